use std::{
    collections::BTreeSet,
    fs,
    io::{self, BufRead, BufReader},
    path::Path,
};

use tracing::debug;

use super::entities::TermRef;

/// Prefix whitelist compiled into the crate.
pub const BUNDLED_PROPERTIES: &str = include_str!("../../resources/obo_xrefs.properties");

/// Set of accepted cross-reference prefixes, such as `FBbt` or `FMA`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XrefWhitelist {
    prefixes: BTreeSet<String>,
}

impl XrefWhitelist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// The whitelist shipped with the crate.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_properties_str(BUNDLED_PROPERTIES)
    }

    /// Reads the keys of a properties file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or read.
    pub fn from_properties_file(path: &Path) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let whitelist = Self::from_properties(BufReader::new(file))?;
        debug!(
            path = %path.display(),
            prefixes = whitelist.len(),
            "loaded xref whitelist"
        );
        Ok(whitelist)
    }

    /// Reads the keys of properties-formatted text; values are ignored.
    ///
    /// # Errors
    ///
    /// Fails when the reader fails.
    pub fn from_properties<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut prefixes = BTreeSet::new();
        let mut continued = false;

        for line in reader.lines() {
            let line = line?;
            let was_continued = continued;
            continued = ends_with_line_continuation(&line);
            if was_continued {
                continue;
            }
            if let Some(key) = property_key(&line) {
                prefixes.insert(key);
            }
        }

        Ok(Self { prefixes })
    }

    fn from_properties_str(text: &str) -> Self {
        Self::from_properties(text.as_bytes()).unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    /// Whether a raw `xref` value should be attached to a term.
    ///
    /// The value must hold a `:` with a whitelisted prefix before it and some
    /// identifier after it.
    #[must_use]
    pub fn accepts(&self, xref: &str) -> bool {
        xref.split_once(':').is_some_and(|(prefix, local)| {
            !local.trim_matches(':').is_empty() && self.contains(prefix)
        })
    }

    /// Builds the reference for an accepted `xref` value.
    #[must_use]
    pub fn filter(&self, xref: &str) -> Option<TermRef> {
        self.accepts(xref).then(|| TermRef::new(xref))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

fn ends_with_line_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|ch| *ch == '\\').count() % 2 == 1
}

/// Key of a logical properties line, ended by the first unescaped `=`, `:` or
/// whitespace.
fn property_key(line: &str) -> Option<String> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }

    let mut key = String::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    key.push(next);
                }
            }
            '=' | ':' => break,
            ch if ch.is_whitespace() => break,
            ch => key.push(ch),
        }
    }

    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn reads_keys_and_ignores_values_and_comments() {
        let text = "# prefixes\n! also a comment\nFBbt\nFMA=anatomy\nMA: mouse\n  ZFA  zebrafish\n\n";
        let whitelist = XrefWhitelist::from_properties(text.as_bytes()).unwrap();

        assert_eq!(
            whitelist.iter().collect::<Vec<_>>(),
            vec!["FBbt", "FMA", "MA", "ZFA"]
        );
    }

    #[test]
    fn continuation_lines_are_not_keys() {
        let text = "CL = cell \\\n    ontology\nUBERON\n";
        let whitelist = XrefWhitelist::from_properties(text.as_bytes()).unwrap();

        assert_eq!(whitelist.iter().collect::<Vec<_>>(), vec!["CL", "UBERON"]);
    }

    #[test]
    fn escaped_separator_stays_in_key() {
        let whitelist = XrefWhitelist::from_properties(r"odd\:key=1".as_bytes()).unwrap();
        assert!(whitelist.contains("odd:key"));
    }

    #[test]
    fn bundled_whitelist_is_not_empty() {
        let whitelist = XrefWhitelist::bundled();
        assert!(whitelist.contains("FBbt"));
        assert!(whitelist.contains("FMA"));
    }

    #[rstest]
    #[case::listed("FBbt:0000001", true)]
    #[case::unlisted("NOPE:123", false)]
    #[case::no_separator("FBbt", false)]
    #[case::empty_local("FBbt:", false)]
    #[case::only_colons("FBbt::", false)]
    #[case::case_sensitive("fbbt:0000001", false)]
    fn filters_by_prefix(#[case] xref: &str, #[case] accepted: bool) {
        let whitelist = XrefWhitelist::new(["FBbt", "FMA"]);
        assert_eq!(whitelist.accepts(xref), accepted);
        assert_eq!(whitelist.filter(xref).is_some(), accepted);
    }
}
