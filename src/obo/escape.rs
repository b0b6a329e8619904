use std::sync::OnceLock;

use regex::Regex;

/// Leading whitespace, an opening quote, a payload of at least two characters
/// whose last character is not a backslash, a closing quote and anything after
/// (dbxref lists, trailing modifiers).
fn quoted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*"(.+?[^\\])".*$"#).expect("quoted value pattern is valid")
    })
}

/// Reverses OBO backslash escaping.
///
/// `\n` becomes a newline, `\t` a tab, `\W` a space, and any other escaped
/// character is kept verbatim without its backslash. A trailing lone backslash
/// is dropped.
#[must_use]
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut escaped = false;

    for ch in raw.chars() {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                'W' => ' ',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }

    out
}

/// Extracts the quoted payload of a `def` or synonym value and decodes it.
///
/// Returns `None` when the value holds no well-formed quoted segment.
#[must_use]
pub fn quoted_value(raw: &str) -> Option<String> {
    quoted_pattern()
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|payload| unescape(payload.as_str()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::newline(r"line\nbreak", "line\nbreak")]
    #[case::tab(r"col\tcol", "col\tcol")]
    #[case::space(r"white\Wspace", "white space")]
    #[case::quote(r#"say \"hi\""#, r#"say "hi""#)]
    #[case::backslash(r"back\\slash", r"back\slash")]
    #[case::unknown(r"\q\{", "q{")]
    #[case::trailing(r"dangling\", "dangling")]
    #[case::plain("nothing to do", "nothing to do")]
    fn unescapes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(unescape(raw), expected);
    }

    #[test]
    fn extracts_definition_payload() {
        assert_eq!(
            quoted_value(r#""a process" [GO:ref]"#).as_deref(),
            Some("a process")
        );
    }

    #[test]
    fn keeps_escaped_quotes_inside_payload() {
        assert_eq!(
            quoted_value(r#"  "the \"big\" one" EXACT []"#).as_deref(),
            Some(r#"the "big" one"#)
        );
    }

    #[test]
    fn decodes_escapes_inside_payload() {
        assert_eq!(
            quoted_value(r#""first\nsecond" []"#).as_deref(),
            Some("first\nsecond")
        );
    }

    #[rstest]
    #[case::unquoted("GO:0000001")]
    #[case::unterminated(r#""never closed"#)]
    #[case::empty(r#""" []"#)]
    fn rejects_values_without_quoted_segment(#[case] raw: &str) {
        assert_eq!(quoted_value(raw), None);
    }
}
