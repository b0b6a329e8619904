//! Line classification and stanza accumulation.
//!
//! OBO text is read line by line. Each line is stripped of its `!` comment and
//! then classified as a stanza header, a tag-value pair or noise. Tag-value
//! pairs are gathered into a [`TagValues`] multi-map belonging to the most
//! recently opened stanza.

use std::{
    collections::BTreeMap,
    io::{self, BufRead},
    sync::OnceLock,
};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

const DEFAULT_NAMESPACE_TAG: &str = "default-namespace";

fn stanza_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*\[(.+)\]\s*$").expect("stanza header pattern is valid"))
}

fn tag_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?[^\\]):(.+)$").expect("tag value pattern is valid"))
}

/// One line of input decoded as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub text: String,
    /// Invalid byte sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Reads the next line of `reader`, without its `\n` or `\r\n` terminator.
///
/// Bytes that are not valid UTF-8 do not fail the read; they are replaced and
/// the line is flagged as lossy. Returns `None` at end of input.
///
/// # Errors
///
/// Fails when the reader fails.
pub fn read_line_lossy<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<DecodedLine>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(match std::str::from_utf8(buf) {
        Ok(text) => DecodedLine {
            text: text.to_string(),
            lossy: false,
        },
        Err(_) => DecodedLine {
            text: String::from_utf8_lossy(buf).into_owned(),
            lossy: true,
        },
    }))
}

/// Removes everything from the first `!` onwards.
///
/// Quoting is not taken into account: a `!` inside a quoted definition also
/// starts a comment.
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    line.find('!').map_or(line, |index| &line[..index])
}

/// Classification of a single comment-stripped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// `[Kind]` opening a new stanza.
    Header(&'a str),
    /// `tag: value`, both sides trimmed.
    TagValue { tag: &'a str, value: &'a str },
    /// Anything else, including blank lines.
    Ignored,
}

impl<'a> Line<'a> {
    /// Classifies a raw line, stripping its comment first.
    #[must_use]
    pub fn classify(raw: &'a str) -> Self {
        let line = strip_comment(raw);

        if let Some(kind) = stanza_header_pattern()
            .captures(line)
            .and_then(|captures| captures.get(1))
        {
            return Self::Header(kind.as_str());
        }

        if let Some(captures) = tag_value_pattern().captures(line) {
            if let (Some(tag), Some(value)) = (captures.get(1), captures.get(2)) {
                return Self::TagValue {
                    tag: tag.as_str().trim(),
                    value: value.as_str().trim(),
                };
            }
        }

        Self::Ignored
    }
}

/// Stanza kinds retained by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    Term,
    Typedef,
}

impl StanzaKind {
    /// Maps a header label to a retained kind; other labels yield `None`.
    #[must_use]
    pub fn from_header(label: &str) -> Option<Self> {
        match label {
            "Term" => Some(Self::Term),
            "Typedef" => Some(Self::Typedef),
            _ => None,
        }
    }
}

/// Multi-valued tag map of one stanza.
///
/// Values of a repeated tag are kept in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagValues {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagValues {
    /// Appends a value to the tag's sequence.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(tag.into()).or_default().push(value.into());
    }

    /// All values recorded for `tag`, in source order.
    #[must_use]
    pub fn values(&self, tag: &str) -> &[String] {
        self.entries.get(tag).map_or(&[], Vec::as_slice)
    }

    /// The first value recorded for `tag`.
    #[must_use]
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.values(tag).first().map(String::as_str)
    }

    /// Reads a boolean flag tag.
    ///
    /// Only the first value counts and it is true when it equals `true`
    /// ignoring case. Repeated values are reported and otherwise ignored.
    #[must_use]
    pub fn flag(&self, tag: &str) -> bool {
        let values = self.values(tag);
        if values.len() > 1 {
            warn!(
                tag,
                id = self.first("id").unwrap_or_default(),
                count = values.len(),
                "flag has more than one value, using the first"
            );
        }
        values
            .first()
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(tag, values)| (tag.as_str(), values.as_slice()))
    }
}

/// Where tag values go while the collector walks the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Header section before the first stanza.
    Header,
    Term(usize),
    Typedef(usize),
    /// Body of a stanza kind that is not retained.
    Discarded,
}

/// Accumulates stanzas from classified lines.
#[derive(Debug, Default)]
pub struct StanzaCollector {
    terms: Vec<TagValues>,
    typedefs: Vec<TagValues>,
    default_namespace: Option<String>,
    ignored_stanzas: usize,
    target: Option<Target>,
}

impl StanzaCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw line to the collector.
    pub fn push_line(&mut self, raw: &str) {
        match Line::classify(raw) {
            Line::Header(label) => self.open(label),
            Line::TagValue { tag, value } => self.record(tag, value),
            Line::Ignored => {}
        }
    }

    fn open(&mut self, label: &str) {
        let target = match StanzaKind::from_header(label) {
            Some(StanzaKind::Term) => {
                self.terms.push(TagValues::default());
                Target::Term(self.terms.len() - 1)
            }
            Some(StanzaKind::Typedef) => {
                self.typedefs.push(TagValues::default());
                Target::Typedef(self.typedefs.len() - 1)
            }
            None => {
                warn!(stanza = label, "ignoring stanza");
                self.ignored_stanzas += 1;
                Target::Discarded
            }
        };
        debug!(stanza = label, "matched stanza");
        self.target = Some(target);
    }

    fn record(&mut self, tag: &str, value: &str) {
        debug!(tag, value, "matched tag");
        if tag == DEFAULT_NAMESPACE_TAG {
            info!(namespace = value, "default-namespace set");
            self.default_namespace = Some(value.to_string());
        }

        let values = match self.target.unwrap_or(Target::Header) {
            Target::Term(index) => &mut self.terms[index],
            Target::Typedef(index) => &mut self.typedefs[index],
            Target::Header | Target::Discarded => return,
        };
        values.insert(tag, value);
    }

    /// Consumes the collector.
    #[must_use]
    pub fn finish(self) -> Stanzas {
        Stanzas {
            terms: self.terms,
            typedefs: self.typedefs,
            default_namespace: self.default_namespace,
            ignored_stanzas: self.ignored_stanzas,
        }
    }
}

/// All stanzas of one OBO document, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stanzas {
    pub terms: Vec<TagValues>,
    pub typedefs: Vec<TagValues>,
    /// Last `default-namespace` value seen anywhere in the file.
    pub default_namespace: Option<String>,
    /// Stanzas whose kind is neither `Term` nor `Typedef`.
    pub ignored_stanzas: usize,
}
