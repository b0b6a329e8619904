//! Relation closure import.
//!
//! An external engine reads a raw ontology file and writes every relation of
//! its transitive closure to a tab-delimited link file. This module drives the
//! engine through [`ClosureEngine`] and turns the link file into
//! [`Relation`]s.
//!
//! Link file records hold at least three tab-separated fields:
//!
//! | index | content |
//! |---|---|
//! | 0 | source term id |
//! | 1 | relation type id, optionally prefixed with `OBO_REL:` |
//! | 2 | target term id |
//! | 3 | `asserted` for directly stated relations |
//! | 4 | unused |
//! | 5 | `redundant` for relations implied by others |

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::obo::{
    entities::{Relation, RelationType},
    lexer::read_line_lossy,
};

pub mod engine;

pub use engine::CommandClosureEngine;

const RELATION_TYPE_PREFIX: &str = "OBO_REL:";
const ASSERTED: &str = "asserted";
const REDUNDANT: &str = "redundant";

/// Errors raised while computing or reading a relation closure.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot create link file in `{dir}`: {source}")]
    TempFile { dir: PathBuf, source: io::Error },
    #[error("cannot run closure engine `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("closure engine `{program}` failed with status {status:?}: {stderr}")]
    Engine {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("cannot read link file `{path}`: {source}")]
    LinkFile { path: PathBuf, source: io::Error },
    #[error("cannot remove link file `{path}`: {source}")]
    Cleanup { path: PathBuf, source: io::Error },
}

/// Computes the transitive closure of an ontology file.
pub trait ClosureEngine {
    /// Runs the engine over `source` and returns the path of the link file it
    /// wrote.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot run or does not complete.
    fn compute_closure(&self, source: &Path) -> Result<PathBuf, ImportError>;

    /// Disposes of a link file returned by [`Self::compute_closure`].
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be removed.
    fn cleanup(&self, link_file: &Path) -> Result<(), ImportError> {
        std::fs::remove_file(link_file).map_err(|source| ImportError::Cleanup {
            path: link_file.to_path_buf(),
            source,
        })
    }
}

/// Cleans the link file up however the import ends.
struct LinkFileGuard<'a, E: ClosureEngine + ?Sized> {
    engine: &'a E,
    path: PathBuf,
}

impl<E: ClosureEngine + ?Sized> Drop for LinkFileGuard<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.cleanup(&self.path) {
            warn!(err.msg = %err, "link_file_cleanup_error");
        }
    }
}

/// Relations read from a link file, with counts of dropped records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    pub relations: Vec<Relation>,
    /// Records whose relation type is not known.
    pub unknown_relation_types: usize,
    /// Records lacking a source, type or target field.
    pub malformed: usize,
    /// Lines holding bytes that are not valid UTF-8, read with the bytes
    /// replaced.
    pub lossy_lines: usize,
}

/// Outcome of reading one link file line.
#[derive(Debug)]
enum LinkRecord<'a> {
    Relation(Relation),
    UnknownType(&'a str),
    Malformed,
    Blank,
}

impl<'a> LinkRecord<'a> {
    fn parse(line: &'a str, types: &BTreeMap<String, RelationType>) -> Self {
        if line.trim().is_empty() {
            return Self::Blank;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 || fields[0].is_empty() || fields[2].is_empty() {
            return Self::Malformed;
        }

        let type_id = fields[1].replace(RELATION_TYPE_PREFIX, "");
        let Some(relation_type) = types.get(&type_id) else {
            return Self::UnknownType(fields[1]);
        };

        let mut relation = Relation::new(fields[0], fields[2], relation_type.clone());
        relation.direct = fields.get(3).is_some_and(|field| *field == ASSERTED);
        relation.redundant = fields.get(5).is_some_and(|field| *field == REDUNDANT);
        Self::Relation(relation)
    }
}

/// Reads link records in file order, resolving their type against `types`.
///
/// # Errors
///
/// Fails when the reader fails.
pub fn read_links<R: BufRead>(
    mut reader: R,
    types: &BTreeMap<String, RelationType>,
) -> io::Result<Links> {
    let mut links = Links::default();
    let mut buf = Vec::new();

    while let Some(decoded) = read_line_lossy(&mut reader, &mut buf)? {
        if decoded.lossy {
            warn!(line = %decoded.text, "replaced bytes that are not valid UTF-8");
            links.lossy_lines += 1;
        }
        let line = decoded.text;
        match LinkRecord::parse(&line, types) {
            LinkRecord::Relation(relation) => links.relations.push(relation),
            LinkRecord::UnknownType(relation_type) => {
                info!(relation_type, "unsupported relation type");
                links.unknown_relation_types += 1;
            }
            LinkRecord::Blank => {}
            LinkRecord::Malformed => {
                warn!(line = %line, "malformed link record");
                links.malformed += 1;
            }
        }
    }

    debug!(relations = links.relations.len(), "read link file");
    Ok(links)
}

/// Runs `engine` over `source` and reads the link file it produces.
///
/// The link file is handed back to [`ClosureEngine::cleanup`] whether reading
/// it succeeds or not.
///
/// # Errors
///
/// Fails when the engine fails or its link file cannot be read.
pub fn import<E: ClosureEngine + ?Sized>(
    engine: &E,
    source: &Path,
    types: &BTreeMap<String, RelationType>,
) -> Result<Links, ImportError> {
    let started = Instant::now();

    let guard = LinkFileGuard {
        engine,
        path: engine.compute_closure(source)?,
    };
    let links = File::open(&guard.path)
        .and_then(|file| read_links(BufReader::new(file), types))
        .map_err(|source| ImportError::LinkFile {
            path: guard.path.clone(),
            source,
        })?;
    drop(guard);

    info!(
        source = %source.display(),
        relations = links.relations.len(),
        took_ms = started.elapsed().as_millis(),
        "processed transitive closure"
    );
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> BTreeMap<String, RelationType> {
        [
            RelationType::is_a(),
            RelationType::new("part_of", "part of", true),
        ]
        .into_iter()
        .map(|relation_type| (relation_type.id.clone(), relation_type))
        .collect()
    }

    #[test]
    fn reads_asserted_not_redundant_link() {
        let links = read_links(
            "GO:001\tOBO_REL:is_a\tGO:002\tasserted\tx\tnot_redundant\n".as_bytes(),
            &types(),
        )
        .unwrap();

        assert_eq!(links.relations.len(), 1);
        let relation = &links.relations[0];
        assert_eq!(relation.source, "GO:001");
        assert_eq!(relation.target, "GO:002");
        assert_eq!(relation.relation_type, RelationType::is_a());
        assert!(relation.direct);
        assert!(!relation.redundant);
    }

    #[test]
    fn reads_flags_and_unprefixed_types() {
        let links = read_links(
            "A\tpart_of\tB\timplied\t\tredundant\nC\tOBO_REL:part_of\tD\n".as_bytes(),
            &types(),
        )
        .unwrap();

        let flags: Vec<_> = links
            .relations
            .iter()
            .map(|relation| (relation.source.as_str(), relation.direct, relation.redundant))
            .collect();
        assert_eq!(flags, vec![("A", false, true), ("C", false, false)]);
    }

    #[test]
    fn counts_dropped_records() {
        let links = read_links(
            "A\tOBO_REL:regulates\tB\tasserted\t\t\nbroken line\n\nE\tis_a\tF\tasserted\t\t\n"
                .as_bytes(),
            &types(),
        )
        .unwrap();

        assert_eq!(links.relations.len(), 1);
        assert_eq!(links.relations[0].source, "E");
        assert_eq!(links.unknown_relation_types, 1);
        assert_eq!(links.malformed, 1);
    }

    #[test]
    fn invalid_utf8_does_not_abort_the_link_file() {
        let links = read_links(
            &b"A\tis_a\tB\tasserted\t\t\nGO:caf\xE9\tis_a\tB\t\t\t\nC\tis_a\tD\t\t\t\n"[..],
            &types(),
        )
        .unwrap();

        let sources: Vec<_> = links
            .relations
            .iter()
            .map(|relation| relation.source.as_str())
            .collect();
        assert_eq!(sources, vec!["A", "GO:caf\u{FFFD}", "C"]);
        assert_eq!(links.lossy_lines, 1);
        assert_eq!(links.malformed, 0);
    }
}
