use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    entities::{Relation, RelationType, Synonym, SynonymKind, Term},
    escape::quoted_value,
    lexer::{read_line_lossy, StanzaCollector, TagValues},
    whitelist::XrefWhitelist,
};
use crate::{
    closure::{self, ClosureEngine, CommandClosureEngine, ImportError},
    config::{self, Config, XrefSource},
};

/// Fatal failures of an ontology parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The cross-reference whitelist could not be loaded.
    #[error("cannot load xref whitelist: {source}")]
    Config { source: io::Error },
    #[error("cannot open ontology `{path}`: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot read ontology: {0}")]
    Read(#[from] io::Error),
}

/// Counts of entries skipped by non-fatal defects, per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    /// Stanzas of a kind other than `Term` or `Typedef`.
    pub ignored_stanzas: usize,
    /// `Term` or `Typedef` stanzas missing their `id` or `name`.
    pub incomplete_stanzas: usize,
    /// Term stanzas whose `id` matches no built term when resolving.
    pub unresolved_terms: usize,
    /// Definitions or synonyms lacking a quoted payload.
    pub malformed_values: usize,
    /// Cross-references outside the whitelist.
    pub rejected_xrefs: usize,
    /// Link records naming an unknown relation type.
    pub unknown_relation_types: usize,
    /// Link records lacking a source, type or target.
    pub malformed_links: usize,
    /// Lines holding bytes that are not valid UTF-8. They are still read,
    /// with the offending bytes replaced.
    pub lossy_lines: usize,
}

impl ParseReport {
    /// Stanzas and relations dropped in total. Rejected cross-references are
    /// filtering, not defects, and lossy lines are kept, so neither is
    /// included.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.ignored_stanzas
            + self.incomplete_stanzas
            + self.unresolved_terms
            + self.unknown_relation_types
            + self.malformed_links
    }
}

/// Builds a term graph from OBO text.
///
/// Terms, relation types and relations accumulate across calls; use a fresh
/// parser for every independent ontology.
#[derive(Debug, Clone)]
pub struct OboParser {
    xref_source: XrefSource,
    reasoner: config::Reasoner,
    whitelist: XrefWhitelist,
    default_namespace: Option<String>,
    terms: BTreeMap<String, Term>,
    types: BTreeMap<String, RelationType>,
    relations: Vec<Relation>,
    report: ParseReport,
}

impl Default for OboParser {
    fn default() -> Self {
        Self::new(XrefSource::default(), config::Reasoner::default())
    }
}

impl OboParser {
    #[must_use]
    pub fn new(xref_source: XrefSource, reasoner: config::Reasoner) -> Self {
        let is_a = RelationType::is_a();
        Self {
            xref_source,
            reasoner,
            whitelist: XrefWhitelist::default(),
            default_namespace: None,
            terms: BTreeMap::new(),
            types: BTreeMap::from([(is_a.id.clone(), is_a)]),
            relations: Vec::new(),
            report: ParseReport::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.xrefs.clone(), config.reasoner.clone())
    }

    /// Loads the cross-reference whitelist, then parses every stanza of `source`.
    ///
    /// # Errors
    ///
    /// Fails when the whitelist cannot be loaded or `source` cannot be read.
    /// Malformed stanzas and values are skipped and counted in [`Self::report`].
    pub fn process_ontology<R: BufRead>(&mut self, source: R) -> Result<(), ParseError> {
        self.read_config()?;
        self.read_terms(source)
    }

    /// [`Self::process_ontology`] over a file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened, see [`Self::process_ontology`].
    pub fn process_ontology_file(&mut self, path: &Path) -> Result<(), ParseError> {
        let reader = open(path)?;
        self.process_ontology(reader)
    }

    /// Parses `source` and maps every known term id to its name.
    ///
    /// The whitelist is not loaded, so no cross-reference is attached.
    ///
    /// # Errors
    ///
    /// Fails when `source` cannot be read.
    pub fn term_id_to_name<R: BufRead>(
        &mut self,
        source: R,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        self.read_terms(source)?;
        Ok(self
            .terms
            .values()
            .map(|term| (term.id().to_string(), term.name().to_string()))
            .collect())
    }

    /// [`Self::term_id_to_name`] over a file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or read.
    pub fn term_id_to_name_file(
        &mut self,
        path: &Path,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        let reader = open(path)?;
        self.term_id_to_name(reader)
    }

    /// Computes the transitive closure of the ontology at `source` with the
    /// configured external engine and appends the resulting relations.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot run or its output cannot be read.
    pub fn process_relations(&mut self, source: &Path) -> Result<(), ImportError> {
        let engine = CommandClosureEngine::new(self.reasoner.clone());
        self.process_relations_with(&engine, source)
    }

    /// [`Self::process_relations`] with a caller supplied engine.
    ///
    /// # Errors
    ///
    /// Fails when the engine fails or its output cannot be read.
    pub fn process_relations_with<E: ClosureEngine + ?Sized>(
        &mut self,
        engine: &E,
        source: &Path,
    ) -> Result<(), ImportError> {
        let links = closure::import(engine, source, &self.types)?;
        self.report.unknown_relation_types += links.unknown_relation_types;
        self.report.malformed_links += links.malformed;
        self.report.lossy_lines += links.lossy_lines;
        self.relations.extend(links.relations);
        Ok(())
    }

    /// Every parsed term, ordered by id.
    pub fn all_terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    /// Every imported relation, in link file order.
    #[must_use]
    pub fn all_relations(&self) -> &[Relation] {
        &self.relations
    }

    #[must_use]
    pub fn terms(&self) -> &BTreeMap<String, Term> {
        &self.terms
    }

    #[must_use]
    pub fn term(&self, id: &str) -> Option<&Term> {
        self.terms.get(id)
    }

    #[must_use]
    pub fn relation_types(&self) -> &BTreeMap<String, RelationType> {
        &self.types
    }

    /// The last `default-namespace` declared by a parsed document.
    #[must_use]
    pub fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    #[must_use]
    pub fn whitelist(&self) -> &XrefWhitelist {
        &self.whitelist
    }

    #[must_use]
    pub fn report(&self) -> ParseReport {
        self.report
    }

    fn read_config(&mut self) -> Result<(), ParseError> {
        self.whitelist = self
            .xref_source
            .load()
            .map_err(|source| ParseError::Config { source })?;
        debug!(prefixes = self.whitelist.len(), "xref whitelist loaded");
        Ok(())
    }

    /// Collects all stanzas of `source`, then builds types, builds terms and
    /// finally resolves each term against the complete term map.
    fn read_terms<R: BufRead>(&mut self, mut source: R) -> Result<(), ParseError> {
        let mut collector = StanzaCollector::new();
        let mut buf = Vec::new();
        let mut line_number = 0usize;
        while let Some(line) = read_line_lossy(&mut source, &mut buf)? {
            line_number += 1;
            if line.lossy {
                warn!(line = line_number, "replaced bytes that are not valid UTF-8");
                self.report.lossy_lines += 1;
            }
            collector.push_line(&line.text);
        }
        let stanzas = collector.finish();

        self.report.ignored_stanzas += stanzas.ignored_stanzas;
        if let Some(namespace) = stanzas.default_namespace {
            self.default_namespace = Some(namespace);
        }

        for values in &stanzas.typedefs {
            self.build_type(values);
        }
        let obsolete: Vec<bool> = stanzas
            .terms
            .iter()
            .map(|values| self.build_term(values))
            .collect();
        for (values, obsolete) in stanzas.terms.iter().zip(obsolete) {
            if !obsolete {
                self.resolve_term(values);
            }
        }

        debug!(
            terms = self.terms.len(),
            types = self.types.len(),
            "ontology parsed"
        );
        Ok(())
    }

    fn build_type(&mut self, values: &TagValues) {
        let (Some(id), Some(name)) = (values.first("id"), values.first("name")) else {
            warn!(tags = ?values, "skipping Typedef stanza without id or name");
            self.report.incomplete_stanzas += 1;
            return;
        };
        let relation_type = RelationType::new(id, name, values.flag("is_transitive"));
        self.types.insert(relation_type.id.clone(), relation_type);
    }

    /// Builds the term of one stanza and returns the stanza's obsolete flag.
    fn build_term(&mut self, values: &TagValues) -> bool {
        let obsolete = values.flag("is_obsolete");
        let (Some(id), Some(name)) = (values.first("id"), values.first("name")) else {
            warn!(tags = ?values, "skipping Term stanza without id or name");
            self.report.incomplete_stanzas += 1;
            return obsolete;
        };
        let term = Term::new(id, name).with_obsolete(obsolete);
        if self.terms.insert(id.to_string(), term).is_some() {
            warn!(id, "duplicate term id, keeping the last stanza");
        }
        obsolete
    }

    fn resolve_term(&mut self, values: &TagValues) {
        let Some(id) = values.first("id") else {
            return;
        };
        let Some(term) = self.terms.get_mut(id) else {
            warn!(id, "no term found for id");
            self.report.unresolved_terms += 1;
            return;
        };

        for kind in SynonymKind::ALL {
            for raw in values.values(kind.tag()) {
                match quoted_value(raw) {
                    Some(value) => term.add_synonym(Synonym::new(value, kind)),
                    None if !kind.is_quoted() => term.add_synonym(Synonym::new(raw.as_str(), kind)),
                    None => {
                        warn!(id, value = raw.as_str(), "could not match synonym value");
                        self.report.malformed_values += 1;
                    }
                }
            }
        }

        for raw in values.values("xref") {
            match self.whitelist.filter(raw) {
                Some(xref) => {
                    term.add_xref(xref);
                }
                None => self.report.rejected_xrefs += 1,
            }
        }

        if let Some(namespace) = values
            .first("namespace")
            .or(self.default_namespace.as_deref())
        {
            term.set_namespace(namespace);
        }

        if let Some(def) = values.first("def") {
            match quoted_value(def) {
                Some(description) => term.set_description(description),
                None => {
                    warn!(id, def, "failed to parse def of term");
                    self.report.malformed_values += 1;
                }
            }
        }

        term.set_tag_values(values.clone());
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ParseError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ParseError::Open {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> OboParser {
        let mut parser = OboParser::new(
            XrefSource::Prefixes {
                prefixes: vec!["FBbt".to_string(), "FMA".to_string()],
            },
            config::Reasoner::default(),
        );
        parser.process_ontology(text.as_bytes()).unwrap();
        parser
    }

    #[test]
    fn builds_single_term() {
        let parser = parse("[Term]\nid: GO:0000001\nname: root\nnamespace: biological_process\n");

        let terms: Vec<_> = parser.all_terms().collect();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id(), "GO:0000001");
        assert_eq!(terms[0].name(), "root");
        assert_eq!(terms[0].namespace(), Some("biological_process"));
        assert!(!terms[0].is_obsolete());
    }

    #[test]
    fn decodes_definition() {
        let parser = parse("[Term]\nid: GO:1\nname: p\ndef: \"a process\" [GO:ref]\n");
        assert_eq!(parser.term("GO:1").unwrap().description(), Some("a process"));
    }

    #[test]
    fn malformed_definition_is_left_unset() {
        let parser = parse("[Term]\nid: GO:1\nname: p\ndef: unquoted text\n");

        assert_eq!(parser.term("GO:1").unwrap().description(), None);
        assert_eq!(parser.report().malformed_values, 1);
    }

    #[test]
    fn falls_back_to_default_namespace() {
        let parser = parse(
            "default-namespace: cell\n[Term]\nid: CL:1\nname: a\n[Term]\nid: CL:2\nname: b\nnamespace: other\n",
        );

        assert_eq!(parser.default_namespace(), Some("cell"));
        assert_eq!(parser.term("CL:1").unwrap().namespace(), Some("cell"));
        assert_eq!(parser.term("CL:2").unwrap().namespace(), Some("other"));
    }

    #[test]
    fn attaches_synonyms_in_tag_then_source_order() {
        let parser = parse(concat!(
            "[Term]\nid: GO:1\nname: t\n",
            "alt_id: GO:9\n",
            "exact_synonym: \"second\" []\n",
            "synonym: \"first\" EXACT []\n",
            "synonym: \"also\\Wfirst\" RELATED []\n",
            "narrow_synonym: no quotes\n",
        ));

        let synonyms: Vec<_> = parser
            .term("GO:1")
            .unwrap()
            .synonyms()
            .iter()
            .map(|synonym| (synonym.value.as_str(), synonym.kind))
            .collect();
        assert_eq!(
            synonyms,
            vec![
                ("first", SynonymKind::Synonym),
                ("also first", SynonymKind::Synonym),
                ("second", SynonymKind::ExactSynonym),
                ("GO:9", SynonymKind::AltId),
            ]
        );
        assert_eq!(parser.report().malformed_values, 1);
    }

    #[test]
    fn filters_xrefs_by_whitelist() {
        let parser = parse(
            "[Term]\nid: GO:1\nname: t\nxref: FBbt:0000001\nxref: NOPE:123\nxref: FMA:5884\nxref: plain\n",
        );

        let xrefs: Vec<_> = parser
            .term("GO:1")
            .unwrap()
            .xrefs()
            .iter()
            .map(|xref| xref.id())
            .collect();
        assert_eq!(xrefs, vec!["FBbt:0000001", "FMA:5884"]);
        assert_eq!(parser.report().rejected_xrefs, 2);
    }

    #[test]
    fn obsolete_terms_are_not_resolved() {
        let parser = parse(concat!(
            "default-namespace: go\n",
            "[Term]\nid: GO:2\nname: old\nis_obsolete: true\n",
            "synonym: \"legacy\" EXACT []\nxref: FBbt:1\ndef: \"gone\" []\nnamespace: ns\n",
        ));

        let term = parser.term("GO:2").unwrap();
        assert!(term.is_obsolete());
        assert!(term.synonyms().is_empty());
        assert!(term.xrefs().is_empty());
        assert_eq!(term.namespace(), None);
        assert_eq!(term.description(), None);
    }

    #[test]
    fn stanzas_without_id_or_name_are_skipped() {
        let parser = parse(concat!(
            "[Term]\nname: nameless\n",
            "[Term]\nid: GO:3\n",
            "[Typedef]\nname: anonymous\n",
            "[Term]\nid: GO:4\nname: kept\n",
        ));

        assert_eq!(parser.terms().keys().collect::<Vec<_>>(), vec!["GO:4"]);
        let report = parser.report();
        assert_eq!(report.incomplete_stanzas, 3);
        assert_eq!(report.unresolved_terms, 1);
    }

    #[test]
    fn typedefs_override_builtin_is_a() {
        let parser = parse(concat!(
            "[Typedef]\nid: part_of\nname: part of\nis_transitive: TRUE\n",
            "[Typedef]\nid: is_a\nname: subclass\n",
            "[Typedef]\nid: regulates\nname: regulates\n",
        ));

        let types = parser.relation_types();
        assert_eq!(types.len(), 3);
        assert_eq!(types["part_of"], RelationType::new("part_of", "part of", true));
        assert_eq!(types["is_a"], RelationType::new("is_a", "subclass", false));
        assert!(!types["regulates"].transitive);
    }

    #[test]
    fn builtin_is_a_exists_without_typedefs() {
        let parser = parse("[Term]\nid: GO:1\nname: t\n");
        assert_eq!(parser.relation_types()["is_a"], RelationType::is_a());
    }

    #[test]
    fn missing_whitelist_file_is_fatal() {
        let mut parser = OboParser::new(
            XrefSource::File {
                file: PathBuf::from("no/such/obo_xrefs.properties"),
            },
            config::Reasoner::default(),
        );

        let err = parser
            .process_ontology("[Term]\nid: GO:1\nname: t\n".as_bytes())
            .unwrap_err();

        assert!(matches!(err, ParseError::Config { .. }));
        assert!(parser.terms().is_empty());
    }

    #[test]
    fn id_to_name_skips_whitelist() {
        let mut parser = OboParser::default();
        let names = parser
            .term_id_to_name("[Term]\nid: GO:1\nname: one\nxref: FBbt:1\n[Term]\nid: GO:2\nname: two\n".as_bytes())
            .unwrap();

        assert_eq!(names.get("GO:1").map(String::as_str), Some("one"));
        assert_eq!(names.get("GO:2").map(String::as_str), Some("two"));
        assert!(parser.term("GO:1").unwrap().xrefs().is_empty());
    }

    #[test]
    fn invalid_utf8_inside_a_stanza_keeps_the_parse_going() {
        let mut parser = OboParser::default();
        parser
            .process_ontology(
                &b"[Term]\nid: GO:1\nname: one\n[Term]\nid: GO:2\nname: caf\xE9\n[Term]\nid: GO:3\nname: three\n"[..],
            )
            .unwrap();

        assert_eq!(
            parser.terms().keys().collect::<Vec<_>>(),
            vec!["GO:1", "GO:2", "GO:3"]
        );
        assert_eq!(parser.term("GO:2").unwrap().name(), "caf\u{FFFD}");
        assert_eq!(parser.report().lossy_lines, 1);
        assert_eq!(parser.report().skipped(), 0);
    }

    #[test]
    fn repeated_obsolete_flag_uses_the_first_value() {
        let parser = parse(concat!(
            "[Term]\nid: GO:1\nname: t\nis_obsolete: false\nis_obsolete: true\n",
            "synonym: \"kept\" EXACT []\n",
        ));

        let term = parser.term("GO:1").unwrap();
        assert!(!term.is_obsolete());
        assert_eq!(term.synonyms().len(), 1);
    }

    #[test]
    fn keeps_raw_tag_values() {
        let parser = parse("[Term]\nid: GO:1\nname: t\nis_a: GO:0 ! parent\n");
        assert_eq!(
            parser.term("GO:1").unwrap().tag_values().first("is_a"),
            Some("GO:0")
        );
    }
}
