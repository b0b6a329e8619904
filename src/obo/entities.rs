use std::fmt;

use serde::Serialize;

use super::lexer::TagValues;

/// Identifier of the relation type every ontology has, declared or not.
pub const IS_A: &str = "is_a";

/// Kind of a [`Synonym`], named after the tag it was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynonymKind {
    Synonym,
    RelatedSynonym,
    ExactSynonym,
    BroadSynonym,
    NarrowSynonym,
    AltId,
}

impl SynonymKind {
    /// Resolution order of synonym-bearing tags within a stanza.
    pub const ALL: [Self; 6] = [
        Self::Synonym,
        Self::RelatedSynonym,
        Self::ExactSynonym,
        Self::BroadSynonym,
        Self::NarrowSynonym,
        Self::AltId,
    ];

    /// The stanza tag holding synonyms of this kind.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Synonym => "synonym",
            Self::RelatedSynonym => "related_synonym",
            Self::ExactSynonym => "exact_synonym",
            Self::BroadSynonym => "broad_synonym",
            Self::NarrowSynonym => "narrow_synonym",
            Self::AltId => "alt_id",
        }
    }

    /// Whether values of this kind are quoted strings.
    #[must_use]
    pub fn is_quoted(self) -> bool {
        !matches!(self, Self::AltId)
    }
}

impl fmt::Display for SynonymKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An alternative label or identifier of a [`Term`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Synonym {
    pub value: String,
    pub kind: SynonymKind,
}

impl Synonym {
    #[must_use]
    pub fn new(value: impl Into<String>, kind: SynonymKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

/// Reference to a term of another ontology, carrying only its identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TermRef {
    id: String,
}

impl TermRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The part of the identifier before the first `:`.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.id.split_once(':').map(|(prefix, _)| prefix)
    }
}

impl fmt::Display for TermRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One ontology concept read from a `[Term]` stanza.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Term {
    id: String,
    name: String,
    namespace: Option<String>,
    description: Option<String>,
    obsolete: bool,
    synonyms: Vec<Synonym>,
    xrefs: Vec<TermRef>,
    #[serde(skip)]
    tag_values: TagValues,
}

impl Term {
    /// Creates a term carrying only its identity.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            namespace: None,
            description: None,
            obsolete: false,
            synonyms: Vec::new(),
            xrefs: Vec::new(),
            tag_values: TagValues::default(),
        }
    }

    #[must_use]
    pub fn with_obsolete(mut self, obsolete: bool) -> Self {
        self.obsolete = obsolete;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of the term; unset until the term is resolved.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Decoded payload of the `def` tag.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }

    /// Synonyms in the order they were attached.
    #[must_use]
    pub fn synonyms(&self) -> &[Synonym] {
        &self.synonyms
    }

    /// Accepted cross-references in source order, without duplicates.
    #[must_use]
    pub fn xrefs(&self) -> &[TermRef] {
        &self.xrefs
    }

    /// The raw stanza the term was resolved from.
    #[must_use]
    pub fn tag_values(&self) -> &TagValues {
        &self.tag_values
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn set_tag_values(&mut self, tag_values: TagValues) {
        self.tag_values = tag_values;
    }

    pub fn add_synonym(&mut self, synonym: Synonym) {
        self.synonyms.push(synonym);
    }

    /// Adds a cross-reference; returns `false` when it was already present.
    pub fn add_xref(&mut self, xref: TermRef) -> bool {
        if self.xrefs.contains(&xref) {
            return false;
        }
        self.xrefs.push(xref);
        true
    }
}

/// A named relation kind, such as `is_a` or `part_of`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RelationType {
    pub id: String,
    pub name: String,
    pub transitive: bool,
}

impl RelationType {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, transitive: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transitive,
        }
    }

    /// The built-in transitive `is_a` type.
    #[must_use]
    pub fn is_a() -> Self {
        Self::new(IS_A, IS_A, true)
    }
}

/// A typed, directed edge between two term identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    /// Stated in the source ontology rather than inferred.
    pub direct: bool,
    /// Implied by other relations.
    pub redundant: bool,
}

impl Relation {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type,
            direct: false,
            redundant: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrefs_are_deduplicated_in_order() {
        let mut term = Term::new("GO:0000001", "root");
        assert!(term.add_xref(TermRef::new("FMA:2")));
        assert!(term.add_xref(TermRef::new("FBbt:1")));
        assert!(!term.add_xref(TermRef::new("FMA:2")));

        let ids: Vec<_> = term.xrefs().iter().map(TermRef::id).collect();
        assert_eq!(ids, vec!["FMA:2", "FBbt:1"]);
    }

    #[test]
    fn term_ref_prefix() {
        assert_eq!(TermRef::new("FBbt:0000001").prefix(), Some("FBbt"));
        assert_eq!(TermRef::new("orphan").prefix(), None);
    }

    #[test]
    fn only_alt_id_is_unquoted() {
        let unquoted: Vec<_> = SynonymKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_quoted())
            .collect();
        assert_eq!(unquoted, vec![SynonymKind::AltId]);
    }

    #[test]
    fn new_term_is_unresolved() {
        let term = Term::new("GO:0000001", "root").with_obsolete(true);
        assert!(term.is_obsolete());
        assert_eq!(term.namespace(), None);
        assert_eq!(term.description(), None);
        assert!(term.synonyms().is_empty());
        assert!(term.tag_values().is_empty());
    }
}
