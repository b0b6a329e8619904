//! OBO flat-file parsing.
//!
//! Parsing happens in two steps. The [`lexer`] first collects every stanza of
//! the document; [`OboParser`] then builds relation types and terms, and only
//! afterwards resolves synonyms, cross-references, namespaces and definitions,
//! so stanzas may refer to terms declared later in the file.

pub mod entities;
pub mod escape;
pub mod lexer;
pub mod parser;
pub mod whitelist;

pub use entities::{Relation, RelationType, Synonym, SynonymKind, Term, TermRef, IS_A};
pub use parser::{OboParser, ParseError, ParseReport};
pub use whitelist::XrefWhitelist;
