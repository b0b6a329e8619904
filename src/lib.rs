//! Parser for the Open Biomedical Ontologies flat-file format.
//!
//! [`obo::OboParser`] reads `[Term]` and `[Typedef]` stanzas into an in-memory
//! term map, and merges relations computed by an external transitive-closure
//! engine (see [`closure`]) into the same graph.
pub use self::errors::Error;

pub mod closure;
pub mod config;
pub mod errors;
pub mod logger;
pub mod obo;

#[cfg(feature = "cli")]
pub mod cli;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
