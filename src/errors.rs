//! # Application Error Handling

use crate::{closure::ImportError, config::ConfigError, obo::ParseError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    JSON(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
