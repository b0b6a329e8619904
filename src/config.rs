//! # Configuration
//!
//! Settings are read from a YAML document. Every section is optional:
//!
//! ```yaml
//! logger:
//!   enable: true
//!   level: debug
//!   format: compact
//! xrefs:
//!   file: config/obo_xrefs.properties
//! reasoner:
//!   program: obo2linkfile
//!   args: ["-o", "{output}", "{input}"]
//!   build_dir: build
//! ```
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{logger, obo::XrefWhitelist};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("cannot parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: Logger,
    pub xrefs: XrefSource,
    pub reasoner: Reasoner,
}

impl Config {
    /// Reads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or not valid YAML for [`Config`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Fails when the text is not valid YAML for [`Config`].
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Logger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Logger {
    /// Enable log write to stdout
    pub enable: bool,

    /// Set the logger level.
    ///
    /// * options: `trace` | `debug` | `info` | `warn` | `error`
    pub level: logger::LogLevel,

    /// Set the logger format.
    ///
    /// * options: `compact` | `pretty` | `json`
    pub format: logger::Format,

    /// Override our custom tracing filter.
    ///
    /// Set this to your own filter if you want to see traces from internal
    /// libraries.
    pub override_filter: Option<String>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: logger::LogLevel::default(),
            format: logger::Format::default(),
            override_filter: None,
        }
    }
}

/// Where the cross-reference prefix whitelist comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum XrefSource {
    /// Keys of a properties file.
    File { file: PathBuf },
    /// Prefixes listed inline.
    Prefixes { prefixes: Vec<String> },
    /// The whitelist compiled into the crate.
    #[default]
    #[serde(skip_deserializing)]
    Bundled,
}

impl XrefSource {
    /// Loads the whitelist.
    ///
    /// # Errors
    ///
    /// Fails when a configured properties file cannot be read.
    pub fn load(&self) -> std::io::Result<XrefWhitelist> {
        match self {
            Self::File { file } => XrefWhitelist::from_properties_file(file),
            Self::Prefixes { prefixes } => Ok(XrefWhitelist::new(prefixes.iter().cloned())),
            Self::Bundled => Ok(XrefWhitelist::bundled()),
        }
    }
}

/// External transitive-closure engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Reasoner {
    /// Executable producing a link file from an OBO file.
    pub program: String,
    /// Arguments; `{input}` and `{output}` are substituted with the source
    /// ontology path and the link file path.
    pub args: Vec<String>,
    /// Directory preferred for link files when it exists.
    pub build_dir: PathBuf,
}

impl Default for Reasoner {
    fn default() -> Self {
        Self {
            program: "obo2linkfile".to_string(),
            args: vec!["-o".to_string(), "{output}".to_string(), "{input}".to_string()],
            build_dir: PathBuf::from("build"),
        }
    }
}
