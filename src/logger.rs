//! # Logger
//!
//! Installs a global `tracing` subscriber configured from [`config::Logger`].
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::config;

// Filter applied when no override is configured; other crates stay at `warn`.
const MODULE_WHITELIST: &[&str] = &["obo_graph"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogLevel {
    /// The "off" level.
    #[serde(rename = "off")]
    Off,
    /// The "trace" level.
    #[serde(rename = "trace")]
    Trace,
    /// The "debug" level.
    #[serde(rename = "debug")]
    Debug,
    /// The "info" level.
    #[serde(rename = "info")]
    #[default]
    Info,
    /// The "warn" level.
    #[serde(rename = "warn")]
    Warn,
    /// The "error" level.
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Format {
    #[serde(rename = "compact")]
    #[default]
    Compact,
    #[serde(rename = "pretty")]
    Pretty,
    #[serde(rename = "json")]
    Json,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Builds the filter directive for a logger configuration.
///
/// `RUST_LOG` wins over the configured level, and an explicit
/// `override_filter` wins over both.
#[must_use]
pub fn filter_directive(config: &config::Logger) -> String {
    if let Some(filter) = &config.override_filter {
        return filter.clone();
    }
    if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !env.is_empty() {
            return env;
        }
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        MODULE_WHITELIST
            .iter()
            .map(|module| format!("{module}={}", config.level)),
    );
    directives.join(",")
}

/// Initialize the global subscriber.
///
/// Returns `false` when logging is disabled or a subscriber was already
/// installed; calling it twice is harmless.
pub fn init(config: &config::Logger) -> bool {
    if !config.enable {
        return false;
    }

    let filter = EnvFilter::try_new(filter_directive(config))
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::default().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        Format::Compact => builder.compact().with_ansi(true).try_init(),
        Format::Pretty => builder.pretty().with_ansi(true).try_init(),
        Format::Json => builder.json().with_ansi(false).try_init(),
    };
    installed.is_ok()
}
