//! Closure engine backed by an external program.
use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use super::{ClosureEngine, ImportError};
use crate::config;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Runs a link-file producing program, `obo2linkfile` by default.
///
/// The link file is created as `obo*.tmp` inside the configured build
/// directory when it exists, otherwise inside the system temp directory.
#[derive(Debug, Clone, Default)]
pub struct CommandClosureEngine {
    settings: config::Reasoner,
}

impl CommandClosureEngine {
    #[must_use]
    pub fn new(settings: config::Reasoner) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &config::Reasoner {
        &self.settings
    }

    /// Directory link files are created in.
    #[must_use]
    pub fn link_file_dir(&self) -> PathBuf {
        if self.settings.build_dir.is_dir() {
            self.settings.build_dir.clone()
        } else {
            std::env::temp_dir()
        }
    }

    /// Creates an empty, persistent link file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be created.
    pub fn create_link_file(&self) -> Result<PathBuf, ImportError> {
        let dir = self.link_file_dir();
        tempfile::Builder::new()
            .prefix("obo")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .and_then(|file| file.into_temp_path().keep().map_err(|err| err.error))
            .map_err(|source| ImportError::TempFile { dir, source })
    }

    /// Program arguments with the placeholders substituted.
    #[must_use]
    pub fn command_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();
        self.settings
            .args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl ClosureEngine for CommandClosureEngine {
    fn compute_closure(&self, source: &Path) -> Result<PathBuf, ImportError> {
        let link_file = self.create_link_file()?;
        let program = self.settings.program.as_str();
        let args = self.command_args(source, &link_file);
        debug!(program, args = ?args, "running closure engine");

        let outcome = duct::cmd(program, &args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run();

        let output = match outcome {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                discard_link_file(&link_file);
                return Err(ImportError::Engine {
                    program: program.to_string(),
                    status: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            Err(source) => {
                discard_link_file(&link_file);
                return Err(ImportError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(progress) = stdout.lines().rev().find(|line| !line.trim().is_empty()) {
            info!(progress = progress.trim(), "closure engine finished");
        }
        Ok(link_file)
    }
}

/// Removes the link file of a failed run, logging when that fails.
fn discard_link_file(link_file: &Path) -> bool {
    match fs::remove_file(link_file) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                err.msg = %err,
                path = %link_file.display(),
                "link_file_cleanup_error"
            );
            false
        }
    }
}
