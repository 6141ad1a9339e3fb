//! Praat interpreter invocation
//!
//! The interpreter gets the script file as its only argument and no stdin.
//! Anything printed to stderr is treated as failure; the exit status is not
//! consulted.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Praat invocation failure
#[derive(Debug, Error)]
pub enum PraatError {
    #[error("Praat executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Failed to start Praat: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Praat reported: {0}")]
    Stderr(String),
}

/// Executes a rendered script and returns its stdout
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &Path) -> Result<String, PraatError>;
}

/// Runs scripts with a locally installed Praat
#[derive(Debug, Clone)]
pub struct PraatRunner {
    executable: PathBuf,
}

impl PraatRunner {
    /// Runner for an explicit executable path
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Runner for the executable inside an installation directory
    ///
    /// A path that already names the executable file is used as-is.
    pub fn locate(install_path: &Path) -> Self {
        if install_path.is_file() {
            return Self::new(install_path);
        }
        Self::new(install_path.join(Self::executable_name()))
    }

    /// Platform-specific executable path relative to the installation directory
    pub fn executable_name() -> &'static str {
        if cfg!(target_os = "windows") {
            "Praat.exe"
        } else if cfg!(target_os = "macos") {
            "Praat.app/Contents/MacOS/Praat"
        } else {
            "praat"
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn is_available(&self) -> bool {
        self.executable.is_file()
    }
}

#[async_trait]
impl ScriptRunner for PraatRunner {
    async fn run(&self, script: &Path) -> Result<String, PraatError> {
        if !self.is_available() {
            return Err(PraatError::ExecutableNotFound(self.executable.clone()));
        }

        debug!(
            executable = %self.executable.display(),
            script = %script.display(),
            "Running Praat script"
        );

        let output = Command::new(&self.executable)
            .arg("--run")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(PraatError::Spawn)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            warn!(script = %script.display(), "Praat wrote to stderr: {}", stderr);
            return Err(PraatError::Stderr(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
