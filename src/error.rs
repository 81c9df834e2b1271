//! Error taxonomy for the packaging pipeline.
//!
//! Every failure the pipeline can signal is a typed variant so the CLI can map
//! it to a distinct exit code without inspecting message text.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stages that run a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Build => f.write_str("build"),
            Stage::Assemble => f.write_str("assemble"),
        }
    }
}

/// Diagnostics for a child process that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    /// Exit code, or `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Bounded tail of the child's stderr.
    pub stderr_tail: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} step exited with status {code}", self.stage)?,
            None => write!(f, "{} step was terminated by a signal", self.stage)?,
        }
        let last_line = self
            .stderr_tail
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty());
        if let Some(line) = last_line {
            write!(f, ": {}", line.trim())?;
        }
        Ok(())
    }
}

/// Errors raised by [`crate::pipeline::create_package`] and its stages.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Folder {} does not exist.", .0.display())]
    SourceDirectoryNotFound(PathBuf),

    #[error("Python {0:?} is not available for download.")]
    RuntimeNotAvailable(String),

    #[error("runtime executable {} is not inside its install root {}", .executable.display(), .install_root.display())]
    RuntimeLayout {
        executable: PathBuf,
        install_root: PathBuf,
    },

    #[error("build command failed: {0}")]
    BuildCommandFailed(StageFailure),

    #[error("archive assembly failed: {0}")]
    ArchiveAssemblyFailed(StageFailure),

    #[error("failed to start {stage} step")]
    Spawn {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("archive builder not found; set PACKAGED_MAKESELF or put makeself.sh on PATH")]
    AssemblerNotFound,

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted")]
    Interrupted,

    #[error("failed to clean up {}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PackageError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Extension trait attaching a context message to raw I/O results.
pub(crate) trait IoContext<T> {
    fn io_context<F>(self, context: F) -> Result<T, PackageError>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T, PackageError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| PackageError::io(context(), source))
    }
}

pub type Result<T, E = PackageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_reports_last_stderr_line() {
        let failure = StageFailure {
            stage: Stage::Build,
            exit_code: Some(2),
            stderr_tail: "Collecting foo\nERROR: No matching distribution\n\n".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "build step exited with status 2: ERROR: No matching distribution"
        );
    }

    #[test]
    fn stage_failure_without_code_mentions_signal() {
        let failure = StageFailure {
            stage: Stage::Assemble,
            exit_code: None,
            stderr_tail: String::new(),
        };
        assert_eq!(
            failure.to_string(),
            "assemble step was terminated by a signal"
        );
    }

    #[test]
    fn source_directory_message_names_the_path() {
        let err = PackageError::SourceDirectoryNotFound(PathBuf::from("/nope/app"));
        assert_eq!(err.to_string(), "Folder /nope/app does not exist.");
    }
}
