//! The fully-resolved input to one packaging run.
use std::path::PathBuf;

/// Runtime version used when neither flags nor config name one.
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// Everything the pipeline needs, resolved either from CLI flags or from a
/// `packaged.toml`, never a mix of both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// Tree to package; `None` packages an ephemeral empty directory.
    pub source_directory: Option<PathBuf>,
    /// Path of the self-extracting binary to produce.
    pub output_path: PathBuf,
    /// Shell text run inside the source tree with the staged runtime on `PATH`.
    pub build_command: String,
    /// Shell text run when the produced binary starts.
    pub startup_command: String,
    pub runtime_version: String,
}

impl PackageRequest {
    pub fn new(
        source_directory: Option<PathBuf>,
        output_path: impl Into<PathBuf>,
        build_command: impl Into<String>,
        startup_command: impl Into<String>,
    ) -> Self {
        Self {
            source_directory,
            output_path: output_path.into(),
            build_command: build_command.into(),
            startup_command: startup_command.into(),
            runtime_version: DEFAULT_PYTHON_VERSION.to_string(),
        }
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }
}
