//! Archive assembly adapter over the external self-extracting archive builder.
use crate::error::{PackageError, Result, Stage};
use crate::process::run_stage;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable naming the archive builder executable.
pub const MAKESELF_ENV: &str = "PACKAGED_MAKESELF";

/// Builder names searched on `PATH`, in order.
const MAKESELF_NAMES: &[&str] = &["makeself.sh", "makeself"];

/// Packs a directory into one self-extracting executable.
pub trait ArchiveAssembler {
    /// `startup_script` is relative to `source_directory`.
    fn assemble(
        &self,
        source_directory: &Path,
        output_path: &Path,
        label: &str,
        startup_script: &Path,
    ) -> Result<()>;
}

/// `makeself`-compatible builder invoked positionally.
#[derive(Debug, Clone)]
pub struct Makeself {
    executable: PathBuf,
}

impl Makeself {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    /// Locate the builder: explicit path, then `PACKAGED_MAKESELF`, then `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        if let Some(path) = std::env::var_os(MAKESELF_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        MAKESELF_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
            .ok_or(PackageError::AssemblerNotFound)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(
        &self,
        source_directory: &Path,
        output_path: &Path,
        label: &str,
        startup_script: &Path,
    ) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg(source_directory)
            .arg(output_path)
            .arg(label)
            .arg(startup_script);
        command
    }
}

impl ArchiveAssembler for Makeself {
    fn assemble(
        &self,
        source_directory: &Path,
        output_path: &Path,
        label: &str,
        startup_script: &Path,
    ) -> Result<()> {
        tracing::info!(
            builder = %self.executable.display(),
            output = %output_path.display(),
            "assembling archive"
        );
        let mut command = self.command(source_directory, output_path, label, startup_script);
        run_stage(Stage::Assemble, &mut command)?.map_err(PackageError::ArchiveAssemblyFailed)
    }
}
