//! Build step execution with the staged runtime first on `PATH`.
use crate::error::{PackageError, Result, Stage};
use crate::process::run_stage;
use crate::staging::StagedEnvironment;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// Compute `PATH` for the build: the staged bin dir, then the inherited value.
pub fn build_path_env(binary_dir: &Path, inherited: Option<OsString>) -> Result<OsString> {
    let mut paths = vec![binary_dir.to_path_buf()];
    if let Some(inherited) = inherited {
        paths.extend(std::env::split_paths(&inherited));
    }
    std::env::join_paths(paths).map_err(|err| {
        PackageError::io(
            format!("compose PATH with {}", binary_dir.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
        )
    })
}

/// Run `build_command` through `sh -c` inside `source_directory`.
pub fn run_build(
    source_directory: &Path,
    staged: &StagedEnvironment,
    build_command: &str,
) -> Result<()> {
    if build_command.trim().is_empty() {
        tracing::info!("empty build command, skipping build step");
        return Ok(());
    }
    let path = build_path_env(&staged.binary_dir, std::env::var_os("PATH"))?;
    tracing::info!(command = %build_command, "running build command");
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(build_command)
        .current_dir(source_directory)
        .env("PATH", path);
    run_stage(Stage::Build, &mut command)?.map_err(PackageError::BuildCommandFailed)
}
