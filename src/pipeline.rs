//! The packaging pipeline.
//!
//! Provision → stage → build → rewrite shims → write startup script →
//! assemble, with staging artifacts removed on every exit path.
use crate::assemble::ArchiveAssembler;
use crate::build::run_build;
use crate::error::{IoContext, Result};
use crate::interrupt::Interrupt;
use crate::request::PackageRequest;
use crate::runtime::{RuntimeHandle, RuntimeProvisioner};
use crate::shebang::ShebangRewriter;
use crate::staging::{ensure_source_directory, stage_runtime, StagingGuard};
use crate::startup::{relative_startup_script, write_startup_script};
use crate::util::display_path;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PackageOutcome {
    pub output_path: PathBuf,
    pub runtime: RuntimeHandle,
    /// Shims whose interpreter header was made portable.
    pub rewritten_shims: Vec<PathBuf>,
}

/// Create the self-extracting executable described by `request`.
///
/// The source tree is left without `.packaged_python` or
/// `_packaged_startup.sh` whether this returns `Ok` or `Err`. When both a
/// stage and cleanup fail, the stage error is returned and the cleanup error
/// is logged.
pub fn create_package(
    request: &PackageRequest,
    provisioner: &dyn RuntimeProvisioner,
    assembler: &dyn ArchiveAssembler,
    rewriter: &ShebangRewriter,
) -> Result<PackageOutcome> {
    create_package_interruptible(request, provisioner, assembler, rewriter, &Interrupt::new())
}

/// [`create_package`] that stops with [`PackageError::Interrupted`] at the
/// next stage boundary once `interrupt` is triggered, cleaning up as usual.
///
/// [`PackageError::Interrupted`]: crate::error::PackageError::Interrupted
pub fn create_package_interruptible(
    request: &PackageRequest,
    provisioner: &dyn RuntimeProvisioner,
    assembler: &dyn ArchiveAssembler,
    rewriter: &ShebangRewriter,
    interrupt: &Interrupt,
) -> Result<PackageOutcome> {
    let start = Instant::now();
    let (_ephemeral, source_directory) = resolve_source_directory(request)?;

    let guard = StagingGuard::new(&source_directory);
    let outcome = run_stages(
        request,
        &source_directory,
        provisioner,
        assembler,
        rewriter,
        interrupt,
    );
    let cleanup = guard.release();

    let outcome = match (outcome, cleanup) {
        (Ok(outcome), Ok(())) => outcome,
        (Ok(_), Err(cleanup_err)) => return Err(cleanup_err),
        (Err(err), Ok(())) => return Err(err),
        (Err(err), Err(cleanup_err)) => {
            tracing::warn!(error = %cleanup_err, "cleanup failed after packaging error");
            return Err(err);
        }
    };

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        output = %outcome.output_path.display(),
        "package created"
    );
    Ok(outcome)
}

/// Use the requested directory, or a fresh empty one kept alive by the
/// returned guard.
fn resolve_source_directory(request: &PackageRequest) -> Result<(Option<TempDir>, PathBuf)> {
    match &request.source_directory {
        Some(dir) => {
            ensure_source_directory(dir)?;
            let resolved = dir
                .canonicalize()
                .io_context(|| format!("resolve source directory {}", dir.display()))?;
            Ok((None, resolved))
        }
        None => {
            let temp = TempDir::new()
                .io_context(|| "create ephemeral source directory".to_string())?;
            let path = temp.path().to_path_buf();
            tracing::debug!(path = %path.display(), "packaging an empty source directory");
            Ok((Some(temp), path))
        }
    }
}

fn run_stages(
    request: &PackageRequest,
    source_directory: &Path,
    provisioner: &dyn RuntimeProvisioner,
    assembler: &dyn ArchiveAssembler,
    rewriter: &ShebangRewriter,
    interrupt: &Interrupt,
) -> Result<PackageOutcome> {
    let runtime = provisioner.resolve(&request.runtime_version)?;
    tracing::info!(
        requested = %request.runtime_version,
        version = %runtime.version,
        "runtime resolved"
    );

    interrupt.check()?;
    let install_root = provisioner.install_root(&runtime);
    let staged = stage_runtime(source_directory, &install_root, &runtime.executable_path)?;
    tracing::info!(
        bin_dir = %display_path(&staged.binary_dir, Some(source_directory)),
        "runtime staged"
    );

    interrupt.check()?;
    run_build(source_directory, &staged, &request.build_command)?;
    interrupt.check()?;

    let rewritten_shims = rewriter.rewrite_dir(&staged.binary_dir)?;
    tracing::info!(
        files_rewritten = rewritten_shims.len(),
        "shim headers rewritten"
    );

    write_startup_script(
        source_directory,
        &staged.binary_dir_relative_path,
        &request.startup_command,
    )?;

    interrupt.check()?;
    let label = request.output_path.display().to_string();
    assembler.assemble(
        source_directory,
        &request.output_path,
        &label,
        &relative_startup_script(),
    )?;

    Ok(PackageOutcome {
        output_path: request.output_path.clone(),
        runtime,
        rewritten_shims,
    })
}
