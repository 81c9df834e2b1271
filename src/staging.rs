//! Staging area management.
//!
//! The runtime is copied into `<source>/.packaged_python` so the build step and
//! the archive both see it at a path relative to the source tree. The staging
//! directory and the startup script are removed before and after every run.
use crate::error::{IoContext, PackageError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the staged runtime directory inside the source tree.
pub const STAGING_DIR_NAME: &str = ".packaged_python";
/// Name of the generated startup script inside the source tree.
pub const STARTUP_SCRIPT_NAME: &str = "_packaged_startup.sh";

/// A runtime copy living inside the source tree for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEnvironment {
    pub staging_root: PathBuf,
    pub binary_dir: PathBuf,
    /// `binary_dir` relative to the source directory.
    pub binary_dir_relative_path: PathBuf,
}

/// Fail with `SourceDirectoryNotFound` unless `source_directory` is a directory.
pub fn ensure_source_directory(source_directory: &Path) -> Result<()> {
    if source_directory.is_dir() {
        Ok(())
    } else {
        Err(PackageError::SourceDirectoryNotFound(
            source_directory.to_path_buf(),
        ))
    }
}

/// Copy the install at `install_root` into the source tree.
///
/// `executable` must live under `install_root`; its parent directory becomes
/// the staged binary directory. Any stale staging directory is removed first.
pub fn stage_runtime(
    source_directory: &Path,
    install_root: &Path,
    executable: &Path,
) -> Result<StagedEnvironment> {
    ensure_source_directory(source_directory)?;

    let bin_rel = executable
        .parent()
        .and_then(|bin| bin.strip_prefix(install_root).ok())
        .ok_or_else(|| PackageError::RuntimeLayout {
            executable: executable.to_path_buf(),
            install_root: install_root.to_path_buf(),
        })?
        .to_path_buf();

    let staging_root = source_directory.join(STAGING_DIR_NAME);
    remove_dir_if_present(&staging_root)
        .io_context(|| format!("remove stale staging dir {}", staging_root.display()))?;

    copy_tree(install_root, &staging_root)?;

    let binary_dir_relative_path = Path::new(STAGING_DIR_NAME).join(&bin_rel);
    Ok(StagedEnvironment {
        binary_dir: source_directory.join(&binary_dir_relative_path),
        staging_root,
        binary_dir_relative_path,
    })
}

/// Recursively copy `source` to `dest`, preserving permissions.
///
/// Relative symlinks are recreated; absolute ones are copied as their target
/// so the copy never refers back to the original location.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).io_context(|| format!("create {}", dest.display()))?;
    let entries = fs::read_dir(source).io_context(|| format!("read {}", source.display()))?;
    for entry in entries {
        let entry = entry.io_context(|| format!("read {}", source.display()))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .io_context(|| format!("stat {}", from.display()))?;
        if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
        } else if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .io_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).io_context(|| format!("read link {}", from.display()))?;
    if target.is_relative() {
        std::os::unix::fs::symlink(&target, to).io_context(|| format!("link {}", to.display()))?;
        return Ok(());
    }
    if from.is_dir() {
        copy_tree(from, to)
    } else {
        fs::copy(from, to)
            .map(|_| ())
            .io_context(|| format!("copy {} to {}", from.display(), to.display()))
    }
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    if from.is_dir() {
        copy_tree(from, to)
    } else {
        fs::copy(from, to)
            .map(|_| ())
            .io_context(|| format!("copy {} to {}", from.display(), to.display()))
    }
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Scope guard owning the packaging side effects inside a source tree.
///
/// Call [`StagingGuard::release`] on the normal path to observe cleanup
/// errors. If the guard is dropped without being released (a panic), the same
/// cleanup runs and failures are logged.
#[derive(Debug)]
pub struct StagingGuard {
    staging_root: PathBuf,
    startup_script: PathBuf,
    released: bool,
}

impl StagingGuard {
    pub fn new(source_directory: &Path) -> Self {
        Self {
            staging_root: source_directory.join(STAGING_DIR_NAME),
            startup_script: source_directory.join(STARTUP_SCRIPT_NAME),
            released: false,
        }
    }

    /// Remove the startup script and the staging directory.
    ///
    /// Both removals are attempted even if the first fails; the first error
    /// is returned.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.cleanup()
    }

    fn cleanup(&self) -> Result<()> {
        let script = remove_file_if_present(&self.startup_script)
            .map_err(|source| cleanup_error(&self.startup_script, source));
        let staging = remove_dir_if_present(&self.staging_root)
            .map_err(|source| cleanup_error(&self.staging_root, source));
        script.and(staging)
    }
}

fn cleanup_error(path: &Path, source: io::Error) -> PackageError {
    PackageError::Cleanup {
        path: path.to_path_buf(),
        source,
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.cleanup() {
            tracing::warn!(error = %err, "cleanup after aborted packaging failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_install(root: &Path) -> PathBuf {
        let bin = root.join("python").join("bin");
        fs::create_dir_all(&bin).expect("create bin");
        fs::create_dir_all(root.join("python").join("lib")).expect("create lib");
        fs::write(root.join("python").join("lib").join("os.py"), b"# stdlib").expect("write");
        let exe = bin.join("python3");
        fs::write(&exe, b"\x7fELF").expect("write exe");
        exe
    }

    #[test]
    fn stages_runtime_under_source_tree() {
        let install = TempDir::new().expect("install dir");
        let source = TempDir::new().expect("source dir");
        let exe = fake_install(install.path());

        let staged = stage_runtime(source.path(), install.path(), &exe).expect("stage");

        assert_eq!(staged.staging_root, source.path().join(".packaged_python"));
        assert_eq!(
            staged.binary_dir_relative_path,
            Path::new(".packaged_python/python/bin")
        );
        assert!(staged.binary_dir.join("python3").is_file());
        assert!(staged
            .staging_root
            .join("python/lib/os.py")
            .is_file());
    }

    #[test]
    fn stale_staging_dir_is_replaced() {
        let install = TempDir::new().expect("install dir");
        let source = TempDir::new().expect("source dir");
        let exe = fake_install(install.path());
        let stale = source.path().join(".packaged_python").join("leftover.txt");
        fs::create_dir_all(stale.parent().expect("parent")).expect("create stale");
        fs::write(&stale, b"old").expect("write stale");

        stage_runtime(source.path(), install.path(), &exe).expect("stage");

        assert!(!stale.exists());
    }

    #[test]
    fn missing_source_directory_is_reported() {
        let install = TempDir::new().expect("install dir");
        let exe = fake_install(install.path());
        let missing = install.path().join("does-not-exist");

        let err = stage_runtime(&missing, install.path(), &exe).expect_err("should fail");
        assert!(matches!(err, PackageError::SourceDirectoryNotFound(path) if path == missing));
    }

    #[test]
    fn executable_outside_install_is_a_layout_error() {
        let install = TempDir::new().expect("install dir");
        let source = TempDir::new().expect("source dir");
        fake_install(install.path());

        let err = stage_runtime(source.path(), install.path(), Path::new("/usr/bin/python3"))
            .expect_err("should fail");
        assert!(matches!(err, PackageError::RuntimeLayout { .. }));
        assert!(!source.path().join(".packaged_python").exists());
    }

    #[cfg(unix)]
    #[test]
    fn relative_symlinks_survive_the_copy() {
        let install = TempDir::new().expect("install dir");
        let source = TempDir::new().expect("source dir");
        let exe = fake_install(install.path());
        std::os::unix::fs::symlink("python3", exe.with_file_name("python")).expect("symlink");

        let staged = stage_runtime(source.path(), install.path(), &exe).expect("stage");

        let link = staged.binary_dir.join("python");
        assert_eq!(fs::read_link(&link).expect("read link"), Path::new("python3"));
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let install = TempDir::new().expect("install dir");
        let source = TempDir::new().expect("source dir");
        let exe = fake_install(install.path());
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod");

        let staged = stage_runtime(source.path(), install.path(), &exe).expect("stage");

        let mode = fs::metadata(staged.binary_dir.join("python3"))
            .expect("stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn guard_release_removes_artifacts() {
        let source = TempDir::new().expect("source dir");
        fs::create_dir_all(source.path().join(".packaged_python/python/bin")).expect("create");
        fs::write(source.path().join("_packaged_startup.sh"), b"x").expect("write");
        fs::write(source.path().join("main.py"), b"print(1)").expect("write");

        StagingGuard::new(source.path()).release().expect("release");

        assert!(!source.path().join(".packaged_python").exists());
        assert!(!source.path().join("_packaged_startup.sh").exists());
        assert!(source.path().join("main.py").exists());
    }

    #[test]
    fn guard_release_is_fine_when_nothing_was_created() {
        let source = TempDir::new().expect("source dir");
        StagingGuard::new(source.path()).release().expect("release");
    }

    #[test]
    fn dropped_guard_still_cleans_up() {
        let source = TempDir::new().expect("source dir");
        fs::create_dir_all(source.path().join(".packaged_python")).expect("create");
        {
            let _guard = StagingGuard::new(source.path());
        }
        assert!(!source.path().join(".packaged_python").exists());
    }

    #[test]
    fn failed_script_removal_still_removes_staging_dir() {
        let source = TempDir::new().expect("source dir");
        fs::create_dir_all(source.path().join(".packaged_python/python/bin")).expect("create");
        let script = source.path().join("_packaged_startup.sh");
        fs::create_dir(&script).expect("create script dir");
        fs::write(script.join("keep"), b"x").expect("write");

        let err = StagingGuard::new(source.path())
            .release()
            .expect_err("script removal fails");

        assert!(matches!(
            err,
            PackageError::Cleanup { ref path, .. } if *path == script
        ));
        assert!(!source.path().join(".packaged_python").exists());
    }
}
