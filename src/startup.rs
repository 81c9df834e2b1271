//! Startup script synthesis.
//!
//! The archive runs this script, not the user's command directly, so the
//! bundled runtime's `bin` directory is on `PATH` wherever the archive is
//! extracted.
use crate::error::{IoContext, Result};
use crate::staging::STARTUP_SCRIPT_NAME;
use std::fs;
use std::path::{Path, PathBuf};

/// Render the script body: a relative `PATH` prefix, then the command.
pub fn render_startup_script(binary_dir_relative_path: &Path, startup_command: &str) -> String {
    let mut script = format!("PATH={}:$PATH\n", binary_dir_relative_path.display());
    script.push_str(startup_command);
    if !startup_command.ends_with('\n') {
        script.push('\n');
    }
    script
}

/// Write `_packaged_startup.sh` into `source_directory` and mark it executable.
pub fn write_startup_script(
    source_directory: &Path,
    binary_dir_relative_path: &Path,
    startup_command: &str,
) -> Result<PathBuf> {
    let path = source_directory.join(STARTUP_SCRIPT_NAME);
    let script = render_startup_script(binary_dir_relative_path, startup_command);
    fs::write(&path, script).io_context(|| format!("write {}", path.display()))?;
    make_executable(&path)?;
    Ok(path)
}

/// Startup script path as the archive builder wants it: relative, `./`-prefixed.
pub fn relative_startup_script() -> PathBuf {
    Path::new(".").join(STARTUP_SCRIPT_NAME)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))
        .io_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
