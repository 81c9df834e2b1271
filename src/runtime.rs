//! Runtime provisioning adapter.
//!
//! Installing interpreters is someone else's job: this module only finds an
//! already-installed distribution under an installs root, optionally asking an
//! external fetch command to populate it first.
use crate::error::{IoContext, PackageError, Result};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the installs root.
pub const INSTALLS_ENV: &str = "PACKAGED_PYTHON_INSTALLS";
/// Environment variable naming an external command that installs a version.
pub const FETCH_COMMAND_ENV: &str = "PACKAGED_FETCH_COMMAND";

/// Executable locations checked inside an install, in order.
const EXECUTABLE_CANDIDATES: &[&str] = &[
    "python/bin/python3",
    "python/bin/python",
    "bin/python3",
    "bin/python",
];

/// A runnable interpreter distribution on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHandle {
    /// Resolved version; may be more specific than the one requested.
    pub version: String,
    pub executable_path: PathBuf,
}

/// Source of runnable interpreter distributions.
pub trait RuntimeProvisioner {
    /// Guarantee `version` exists locally and return its handle.
    fn resolve(&self, version: &str) -> Result<RuntimeHandle>;

    /// Directory holding one subdirectory per installed version.
    fn installs_root(&self) -> &Path;

    /// Installation root of a resolved handle.
    fn install_root(&self, handle: &RuntimeHandle) -> PathBuf {
        self.installs_root().join(&handle.version)
    }
}

/// Provisioner backed by a directory of unpacked distributions.
#[derive(Debug, Clone)]
pub struct InstallsProvisioner {
    installs_root: PathBuf,
    fetch_command: Option<String>,
}

impl InstallsProvisioner {
    pub fn new(installs_root: PathBuf) -> Self {
        Self {
            installs_root,
            fetch_command: None,
        }
    }

    pub fn with_fetch_command(mut self, command: Option<String>) -> Self {
        self.fetch_command = command.filter(|command| !command.trim().is_empty());
        self
    }

    /// Resolve from the environment: explicit env vars first, then the
    /// per-user data directory.
    pub fn from_env() -> anyhow::Result<Self> {
        let installs_root = match std::env::var_os(INSTALLS_ENV) {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => default_installs_root()?,
        };
        let fetch_command = std::env::var(FETCH_COMMAND_ENV).ok();
        Ok(Self::new(installs_root).with_fetch_command(fetch_command))
    }

    fn find_installed(&self, version: &str) -> Result<Option<RuntimeHandle>> {
        if !self.installs_root.is_dir() {
            return Ok(None);
        }
        let entries = fs::read_dir(&self.installs_root)
            .io_context(|| format!("read {}", self.installs_root.display()))?;
        let mut best: Option<(String, PathBuf)> = None;
        for entry in entries {
            let entry = entry.io_context(|| format!("read {}", self.installs_root.display()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !version_matches(version, &name) {
                continue;
            }
            let Some(executable) = find_executable(&entry.path()) else {
                tracing::debug!(install = %name, "skipping install without an interpreter");
                continue;
            };
            let better = match &best {
                Some((current, _)) => compare_versions(&name, current) == Ordering::Greater,
                None => true,
            };
            if better {
                best = Some((name, executable));
            }
        }
        Ok(best.map(|(version, executable_path)| RuntimeHandle {
            version,
            executable_path,
        }))
    }

    /// Placeholders are substituted per argument after splitting, so an
    /// installs root containing spaces stays a single argument.
    fn fetch(&self, command: &str, version: &str) -> Result<()> {
        let template = shell_words::split(command).map_err(|err| {
            PackageError::io(
                format!("parse fetch command: {command}"),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
            )
        })?;
        let installs = self.installs_root.to_string_lossy();
        let args: Vec<String> = template
            .iter()
            .map(|arg| substitute(arg, version, &installs))
            .collect();
        let Some((program, rest)) = args.split_first() else {
            return Ok(());
        };
        tracing::info!(%version, %command, "fetching runtime");
        let status = Command::new(program)
            .args(rest)
            .status()
            .io_context(|| format!("spawn fetch command: {program}"))?;
        if !status.success() {
            tracing::warn!(%version, %status, "fetch command failed");
        }
        Ok(())
    }
}

impl RuntimeProvisioner for InstallsProvisioner {
    fn resolve(&self, version: &str) -> Result<RuntimeHandle> {
        if let Some(handle) = self.find_installed(version)? {
            return Ok(handle);
        }
        if let Some(command) = &self.fetch_command {
            self.fetch(command, version)?;
            if let Some(handle) = self.find_installed(version)? {
                return Ok(handle);
            }
        }
        Err(PackageError::RuntimeNotAvailable(version.to_string()))
    }

    fn installs_root(&self) -> &Path {
        &self.installs_root
    }
}

fn default_installs_root() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(data_dir.join("packaged").join("pythons"))
}

fn find_executable(install: &Path) -> Option<PathBuf> {
    EXECUTABLE_CANDIDATES
        .iter()
        .map(|rel| install.join(rel))
        .find(|candidate| candidate.is_file())
}

fn substitute(arg: &str, version: &str, installs: &str) -> String {
    let arg = arg.replace("{version}", version);
    arg.replace("{installs}", installs)
}

/// `3.12` matches `3.12` and `3.12.4`, but not `3.1` or `3.120`.
fn version_matches(requested: &str, installed: &str) -> bool {
    match installed.strip_prefix(requested) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| -> Vec<u64> {
        value
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    };
    parse(left).cmp(&parse(right))
}
