//! `packaged.toml` loading.
//!
//! The file lives at the root of the tree it packages, so its directory is the
//! source directory. Missing required keys are reported by name.
use crate::request::{PackageRequest, DEFAULT_PYTHON_VERSION};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_NAME: &str = "packaged.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Expected key {0:?} in config")]
    MissingKey(String),

    #[error("read config {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Raw file contents; every key optional so absence can be named precisely.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    output_path: Option<String>,
    build_command: Option<String>,
    startup_command: Option<String>,
    python_version: Option<String>,
}

/// True when `directory` holds a `packaged.toml`.
pub fn config_file_exists(directory: &Path) -> bool {
    directory.join(CONFIG_NAME).is_file()
}

/// Parse `<directory>/packaged.toml` into a request rooted at `directory`.
pub fn load_config(directory: &Path) -> Result<PackageRequest, ConfigError> {
    let path = directory.join(CONFIG_NAME);
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let source_directory = std::path::absolute(directory).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    parse_config(&text, &path, source_directory)
}

fn parse_config(
    text: &str,
    path: &Path,
    source_directory: PathBuf,
) -> Result<PackageRequest, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let output_path = require(file.output_path, "output_path")?;
    let build_command = require(file.build_command, "build_command")?;
    let startup_command = require(file.startup_command, "startup_command")?;
    let version = file
        .python_version
        .unwrap_or_else(|| DEFAULT_PYTHON_VERSION.to_string());
    Ok(PackageRequest::new(
        Some(source_directory),
        output_path,
        build_command,
        startup_command,
    )
    .with_runtime_version(version))
}

fn require(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}
