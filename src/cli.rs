//! CLI argument parsing.
//!
//! A request comes either from positional arguments and flags, or, when the
//! only argument is a directory holding `packaged.toml`, from that file.
use crate::config::{config_file_exists, load_config, ConfigError};
use crate::request::{PackageRequest, DEFAULT_PYTHON_VERSION};
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "packaged",
    version,
    about = "Ship a directory of Python source as one self-extracting executable",
    after_help = "Examples:\n  packaged app.bin 'pip install -r requirements.txt' 'python -m app' ./app\n  packaged ./app                    (reads ./app/packaged.toml)"
)]
pub struct RootArgs {
    /// Filename for the generated binary
    pub output_path: PathBuf,

    /// Command run in the source directory while building the package
    pub build_command: String,

    /// Command run when the generated binary starts
    pub startup_command: String,

    /// Folder containing the source to package (default: an empty folder)
    pub source_directory: Option<PathBuf>,

    /// Version of Python to package the project with
    #[arg(long, value_name = "VERSION", default_value = DEFAULT_PYTHON_VERSION)]
    pub python_version: String,

    /// Path to the makeself archive builder
    #[arg(long, value_name = "PATH")]
    pub makeself: Option<PathBuf>,

    /// Log pipeline progress to stderr
    #[arg(long, short)]
    pub verbose: bool,
}

/// A fully-resolved invocation.
#[derive(Debug)]
pub struct Invocation {
    pub request: PackageRequest,
    pub makeself: Option<PathBuf>,
    pub verbose: bool,
}

/// Errors from resolving the invocation, other than clap's own usage errors.
#[derive(Debug)]
pub enum ResolveError {
    Config(ConfigError),
    Usage(clap::Error),
}

/// Resolve `argv` (without the program name) into an [`Invocation`].
pub fn resolve_invocation<I, T>(argv: I) -> Result<Invocation, ResolveError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    if let [only] = argv.as_slice() {
        let directory = Path::new(only);
        if config_file_exists(directory) {
            let request = load_config(directory).map_err(ResolveError::Config)?;
            return Ok(Invocation {
                request,
                makeself: None,
                verbose: false,
            });
        }
    }

    let program = OsString::from("packaged");
    let args = RootArgs::try_parse_from(std::iter::once(program).chain(argv))
        .map_err(ResolveError::Usage)?;
    Ok(args.into_invocation())
}

impl RootArgs {
    fn into_invocation(self) -> Invocation {
        let source_directory = self
            .source_directory
            .map(|dir| std::path::absolute(&dir).unwrap_or(dir));
        let request = PackageRequest::new(
            source_directory,
            self.output_path,
            self.build_command,
            self.startup_command,
        )
        .with_runtime_version(self.python_version);
        Invocation {
            request,
            makeself: self.makeself,
            verbose: self.verbose,
        }
    }
}
