use anyhow::Result;
use packaged::assemble::Makeself;
use packaged::cli::{resolve_invocation, Invocation, ResolveError};
use packaged::config::ConfigError;
use packaged::runtime::InstallsProvisioner;
use packaged::shebang::ShebangRewriter;
use packaged::{create_package_interruptible, Interrupt, PackageError};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_UNSUPPORTED_OS: u8 = 2;
const EXIT_CONFIG_KEY_MISSING: u8 = 3;
const EXIT_SOURCE_NOT_FOUND: u8 = 4;
const EXIT_RUNTIME_UNAVAILABLE: u8 = 5;
const EXIT_INTERRUPTED: u8 = 130;

/// Log filter env var; `RUST_LOG` is honoured when it is unset.
const LOG_ENV: &str = "PACKAGED_LOG";

fn main() -> ExitCode {
    let argv: Vec<_> = std::env::args_os().skip(1).collect();

    if cfg!(windows) {
        error("Sorry, Windows is not supported yet.");
        return ExitCode::from(EXIT_UNSUPPORTED_OS);
    }

    let invocation = match resolve_invocation(argv) {
        Ok(invocation) => invocation,
        Err(ResolveError::Usage(err)) => err.exit(),
        Err(ResolveError::Config(err @ ConfigError::MissingKey(_))) => {
            error(&err.to_string());
            return ExitCode::from(EXIT_CONFIG_KEY_MISSING);
        }
        Err(ResolveError::Config(err)) => {
            error(&format!("{:#}", anyhow::Error::new(err)));
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    init_tracing(invocation.verbose);

    let interrupt = Interrupt::new();
    let handler_side = interrupt.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        tracing::info!("received Ctrl+C, cleaning up");
        handler_side.trigger();
    }) {
        tracing::warn!(error = %err, "failed to install Ctrl+C handler");
    }

    match run(&invocation, &interrupt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) if interrupt.is_triggered() => {
            error("Interrupted.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            error(&format!("{err:#}"));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(invocation: &Invocation, interrupt: &Interrupt) -> Result<()> {
    let provisioner = InstallsProvisioner::from_env()?;
    let assembler = Makeself::locate(invocation.makeself.as_deref())?;
    let outcome = create_package_interruptible(
        &invocation.request,
        &provisioner,
        &assembler,
        &ShebangRewriter::default(),
        interrupt,
    )?;
    tracing::info!(
        version = %outcome.runtime.version,
        output = %outcome.output_path.display(),
        "done"
    );
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PackageError>() {
        Some(PackageError::SourceDirectoryNotFound(_)) => EXIT_SOURCE_NOT_FOUND,
        Some(PackageError::RuntimeNotAvailable(_)) => EXIT_RUNTIME_UNAVAILABLE,
        _ => EXIT_FAILURE,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "packaged=info" } else { "packaged=warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn error(message: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("\x1b[1;31mError:\x1b[m {message}");
    } else {
        eprintln!("Error: {message}");
    }
}
