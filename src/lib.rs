//! Package a directory of Python source, a build command and a startup
//! command into one self-extracting executable that carries its own runtime.
pub mod assemble;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod pipeline;
pub mod process;
pub mod request;
pub mod runtime;
pub mod shebang;
pub mod staging;
pub mod startup;
pub mod util;

pub use error::{PackageError, Stage, StageFailure};
pub use interrupt::Interrupt;
pub use pipeline::{create_package, create_package_interruptible, PackageOutcome};
pub use request::{PackageRequest, DEFAULT_PYTHON_VERSION};
