//! Cooperative interruption of a packaging run.
//!
//! A Ctrl+C handler only sets the flag. A child already running receives the
//! terminal's SIGINT itself; the pipeline checks the flag between stages and
//! unwinds through its staging guard.
use crate::error::{PackageError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`PackageError::Interrupted`] once triggered.
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(PackageError::Interrupted);
        }
        Ok(())
    }
}
