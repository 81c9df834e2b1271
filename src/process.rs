//! Child process execution for pipeline stages.
//!
//! Stdout is inherited so the user sees build progress. Stderr is forwarded as
//! it arrives and its tail is kept for the failure diagnostic.
use crate::error::{PackageError, Result, Stage, StageFailure};
use crate::util::tail_bytes;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

/// Bytes of stderr retained for a [`StageFailure`].
pub const STDERR_TAIL_BYTES: usize = 4096;

/// Run `command` to completion; a non-zero exit becomes a [`StageFailure`].
///
/// The outer `Result` reports spawn/wait errors; the inner one reports the
/// child's own failure.
pub fn run_stage(
    stage: Stage,
    command: &mut Command,
) -> Result<std::result::Result<(), StageFailure>> {
    let start = Instant::now();
    let mut child = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| PackageError::Spawn { stage, source })?;

    let stderr_handle = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut kept: Vec<u8> = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match err.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let _ = std::io::stderr().write_all(&buf[..n]);
                        let _ = std::io::stderr().flush();
                        kept.extend_from_slice(&buf[..n]);
                        if kept.len() > STDERR_TAIL_BYTES * 2 {
                            kept.drain(..kept.len() - STDERR_TAIL_BYTES);
                        }
                    }
                    Err(_) => break,
                }
            }
            kept
        })
    });

    let status = child
        .wait()
        .map_err(|source| PackageError::Spawn { stage, source })?;
    let stderr = stderr_handle
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    tracing::info!(
        %stage,
        elapsed_ms = start.elapsed().as_millis() as u64,
        exit_code = status.code(),
        "stage child exited"
    );

    if status.success() {
        return Ok(Ok(()));
    }
    Ok(Err(StageFailure {
        stage,
        exit_code: status.code(),
        stderr_tail: tail_bytes(&stderr, STDERR_TAIL_BYTES),
    }))
}
