//! Portability rewriting for interpreter shims in the staged `bin` directory.
//!
//! Entry points installed during the build point at the staging-time absolute
//! path of the bundled interpreter. That path will not exist where the archive
//! is extracted, so such headers are replaced with an `env` lookup that finds
//! the bundled interpreter through `PATH` instead.
use crate::error::{IoContext, Result};
use crate::staging::STAGING_DIR_NAME;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const SHEBANG: &[u8] = b"#!";
const POSIX_SH_LINE: &[u8] = b"#!/bin/sh";
const EXEC_TRAMPOLINE_PREFIX: &[u8] = b"'''exec'";
const CLOSING_QUOTE: &[u8] = b"'";

/// Interpreter name used by default in rewritten headers.
pub const DEFAULT_INTERPRETER: &str = "python";

/// Rewrites shim headers that reference the staging directory.
#[derive(Debug, Clone)]
pub struct ShebangRewriter {
    interpreter: String,
}

impl Default for ShebangRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl ShebangRewriter {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    fn portable_line(&self) -> Vec<u8> {
        format!("#!/usr/bin/env {}", self.interpreter).into_bytes()
    }

    /// Rewrite every matching regular file directly inside `bin_dir`.
    ///
    /// Returns the paths that were modified, sorted.
    pub fn rewrite_dir(&self, bin_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut rewritten = Vec::new();
        if !bin_dir.is_dir() {
            return Ok(rewritten);
        }
        let entries = fs::read_dir(bin_dir).io_context(|| format!("read {}", bin_dir.display()))?;
        for entry in entries {
            let entry = entry.io_context(|| format!("read {}", bin_dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .io_context(|| format!("stat {}", path.display()))?;
            if !file_type.is_file() {
                continue;
            }
            if !has_shebang(&path).io_context(|| format!("read {}", path.display()))? {
                continue;
            }
            let bytes = fs::read(&path).io_context(|| format!("read {}", path.display()))?;
            let Some(updated) = self.rewrite_bytes(&bytes) else {
                continue;
            };
            fs::write(&path, updated).io_context(|| format!("write {}", path.display()))?;
            tracing::debug!(path = %path.display(), "rewrote interpreter header");
            rewritten.push(path);
        }
        rewritten.sort();
        Ok(rewritten)
    }

    /// Return the rewritten contents, or `None` when the header does not
    /// reference the staging directory.
    pub fn rewrite_bytes(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        if !bytes.starts_with(SHEBANG) {
            return None;
        }
        let (first, rest) = split_line(bytes);
        if contains(first, STAGING_DIR_NAME.as_bytes()) {
            // A direct interpreter path: swap the first line only.
            return Some(self.assemble(rest));
        }
        if trim_line_end(first) != POSIX_SH_LINE {
            return None;
        }
        // `#!/bin/sh` followed by a quoted `exec` line re-invoking the
        // interpreter, then the line closing the quote.
        let (second, after_second) = split_line(rest);
        let second = trim_line_end(second);
        if !second.starts_with(EXEC_TRAMPOLINE_PREFIX)
            || !contains(second, STAGING_DIR_NAME.as_bytes())
        {
            return None;
        }
        let (third, _) = split_line(after_second);
        if !third.trim_ascii_start().starts_with(CLOSING_QUOTE) {
            return None;
        }
        Some(self.assemble(after_second))
    }

    fn assemble(&self, rest: &[u8]) -> Vec<u8> {
        let mut out = self.portable_line();
        out.push(b'\n');
        out.extend_from_slice(rest);
        out
    }
}

/// Peek at the first two bytes without reading the whole file.
fn has_shebang(path: &Path) -> io::Result<bool> {
    let mut head = [0u8; 2];
    let mut file = fs::File::open(path)?;
    match file.read_exact(&mut head) {
        Ok(()) => Ok(&head[..] == SHEBANG),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    }
}

/// Split at the first newline: the line without its terminator, and the rest.
fn split_line(bytes: &[u8]) -> (&[u8], &[u8]) {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(idx) => (&bytes[..idx], &bytes[idx + 1..]),
        None => (bytes, &[]),
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
