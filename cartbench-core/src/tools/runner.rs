//! Asynchronous external-process execution.
//!
//! One invocation of a codec tool is one independently-scheduled unit of
//! work: the child is spawned with a piped stdout, its output is read to
//! end-of-stream line by line, and the exit status is awaited. The caller
//! never blocks a thread on completion; it awaits the future. Dropping the
//! future kills the child (`kill_on_drop`), which is the cancellation
//! contract for in-flight operations.
//!
//! The runner sits behind a trait so the workflow layer can be exercised
//! in tests with a recording fake instead of real tool binaries.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Console Encoding
// ============================================================================

/// Text encoding used to decode subprocess output.
///
/// Console tools on Windows commonly emit the legacy ANSI codepage rather
/// than UTF-8. `Auto` resolves to Windows-1252 on Windows and UTF-8
/// elsewhere; the heuristic is not exhaustive for all locales, so the
/// encoding stays configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleEncoding {
    /// Platform default: Windows-1252 on Windows, UTF-8 elsewhere.
    #[default]
    Auto,
    /// Force UTF-8.
    Utf8,
    /// Force Windows-1252.
    Windows1252,
}

impl ConsoleEncoding {
    /// Decodes one raw output line. Malformed byte sequences are replaced,
    /// never fatal; a garbled line is an unrecognized line to the parsers.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self.resolved() {
            ConsoleEncoding::Windows1252 => {
                let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
                text.into_owned()
            }
            _ => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    fn resolved(&self) -> ConsoleEncoding {
        match self {
            ConsoleEncoding::Auto => {
                if cfg!(windows) {
                    ConsoleEncoding::Windows1252
                } else {
                    ConsoleEncoding::Utf8
                }
            }
            other => *other,
        }
    }
}

// ============================================================================
// Invocation Result
// ============================================================================

/// Completion result of one external tool invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Exit code of the process, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout, decoded line by line.
    pub lines: Vec<String>,
}

impl Invocation {
    /// True if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// Executes one tool invocation and yields its captured output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args`, capturing stdout to end-of-stream.
    ///
    /// A non-zero exit is NOT an error at this layer; it is reported in the
    /// returned [`Invocation`] for the caller to interpret. Errors here mean
    /// the process could not be spawned or its output could not be read.
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<Invocation>;
}

/// [`ProcessRunner`] backed by real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    encoding: ConsoleEncoding,
}

impl SystemRunner {
    pub fn new(encoding: ConsoleEncoding) -> Self {
        Self { encoding }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(ConsoleEncoding::Auto)
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<Invocation> {
        debug!(program = %program.display(), ?args, "spawning external tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut lines = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf).await?;
                if n == 0 {
                    break;
                }
                while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
                    buf.pop();
                }
                lines.push(self.encoding.decode(&buf));
            }
        }

        let status = child.wait().await?;
        debug!(
            program = %program.display(),
            code = ?status.code(),
            captured = lines.len(),
            "external tool finished"
        );

        Ok(Invocation {
            code: status.code(),
            lines,
        })
    }
}
