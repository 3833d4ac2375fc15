//! Shell command unit and its resolution handle
//!
//! A [`Command`] is one logical unit of work for the shell bridge: one or
//! more literal command lines tried as a single unit, each with stderr
//! folded into stdout. Submitting a command yields a [`CommandHandle`] that
//! the caller blocks on until the bridge resolves the command's exit code.

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Exit code reported for commands the bridge could not run to completion
/// (session not active, process death, protocol desynchronization).
/// Distinct from anything a real shell reports (`$?` is 0..=255).
pub const FAILED_EXIT_CODE: i32 = -1;

/// One logical unit of shell work: an ordered set of command-line
/// alternatives executed back to back inside the privileged shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    lines: Vec<String>,
}

impl Command {
    /// Create a command from a single command line.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
        }
    }

    /// Create a command from several alternative command lines. All
    /// alternatives are written to the shell in order as one unit.
    pub fn with_alternatives(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The command lines of this unit.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Render the unit as wire text: every line suffixed with a
    /// stderr-to-stdout redirection and a newline.
    pub fn script(&self) -> String {
        let mut script = String::new();
        for line in &self.lines {
            script.push_str(line);
            script.push_str(" 2>&1\n");
        }
        script
    }
}

/// Caller-side handle for an individual submitted [`Command`].
///
/// The handle can be awaited repeatedly: a timed-out wait is local to the
/// caller, and the engine may still resolve the command later.
#[derive(Debug)]
pub struct CommandHandle {
    index: u64,
    submitted_at: DateTime<Local>,
    rx: oneshot::Receiver<i32>,
    result: Option<i32>,
}

impl CommandHandle {
    pub(crate) fn new(index: u64, rx: oneshot::Receiver<i32>) -> Self {
        Self {
            index,
            submitted_at: Local::now(),
            rx,
            result: None,
        }
    }

    /// The queue position assigned at submission time. Unique and
    /// monotonically increasing within one session.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// When the command was submitted.
    pub fn submitted_at(&self) -> DateTime<Local> {
        self.submitted_at
    }

    /// The resolved exit code, if the command has already resolved.
    pub fn exit_code(&self) -> Option<i32> {
        self.result
    }

    /// Wait until the command resolves or the timeout elapses.
    ///
    /// Returns the exit code on resolution. A timeout leaves the command in
    /// the queue; awaiting again later can still observe the resolution.
    pub async fn await_exit(&mut self, timeout: Duration) -> Result<i32> {
        if let Some(code) = self.result {
            return Ok(code);
        }
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(code)) => {
                self.result = Some(code);
                Ok(code)
            }
            // Resolver dropped without an answer: the engine died.
            Ok(Err(_)) => {
                self.result = Some(FAILED_EXIT_CODE);
                Ok(FAILED_EXIT_CODE)
            }
            Err(_) => Err(Error::CommandTimeout { duration: timeout }),
        }
    }

    /// Convenience wrapper: wait for resolution and report success only for
    /// a clean zero exit.
    pub async fn succeeded(&mut self, timeout: Duration) -> bool {
        matches!(self.await_exit(timeout).await, Ok(0))
    }
}
