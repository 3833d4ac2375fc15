//! propctl - edit privileged device property files over a superuser shell
//!
//! This library carries the machinery a property editor needs on a device
//! where the interesting files live on read-only system partitions:
//!
//! - **Shell bridge:** one long-lived superuser shell process, fed by a
//!   writer loop and demultiplexed by a reader loop through an echoed
//!   sentinel marker, so many concurrent callers each get a plain
//!   "run one command, get one exit code" contract.
//! - **Mount orchestration:** mount table snapshots plus the
//!   remount-with-fallbacks dance (`mount`, busybox, toolbox) needed
//!   before a system file can be replaced.
//! - **Property store:** an ordered, comment-preserving model of the
//!   property-file dialect, so editing a file does not shred it.
//! - **Editing flows:** save/restore with staging, backups, and the
//!   read-write/read-only remount bracket.
//!
//! ## Module Organization
//!
//! - [`shell`] - Superuser shell bridge (launcher, session engine, facade)
//! - [`mount`] - Mount table parsing and remount commands
//! - [`properties`] - Property file model
//! - [`editor`] - Privileged save/restore flows
//! - [`config`] - Configuration loading
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use propctl::{Config, PrivilegedShell};
//!
//! # async fn run() {
//! let config = Config::default();
//! let shell = PrivilegedShell::connect(&config).await;
//! if shell.has_privilege() {
//!     shell.run_command("setprop ro.debuggable 0").await;
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each session runs exactly three kinds of execution units: the caller
//! tasks submitting commands, one writer loop owning the process's stdin,
//! and one reader loop owning its stdout. The pending command queue is the
//! only structure they share, and submission order always equals
//! resolution order.

pub mod config;
pub mod editor;
pub mod error;
pub mod mount;
pub mod properties;
pub mod shell;

// Re-exports for convenience
pub use config::{Config, ConfigLoader};
pub use editor::{Outcome, PropertyEditor};
pub use error::{Error, Result};
pub use mount::{MountEntry, MountTable};
pub use properties::{Entry, PropertyFile};
pub use shell::{Command, CommandHandle, PrivilegedShell, SessionState, ShellSession};
