//! Privileged Shell Bridge
//!
//! Everything needed to run commands as the superuser through one
//! long-lived interactive shell process: binary discovery and privilege
//! probing, the session engine with its writer/reader loops and sentinel
//! marker protocol, and the pass/fail facade the application consumes.

pub mod command;
pub mod facade;
pub mod launcher;
pub mod session;

// Re-exports for convenience
pub use command::{Command, CommandHandle, FAILED_EXIT_CODE};
pub use facade::PrivilegedShell;
pub use launcher::{find_su_binary, probe_privilege, PROBE_RESPONSE, SU_SEARCH_PATHS};
pub use session::{parse_marker, SessionState, ShellSession, MARKER_TOKEN};
