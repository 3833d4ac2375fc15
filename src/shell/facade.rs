//! Stable privileged-execution surface for the rest of the application
//!
//! [`PrivilegedShell`] owns one [`ShellSession`] and the [`MountTable`],
//! and reduces everything the engine can report to the pass/fail answers
//! higher layers act on. No error type crosses this boundary: "false"
//! uniformly means the privileged operation did not happen.

use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::command::Command;
use super::session::ShellSession;
use crate::config::Config;
use crate::mount::{self, MountEntry, MountTable};

/// Facade over one privileged shell session and the device mount table.
pub struct PrivilegedShell {
    session: ShellSession,
    mounts: RwLock<MountTable>,
    command_timeout: Duration,
}

impl PrivilegedShell {
    /// Start a session per the configuration and take the first mount
    /// table snapshot. Never fails: without privilege every operation
    /// simply reports `false`.
    pub async fn connect(config: &Config) -> Self {
        let session = ShellSession::start(&config.shell).await;
        Self::with_session(
            session,
            MountTable::new(config.mounts.table_path.clone()),
            config.shell.command_timeout(),
        )
        .await
    }

    /// Assemble a facade from parts. Used by `connect` and by tests that
    /// drive the session over in-memory streams.
    pub async fn with_session(
        session: ShellSession,
        mut mounts: MountTable,
        command_timeout: Duration,
    ) -> Self {
        if let Err(e) = mounts.refresh() {
            warn!(error = %e, "could not read mount table");
        }
        Self {
            session,
            mounts: RwLock::new(mounts),
            command_timeout,
        }
    }

    /// Whether the session holds verified superuser privilege.
    pub fn has_privilege(&self) -> bool {
        self.session.has_privilege()
    }

    /// Run one command line as the superuser. True only for a clean zero
    /// exit within the configured wait budget.
    pub async fn run_command(&self, line: &str) -> bool {
        let mut handle = self.session.submit(Command::new(line)).await;
        let ok = handle.succeeded(self.command_timeout).await;
        debug!(line, ok, "privileged command finished");
        ok
    }

    /// Whether the mount point currently carries the given flag.
    pub async fn check_mount_flags(&self, mount_point: &str, flag: &str) -> bool {
        self.mounts.read().await.is_mounted_as(mount_point, flag)
    }

    /// Remount a partition with the given flag.
    ///
    /// Already-satisfied requests return true without touching the shell.
    /// Otherwise the remount variants go out as one unit and the result is
    /// judged by re-reading the mount table: the echoed exit status belongs
    /// to the last variant tried, which says nothing about whether an
    /// earlier one already did the work.
    pub async fn mount_partition(&self, mount_point: &str, flag: &str) -> bool {
        let command = {
            let table = self.mounts.read().await;
            let Some(entry) = table.entry(mount_point) else {
                debug!(mount_point, "unknown mount point");
                return false;
            };
            if entry.has_flag(flag) {
                return true;
            }
            mount::remount_command(entry, flag)
        };

        let mut handle = self.session.submit(command).await;
        if handle.await_exit(self.command_timeout).await.is_err() {
            warn!(mount_point, flag, "remount timed out");
            return false;
        }
        self.refresh_mounts().await;
        self.mounts.read().await.is_mounted_as(mount_point, flag)
    }

    /// Unmount a partition. True only when the shell reported a zero exit;
    /// the table is refreshed afterwards.
    pub async fn unmount_partition(&self, mount_point: &str) -> bool {
        let command = {
            let table = self.mounts.read().await;
            let Some(entry) = table.entry(mount_point) else {
                return false;
            };
            mount::unmount_command(entry)
        };

        let mut handle = self.session.submit(command).await;
        let ok = handle.succeeded(self.command_timeout).await;
        if ok {
            self.refresh_mounts().await;
        }
        ok
    }

    /// Re-read the mount table.
    pub async fn refresh_mounts(&self) {
        let mut table = self.mounts.write().await;
        if let Err(e) = table.refresh() {
            warn!(error = %e, "mount table refresh failed");
        }
    }

    /// Snapshot of the current mount entries.
    pub async fn mount_entries(&self) -> Vec<MountEntry> {
        self.mounts.read().await.entries().to_vec()
    }

    /// The entry whose mount point covers the given path, if any.
    pub async fn partition_of(&self, path: &std::path::Path) -> Option<MountEntry> {
        self.mounts.read().await.entry_covering(path).cloned()
    }

    /// Orderly shutdown: drain queued commands, tell the shell to exit,
    /// and wait for the engine to wind down. A shell that ignores the exit
    /// instruction is killed after the command timeout.
    pub async fn close(&mut self) {
        self.session.close().await;
        if tokio::time::timeout(self.command_timeout, self.session.wait_closed())
            .await
            .is_err()
        {
            warn!("session did not drain in time, killing shell");
            self.session.force_teardown().await;
            self.session.wait_closed().await;
        }
    }
}

impl std::fmt::Debug for PrivilegedShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedShell")
            .field("session", &self.session)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}
