//! Mount table parsing and remount command construction
//!
//! Reads the line-oriented system mount table (`/proc/mounts` unless
//! configured otherwise) into [`MountEntry`] records and builds the
//! remount/unmount command variants that get pushed through the shell
//! bridge. Not every device ships a `mount` that accepts the remount
//! syntax, so each operation is tried as the native command first and then
//! through the busybox and toolbox applets, in a fixed order.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::shell::Command;

/// Applet prefixes tried after the native command, in order.
const COMMAND_PREFIXES: [&str; 3] = ["busybox ", "toolbox ", "/system/bin/toolbox "];

/// One line of the mount table: backing device, mount point, filesystem
/// type, and the mount flags verbatim as the system reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    device: String,
    mount_point: String,
    fs_type: String,
    flags: Vec<String>,
}

impl MountEntry {
    /// Parse a single whitespace-delimited mount table line. Only the
    /// first four fields are consumed; lines with fewer are skipped.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let device = fields.next()?.to_string();
        let mount_point = fields.next()?.to_string();
        let fs_type = fields.next()?.to_string();
        let flags = fields
            .next()?
            .split(',')
            .map(str::to_string)
            .collect();
        Some(Self {
            device,
            mount_point,
            fs_type,
            flags,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// The flag tokens in the order the table reported them.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Whether the flag set contains the given token (exact match, e.g.
    /// `rw` or `ro`).
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Snapshot of the system mount table.
///
/// `refresh` rebuilds the entry set from the source file and swaps it in
/// whole, so readers never observe a half-rebuilt table.
#[derive(Debug)]
pub struct MountTable {
    source: PathBuf,
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// An empty table backed by the given source file.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            entries: Vec::new(),
        }
    }

    /// Path of the mount table source.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Re-read the source file and replace the entry set atomically.
    pub fn refresh(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.source).map_err(|source| Error::MountTableRead {
            path: self.source.clone(),
            source,
        })?;
        self.entries = Self::parse(&text);
        debug!(
            source = %self.source.display(),
            entries = self.entries.len(),
            "mount table refreshed"
        );
        Ok(())
    }

    /// Parse a full mount table text into entries, skipping malformed
    /// lines.
    pub fn parse(text: &str) -> Vec<MountEntry> {
        text.lines().filter_map(MountEntry::parse_line).collect()
    }

    /// Current entries in table order.
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Look up an entry by its mount point path.
    pub fn entry(&self, mount_point: &str) -> Option<&MountEntry> {
        self.entries
            .iter()
            .find(|e| e.mount_point == mount_point)
    }

    /// Whether the mount point exists and carries the given flag.
    pub fn is_mounted_as(&self, mount_point: &str, flag: &str) -> bool {
        self.entry(mount_point)
            .map(|e| e.has_flag(flag))
            .unwrap_or(false)
    }

    /// The entry whose mount point is the longest path prefix of `path`.
    /// This is the partition a file lives on.
    pub fn entry_covering(&self, path: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .filter(|e| path.starts_with(&e.mount_point))
            .max_by_key(|e| e.mount_point.len())
    }
}

/// Build the remount unit for an entry: the native `mount -o
/// <flag>,remount` plus the applet-prefixed variants as one command, so a
/// single submission succeeds if any variant is accepted.
pub fn remount_command(entry: &MountEntry, flag: &str) -> Command {
    let base = format!(
        "mount -o {},remount {} {}",
        flag,
        entry.device(),
        entry.mount_point()
    );
    prefixed_alternatives(base)
}

/// Build the unmount unit for an entry, with the same variant fallbacks.
pub fn unmount_command(entry: &MountEntry) -> Command {
    prefixed_alternatives(format!("umount {}", entry.mount_point()))
}

fn prefixed_alternatives(base: String) -> Command {
    let mut lines = Vec::with_capacity(1 + COMMAND_PREFIXES.len());
    for prefix in COMMAND_PREFIXES {
        lines.push(format!("{prefix}{base}"));
    }
    lines.insert(0, base);
    Command::with_alternatives(lines)
}
