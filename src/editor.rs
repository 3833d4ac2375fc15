//! Privileged property-file editing flows
//!
//! Writing a property file that lives on a read-only system partition
//! takes more than a `write()`: the partition has to be remounted
//! read-write, the previous file preserved, the new content installed
//! through the privileged shell, and the partition put back the way it
//! was. [`PropertyEditor`] packages those flows and reports a single
//! [`Outcome`] pair for the UI layer.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::mount::MountEntry;
use crate::properties::PropertyFile;
use crate::shell::PrivilegedShell;

/// What a flow reports back: a success/failure code and one
/// human-readable message. Nothing richer crosses this boundary.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Save/restore orchestration for privileged property files.
pub struct PropertyEditor {
    work_dir: PathBuf,
}

impl PropertyEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            work_dir: config.work_dir(),
        }
    }

    /// The staging and backup directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Serialize `properties` and install it at `dest` through the
    /// privileged shell, preserving the previous file as `<dest>.bak`.
    pub async fn save(
        &self,
        shell: &PrivilegedShell,
        properties: &PropertyFile,
        dest: &Path,
    ) -> Outcome {
        if !shell.has_privilege() {
            return Outcome::failure("no superuser privilege");
        }
        let Some(name) = dest.file_name() else {
            return Outcome::failure(format!("{} has no file name", dest.display()));
        };

        let bracket = match self.make_writable(shell, dest).await {
            Ok(bracket) => bracket,
            Err(mount_point) => {
                return Outcome::failure(format!(
                    "could not remount {mount_point} read-write"
                ))
            }
        };

        let result = self.install(shell, properties, dest, name).await;
        self.restore_readonly(shell, bracket).await;
        result
    }

    /// Put `<dest>.bak` back in place of `dest` through the privileged
    /// shell.
    pub async fn restore(&self, shell: &PrivilegedShell, dest: &Path) -> Outcome {
        if !shell.has_privilege() {
            return Outcome::failure("no superuser privilege");
        }
        let backup = PathBuf::from(format!("{}.bak", dest.display()));
        if !backup.exists() {
            return Outcome::failure(format!("no backup found at {}", backup.display()));
        }

        let bracket = match self.make_writable(shell, dest).await {
            Ok(bracket) => bracket,
            Err(mount_point) => {
                return Outcome::failure(format!(
                    "could not remount {mount_point} read-write"
                ))
            }
        };

        let result = if shell
            .run_command(&format!("mv {} {}", backup.display(), dest.display()))
            .await
        {
            Outcome::success(format!("restored {}", dest.display()))
        } else {
            Outcome::failure(format!("could not restore {}", dest.display()))
        };
        self.restore_readonly(shell, bracket).await;
        result
    }

    /// Remount the partition holding `dest` read-write when needed.
    /// Returns the entry to put back read-only afterwards, or Err with
    /// the mount point that refused.
    async fn make_writable(
        &self,
        shell: &PrivilegedShell,
        dest: &Path,
    ) -> std::result::Result<Option<MountEntry>, String> {
        let Some(partition) = shell.partition_of(dest).await else {
            // Nothing in the table covers the path; leave mounts alone.
            return Ok(None);
        };
        if partition.has_flag("rw") {
            return Ok(None);
        }
        if shell.mount_partition(partition.mount_point(), "rw").await {
            debug!(mount_point = partition.mount_point(), "remounted read-write");
            Ok(Some(partition))
        } else {
            Err(partition.mount_point().to_string())
        }
    }

    async fn restore_readonly(&self, shell: &PrivilegedShell, bracket: Option<MountEntry>) {
        if let Some(partition) = bracket {
            if !shell.mount_partition(partition.mount_point(), "ro").await {
                warn!(
                    mount_point = partition.mount_point(),
                    "could not remount read-only again"
                );
            }
        }
    }

    async fn install(
        &self,
        shell: &PrivilegedShell,
        properties: &PropertyFile,
        dest: &Path,
        name: &std::ffi::OsStr,
    ) -> Outcome {
        if let Err(e) = fs::create_dir_all(&self.work_dir) {
            return Outcome::failure(format!(
                "could not create work directory {}: {e}",
                self.work_dir.display()
            ));
        }
        let staging = self.work_dir.join(name);
        if let Err(e) = properties.save(&staging) {
            return Outcome::failure(e.to_string());
        }

        match dest.parent() {
            None => return Outcome::failure(format!("{} has no parent", dest.display())),
            Some(parent) if !parent.exists() => {
                if !shell
                    .run_command(&format!("mkdir -p {}", parent.display()))
                    .await
                {
                    return Outcome::failure(format!(
                        "destination folder {} could not be created",
                        parent.display()
                    ));
                }
            }
            Some(_) => {}
        }

        if dest.exists() {
            // Dated copy in the work directory, then the .bak the shell
            // can restore from later.
            let dated = self.work_dir.join(format!(
                "{}.{}",
                name.to_string_lossy(),
                Local::now().format("%Y-%m-%d")
            ));
            if let Err(e) = fs::copy(dest, &dated) {
                debug!(error = %e, "could not keep dated copy");
            }
            if !shell
                .run_command(&format!("mv {} {}.bak", dest.display(), dest.display()))
                .await
            {
                return Outcome::failure(format!("could not back up {}", dest.display()));
            }
        }

        if shell
            .run_command(&format!("cat {} > {}", staging.display(), dest.display()))
            .await
        {
            Outcome::success(format!("saved {}", dest.display()))
        } else {
            Outcome::failure(format!("could not install {}", dest.display()))
        }
    }
}
