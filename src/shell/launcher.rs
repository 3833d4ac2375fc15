//! Superuser shell discovery, spawning, and privilege probing
//!
//! Locates a superuser binary among the well-known install locations,
//! spawns it as an interactive process with captured stdin/stdout, and
//! verifies that the spawned shell actually grants elevated privilege by
//! round-tripping a probe line through it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as OsCommand};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Line written to the shell to verify elevation.
pub const PROBE_COMMAND: &str = "echo test_root\n";

/// Reply expected back from a shell that accepted the probe.
pub const PROBE_RESPONSE: &str = "test_root";

/// Well-known install locations for a superuser binary, probed in order.
pub const SU_SEARCH_PATHS: [&str; 11] = [
    "/data/bin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/sbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
    "/su/bin/su",
    "/su/xbin/su",
];

/// Locate a superuser binary.
///
/// A configured override wins when it points at an existing file; otherwise
/// the fixed search locations are probed in order, stopping at the first
/// match. Returns `None` when nothing is found.
pub fn find_su_binary(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }
    for candidate in SU_SEARCH_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            debug!(path = %path.display(), "found superuser binary");
            return Some(path);
        }
    }
    None
}

/// Spawn the superuser binary as an interactive process with stdin and
/// stdout captured. Stderr is not captured separately; commands fold it
/// into stdout on the wire.
pub fn spawn_su_process(su_path: &Path) -> Result<(Child, ChildStdin, ChildStdout)> {
    let mut child = OsCommand::new(su_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::SpawnFailed {
            command: su_path.display().to_string(),
            source,
        })?;

    let stdin = child.stdin.take().ok_or_else(|| Error::SpawnFailed {
        command: su_path.display().to_string(),
        source: std::io::Error::other("stdin not captured"),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| Error::SpawnFailed {
        command: su_path.display().to_string(),
        source: std::io::Error::other("stdout not captured"),
    })?;

    Ok((child, stdin, stdout))
}

/// Round-trip the probe line through the spawned shell.
///
/// Writes the probe, then reads lines until the expected reply arrives
/// (granted), the stream ends (denied), or the timeout elapses. Blank lines
/// are skipped and do not count as failure. The reader must be the same
/// buffered reader the session will keep using, so no buffered bytes are
/// lost between probe and protocol.
pub async fn probe_privilege<W, R>(
    writer: &mut W,
    reader: &mut BufReader<R>,
    timeout: Duration,
) -> bool
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    if let Err(e) = writer.write_all(PROBE_COMMAND.as_bytes()).await {
        warn!(error = %e, "privilege probe write failed");
        return false;
    }
    if let Err(e) = writer.flush().await {
        warn!(error = %e, "privilege probe flush failed");
        return false;
    }

    let wait_for_reply = async {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                // End of stream: the process died or rejected elevation.
                Ok(0) => return false,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "privilege probe read failed");
                    return false;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if line == PROBE_RESPONSE {
                return true;
            }
            debug!(line, "ignoring pre-probe output");
        }
    };

    match tokio::time::timeout(timeout, wait_for_reply).await {
        Ok(granted) => granted,
        Err(_) => {
            warn!(?timeout, "privilege probe timed out");
            false
        }
    }
}
