//! Integration tests for privilege acquisition
//!
//! A shell that never answers the probe, or answers it after noise, and
//! the degraded no-privilege session behavior.

#[path = "../test_utils/fake_shell.rs"]
mod fake_shell;

use std::path::Path;
use std::time::Duration;

use fake_shell::{start_session, Reply};
use propctl::config::ShellConfig;
use propctl::shell::{
    find_su_binary, Command, SessionState, ShellSession, FAILED_EXIT_CODE, SU_SEARCH_PATHS,
};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_probe_rejection_leaves_session_closed() {
    let (session, _shell) = start_session(false, |_, _| Reply::Answer(vec![], 0)).await;
    assert!(!session.has_privilege());
    assert_eq!(session.state().await, SessionState::Closed);

    // Nothing ever reaches active queueing; handles resolve immediately.
    let mut handle = session.submit(Command::new("id")).await;
    assert_eq!(handle.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);
}

#[tokio::test]
async fn test_probe_tolerates_noise_before_reply() {
    // Some shells print banners before executing anything; the probe must
    // keep reading until the expected reply arrives.
    use tokio::io::{AsyncWriteExt, BufReader};

    let (ours, theirs) = tokio::io::duplex(4096);
    let banner = tokio::spawn(async move {
        let (their_read, mut their_write) = tokio::io::split(theirs);
        their_write
            .write_all(b"su: banner line\n\ntest_root\n")
            .await
            .unwrap();
        // Keep the pipes open long enough for the session to settle.
        let mut reader = BufReader::new(their_read);
        let mut sink = String::new();
        use tokio::io::AsyncBufReadExt;
        loop {
            sink.clear();
            if reader.read_line(&mut sink).await.unwrap_or(0) == 0 {
                break;
            }
        }
    });

    let (read_half, write_half) = tokio::io::split(ours);
    let session = ShellSession::from_streams(
        Box::new(write_half),
        Box::new(read_half),
        None,
        Duration::from_secs(2),
    )
    .await;
    assert!(session.has_privilege());
    assert_eq!(session.state().await, SessionState::Active);
    session.close().await;
    banner.await.unwrap();
}

#[tokio::test]
async fn test_start_without_su_binary_degrades() {
    // Only meaningful on hosts without a superuser binary installed.
    if SU_SEARCH_PATHS.iter().any(|p| Path::new(p).exists()) {
        return;
    }
    let config = ShellConfig {
        su_path: Some("/nonexistent/su".into()),
        ..ShellConfig::default()
    };
    let session = ShellSession::start(&config).await;
    assert!(!session.has_privilege());
    assert_eq!(session.state().await, SessionState::Closed);
}

#[test]
fn test_su_discovery_override_must_exist() {
    if SU_SEARCH_PATHS.iter().any(|p| Path::new(p).exists()) {
        return;
    }
    assert_eq!(find_su_binary(Some(Path::new("/nonexistent/su"))), None);
    assert_eq!(find_su_binary(None), None);
}
