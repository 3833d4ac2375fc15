//! Integration tests for the shell session engine
//!
//! Drives a full session (probe, writer loop, reader loop) against a
//! scripted shell on the far side of in-memory pipes, covering the
//! ordering guarantee, process-death containment, and marker
//! desynchronization.

#[path = "../test_utils/fake_shell.rs"]
mod fake_shell;

use std::sync::Arc;
use std::time::Duration;

use fake_shell::{start_session, Reply};
use propctl::shell::{Command, SessionState, FAILED_EXIT_CODE};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_single_command_roundtrip() {
    let (session, shell) = start_session(true, |_, _| {
        Reply::Answer(vec!["hi".to_string()], 0)
    })
    .await;
    assert!(session.has_privilege());
    assert_eq!(session.state().await, SessionState::Active);

    let mut handle = session.submit(Command::new("echo hi")).await;
    assert_eq!(handle.await_exit(WAIT).await.unwrap(), 0);

    session.close().await;
    let report = shell.await.unwrap();
    assert_eq!(report.commands, vec!["echo hi".to_string()]);
    assert_eq!(report.markers, vec![0]);
    assert!(report.saw_exit);
}

#[tokio::test]
async fn test_nonzero_exit_code_reported() {
    let (session, _shell) = start_session(true, |_, _| Reply::Answer(vec![], 3)).await;
    let mut handle = session.submit(Command::new("false")).await;
    assert_eq!(handle.await_exit(WAIT).await.unwrap(), 3);
    session.close().await;
}

#[tokio::test]
async fn test_concurrent_submissions_resolve_in_submission_order() {
    let (session, shell) =
        start_session(true, |index, _| Reply::Answer(vec![], (index % 5) as i32)).await;
    let session = Arc::new(session);

    let mut tasks = Vec::new();
    for caller in 0..4 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for i in 0..5 {
                let mut handle = session
                    .submit(Command::new(format!("job {caller} {i}")))
                    .await;
                let code = handle.await_exit(WAIT).await.unwrap();
                results.push((handle.index(), code));
            }
            results
        }));
    }

    for task in tasks {
        for (index, code) in task.await.unwrap() {
            // Each handle got the code the shell tied to its own index,
            // so no response was delivered to the wrong command.
            assert_eq!(code, (index % 5) as i32);
        }
    }

    session.close().await;
    let report = shell.await.unwrap();
    // The writer serialized all twenty units in submission order.
    let expected: Vec<u64> = (0..20).collect();
    assert_eq!(report.markers, expected);
    assert!(report.saw_exit);
}

#[tokio::test]
async fn test_process_death_fails_all_pending() {
    // The shell dies on the first marker request while more commands are
    // queued behind it; none of the callers may hang.
    let (session, _shell) = start_session(true, |_, _| Reply::Die).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(session.submit(Command::new(format!("job {i}"))).await);
    }
    for mut handle in handles {
        assert_eq!(handle.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);
    }
    assert_eq!(session.state().await, SessionState::Closed);
    assert!(!session.has_privilege());
}

#[tokio::test]
async fn test_marker_desync_is_fatal() {
    let (session, _shell) = start_session(true, |index, _| {
        if index == 0 {
            Reply::Misnumbered(7, 0)
        } else {
            Reply::Answer(vec![], 0)
        }
    })
    .await;

    let mut first = session.submit(Command::new("first")).await;
    let mut second = session.submit(Command::new("second")).await;

    assert_eq!(first.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);
    assert_eq!(second.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);
    assert_eq!(session.state().await, SessionState::Closed);

    // The session stays dead; later submissions fail immediately.
    let mut late = session.submit(Command::new("late")).await;
    assert_eq!(late.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);
}

#[tokio::test]
async fn test_marker_amid_ordinary_output() {
    // Output lines around the marker are protocol noise and must not
    // disturb resolution.
    let (session, _shell) = start_session(true, |_, _| {
        Reply::Answer(
            vec![
                "some output".to_string(),
                "more output".to_string(),
            ],
            0,
        )
    })
    .await;
    let mut handle = session.submit(Command::new("noisy")).await;
    assert_eq!(handle.await_exit(WAIT).await.unwrap(), 0);
    session.close().await;
}

#[tokio::test]
async fn test_close_drains_queued_commands() {
    let (session, shell) = start_session(true, |_, _| Reply::Answer(vec![], 0)).await;

    let mut handles = Vec::new();
    for i in 0..3 {
        handles.push(session.submit(Command::new(format!("job {i}"))).await);
    }
    session.close().await;
    assert!(matches!(
        session.state().await,
        SessionState::Draining | SessionState::Closed
    ));

    // Already-queued commands still resolve after close.
    for mut handle in handles {
        assert_eq!(handle.await_exit(WAIT).await.unwrap(), 0);
    }

    // New submissions are rejected during drain.
    let mut late = session.submit(Command::new("late")).await;
    assert_eq!(late.await_exit(WAIT).await.unwrap(), FAILED_EXIT_CODE);

    let report = shell.await.unwrap();
    assert_eq!(report.markers, vec![0, 1, 2]);
    assert!(report.saw_exit);
}

#[tokio::test]
async fn test_caller_timeout_is_local() {
    // The first command never resolves within the caller's short budget,
    // but the engine keeps going and resolves it afterwards.
    let (session, _shell) = start_session(true, move |index, _| {
        if index == 0 {
            Reply::Answer(vec![], 9)
        } else {
            Reply::Answer(vec![], 0)
        }
    })
    .await;

    let mut slow = session.submit(Command::new("slow")).await;
    // Poll with a zero-ish budget until the engine has had time to answer.
    let err = slow.await_exit(Duration::from_millis(1)).await;
    if err.is_err() {
        // Timed out locally; the session is unaffected.
        let mut other = session.submit(Command::new("other")).await;
        assert_eq!(other.await_exit(WAIT).await.unwrap(), 0);
        // And the original handle can still observe its resolution.
        assert_eq!(slow.await_exit(WAIT).await.unwrap(), 9);
    } else {
        assert_eq!(err.unwrap(), 9);
    }
    session.close().await;
}
