//! The privileged shell session engine
//!
//! Owns one long-lived superuser shell process and bridges it to any number
//! of concurrent callers. A writer loop serializes queued [`Command`]s into
//! the process's stdin in submission order, each followed by an echoed
//! sentinel marker carrying the command's queue index and `$?`. A reader
//! loop scans the process's combined output for those markers and resolves
//! each command with its exit code, strictly in submission order.
//!
//! Failure containment is the point of this engine: process death, broken
//! pipes, and marker desynchronization all resolve every still-pending
//! command with [`FAILED_EXIT_CODE`] instead of leaving callers hanging.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::command::{Command, CommandHandle, FAILED_EXIT_CODE};
use super::launcher::{self, probe_privilege};
use crate::config::ShellConfig;

/// Sentinel embedded in echoed marker lines. Chosen to be unlikely to
/// collide with real command output.
pub const MARKER_TOKEN: &str = "F*D^W@#FGF";

/// Boxed async writer half of the shell process (its stdin).
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed async reader half of the shell process (its stdout).
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

static MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}\s+(\d+)\s+(\d+)", regex::escape(MARKER_TOKEN)))
        .expect("marker pattern is valid")
});

/// Extract `(index, exit_code)` from a line carrying the sentinel marker.
///
/// Returns `None` for ordinary output lines, including the writer-side
/// `echo` instruction itself (its `$?` is not yet a number).
pub fn parse_marker(line: &str) -> Option<(u64, i32)> {
    let caps = MARKER_PATTERN.captures(line)?;
    let index = caps.get(1)?.as_str().parse().ok()?;
    let code = caps.get(2)?.as_str().parse().ok()?;
    Some((index, code))
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed but not yet probing.
    Unstarted,
    /// Privilege probe in flight.
    Probing,
    /// Probe succeeded; commands are accepted.
    Active,
    /// Close requested; queued commands drain, new ones are rejected.
    Draining,
    /// Torn down. No commands are accepted and none remain pending.
    Closed,
}

/// A command queued inside the engine. The wire text is prepared at
/// submission time so the writer loop never touches the caller's data.
struct QueuedCommand {
    index: u64,
    script: String,
    tx: oneshot::Sender<i32>,
}

/// Queue state shared between submitters, the writer loop, and the reader
/// loop. Pending commands have not been written yet; in-flight commands
/// await their marker. Both are ordered by index, and the reader can never
/// await a command the writer has not written.
struct Queue {
    state: SessionState,
    pending: VecDeque<QueuedCommand>,
    in_flight: VecDeque<QueuedCommand>,
    next_index: u64,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Notify,
    granted: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl Shared {
    fn new(state: SessionState) -> Self {
        Self {
            queue: Mutex::new(Queue {
                state,
                pending: VecDeque::new(),
                in_flight: VecDeque::new(),
                next_index: 0,
            }),
            wake: Notify::new(),
            granted: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }
}

/// One long-lived privileged shell process plus its engine state.
///
/// Constructed explicitly and owned by whoever needs privileged execution;
/// there is no process-wide singleton. Dropping the session without
/// [`close`](Self::close) leaves the drain to the subprocess's own exit.
pub struct ShellSession {
    id: String,
    shared: Arc<Shared>,
    writer_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl ShellSession {
    /// A session that never obtained privilege. Submissions resolve
    /// immediately with [`FAILED_EXIT_CODE`].
    pub fn disconnected() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            shared: Arc::new(Shared::new(SessionState::Closed)),
            writer_task: None,
            reader_task: None,
        }
    }

    /// Locate, spawn, and probe a superuser shell.
    ///
    /// Every failure along the way (no binary, spawn error, probe rejected)
    /// degrades to a disconnected session rather than an error; lack of
    /// privilege is an outcome, not an exception.
    pub async fn start(config: &ShellConfig) -> Self {
        let Some(su_path) = launcher::find_su_binary(config.su_path.as_deref()) else {
            info!("no superuser binary found");
            return Self::disconnected();
        };
        match launcher::spawn_su_process(&su_path) {
            Ok((child, stdin, stdout)) => {
                Self::from_streams(
                    Box::new(stdin),
                    Box::new(stdout),
                    Some(child),
                    config.probe_timeout(),
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, "failed to start superuser shell");
                Self::disconnected()
            }
        }
    }

    /// Build a session over already-captured process streams.
    ///
    /// Runs the privilege probe first; on probe failure the optional child
    /// is killed and the session comes back closed. On success the writer
    /// and reader loops take ownership of the two streams.
    pub async fn from_streams(
        writer: BoxedWriter,
        reader: BoxedReader,
        child: Option<Child>,
        probe_timeout: Duration,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let shared = Arc::new(Shared::new(SessionState::Unstarted));

        let mut writer = writer;
        let mut reader = BufReader::new(reader);

        shared.queue.lock().await.state = SessionState::Probing;
        let granted = probe_privilege(&mut writer, &mut reader, probe_timeout).await;
        if !granted {
            shared.queue.lock().await.state = SessionState::Closed;
            if let Some(mut child) = child {
                let _ = child.kill().await;
            }
            info!(session = %id, "privilege not granted");
            return Self {
                id,
                shared,
                writer_task: None,
                reader_task: None,
            };
        }

        shared.granted.store(true, Ordering::SeqCst);
        shared.queue.lock().await.state = SessionState::Active;
        *shared.child.lock().await = child;

        let writer_task = tokio::spawn(writer_loop(shared.clone(), writer, id.clone()));
        let reader_task = tokio::spawn(reader_loop(shared.clone(), reader, id.clone()));
        info!(session = %id, "privileged shell session active");

        Self {
            id,
            shared,
            writer_task: Some(writer_task),
            reader_task: Some(reader_task),
        }
    }

    /// Session identifier used in log output.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the probe verified elevated privilege and the session has
    /// not died since.
    pub fn has_privilege(&self) -> bool {
        self.shared.granted.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.shared.queue.lock().await.state
    }

    /// Enqueue a command and return its handle without blocking.
    ///
    /// Indexes are assigned monotonically under the queue lock, so
    /// submission order is a total order across concurrent callers. When
    /// the session is not accepting work the handle comes back already
    /// resolved with [`FAILED_EXIT_CODE`].
    pub async fn submit(&self, command: Command) -> CommandHandle {
        let (tx, rx) = oneshot::channel();
        let mut q = self.shared.queue.lock().await;
        let index = q.next_index;
        q.next_index += 1;
        if q.state != SessionState::Active {
            drop(q);
            debug!(session = %self.id, index, "submission rejected, session not active");
            let _ = tx.send(FAILED_EXIT_CODE);
            return CommandHandle::new(index, rx);
        }
        q.pending.push_back(QueuedCommand {
            index,
            script: wire_script(&command, index),
            tx,
        });
        drop(q);
        self.shared.wake.notify_one();
        CommandHandle::new(index, rx)
    }

    /// Request an orderly shutdown: stop accepting new commands, drain the
    /// queue, then instruct the shell to exit. Does not block and does not
    /// kill the subprocess while commands are pending.
    pub async fn close(&self) {
        let mut q = self.shared.queue.lock().await;
        if q.state == SessionState::Active {
            q.state = SessionState::Draining;
        }
        drop(q);
        self.shared.wake.notify_one();
    }

    /// Tear the session down now: fail everything pending and kill the
    /// subprocess if it is still alive.
    pub async fn force_teardown(&self) {
        teardown(&self.shared, &self.id).await;
    }

    /// Wait until both loops have finished. Returns immediately for a
    /// session that never started them.
    pub async fn wait_closed(&mut self) {
        if let Some(task) = &mut self.writer_task {
            let _ = task.await;
        }
        self.writer_task = None;
        if let Some(task) = &mut self.reader_task {
            let _ = task.await;
        }
        self.reader_task = None;
    }
}

impl std::fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellSession")
            .field("id", &self.id)
            .field("granted", &self.has_privilege())
            .finish()
    }
}

/// Wire text for one command: every alternative line with stderr folded
/// into stdout, then the echoed marker reporting this unit's `$?`.
fn wire_script(command: &Command, index: u64) -> String {
    let mut script = command.script();
    script.push_str(&format!("\necho {} {} $?\n", MARKER_TOKEN, index));
    script
}

enum WriterJob {
    Write(String),
    Exit,
    Stop,
}

/// Writer side: strictly sequential, single instance per session.
///
/// Moves commands from pending to in-flight under the queue lock, performs
/// the actual stream writes outside of it. When draining and the queue is
/// exhausted, sends the session-terminating instruction and closes stdin.
async fn writer_loop(shared: Arc<Shared>, mut stdin: BoxedWriter, session: String) {
    loop {
        let job = loop {
            let notified = shared.wake.notified();
            {
                let mut q = shared.queue.lock().await;
                if q.state == SessionState::Closed {
                    break WriterJob::Stop;
                }
                if let Some(cmd) = q.pending.pop_front() {
                    let script = cmd.script.clone();
                    q.in_flight.push_back(cmd);
                    break WriterJob::Write(script);
                }
                if q.state == SessionState::Draining {
                    break WriterJob::Exit;
                }
            }
            notified.await;
        };

        match job {
            WriterJob::Write(script) => {
                let result = async {
                    stdin.write_all(script.as_bytes()).await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = result {
                    // Broken pipe is process death; fail everything pending.
                    warn!(session = %session, error = %e, "shell input write failed");
                    teardown(&shared, &session).await;
                    return;
                }
            }
            WriterJob::Exit => {
                debug!(session = %session, "queue drained, terminating shell");
                let _ = stdin.write_all(b"\nexit 0\n").await;
                let _ = stdin.flush().await;
                let _ = stdin.shutdown().await;
                return;
            }
            WriterJob::Stop => return,
        }
    }
}

/// Reader side: single instance per session.
///
/// Scans each output line for the sentinel marker and resolves the oldest
/// in-flight command. Lines without the marker are ordinary command output
/// with no protocol significance. A marker whose index does not match the
/// awaited index is fatal: correlation cannot be trusted to self-correct,
/// so the session closes and fails everything still pending. End of stream
/// means the process died; same remediation.
async fn reader_loop(
    shared: Arc<Shared>,
    mut stdout: BufReader<BoxedReader>,
    session: String,
) {
    let mut awaited: u64 = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match stdout.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(session = %session, "shell output reached end of stream");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(session = %session, error = %e, "shell output read failed");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        let Some((index, code)) = parse_marker(line) else {
            debug!(session = %session, line, "shell output");
            continue;
        };

        let resolved = {
            let mut q = shared.queue.lock().await;
            match q.in_flight.front() {
                Some(front) if front.index == index && index == awaited => {
                    q.in_flight.pop_front()
                }
                _ => None,
            }
        };
        match resolved {
            Some(cmd) => {
                debug!(session = %session, index, code, "command resolved");
                let _ = cmd.tx.send(code);
                awaited = index + 1;
            }
            None => {
                error!(
                    session = %session,
                    index,
                    awaited,
                    "marker index out of sequence, closing session"
                );
                break;
            }
        }
    }
    teardown(&shared, &session).await;
}

/// Idempotent teardown: mark the session closed, resolve every abandoned
/// command as failed in submission order, wake the writer, and kill the
/// subprocess if it is still around.
async fn teardown(shared: &Arc<Shared>, session: &str) {
    let abandoned = {
        let mut q = shared.queue.lock().await;
        if q.state == SessionState::Closed {
            return;
        }
        q.state = SessionState::Closed;
        let mut commands: Vec<QueuedCommand> = q.in_flight.drain(..).collect();
        commands.extend(q.pending.drain(..));
        commands
    };
    shared.granted.store(false, Ordering::SeqCst);
    if !abandoned.is_empty() {
        warn!(
            session,
            abandoned = abandoned.len(),
            "resolving abandoned commands as failed"
        );
    }
    for cmd in abandoned {
        let _ = cmd.tx.send(FAILED_EXIT_CODE);
    }
    shared.wake.notify_one();

    let child = shared.child.lock().await.take();
    if let Some(mut child) = child {
        let _ = child.kill().await;
    }
    info!(session, "shell session closed");
}
