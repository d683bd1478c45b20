//! Lifecycle owner for the server process.
//!
//! The supervisor spawns the server, hands its stdout to a [`LogReader`]
//! task feeding the chat queue, drains stderr into the log, and serialises
//! console commands written to stdin.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::chat::{EventQueue, LineClassifier, LogReader, ReaderSummary, SERVER_LOG_TARGET};

use super::{ServerProcess, ServerProcessBuilder, SpawnError};

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Console command that shuts the server down.
pub const STOP_COMMAND: &str = "stop";

/// Capacity of the raw output broadcast channel.
const RAW_LINE_BUFFER: usize = 256;

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessState {
    #[default]
    NotStarted,
    Running,
    Exited,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// The process could not be launched.
    #[error("Failed to launch server: {0}")]
    Launch(#[from] SpawnError),
    /// A command was sent while the server was not running.
    #[error("Server is not running ({state})")]
    NotRunning { state: ProcessState },
    /// `start` was called while the server was already running.
    #[error("Server is already running")]
    AlreadyRunning,
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stdin was not available.
    #[error("Process stdin not available")]
    NoStdin,
    /// Writing to or waiting on the process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared with the reader task.
#[derive(Debug)]
struct Shared {
    state: watch::Sender<ProcessState>,
    stdin: Mutex<Option<ChildStdin>>,
}

impl Shared {
    fn transition(&self, to: ProcessState) {
        let from = self.state.send_replace(to);
        if from != to {
            tracing::debug!(from = ?from, to = ?to, "Server state transition");
        }
    }
}

/// Owns the server process and the one-way command channel into it.
#[derive(Debug)]
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    process: Mutex<Option<ServerProcess>>,
    reader: Mutex<Option<JoinHandle<ReaderSummary>>>,
    classifier: Arc<LineClassifier>,
    raw_lines: broadcast::Sender<String>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Create a supervisor using the default line classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_classifier(LineClassifier::new())
    }

    /// Create a supervisor with a custom line classifier.
    #[must_use]
    pub fn with_classifier(classifier: LineClassifier) -> Self {
        let (state, _) = watch::channel(ProcessState::NotStarted);
        let (raw_lines, _) = broadcast::channel(RAW_LINE_BUFFER);
        Self {
            shared: Arc::new(Shared {
                state,
                stdin: Mutex::new(None),
            }),
            process: Mutex::new(None),
            reader: Mutex::new(None),
            classifier: Arc::new(classifier),
            raw_lines,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.shared.state.borrow()
    }

    /// Subscribe to every raw stdout line, recognised or not.
    #[must_use]
    pub fn subscribe_raw_lines(&self) -> broadcast::Receiver<String> {
        self.raw_lines.subscribe()
    }

    /// Launch the server and start reading its output into `queue`.
    ///
    /// Returns as soon as the process is spawned; no output is assumed yet.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::AlreadyRunning` if the server is running, or
    /// `ServerError::Launch` if the process cannot be spawned.
    pub async fn start(
        &self,
        builder: &ServerProcessBuilder,
        queue: EventQueue,
    ) -> Result<(), ServerError> {
        let mut process_slot = self.process.lock().await;
        if self.state() == ProcessState::Running {
            return Err(ServerError::AlreadyRunning);
        }

        let mut process = ServerProcess::spawn(builder)?;
        let stdout = process.take_stdout().ok_or(ServerError::NoStdout)?;
        let stdin = process.take_stdin().ok_or(ServerError::NoStdin)?;
        if let Some(stderr) = process.take_stderr() {
            tokio::spawn(drain_stderr(stderr));
        }

        tracing::info!(
            pid = ?process.id(),
            cwd = %builder.get_working_dir().display(),
            "Server process started"
        );

        *self.shared.stdin.lock().await = Some(stdin);
        *process_slot = Some(process);
        self.shared.transition(ProcessState::Running);

        let reader = LogReader::new(BufReader::new(stdout), Arc::clone(&self.classifier), queue)
            .with_raw_lines(self.raw_lines.clone());
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let summary = reader.run().await;
            shared.stdin.lock().await.take();
            shared.transition(ProcessState::Exited);
            tracing::info!(
                lines = summary.lines,
                events = summary.events,
                "Server output closed"
            );
            summary
        });
        *self.reader.lock().await = Some(handle);

        Ok(())
    }

    /// Write `command` plus a newline to the server console and flush.
    ///
    /// Concurrent callers are serialised; the effect is only visible later
    /// in the server's output.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::NotRunning` unless the server is running, or
    /// `ServerError::Io` if the write fails.
    pub async fn send_command(&self, command: &str) -> Result<(), ServerError> {
        let state = self.state();
        if state != ProcessState::Running {
            return Err(ServerError::NotRunning { state });
        }

        let mut stdin = self.shared.stdin.lock().await;
        let Some(stdin) = stdin.as_mut() else {
            return Err(ServerError::NotRunning {
                state: self.state(),
            });
        };

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        tracing::debug!(command = %command, "Sent server command");
        Ok(())
    }

    /// Resolve once the server is no longer running.
    ///
    /// Returns immediately if it was never started.
    pub async fn wait_for_exit(&self) -> ProcessState {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|state| *state != ProcessState::Running).await;
        let state = *rx.borrow();
        state
    }

    /// Counters from the reader task, once it has finished.
    ///
    /// Waits for the reader if the server is still producing output.
    pub async fn join_reader(&self) -> Option<ReaderSummary> {
        let handle = self.reader.lock().await.take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "Log reader task failed");
                None
            }
        }
    }

    /// Ask the server to stop, terminating it if it outlives `timeout`.
    ///
    /// Once the process is reaped its output gets another `timeout` to
    /// close; after that the reader is abandoned and the state forced to
    /// `Exited`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Io` if waiting on or signalling the process fails.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ServerError> {
        if let Err(e) = self.send_command(STOP_COMMAND).await {
            tracing::debug!(error = %e, "Could not send stop command");
        }

        let mut process_slot = self.process.lock().await;
        let Some(process) = process_slot.as_mut() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, process.wait()).await {
            Ok(status) => {
                tracing::info!(status = %status?, "Server stopped");
            }
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Server ignored stop, terminating");
                process.graceful_terminate(DEFAULT_TERMINATE_TIMEOUT).await?;
            }
        }
        process_slot.take();
        drop(process_slot);

        // A grandchild can keep stdout open after the server itself is gone.
        if tokio::time::timeout(timeout, self.wait_for_exit()).await.is_err() {
            tracing::warn!(
                timeout = ?timeout,
                "Server output still open after exit, detaching reader"
            );
            if let Some(handle) = self.reader.lock().await.take() {
                handle.abort();
            }
            self.shared.stdin.lock().await.take();
            self.shared.transition(ProcessState::Exited);
        }
        Ok(())
    }
}

/// Forward stderr lines to the log until the pipe closes.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::warn!(target: SERVER_LOG_TARGET, "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Server stderr closed with error");
                break;
            }
        }
    }
}
