//! Minecraft server process spawning and control.
//!
//! This module provides a builder for the server's launch command and a
//! thin wrapper over the running child with all three pipes attached.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::config::ServerConfig;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Server binary not found: {0}")]
    NotFound(String),
    /// The working directory does not exist.
    #[error("Server directory not found: {}", .0.display())]
    WorkingDirMissing(PathBuf),
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error, binary: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(binary.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for the server launch command.
#[derive(Debug, Clone)]
pub struct ServerProcessBuilder {
    binary: String,
    working_dir: PathBuf,
    memory: Option<String>,
    jar: String,
    extra_args: Vec<String>,
    launch_args: Option<Vec<String>>,
}

impl ServerProcessBuilder {
    /// Create a builder launching `java -jar server.jar nogui` in `working_dir`.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "java".to_string(),
            working_dir: working_dir.into(),
            memory: None,
            jar: "server.jar".to_string(),
            extra_args: Vec::new(),
            launch_args: None,
        }
    }

    /// Create a builder from the `[server]` config section.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let builder = Self::new(&config.path)
            .binary(&config.java)
            .memory(&config.memory)
            .jar(&config.jar)
            .extra_args(config.extra_args.iter().cloned());

        match &config.launch_args {
            Some(args) => builder.args(args.iter().cloned()),
            None => builder,
        }
    }

    /// Set the binary to execute.
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the heap size passed as both `-Xms` and `-Xmx`.
    #[must_use]
    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    /// Set the server jar.
    #[must_use]
    pub fn jar(mut self, jar: impl Into<String>) -> Self {
        self.jar = jar.into();
        self
    }

    /// Add JVM arguments placed before `-jar`.
    #[must_use]
    pub fn extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// Replace the generated arguments with `args`, passed verbatim.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.launch_args = Some(args.into_iter().collect());
        self
    }

    /// Get the working directory.
    #[must_use]
    pub fn get_working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// Get the binary.
    #[must_use]
    pub fn get_binary(&self) -> &str {
        &self.binary
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        if let Some(args) = &self.launch_args {
            return args.clone();
        }

        let mut args = Vec::new();

        if let Some(memory) = &self.memory {
            args.push(format!("-Xmx{memory}"));
            args.push(format!("-Xms{memory}"));
        }

        args.extend(self.extra_args.iter().cloned());
        args.push("-jar".to_string());
        args.push(self.jar.clone());
        args.push("nogui".to_string());

        args
    }
}

/// A running server process with piped stdin, stdout and stderr.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    /// Spawn the server described by `builder`.
    ///
    /// The working directory is canonicalised first so a missing directory
    /// is reported as such rather than as a missing binary.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the directory is missing or the process fails to spawn.
    pub fn spawn(builder: &ServerProcessBuilder) -> Result<Self, SpawnError> {
        let working_dir = std::fs::canonicalize(&builder.working_dir)
            .map_err(|_| SpawnError::WorkingDirMissing(builder.working_dir.clone()))?;
        let args = builder.build_args();

        tracing::debug!(
            binary = %builder.binary,
            args = ?args,
            cwd = %working_dir.display(),
            "Spawning server process"
        );

        let child = Command::new(&builder.binary)
            .args(&args)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(e, &builder.binary))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Process already exited
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => self.child.kill().await,
        }
    }
}
