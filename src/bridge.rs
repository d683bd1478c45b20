//! Wiring of the server supervisor, chat queue and sender.
//!
//! [`Bridge::start`] launches the server, starts the log reader through the
//! supervisor, and spawns the periodic sender. Console commands bypass the
//! queue and go straight to the supervisor.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::allowlist::{AllowList, AllowListError, RELOAD_COMMAND};
use crate::chat::{EventQueue, Sender, SenderStats};
use crate::config::{BridgeConfig, ConfigError};
use crate::server::{ProcessState, ProcessSupervisor, ServerError, ServerProcessBuilder};
use crate::transport::{ChatTransport, TransportError};

/// Error type for bridge operations.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    AllowList(#[from] AllowListError),
    #[error("Chat sender task failed: {0}")]
    SenderJoin(#[from] tokio::task::JoinError),
}

/// A running bridge between one server and one chat channel.
pub struct Bridge {
    config: BridgeConfig,
    supervisor: Arc<ProcessSupervisor>,
    queue: EventQueue,
    transport: Arc<dyn ChatTransport>,
    cancel: CancellationToken,
    sender: Option<JoinHandle<SenderStats>>,
}

impl Bridge {
    #[must_use]
    pub fn new(config: BridgeConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_supervisor(config, transport, ProcessSupervisor::new())
    }

    /// Create a bridge around a preconfigured supervisor.
    #[must_use]
    pub fn with_supervisor(
        config: BridgeConfig,
        transport: Arc<dyn ChatTransport>,
        supervisor: ProcessSupervisor,
    ) -> Self {
        Self {
            config,
            supervisor: Arc::new(supervisor),
            queue: EventQueue::new(),
            transport,
            cancel: CancellationToken::new(),
            sender: None,
        }
    }

    /// Handle to the supervisor, for sending console commands.
    #[must_use]
    pub fn supervisor(&self) -> Arc<ProcessSupervisor> {
        Arc::clone(&self.supervisor)
    }

    /// Handle to the outbound queue.
    #[must_use]
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Launch the server, then the sender.
    ///
    /// If configured, the allow-list file is read before launch, then
    /// rewritten and reloaded right after. A failed sync stops the server.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError` if the config is invalid, the server cannot be
    /// launched, or the allow-list cannot be synced.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        self.config.validate()?;

        // Load before launch so a corrupt file never leaves a server behind.
        let allowlist = if self.config.allowlist.reload_on_start {
            Some(AllowList::load(self.config.allowlist_path()).await?)
        } else {
            None
        };

        let builder = ServerProcessBuilder::from_config(&self.config.server);
        self.supervisor.start(&builder, self.queue.clone()).await?;

        if let Some(allowlist) = allowlist {
            if let Err(e) = self.update_allowlist(&allowlist).await {
                tracing::warn!(error = %e, "Allow-list sync failed, stopping server");
                if let Err(stop_err) = self
                    .supervisor
                    .stop(self.config.server.stop_timeout())
                    .await
                {
                    tracing::warn!(error = %stop_err, "Failed to stop server");
                }
                return Err(e);
            }
        }

        let sender = Sender::new(
            self.queue.clone(),
            Arc::clone(&self.transport),
            &self.config.chat,
        );
        self.sender = Some(tokio::spawn(sender.run(self.cancel.child_token())));

        tracing::info!(channel = %self.config.chat.channel_id, "Bridge started");
        Ok(())
    }

    /// Forward a console command to the server.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::NotRunning` unless the server is running.
    pub async fn send_command(&self, command: &str) -> Result<(), BridgeError> {
        self.supervisor.send_command(command).await?;
        Ok(())
    }

    /// Save `allowlist` and tell the server to reload it.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError` if saving fails or the server is not running.
    pub async fn update_allowlist(&self, allowlist: &AllowList) -> Result<(), BridgeError> {
        allowlist.save().await?;
        self.supervisor.send_command(RELOAD_COMMAND).await?;
        Ok(())
    }

    /// Resolve once the server process has exited.
    pub async fn wait_for_exit(&self) -> ProcessState {
        self.supervisor.wait_for_exit().await
    }

    /// Stop the server, flush what is queued, and stop the sender.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError` if stopping the server or joining the sender fails.
    pub async fn shutdown(&mut self) -> Result<SenderStats, BridgeError> {
        let stopped = self
            .supervisor
            .stop(self.config.server.stop_timeout())
            .await;
        if let Some(summary) = self.supervisor.join_reader().await {
            tracing::debug!(lines = summary.lines, events = summary.events, "Log reader finished");
        }

        self.cancel.cancel();
        let stats = match self.sender.take() {
            Some(handle) => handle.await?,
            None => SenderStats::default(),
        };

        stopped?;
        tracing::info!(
            pages = stats.pages_sent,
            dropped = stats.pages_dropped,
            "Bridge stopped"
        );
        Ok(stats)
    }
}
