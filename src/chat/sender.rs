//! Periodic delivery of queued chat lines.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ChatConfig;
use crate::transport::ChatTransport;

use super::{paginate, EventQueue};

/// Default delay between flushes, in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Default maximum characters per outbound message.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Result of a single flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Lines drained from the queue.
    pub lines: usize,
    /// Pages delivered.
    pub pages_sent: usize,
    /// Pages dropped because an earlier page failed.
    pub pages_dropped: usize,
}

/// Totals accumulated over the sender's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub flushes: usize,
    pub lines: usize,
    pub pages_sent: usize,
    pub pages_dropped: usize,
}

impl SenderStats {
    fn record(&mut self, outcome: FlushOutcome) {
        self.flushes = self.flushes.saturating_add(1);
        self.lines = self.lines.saturating_add(outcome.lines);
        self.pages_sent = self.pages_sent.saturating_add(outcome.pages_sent);
        self.pages_dropped = self.pages_dropped.saturating_add(outcome.pages_dropped);
    }
}

/// Drains the queue on a fixed interval and posts the batch as pages.
pub struct Sender {
    queue: EventQueue,
    transport: Arc<dyn ChatTransport>,
    channel_id: String,
    interval: Duration,
    page_size: usize,
    stats: SenderStats,
}

impl Sender {
    #[must_use]
    pub fn new(queue: EventQueue, transport: Arc<dyn ChatTransport>, config: &ChatConfig) -> Self {
        Self {
            queue,
            transport,
            channel_id: config.channel_id.clone(),
            interval: config.flush_interval(),
            page_size: config.page_size,
            stats: SenderStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Drain the queue once and deliver it.
    ///
    /// Lines are trimmed and joined with `\n`, then split into pages sent
    /// one after another. The first failed page drops the rest of the
    /// batch.
    pub async fn flush(&mut self) -> FlushOutcome {
        let lines = self.queue.drain();
        if lines.is_empty() {
            return FlushOutcome::default();
        }

        let text = lines
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join("\n");

        let mut outcome = FlushOutcome {
            lines: lines.len(),
            ..FlushOutcome::default()
        };
        let mut pages = paginate(&text, self.page_size).enumerate();

        while let Some((index, page)) = pages.next() {
            if let Err(e) = self.transport.send(&self.channel_id, page).await {
                outcome.pages_dropped = 1 + pages.by_ref().count();
                tracing::warn!(
                    channel = %self.channel_id,
                    page = index,
                    dropped = outcome.pages_dropped,
                    error = %e,
                    "Failed to deliver chat page, dropping rest of batch"
                );
                break;
            }
            outcome.pages_sent += 1;
        }

        tracing::debug!(
            lines = outcome.lines,
            pages = outcome.pages_sent,
            "Flushed chat batch"
        );
        self.stats.record(outcome);
        outcome
    }

    /// Flush every interval until cancelled, then flush once more.
    pub async fn run(mut self, cancel: CancellationToken) -> SenderStats {
        tracing::debug!(interval = ?self.interval, page_size = self.page_size, "Chat sender started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {
                    self.flush().await;
                }
            }
        }

        self.flush().await;
        tracing::debug!(stats = ?self.stats, "Chat sender stopped");
        self.stats
    }
}
