//! Reader that turns server output into queued chat lines.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

use super::{EventQueue, LineClassifier, LogEvent};

/// Tracing target carrying every raw line the server prints.
pub const SERVER_LOG_TARGET: &str = "mc_bridge::server_log";

/// Counters reported when the reader stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Lines read from the stream.
    pub lines: usize,
    /// Lines that produced a queued event.
    pub events: usize,
}

/// Pulls lines from the server's stdout until end of stream.
///
/// Each line is logged on [`SERVER_LOG_TARGET`], published to the optional
/// raw-line channel, classified, and its event rendered into the queue.
pub struct LogReader<R> {
    reader: R,
    classifier: Arc<LineClassifier>,
    queue: EventQueue,
    raw_lines: Option<broadcast::Sender<String>>,
}

impl<R> LogReader<R>
where
    R: AsyncBufRead + Unpin,
{
    #[must_use]
    pub fn new(reader: R, classifier: Arc<LineClassifier>, queue: EventQueue) -> Self {
        Self {
            reader,
            classifier,
            queue,
            raw_lines: None,
        }
    }

    /// Also publish every raw line to `tx`.
    #[must_use]
    pub fn with_raw_lines(mut self, tx: broadcast::Sender<String>) -> Self {
        self.raw_lines = Some(tx);
        self
    }

    /// Handle one line: surface it, classify it, queue the result.
    pub fn process_line(&self, line: &str) -> Option<LogEvent> {
        tracing::info!(target: SERVER_LOG_TARGET, "{line}");
        if let Some(tx) = &self.raw_lines {
            // No subscribers is fine.
            let _ = tx.send(line.to_string());
        }

        let event = self.classifier.classify(line)?;
        tracing::debug!(
            player = event.participant(),
            event = ?event,
            "Classified server log line"
        );
        self.queue.push_event(&event);
        Some(event)
    }

    /// Read until end of stream or a read error.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; surrounding
    /// whitespace is trimmed before classification.
    pub async fn run(mut self) -> ReaderSummary {
        let mut summary = ReaderSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    tracing::debug!("Server output reached end of stream");
                    break;
                }
                Ok(_) => {
                    summary.lines += 1;
                    let line = String::from_utf8_lossy(&buf);
                    if self.process_line(line.trim()).is_some() {
                        summary.events += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read server output, stopping reader");
                    break;
                }
            }
        }

        summary
    }
}
