//! Tests for batched chat delivery.

use std::sync::Arc;
use std::time::Duration;

use mc_bridge::chat::{EventQueue, Sender};
use mc_bridge::config::ChatConfig;
use tokio_util::sync::CancellationToken;

use crate::common::{eventually, RecordingTransport};

fn chat_config(flush_interval_ms: u64) -> ChatConfig {
    ChatConfig {
        channel_id: "778899".to_string(),
        flush_interval_ms,
        page_size: 500,
    }
}

#[tokio::test]
async fn batch_of_1100_chars_is_sent_as_three_ordered_pages() {
    let queue = EventQueue::new();
    let lines: Vec<String> = ["a", "b", "c"].iter().map(|c| c.repeat(366)).collect();
    for line in &lines {
        queue.push(line.clone());
    }
    let expected = lines.join("\n");
    assert_eq!(expected.len(), 1100);

    let transport = Arc::new(RecordingTransport::default());
    let mut sender = Sender::new(queue.clone(), transport.clone(), &chat_config(1000));
    let outcome = sender.flush().await;

    assert_eq!(outcome.lines, 3);
    assert_eq!(outcome.pages_sent, 3);
    let pages = transport.pages();
    assert_eq!(
        pages.iter().map(String::len).collect::<Vec<_>>(),
        [500, 500, 100]
    );
    assert_eq!(pages.concat(), expected);
    assert!(transport.channels().iter().all(|c| c == "778899"));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn failed_send_drops_rest_of_batch_but_not_next_batch() {
    let queue = EventQueue::new();
    queue.push("x".repeat(1200));
    let transport = Arc::new(RecordingTransport::failing_after(1));
    let mut sender = Sender::new(queue.clone(), transport.clone(), &chat_config(1000));

    let outcome = sender.flush().await;
    assert_eq!(outcome.pages_sent, 1);
    assert_eq!(outcome.pages_dropped, 2);
    assert!(queue.is_empty());

    queue.push("<Steve> still here");
    let outcome = sender.flush().await;
    assert_eq!(outcome.lines, 1);
    assert_eq!(outcome.pages_dropped, 1);

    let stats = sender.stats();
    assert_eq!(stats.flushes, 2);
    assert_eq!(stats.lines, 2);
    assert_eq!(stats.pages_sent, 1);
    assert_eq!(stats.pages_dropped, 3);
}

#[tokio::test]
async fn run_flushes_on_interval() {
    let queue = EventQueue::new();
    let transport = Arc::new(RecordingTransport::default());
    let sender = Sender::new(queue.clone(), transport.clone(), &chat_config(20));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sender.run(cancel.clone()));

    queue.push("Steve joined the game");
    assert!(eventually(|| transport.pages().len() == 1).await);

    queue.push("<Steve> hi");
    queue.push("Steve left the game");
    let expected = "Steve joined the game\n<Steve> hi\nSteve left the game";
    assert!(eventually(|| transport.pages().join("\n") == expected).await);

    cancel.cancel();
    let stats = task.await.unwrap();

    assert_eq!(transport.pages()[0], "Steve joined the game");
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.pages_sent, transport.pages().len());
}

#[tokio::test]
async fn cancel_flushes_remaining_lines() {
    let queue = EventQueue::new();
    let transport = Arc::new(RecordingTransport::default());
    let sender = Sender::new(queue.clone(), transport.clone(), &chat_config(3_600_000));
    let cancel = CancellationToken::new();

    queue.push("<Alex> bye");
    cancel.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(2), sender.run(cancel))
        .await
        .unwrap();

    assert_eq!(stats.pages_sent, 1);
    assert_eq!(transport.pages(), ["<Alex> bye"]);
}
