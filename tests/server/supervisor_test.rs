//! Tests for the process supervisor.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mc_bridge::chat::EventQueue;
use mc_bridge::server::{ProcessState, ProcessSupervisor, ServerError, SpawnError};
use tempfile::TempDir;

use crate::common::{collect_lines, echo_server, script_server};

#[tokio::test]
async fn send_command_before_start_is_not_running() {
    let supervisor = ProcessSupervisor::new();

    let err = supervisor.send_command("whitelist reload").await.unwrap_err();

    assert!(matches!(
        err,
        ServerError::NotRunning {
            state: ProcessState::NotStarted
        }
    ));
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
}

#[tokio::test]
async fn start_with_missing_dir_leaves_state_unchanged() {
    let supervisor = ProcessSupervisor::new();
    let builder = mc_bridge::server::ServerProcessBuilder::new("/nonexistent/mc-bridge/world");

    let err = supervisor
        .start(&builder, EventQueue::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServerError::Launch(SpawnError::WorkingDirMissing(_))
    ));
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
}

#[tokio::test]
async fn commands_reach_the_server_and_chat_is_queued() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();
    let queue = EventQueue::new();

    supervisor
        .start(&echo_server(dir.path()), queue.clone())
        .await
        .unwrap();
    assert_eq!(supervisor.state(), ProcessState::Running);

    supervisor
        .send_command("[Async Chat Thread - #3/INFO]: <Steve> hello world")
        .await
        .unwrap();
    supervisor
        .send_command("[Server thread/INFO]: Steve[/127.0.0.1:54321] logged in")
        .await
        .unwrap();

    let lines = collect_lines(&queue, 2).await;
    assert_eq!(lines, ["<Steve> hello world", "Steve joined the game"]);

    supervisor.stop(Duration::from_millis(200)).await.unwrap();
    assert_eq!(supervisor.state(), ProcessState::Exited);
}

#[tokio::test]
async fn unrecognised_lines_are_surfaced_but_not_queued() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();
    let mut raw = supervisor.subscribe_raw_lines();
    let queue = EventQueue::new();

    supervisor
        .start(&echo_server(dir.path()), queue.clone())
        .await
        .unwrap();
    supervisor.send_command("Done (3.1s)! For help, type \"help\"").await.unwrap();

    let line = tokio::time::timeout(Duration::from_secs(2), raw.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, "Done (3.1s)! For help, type \"help\"");
    assert!(queue.is_empty());

    supervisor.stop(Duration::from_millis(200)).await.unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();

    supervisor
        .start(&echo_server(dir.path()), EventQueue::new())
        .await
        .unwrap();
    let err = supervisor
        .start(&echo_server(dir.path()), EventQueue::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::AlreadyRunning));

    supervisor.stop(Duration::from_millis(200)).await.unwrap();
}

#[tokio::test]
async fn end_of_output_marks_exited() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();
    let queue = EventQueue::new();
    let script = "echo '[Server thread/INFO]: Steve left the game'; echo 'Saving worlds'";

    supervisor
        .start(&script_server(dir.path(), script), queue.clone())
        .await
        .unwrap();

    let state = tokio::time::timeout(Duration::from_secs(2), supervisor.wait_for_exit())
        .await
        .unwrap();
    assert_eq!(state, ProcessState::Exited);
    assert_eq!(queue.drain(), ["Steve left the game"]);

    let summary = supervisor.join_reader().await.unwrap();
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.events, 1);

    let err = supervisor.send_command("list").await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::NotRunning {
            state: ProcessState::Exited
        }
    ));
}

#[tokio::test]
async fn stop_command_lets_server_exit_gracefully() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();
    let queue = EventQueue::new();
    let script = "read cmd; echo \"[Server thread/INFO]: Stopping the server ($cmd)\"";

    supervisor
        .start(&script_server(dir.path(), script), queue.clone())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), supervisor.stop(Duration::from_secs(3)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(supervisor.state(), ProcessState::Exited);
    let summary = supervisor.join_reader().await.unwrap();
    assert_eq!(summary.lines, 1);
}

#[tokio::test]
async fn stop_returns_when_a_grandchild_holds_output_open() {
    let dir = TempDir::new().unwrap();
    let supervisor = ProcessSupervisor::new();
    let script = "sleep 5 & read cmd; exit 0";

    supervisor
        .start(&script_server(dir.path(), script), EventQueue::new())
        .await
        .unwrap();

    tokio::time::timeout(
        Duration::from_secs(3),
        supervisor.stop(Duration::from_millis(300)),
    )
    .await
    .expect("stop waited on the orphaned output")
    .unwrap();

    assert_eq!(supervisor.state(), ProcessState::Exited);
    assert!(supervisor.join_reader().await.is_none());
    assert!(matches!(
        supervisor.send_command("list").await,
        Err(ServerError::NotRunning {
            state: ProcessState::Exited
        })
    ));
}

#[tokio::test]
async fn concurrent_commands_are_not_interleaved() {
    let dir = TempDir::new().unwrap();
    let supervisor = Arc::new(ProcessSupervisor::new());
    let queue = EventQueue::new();

    supervisor
        .start(&echo_server(dir.path()), queue.clone())
        .await
        .unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move {
                let text = format!("message number {i} {}", "x".repeat(200));
                supervisor
                    .send_command(&format!("[Async Chat Thread - #{i}/INFO]: <P{i}> {text}"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let lines = collect_lines(&queue, 20).await;
    let expected: HashSet<String> = (0..20)
        .map(|i| format!("<P{i}> message number {i} {}", "x".repeat(200)))
        .collect();
    assert_eq!(lines.into_iter().collect::<HashSet<_>>(), expected);

    supervisor.stop(Duration::from_millis(200)).await.unwrap();
}
