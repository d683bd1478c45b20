//! Tests for server process spawning and control.

use mc_bridge::server::{ServerProcess, ServerProcessBuilder, SpawnError};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::common::{echo_server, script_server};

#[test]
fn builder_generates_java_command() {
    let builder = ServerProcessBuilder::new("/srv/mc").memory("2G");
    assert_eq!(builder.get_binary(), "java");
    assert_eq!(
        builder.build_args(),
        ["-Xmx2G", "-Xms2G", "-jar", "server.jar", "nogui"]
    );
}

#[test]
fn builder_is_clone() {
    let builder = ServerProcessBuilder::new("/srv/mc").memory("1G").jar("fabric.jar");
    let cloned = builder.clone();
    assert_eq!(builder.build_args(), cloned.build_args());
}

#[tokio::test]
async fn spawn_missing_binary_is_not_found() {
    let dir = TempDir::new().unwrap();
    let builder = ServerProcessBuilder::new(dir.path()).binary("mc-bridge-no-such-java");

    let err = ServerProcess::spawn(&builder).unwrap_err();
    assert!(matches!(err, SpawnError::NotFound(ref name) if name == "mc-bridge-no-such-java"));
}

#[tokio::test]
async fn spawn_missing_dir_is_reported() {
    let builder = ServerProcessBuilder::new("/nonexistent/mc-bridge/world");
    let err = ServerProcess::spawn(&builder).unwrap_err();
    assert!(matches!(err, SpawnError::WorkingDirMissing(_)));
    assert!(err.to_string().contains("/nonexistent/mc-bridge/world"));
}

#[tokio::test]
async fn spawn_runs_in_canonical_working_dir() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let mut process = ServerProcess::spawn(&script_server(dir.path(), "pwd -P")).unwrap();

    let mut stdout = process.take_stdout().unwrap();
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    process.wait().await.unwrap();

    assert_eq!(output.trim(), expected.to_str().unwrap());
}

#[tokio::test]
async fn all_three_pipes_are_attached() {
    let dir = TempDir::new().unwrap();
    let mut process = ServerProcess::spawn(&echo_server(dir.path())).unwrap();

    let mut stdin = process.take_stdin().unwrap();
    let mut stdout = process.take_stdout().unwrap();
    assert!(process.take_stderr().is_some());
    assert!(process.take_stdin().is_none());
    assert!(process.take_stdout().is_none());

    stdin.write_all(b"list\n").await.unwrap();
    drop(stdin);

    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, "list\n");
    assert!(process.wait().await.unwrap().success());
}

#[tokio::test]
async fn try_wait_on_running_process() {
    let dir = TempDir::new().unwrap();
    let mut process = ServerProcess::spawn(&echo_server(dir.path())).unwrap();

    assert!(process.id().is_some());
    assert!(process.try_wait().unwrap().is_none());

    process.kill().await.unwrap();
    assert!(!process.wait().await.unwrap().success());
}

#[tokio::test]
async fn graceful_terminate_with_timeout() {
    let dir = TempDir::new().unwrap();
    let mut process = ServerProcess::spawn(&echo_server(dir.path())).unwrap();

    let result = process
        .graceful_terminate(std::time::Duration::from_millis(100))
        .await;
    assert!(result.is_ok());
    assert!(process.try_wait().unwrap().is_some());
}
