//! Engine protocol integration tests.
//!
//! These tests connect an `EngineConnection` to a scripted engine over an
//! in-memory pipe and exercise the line-delimited JSON-RPC flow: handshake,
//! model fetch, streamed builds, failures and shutdown.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gradle_shell::engine::protocol::BUILD_FAILED;
use gradle_shell::engine::{BuildEngine, EngineConnection, EngineError};
use gradle_shell::models::*;

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================
// Scripted engine
// ============================================================

/// Write one message as line-delimited JSON.
async fn send(writer: &mut WriteHalf<DuplexStream>, message: Value) {
    let mut line = serde_json::to_string(&message).expect("Failed to serialize message");
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .expect("Failed to write message");
}

fn project_json() -> Value {
    json!({
        "name": "demo",
        "path": ":",
        "tasks": [
            {"name": "build", "path": ":build"},
            {"name": "clean", "path": ":clean"}
        ],
        "children": [{
            "name": "app",
            "path": ":app",
            "parent": ":",
            "tasks": [{"name": "build", "path": ":app:build"}],
            "children": []
        }]
    })
}

/// Spawn a fake engine. Returns the requests it received once it stops.
///
/// Build tasks drive its behaviour: `broken` fails the build, `hang-up` closes
/// the pipe mid-build, `garbage` answers with a line that is not JSON. With
/// `sink_signal`, the engine waits for the client to write the first output
/// chunk before it sends the final response.
fn spawn_engine(
    server: DuplexStream,
    mut sink_signal: Option<mpsc::UnboundedReceiver<()>>,
) -> JoinHandle<Vec<Value>> {
    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();
        let mut seen = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            let request: Value = serde_json::from_str(&line).expect("client sent invalid JSON");
            seen.push(request.clone());
            let id = request["id"].clone();

            match request["method"].as_str().unwrap_or_default() {
                "initialize" => {
                    send(&mut write, json!({"jsonrpc": "2.0", "id": id, "result": {"engine": "fake"}})).await;
                }
                "environment/describe" => {
                    send(
                        &mut write,
                        json!({"jsonrpc": "2.0", "id": id, "result": {
                            "engine_version": "8.5",
                            "runtime_home": "/usr/lib/jvm/java-17",
                            "runtime_arguments": ["-Xmx512m"]
                        }}),
                    )
                    .await;
                }
                "model/fetch" => {
                    if request["params"]["arguments"] == json!(["--broken-settings"]) {
                        send(
                            &mut write,
                            json!({"jsonrpc": "2.0", "id": id, "error": {
                                "code": -32000,
                                "message": "Could not compile settings file"
                            }}),
                        )
                        .await;
                    } else {
                        send(&mut write, json!({"jsonrpc": "2.0", "id": id, "result": project_json()})).await;
                    }
                }
                "build/run" => {
                    let tasks: Vec<String> =
                        serde_json::from_value(request["params"]["tasks"].clone()).unwrap();

                    if tasks.iter().any(|t| t == "garbage") {
                        write.write_all(b"this is not json\n").await.unwrap();
                        continue;
                    }

                    for task in &tasks {
                        send(
                            &mut write,
                            json!({"jsonrpc": "2.0", "method": "build/output", "params": {
                                "stream": "stdout",
                                "text": format!("> Task :{}\n", task)
                            }}),
                        )
                        .await;
                    }

                    if let Some(signal) = sink_signal.as_mut() {
                        signal.recv().await;
                    }

                    if tasks.iter().any(|t| t == "hang-up") {
                        break;
                    }

                    send(
                        &mut write,
                        json!({"jsonrpc": "2.0", "method": "build/output", "params": {
                            "stream": "stderr",
                            "text": "BUILD DONE\n"
                        }}),
                    )
                    .await;

                    if tasks.iter().any(|t| t == "broken") {
                        send(
                            &mut write,
                            json!({"jsonrpc": "2.0", "id": id, "error": {
                                "code": BUILD_FAILED,
                                "message": "Build failed",
                                "data": "Execution failed for task ':broken'."
                            }}),
                        )
                        .await;
                    } else if tasks.iter().any(|t| t == "rejected") {
                        send(
                            &mut write,
                            json!({"jsonrpc": "2.0", "id": id, "error": {
                                "code": -32602,
                                "message": "Unknown command-line option '--nope'"
                            }}),
                        )
                        .await;
                    } else {
                        send(&mut write, json!({"jsonrpc": "2.0", "id": id, "result": {}})).await;
                    }
                }
                "shutdown" => {
                    send(&mut write, json!({"jsonrpc": "2.0", "id": id, "result": null})).await;
                    break;
                }
                other => panic!("unexpected method {}", other),
            }
        }

        seen
    })
}

async fn connect() -> (EngineConnection, JoinHandle<Vec<Value>>) {
    connect_with(None).await
}

async fn connect_with(
    sink_signal: Option<mpsc::UnboundedReceiver<()>>,
) -> (EngineConnection, JoinHandle<Vec<Value>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let engine = spawn_engine(server, sink_signal);
    let (read, write) = tokio::io::split(client);

    let connection = EngineConnection::from_transport(
        read,
        write,
        std::path::Path::new("/work/demo"),
        Some(std::path::Path::new("/opt/gradle")),
    )
    .await
    .expect("handshake failed");

    (connection, engine)
}

fn build(tasks: &[&str]) -> BuildRequest {
    BuildRequest {
        arguments: vec!["--offline".to_string()],
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
        jvm_arguments: vec![],
        color_output: true,
    }
}

/// Sink that reports every write on a channel.
struct SignallingSink {
    written: Vec<u8>,
    signal: mpsc::UnboundedSender<()>,
}

impl AsyncWrite for SignallingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.written.extend_from_slice(buf);
        let _ = self.signal.send(());
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ============================================================
// Handshake and queries
// ============================================================

mod handshake {
    use super::*;

    #[tokio::test]
    async fn sends_project_dir_and_installation() {
        let (connection, engine) = connect().await;
        connection.close().await.expect("close failed");

        let seen = engine.await.unwrap();
        assert_eq!(seen[0]["method"], "initialize");
        assert_eq!(seen[0]["params"]["project_dir"], "/work/demo");
        assert_eq!(seen[0]["params"]["installation"], "/opt/gradle");
        assert_eq!(seen[0]["params"]["client"]["name"], "gradle-shell");
    }

    #[tokio::test]
    async fn describes_environment() {
        let (mut connection, _engine) = connect().await;

        let environment = connection.describe_environment().await.unwrap();

        assert_eq!(environment.engine_version, "8.5");
        assert_eq!(
            environment.runtime_home,
            std::path::PathBuf::from("/usr/lib/jvm/java-17")
        );
        assert_eq!(environment.runtime_arguments, ["-Xmx512m"]);
    }

    #[tokio::test]
    async fn fetches_project_hierarchy() {
        let (mut connection, engine) = connect().await;

        let project = connection
            .fetch_project(&["--offline".to_string()])
            .await
            .unwrap();
        connection.close().await.unwrap();

        assert_eq!(project.name, "demo");
        assert!(project.is_root());
        assert_eq!(project.children.len(), 1);
        assert_eq!(project.children[0].parent.as_deref(), Some(":"));
        assert_eq!(project.children[0].tasks[0].path, ":app:build");

        let seen = engine.await.unwrap();
        assert_eq!(seen[1]["method"], "model/fetch");
        assert_eq!(seen[1]["params"]["arguments"], json!(["--offline"]));
    }

    #[tokio::test]
    async fn model_fetch_error_is_remote() {
        let (mut connection, _engine) = connect().await;

        let err = connection
            .fetch_project(&["--broken-settings".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Remote { code: -32000, .. }));
        assert!(!err.is_transport());
    }
}

// ============================================================
// Builds
// ============================================================

mod builds {
    use super::*;

    #[tokio::test]
    async fn streams_output_and_completes() {
        let (mut connection, engine) = connect().await;
        let mut out = Vec::new();

        let outcome = connection
            .run_build(&build(&["clean", "build"]), &mut out)
            .await
            .unwrap();
        connection.close().await.unwrap();

        assert_eq!(outcome, InvocationOutcome::Completed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "> Task :clean\n> Task :build\nBUILD DONE\n"
        );

        let seen = engine.await.unwrap();
        let request = &seen[1];
        assert_eq!(request["method"], "build/run");
        assert_eq!(request["params"]["tasks"], json!(["clean", "build"]));
        assert_eq!(request["params"]["arguments"], json!(["--offline"]));
        assert_eq!(request["params"]["color_output"], json!(true));
    }

    #[tokio::test]
    async fn writes_output_before_build_finishes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (mut connection, _engine) = connect_with(Some(rx)).await;
        let mut sink = SignallingSink {
            written: Vec::new(),
            signal: tx,
        };

        // The engine holds back its final response until the sink has seen output.
        let outcome = tokio::time::timeout(TIMEOUT, connection.run_build(&build(&["build"]), &mut sink))
            .await
            .expect("output was buffered until the build finished")
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            String::from_utf8(sink.written).unwrap(),
            "> Task :build\nBUILD DONE\n"
        );
    }

    #[tokio::test]
    async fn build_failure_keeps_connection_usable() {
        let (mut connection, engine) = connect().await;
        let mut out = Vec::new();

        let failed = connection
            .run_build(&build(&["broken"]), &mut out)
            .await
            .unwrap();
        let next = connection
            .run_build(&build(&["build"]), &mut out)
            .await
            .unwrap();
        connection.close().await.unwrap();

        assert_eq!(
            failed,
            InvocationOutcome::Failed(BuildFailure::new(
                "Build failed\nExecution failed for task ':broken'."
            ))
        );
        assert_eq!(next, InvocationOutcome::Completed);

        let ids: Vec<u64> = engine
            .await
            .unwrap()
            .iter()
            .map(|request| request["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn rejected_request_fails_without_breaking_connection() {
        let (mut connection, _engine) = connect().await;
        let mut out = Vec::new();

        let rejected = connection
            .run_build(&build(&["rejected"]), &mut out)
            .await
            .unwrap();
        let next = connection
            .run_build(&build(&["build"]), &mut out)
            .await
            .unwrap();
        connection.close().await.unwrap();

        assert_eq!(
            rejected,
            InvocationOutcome::Failed(BuildFailure::new("Unknown command-line option '--nope'"))
        );
        assert!(next.is_success());
    }

    #[tokio::test]
    async fn engine_hang_up_is_a_transport_error() {
        let (mut connection, _engine) = connect().await;
        let mut out = Vec::new();

        let err = connection
            .run_build(&build(&["hang-up"]), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Disconnected));
        assert!(err.is_transport());
        assert_eq!(String::from_utf8(out).unwrap(), "> Task :hang-up\n");
    }

    #[tokio::test]
    async fn malformed_line_is_a_transport_error() {
        let (mut connection, _engine) = connect().await;
        let mut out = Vec::new();

        let err = connection
            .run_build(&build(&["garbage"]), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Protocol(_)));
        assert!(err.is_transport());
    }
}

// ============================================================
// Shutdown and connect failures
// ============================================================

mod shutdown {
    use super::*;

    #[tokio::test]
    async fn close_sends_shutdown_last() {
        let (mut connection, engine) = connect().await;
        let mut out = Vec::new();
        connection.run_build(&build(&[]), &mut out).await.unwrap();

        connection.close().await.expect("close failed");

        let seen = engine.await.unwrap();
        let methods: Vec<&str> = seen
            .iter()
            .map(|request| request["method"].as_str().unwrap())
            .collect();
        assert_eq!(methods, ["initialize", "build/run", "shutdown"]);
        assert!(seen[2].get("params").is_none());
    }

    #[tokio::test]
    async fn connect_without_build_fails() {
        let dir = tempfile::tempdir().unwrap();

        let result =
            EngineConnection::connect(&["gradle-engine".to_string()], dir.path(), None).await;

        assert!(matches!(result, Err(EngineError::NoBuildRoot(_))));
    }

    #[tokio::test]
    async fn connect_with_missing_engine_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.gradle.kts"), "").unwrap();

        let result = EngineConnection::connect(
            &["definitely-not-an-installed-engine-1b7f".to_string()],
            dir.path(),
            None,
        )
        .await;

        assert!(matches!(result, Err(EngineError::EngineNotFound { .. })));
    }

    #[tokio::test]
    async fn connect_with_empty_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();

        let result = EngineConnection::connect(&[], dir.path(), None).await;

        assert!(matches!(result, Err(EngineError::NoEngineCommand)));
    }
}
