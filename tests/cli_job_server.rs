//! The nestor binary against a local fake job API.
//!
//! Submitted jobs finish immediately with SUCCEEDED, except titles starting
//! with `fail` which end FAILED and titles starting with `long` which keep
//! RUNNING. The fake never accepts a stop request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeState {
    jobs: Arc<Mutex<HashMap<String, (String, Value)>>>,
}

async fn submit(State(state): State<FakeState>, Json(body): Json<Value>) -> Json<Value> {
    let mut jobs = state.jobs.lock().unwrap();
    let id = format!("raysubmit_{}", jobs.len() + 1);
    let title = body["metadata"]["title"].as_str().unwrap_or_default();
    let status = if title.starts_with("fail") {
        "FAILED"
    } else if title.starts_with("long") {
        "RUNNING"
    } else {
        "SUCCEEDED"
    };
    jobs.insert(id.clone(), (status.to_string(), body));
    Json(json!({"job_id": null, "submission_id": id}))
}

async fn job_info(
    State(state): State<FakeState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let jobs = state.jobs.lock().unwrap();
    let (status, _) = jobs.get(&job_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({"status": status, "message": "done"})))
}

async fn logs(
    State(state): State<FakeState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let jobs = state.jobs.lock().unwrap();
    let (_, body) = jobs.get(&job_id).ok_or(StatusCode::NOT_FOUND)?;
    let arguments = body["runtime_env"]["env_vars"]["ENV_JOB_ARGUMENTS"].clone();
    Ok(Json(json!({"logs": format!("arguments: {}\n42\n", arguments.as_str().unwrap_or(""))})))
}

async fn stop(
    State(state): State<FakeState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let jobs = state.jobs.lock().unwrap();
    jobs.get(&job_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({"stopped": false})))
}

async fn start_fake_job_api() -> SocketAddr {
    let app = Router::new()
        .route("/api/jobs/", post(submit))
        .route("/api/jobs/{job_id}", get(job_info))
        .route("/api/jobs/{job_id}/logs", get(logs))
        .route("/api/jobs/{job_id}/stop", post(stop))
        .with_state(FakeState::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn write_config(dir: &FsPath, addr: SocketAddr) -> PathBuf {
    let path = dir.join("nestor.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[client]
active_provider = "docker"
poll_interval_ms = 50

[[providers]]
name = "docker"

[[providers.compute_resources]]
name = "docker"
host = "{}"
port_job_server = {}
"#,
            addr.ip(),
            addr.port()
        ),
    )
    .unwrap();
    path
}

/// Run the binary off the async runtime so the fake server keeps serving.
async fn nestor(config: PathBuf, args: &[&str]) -> Output {
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        Command::new(assert_cmd::cargo::cargo_bin!("nestor"))
            .env_remove("NESTOR_HOME")
            .arg("--config")
            .arg(&config)
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_wait_prints_logs_and_succeeds() {
    let addr = start_fake_job_api().await;
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), addr);

    let output = nestor(
        config,
        &[
            "run",
            "--title",
            "simple_job",
            "--entrypoint",
            "job.py",
            "--arg",
            "one=1",
            "--arg",
            "two=2",
            "--wait",
        ],
    )
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let logs = stdout(&output);
    assert!(logs.contains("42"));
    assert!(logs.contains(r#"{"one":1,"two":2}"#), "{logs}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_then_status_and_logs_by_id() {
    let addr = start_fake_job_api().await;
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), addr);

    let output = nestor(
        config.clone(),
        &["run", "--title", "simple_job", "--entrypoint", "job.py"],
    )
    .await;
    assert!(output.status.success());
    let job_id = stdout(&output).trim().to_string();
    assert_eq!(job_id, "raysubmit_1");

    let status = nestor(config.clone(), &["status", &job_id, "--json"]).await;
    assert!(status.status.success());
    let info: Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(info["status"], "SUCCEEDED");
    assert_eq!(info["terminal"], true);
    assert_eq!(info["resource"], "docker");

    let logs = nestor(config.clone(), &["logs", &job_id]).await;
    assert!(stdout(&logs).contains("42"));

    let stop = nestor(config, &["stop", &job_id]).await;
    assert!(stop.status.success());
    assert!(stdout(&stop).contains("already finished"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_job_id_exits_5() {
    let addr = start_fake_job_api().await;
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), addr);

    let output = nestor(config, &["status", "raysubmit_missing"]).await;
    assert_eq!(output.status.code(), Some(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_job_exits_6() {
    let addr = start_fake_job_api().await;
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), addr);

    let output = nestor(
        config,
        &["run", "--title", "failing_job", "--entrypoint", "fail.py", "--wait"],
    )
    .await;
    assert_eq!(output.status.code(), Some(6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_stop_of_running_job() {
    let addr = start_fake_job_api().await;
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), addr);

    let output = nestor(
        config.clone(),
        &["run", "--title", "long_job", "--entrypoint", "loop.py"],
    )
    .await;
    assert!(output.status.success());
    let job_id = stdout(&output).trim().to_string();

    let stop = nestor(config, &["stop", &job_id]).await;
    assert!(stop.status.success());
    let text = stdout(&stop);
    assert!(text.contains("not accepted"), "{text}");
    assert!(!text.contains("already finished"), "{text}");
}
