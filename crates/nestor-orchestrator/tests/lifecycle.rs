//! End-to-end job lifecycle through `NestorClient` against in-memory job servers.

use std::sync::Arc;
use std::time::Duration;

use nestor_jobserver::memory::{InMemoryConnector, JobScript};
use nestor_orchestrator::{ComputeResource, JobStatus, NestorClient, Provider, ResourceSelector};
use nestor_program::NestedProgram;
use nestor_utils::error::{JobError, NestorError, ProviderError, SubmissionError};
use nestor_utils::exit_codes::ExitCode;
use serde_json::json;

const POLL: Duration = Duration::from_millis(1);
const WAIT: Duration = Duration::from_secs(5);

fn docker() -> ComputeResource {
    ComputeResource::new("docker", "localhost", 8265)
}

fn client_with_docker() -> (Arc<InMemoryConnector>, NestorClient) {
    let connector = Arc::new(InMemoryConnector::new());
    connector
        .server_for(&docker())
        .set_script("simple_job", JobScript::succeeds("Running job\n42\n"));

    let mut client = NestorClient::with_connector(connector.clone());
    client.register(Provider::new("docker", vec![docker()]).unwrap());
    client.set_provider("docker").unwrap();
    (connector, client)
}

fn simple_job() -> NestedProgram {
    NestedProgram::builder("simple_job", "job.py")
        .working_dir("/srv/resources")
        .argument("json", &json!({"one": 1, "two": 2}))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_simple_job_succeeds_with_output() {
    let (connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    assert_eq!(job.last_known_status(), JobStatus::Pending);

    let status = job.wait_for_terminal(POLL, WAIT).await.unwrap();
    assert_eq!(status, JobStatus::Succeeded);
    assert!(job.logs().await.unwrap().contains("42"));

    let sent = &connector.server_for(&docker()).submissions()[0];
    assert_eq!(sent.encoded_arguments, r#"{"json":{"one":1,"two":2}}"#);
}

#[tokio::test]
async fn test_sequential_runs_get_distinct_ids() {
    let (_connector, client) = client_with_docker();

    let first = client.run(&simple_job()).await.unwrap();
    let second = client.run(&simple_job()).await.unwrap();
    assert_ne!(first.job_id(), second.job_id());

    for job in [&first, &second] {
        let status = job.wait_for_terminal(POLL, WAIT).await.unwrap();
        assert!(status.is_terminal());
    }
}

#[tokio::test]
async fn test_job_found_by_id_matches_original() {
    let (_connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    job.wait_for_terminal(POLL, WAIT).await.unwrap();

    let found = client.get_job_by_id(job.job_id()).await.unwrap();
    assert_eq!(found.job_id(), job.job_id());
    assert_eq!(found.resource(), job.resource());
    assert_eq!(found.status().await.unwrap(), job.status().await.unwrap());
    assert_eq!(found.logs().await.unwrap(), job.logs().await.unwrap());
}

#[tokio::test]
async fn test_stop_after_completion_is_refused() {
    let (_connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    let status = job.wait_for_terminal(POLL, WAIT).await.unwrap();

    assert!(!job.stop().await.unwrap());
    assert_eq!(job.status().await.unwrap(), status);
}

#[tokio::test]
async fn test_stop_running_job() {
    let (connector, client) = client_with_docker();
    connector
        .server_for(&docker())
        .set_script("long_job", JobScript::runs_forever());
    let program = NestedProgram::builder("long_job", "loop.py").build().unwrap();

    let job = client.run(&program).await.unwrap();
    assert!(job.stop().await.unwrap());
    assert_eq!(
        job.wait_for_terminal(POLL, WAIT).await.unwrap(),
        JobStatus::Stopped
    );
}

#[tokio::test]
async fn test_terminal_status_never_changes() {
    let (connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    let status = job.wait_for_terminal(POLL, WAIT).await.unwrap();

    connector
        .server_for(&docker())
        .report_status(job.job_id(), JobStatus::Failed);
    for _ in 0..3 {
        assert_eq!(job.status().await.unwrap(), status);
    }
}

#[tokio::test]
async fn test_handles_from_one_client_agree_on_terminal_status() {
    let (connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    let status = job.wait_for_terminal(POLL, WAIT).await.unwrap();
    connector
        .server_for(&docker())
        .report_status(job.job_id(), JobStatus::Failed);

    let found = client.get_job_by_id(job.job_id()).await.unwrap();
    assert_eq!(found.last_known_status(), status);
    assert_eq!(found.status().await.unwrap(), status);
    assert_eq!(found.info().await.unwrap().status, status);

    let job_id = job.job_id().to_string();
    drop(job);
    drop(found);
    let fresh = client.get_job_by_id(&job_id).await.unwrap();
    assert_eq!(fresh.last_known_status(), JobStatus::Failed);
}

#[tokio::test]
async fn test_unrecognised_status_is_protocol_error_for_every_handle() {
    let (connector, client) = client_with_docker();

    let job = client.run(&simple_job()).await.unwrap();
    connector
        .server_for(&docker())
        .report_unrecognised(job.job_id(), "EXPLODED");

    let from_handle = job.status().await.unwrap_err();
    match &from_handle {
        JobError::Protocol { job_id, reason } => {
            assert_eq!(job_id, job.job_id());
            assert!(reason.contains("EXPLODED"));
        }
        other => panic!("expected JobError::Protocol, got {other:?}"),
    }

    match client.get_job_by_id(job.job_id()).await.unwrap_err() {
        NestorError::Job(from_lookup) => assert_eq!(from_lookup, from_handle),
        other => panic!("expected a job error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_without_active_provider() {
    let connector = Arc::new(InMemoryConnector::new());
    let mut client = NestorClient::with_connector(connector.clone());
    client.register(Provider::new("docker", vec![docker()]).unwrap());

    let err = client.run(&simple_job()).await.unwrap_err();
    assert!(matches!(
        err,
        NestorError::Provider(ProviderError::NoActiveProvider)
    ));
    assert_eq!(err.to_exit_code(), ExitCode::CONFIG);
    assert!(connector.server_for(&docker()).submissions().is_empty());
}

#[tokio::test]
async fn test_unknown_job_id() {
    let (_connector, client) = client_with_docker();

    let err = client.get_job_by_id("raysubmit_9999").await.unwrap_err();
    match &err {
        NestorError::Job(JobError::NotFound { job_id, resource }) => {
            assert_eq!(job_id, "raysubmit_9999");
            assert_eq!(resource, "docker");
        }
        other => panic!("expected JobError::NotFound, got {other:?}"),
    }
    assert_eq!(err.to_exit_code(), ExitCode::JOB_NOT_FOUND);
}

#[tokio::test]
async fn test_failed_submission_leaves_no_job() {
    let (connector, client) = client_with_docker();
    connector.server_for(&docker()).fail_next_submissions(1);

    let err = client.run(&simple_job()).await.unwrap_err();
    assert!(matches!(
        err,
        NestorError::Submission(SubmissionError::Rejected { .. })
    ));
    assert_eq!(err.to_exit_code(), ExitCode::SUBMISSION_FAILED);
    assert!(connector.server_for(&docker()).submissions().is_empty());
}

#[tokio::test]
async fn test_round_robin_spreads_jobs() {
    let connector = Arc::new(InMemoryConnector::new());
    let nodes = vec![
        ComputeResource::new("node-a", "10.0.0.1", 8265),
        ComputeResource::new("node-b", "10.0.0.2", 8265),
    ];
    let mut client = NestorClient::with_connector(connector.clone());
    client.register(
        Provider::new("cluster", nodes.clone())
            .unwrap()
            .with_selector(ResourceSelector::round_robin()),
    );
    client.set_provider("cluster").unwrap();

    let mut used = Vec::new();
    for _ in 0..4 {
        used.push(client.run(&simple_job()).await.unwrap().resource().name.clone());
    }
    assert_eq!(used, vec!["node-a", "node-b", "node-a", "node-b"]);
    for node in &nodes {
        assert_eq!(connector.server_for(node).submissions().len(), 2);
    }

    let last = client.run(&simple_job()).await.unwrap();
    let found = client.get_job_by_id(last.job_id()).await.unwrap();
    assert_eq!(found.resource().name, "node-a");
}

#[tokio::test]
async fn test_run_on_named_resource() {
    let (connector, mut client) = client_with_docker();
    let gpu = ComputeResource::new("gpu", "10.0.0.9", 8265);
    client.register(Provider::new("docker", vec![docker(), gpu.clone()]).unwrap());

    let job = client.run_on(&simple_job(), "gpu").await.unwrap();
    assert_eq!(job.resource(), &gpu);
    assert_eq!(connector.server_for(&gpu).submissions().len(), 1);

    assert!(matches!(
        client.run_on(&simple_job(), "tpu").await,
        Err(NestorError::Provider(ProviderError::UnknownResource { .. }))
    ));
}
