use std::io::Write;
use std::process::{Command, Output};

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROW: &str = "crazy friday,8.0,AA-111-1: Crazy Friday,Project Meetings\n";

fn csv_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

async fn mount_service(server: &MockServer, update_status: u16) {
    Mock::given(method("GET"))
        .and(path("/laborTaskRelationships"))
        .and(query_param("filter", "AA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "AA": [{"taskDesc": "Project Meetings", "taskId": "MTG"}]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "t-1"})))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/tasks/t-1"))
        .respond_with(ResponseTemplate::new(update_status))
        .mount(server)
        .await;
}

/// Runs `timekeeper-import import` with config taken from the environment.
async fn run_import(server: &MockServer, contents: &str) -> Output {
    let file = csv_file(contents);
    let file_path = file.path().to_path_buf();
    let service_url = server.uri();

    tokio::task::spawn_blocking(move || {
        let output = Command::new(env!("CARGO_BIN_EXE_timekeeper-import"))
            .arg("import")
            .arg(&file_path)
            .args(["--actor", "jdoe", "--date", "2017-04-14"])
            .env_remove("TIMEKEEPER_CONFIG")
            .env("TIMEKEEPER_SERVICE_URL", service_url)
            .env("TIMEKEEPER_API_KEY", "test-api-key")
            .env("TIMEKEEPER_SHARED_SECRET", "test-secret")
            .env("TIMEKEEPER_MAX_RETRIES", "1")
            .env("RUST_LOG", "error")
            .output()
            .unwrap();
        drop(file);
        output
    })
    .await
    .unwrap()
}

async fn requests_with(server: &MockServer, verb: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.method.as_str() == verb)
        .count()
}

#[tokio::test]
async fn clean_batch_exits_zero() {
    let server = MockServer::start().await;
    mount_service(&server, 200).await;

    let output = run_import(&server, ROW).await;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(requests_with(&server, "PUT").await, 1);
}

#[tokio::test]
async fn exhausted_entry_exits_non_zero() {
    let server = MockServer::start().await;
    mount_service(&server, 500).await;

    let output = run_import(&server, ROW).await;

    assert_eq!(output.status.code(), Some(1));
    // one retry configured
    assert_eq!(requests_with(&server, "POST").await, 2);
    assert_eq!(requests_with(&server, "PUT").await, 2);
}

#[tokio::test]
async fn exhaustion_exits_non_zero_after_importing_remaining_rows() {
    let server = MockServer::start().await;
    mount_service(&server, 200).await;

    let rows = format!("{}second,1.0,AA-111-1,No Such Task\n{}", ROW, ROW);
    let output = run_import(&server, &rows).await;

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(requests_with(&server, "PUT").await, 2);
}

#[tokio::test]
async fn malformed_file_exits_non_zero() {
    let server = MockServer::start().await;
    mount_service(&server, 200).await;

    let output = run_import(&server, "too,few,fields\n").await;

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(requests_with(&server, "POST").await, 0);
}
