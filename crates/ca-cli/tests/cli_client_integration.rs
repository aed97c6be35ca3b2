use ca_admin_api::{build_router, AppState};
use ca_core::collections::{COMMUNITIES, DOCUMENTS, POSTS, USERS};
use ca_core::storage::MemoryBlobStore;
use ca_core::store::{DocumentStore, MemoryStore};
use serde_json::{json, Value};
use std::process::{Command, Output};
use std::sync::Arc;
use tokio::net::TcpListener;

struct TestServer {
    api_url: String,
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStore>,
}

async fn start_server() -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let router = build_router(
        AppState::new(store.clone(), blobs.clone()),
        8 * 1024 * 1024,
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        ca_core::server::serve_listener(listener, router)
            .await
            .expect("serve");
    });
    TestServer {
        api_url: format!("http://{addr}"),
        store,
        blobs,
    }
}

async fn run_ca(server: &TestServer, args: &[&str]) -> Output {
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    let api_url = server.api_url.clone();
    tokio::task::spawn_blocking(move || {
        let mut command = Command::new(env!("CARGO_BIN_EXE_ca"));
        command.args(&args);
        command.args(["--api-url", &api_url]);
        command.env("RUST_LOG", "off");
        command.output().expect("run ca command")
    })
    .await
    .expect("join ca command")
}

fn assert_success(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{context} failed: status={:?}, stdout={}, stderr={}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("parse json output")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_health_reports_ok() {
    let server = start_server().await;

    let output = run_ca(&server, &["health"]).await;
    assert_success(&output, "health");
    assert_eq!(
        parse_json_stdout(&output)
            .get("status")
            .and_then(Value::as_str),
        Some("ok")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_records_create_get_and_delete() {
    let server = start_server().await;

    let output = run_ca(
        &server,
        &[
            "records",
            "create",
            "--kind",
            "news",
            "--data",
            r#"{"title":"Road closure","content":"Route 11 closed Friday."}"#,
        ],
    )
    .await;
    assert_success(&output, "records create");
    let created = parse_json_stdout(&output);
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .expect("created id")
        .to_string();

    let output = run_ca(&server, &["records", "get", "--kind", "news", "--id", &id]).await;
    assert_success(&output, "records get");
    assert_eq!(
        parse_json_stdout(&output)
            .get("title")
            .and_then(Value::as_str),
        Some("Road closure")
    );

    let output = run_ca(&server, &["records", "delete", "--kind", "news", "--id", &id]).await;
    assert_success(&output, "records delete");

    let output = run_ca(&server, &["records", "get", "--kind", "news", "--id", &id]).await;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NOT_FOUND"), "stderr: {stderr}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_records_create_reports_missing_fields() {
    let server = start_server().await;

    let output = run_ca(
        &server,
        &["records", "create", "--kind", "users", "--data", r#"{"name":"x"}"#],
    )
    .await;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BAD_REQUEST"), "stderr: {stderr}");
    assert!(stderr.contains("email"), "stderr: {stderr}");
    assert_eq!(server.store.write_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_community_resolve_and_associate() {
    let server = start_server().await;
    server
        .store
        .seed(COMMUNITIES, "c-mem", json!({ "name": "Membertou" }))
        .await;
    server
        .store
        .seed(
            USERS,
            "u1",
            json!({ "email": "a@example.org", "community": "membertou" }),
        )
        .await;
    server
        .store
        .seed(USERS, "u2", json!({ "email": "b@example.org" }))
        .await;
    server
        .store
        .seed(
            POSTS,
            "p1",
            json!({ "title": "t", "content": "c", "community": "MEMBERTOU." }),
        )
        .await;

    let output = run_ca(&server, &["community", "resolve", "--name", "membertou"]).await;
    assert_success(&output, "community resolve");
    let identity = parse_json_stdout(&output);
    assert_eq!(
        identity.get("document_id").and_then(Value::as_str),
        Some("c-mem")
    );
    assert_eq!(
        identity.get("formatted_id").and_then(Value::as_str),
        Some("membertou")
    );

    let output = run_ca(&server, &["community", "associate", "--name", "Membertou"]).await;
    assert_success(&output, "community associate");
    let report = parse_json_stdout(&output);
    assert_eq!(report.get("total_updated").and_then(Value::as_u64), Some(2));
    assert_eq!(
        report.get("unaffiliated_assigned").and_then(Value::as_u64),
        Some(0)
    );

    let output = run_ca(
        &server,
        &[
            "community",
            "associate",
            "--name",
            "Membertou",
            "--include-unaffiliated",
        ],
    )
    .await;
    assert_success(&output, "community associate with unaffiliated");
    let report = parse_json_stdout(&output);
    assert_eq!(report.get("total_updated").and_then(Value::as_u64), Some(1));
    assert_eq!(
        report.get("unaffiliated_assigned").and_then(Value::as_u64),
        Some(1)
    );

    let u2 = server
        .store
        .get(USERS, "u2")
        .await
        .expect("store")
        .expect("u2");
    assert_eq!(u2.str_field("community"), Some("Membertou"));

    let output = run_ca(&server, &["community", "members", "--community", "c-mem"]).await;
    assert_success(&output, "community members");
    assert_eq!(parse_json_stdout(&output).as_array().map(Vec::len), Some(2));

    let output = run_ca(&server, &["community", "associate", "--name", "Nowhere"]).await;
    assert!(!output.status.success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_documents_upload_download_delete() {
    let server = start_server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("newsletter.txt");
    std::fs::write(&source, b"spring newsletter").expect("write source");
    let source_arg = source.display().to_string();

    let output = run_ca(
        &server,
        &[
            "documents",
            "upload",
            "--file",
            &source_arg,
            "--title",
            "Spring newsletter",
            "--community",
            "Membertou",
            "--content-type",
            "text/plain",
            "--field",
            "description=April issue",
        ],
    )
    .await;
    assert_success(&output, "documents upload");
    let created = parse_json_stdout(&output);
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .expect("document id")
        .to_string();
    assert_eq!(
        created.get("description").and_then(Value::as_str),
        Some("April issue")
    );
    let storage_path = created
        .get("storagePath")
        .and_then(Value::as_str)
        .expect("storage path")
        .to_string();
    assert!(server.blobs.contains(&storage_path).await);

    let output = run_ca(&server, &["documents", "list", "--community", "Membertou"]).await;
    assert_success(&output, "documents list");
    assert_eq!(parse_json_stdout(&output).as_array().map(Vec::len), Some(1));

    let target = dir.path().join("downloaded.txt");
    let target_arg = target.display().to_string();
    let output = run_ca(
        &server,
        &["documents", "download", "--id", &id, "--output", &target_arg],
    )
    .await;
    assert_success(&output, "documents download");
    let summary = parse_json_stdout(&output);
    assert_eq!(summary.get("bytes").and_then(Value::as_u64), Some(17));
    assert_eq!(
        std::fs::read(&target).expect("read download"),
        b"spring newsletter"
    );

    let output = run_ca(&server, &["documents", "delete", "--id", &id]).await;
    assert_success(&output, "documents delete");
    assert!(!server.blobs.contains(&storage_path).await);
    assert!(server
        .store
        .get(DOCUMENTS, &id)
        .await
        .expect("store")
        .is_none());
}
