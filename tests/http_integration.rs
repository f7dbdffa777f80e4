use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
use medsift::{api, config, service::DocumentService};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tower::ServiceExt;

static INIT: OnceCell<()> = OnceCell::const_new();
static MOCK_SERVER: OnceCell<&'static MockServer> = OnceCell::const_new();

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests run in a single process and establish deterministic configuration upfront.
    unsafe { std::env::set_var(key, value) }
}

/// Start the shared mock server, point every external dependency at it, and
/// register the mocks the service touches during startup.
async fn harness() -> &'static MockServer {
    INIT.get_or_init(|| async {
        let mock_server: &'static MockServer = Box::leak(Box::new(MockServer::start_async().await));
        let base_url = mock_server.base_url();

        set_env("UNSTRUCTURED_API_KEY", "unst-test-key");
        set_env("UNSTRUCTURED_API_URL", &base_url);
        set_env("PARTITION_LANGUAGES", "ces");
        set_env("QDRANT_URL", &base_url);
        set_env("QDRANT_COLLECTION_NAME", "patient-docs");
        set_env("OPENAI_API_KEY", "sk-test");
        set_env("OPENAI_BASE_URL", &base_url);
        config::init_config();

        // Startup path: the collection already exists and its indexes apply cleanly.
        mock_server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/patient-docs");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {}
                }));
            })
            .await;
        mock_server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/patient-docs/index");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {}
                }));
            })
            .await;

        MOCK_SERVER.set(mock_server).ok();
    })
    .await;
    MOCK_SERVER.get().expect("mock server initialized")
}

fn embeddings_body(rows: usize) -> Value {
    let data: Vec<Value> = (0..rows)
        .map(|index| {
            json!({
                "embedding": vec![0.1_f32; 1536],
                "index": index
            })
        })
        .collect();
    json!({ "data": data, "model": "text-embedding-3-small" })
}

fn chat_body(content: &str) -> Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

async fn await_hits(mock: &httpmock::Mock<'_>, expected: usize) {
    for _ in 0..200 {
        if mock.hits_async().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("mock never reached {expected} hits");
}

#[tokio::test]
async fn process_file_runs_the_full_pipeline_and_posts_success_callback() {
    let server = harness().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/docs/report.pdf");
            then.status(200).body("%PDF-1.4 fake report");
        })
        .await;
    let partition_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/general/v0/general")
                .header("unstructured-api-key", "unst-test-key");
            then.status(200).json_body(json!([
                {"type": "Header", "text": "Report", "metadata": {}},
                {"type": "PageNumber", "text": "1", "metadata": {}},
                {"type": "NarrativeText", "text": "Patient is stable.", "metadata": {}}
            ]));
        })
        .await;
    // All three partitioned chunks are embedded and stored; page numbers are
    // only dropped from the markdown rendering.
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_contains("Patient is stable.");
            then.status(200).json_body(embeddings_body(3));
        })
        .await;
    let upsert_mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/patient-docs/points")
                .body_contains("\"patient_id\":\"patient-e2e\"");
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.0,
                "result": { "operation_id": 1, "status": "completed" }
            }));
        })
        .await;

    let bundle_content = json!({
        "resourceType": "Bundle",
        "type": "document",
        "timestamp": "2025-06-01T10:00:00Z",
        "coding": [],
        "entry": [
            {
                "resourceType": "Patient",
                "identifier": [],
                "name": [],
                "gender": null,
                "birthDate": null,
                "address": []
            }
        ]
    })
    .to_string();
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("clinical_bundle");
            then.status(200).json_body(chat_body(&bundle_content));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("plain_text");
            then.status(200)
                .json_body(chat_body("{\"text\":\"Patient is stable.\"}"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("simplified_text");
            then.status(200)
                .json_body(chat_body("{\"text\":\"The patient is doing fine.\"}"));
        })
        .await;

    let callback_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/callback-e2e")
                .body_contains("\"status\":\"success\"")
                .body_contains("\"raw_text\":\"Patient is stable.\"")
                .body_contains("\"mortal_readable\":\"Patient is stable.\"")
                .body_contains("\\\"resourceType\\\":\\\"Bundle\\\"");
            then.status(200);
        })
        .await;

    let app = api::create_router(Arc::new(DocumentService::new().await));
    let payload = json!({
        "url": server.url("/docs/report.pdf"),
        "callback_url": server.url("/callback-e2e"),
        "patient_id": "patient-e2e"
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/process-file")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(&body[..], b"\"OK\"");

    await_hits(&callback_mock, 1).await;
    partition_mock.assert_async().await;
    upsert_mock.assert_async().await;
}

#[tokio::test]
async fn suggestions_with_empty_history_still_run_the_rewrite_step() {
    let server = harness().await;

    let rewrite_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("formulate a search query");
            then.status(200).json_body(chat_body("patient overview"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_contains("patient overview");
            then.status(200).json_body(embeddings_body(1));
        })
        .await;
    let search_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/patient-docs/points/query")
                .body_contains("\"value\":\"patient-empty\"");
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.0,
                "result": [
                    {
                        "id": "p1",
                        "score": 0.7,
                        "payload": {
                            "text": "Last visit: blood pressure 120/80.",
                            "category": "NarrativeText",
                            "patient_id": "patient-empty"
                        }
                    }
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("expert at making suggestions");
            then.status(200)
                .json_body(chat_body("Start with a check-in about blood pressure."));
        })
        .await;

    let app = api::create_router(Arc::new(DocumentService::new().await));
    let payload = json!({
        "patient_id": "patient-empty",
        "chat_history": []
    });
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/suggestions")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["answer"], "Start with a check-in about blood pressure.");
    assert_eq!(
        json["sources"][0]["metadata"]["patient_id"],
        "patient-empty"
    );

    assert_eq!(rewrite_mock.hits_async().await, 1);
    assert_eq!(search_mock.hits_async().await, 1);
}
