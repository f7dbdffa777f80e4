//! HTTP surface for medsift.
//!
//! Two endpoints:
//!
//! - `POST /process-file` – Accept `{url, callback_url, patient_id}`, answer `201 "OK"`
//!   immediately, and run the download → partition → store → extract pipeline as a
//!   detached background task. The outcome is delivered to `callback_url` as either a
//!   success payload or an error payload; callback delivery itself is best-effort.
//! - `POST /suggestions` – Accept `{patient_id, chat_history}` and synchronously return
//!   a grounded suggestion plus its source chunks.

use crate::service::DocumentApi;
use crate::suggestion::ChatMessage;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Build the HTTP router exposing the document pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/process-file", post(process_file::<S>))
        .route("/suggestions", post(get_suggestions::<S>))
        .with_state(service)
}

/// Request body for the `POST /process-file` endpoint.
#[derive(Debug, Clone, Deserialize)]
struct ProcessFileRequest {
    /// Location of the document to download.
    url: String,
    /// Where to deliver the extraction outcome.
    callback_url: String,
    /// Patient the document belongs to.
    patient_id: String,
}

/// Accept a file-processing request and schedule the pipeline in the background.
///
/// The HTTP caller is never blocked on external-service latency; the request is
/// merely acknowledged. Results (or failures) travel via the callback URL.
async fn process_file<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ProcessFileRequest>,
) -> impl IntoResponse
where
    S: DocumentApi + 'static,
{
    tracing::info!(
        url = %request.url,
        patient_id = %request.patient_id,
        "File processing scheduled"
    );
    tokio::spawn(process_file_and_callback(service, request));
    (StatusCode::CREATED, Json("OK"))
}

/// Request body for the `POST /suggestions` endpoint.
#[derive(Deserialize)]
struct SuggestionsRequest {
    /// Patient whose stored chunks ground the suggestion.
    patient_id: String,
    /// Conversation so far, oldest turn first.
    chat_history: Vec<ChatMessage>,
}

/// Produce a grounded suggestion for the next message in a conversation.
async fn get_suggestions<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SuggestionsRequest>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let suggestion = service
        .suggest(&request.patient_id, &request.chat_history)
        .await?;
    tracing::info!(
        patient_id = %request.patient_id,
        sources = suggestion.sources.len(),
        "Suggestion request completed"
    );
    Ok(Json(suggestion).into_response())
}

/// One-shot background job with exactly two terminal outcomes: a success
/// callback or an error callback. No retries anywhere, including callback
/// delivery.
async fn process_file_and_callback<S>(service: Arc<S>, request: ProcessFileRequest)
where
    S: DocumentApi,
{
    let client = match Client::builder().user_agent("medsift/0.1").build() {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(error = %error, "Failed to construct HTTP client for background job");
            return;
        }
    };

    let payload = match run_process_job(service.as_ref(), &client, &request).await {
        Ok(payload) => {
            tracing::info!(url = %request.url, "Extraction succeeded");
            payload
        }
        Err(error) => {
            tracing::error!(url = %request.url, error = %format!("{error:#}"), "Failed to process file");
            json!({
                "status": "error",
                "error": format!("{error:#}"),
            })
        }
    };

    deliver_callback(&client, &request.callback_url, &payload).await;
}

/// Download the document and run the extraction pipeline.
async fn run_process_job<S>(
    service: &S,
    client: &Client,
    request: &ProcessFileRequest,
) -> anyhow::Result<Value>
where
    S: DocumentApi + ?Sized,
{
    let response = client
        .get(&request.url)
        .send()
        .await
        .with_context(|| format!("failed to download file from {}", request.url))?;
    let status = response.status();
    anyhow::ensure!(
        status.is_success(),
        "download of {} failed with status {status}",
        request.url
    );
    let bytes = response
        .bytes()
        .await
        .context("failed to read downloaded file body")?
        .to_vec();

    let file_name = file_name_from_url(&request.url);
    let outcome = service
        .extract_document(&file_name, bytes, &request.patient_id)
        .await?;

    let bundle_json =
        serde_json::to_string(&outcome.bundle).context("failed to serialize FHIR bundle")?;
    tracing::info!(
        url = %request.url,
        fhir_len = bundle_json.len(),
        plain_text_len = outcome.plain_text.text.len(),
        simplified_len = outcome.simplified.text.len(),
        "Extracted results"
    );

    // Both text fields carry the verbatim plain text; see DESIGN.md.
    Ok(json!({
        "status": "success",
        "hl7_fhir_data": bundle_json,
        "raw_text": outcome.plain_text.text,
        "mortal_readable": outcome.plain_text.text,
    }))
}

/// POST the terminal payload to the callback URL; failures are logged and dropped.
async fn deliver_callback(client: &Client, callback_url: &str, payload: &Value) {
    match client.post(callback_url).json(payload).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::info!(callback_url, "Callback delivered");
        }
        Ok(response) => {
            tracing::error!(
                callback_url,
                status = %response.status(),
                "Callback URL rejected notification"
            );
        }
        Err(error) => {
            tracing::error!(callback_url, error = %error, "Failed to notify callback URL");
        }
    }
}

/// Derive a file name from the last URL path segment.
fn file_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .split(['?', '#'])
                .next()
                .unwrap_or(segment)
                .to_string()
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

struct AppError(crate::suggestion::SuggestError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<crate::suggestion::SuggestError> for AppError {
    fn from(inner: crate::suggestion::SuggestError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkCategory};
    use crate::extraction::{ExtractError, ExtractionOutcome, PlainText, SimplifiedText};
    use crate::fhir::{Bundle, BundleResourceType, BundleType};
    use crate::llm::LlmError;
    use crate::suggestion::{SuggestError, Suggestion};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    fn sample_outcome() -> ExtractionOutcome {
        ExtractionOutcome {
            bundle: Bundle {
                resource_type: BundleResourceType::Bundle,
                bundle_type: BundleType::Document,
                timestamp: "2025-06-01T10:00:00Z".into(),
                coding: vec![],
                entry: vec![],
            },
            plain_text: PlainText {
                text: "Patient is stable.".into(),
            },
            simplified: SimplifiedText {
                text: "The patient is doing fine.".into(),
            },
        }
    }

    struct StubService {
        extract_calls: Mutex<Vec<(String, String)>>,
        fail_extraction: bool,
    }

    impl StubService {
        fn new(fail_extraction: bool) -> Self {
            Self {
                extract_calls: Mutex::new(Vec::new()),
                fail_extraction,
            }
        }
    }

    #[async_trait]
    impl DocumentApi for StubService {
        async fn extract_document(
            &self,
            file_name: &str,
            _bytes: Vec<u8>,
            patient_id: &str,
        ) -> Result<ExtractionOutcome, ExtractError> {
            self.extract_calls
                .lock()
                .unwrap()
                .push((file_name.to_string(), patient_id.to_string()));
            if self.fail_extraction {
                return Err(ExtractError::Llm(LlmError::InvalidResponse(
                    "simulated extraction failure".into(),
                )));
            }
            Ok(sample_outcome())
        }

        async fn suggest(
            &self,
            patient_id: &str,
            history: &[ChatMessage],
        ) -> Result<Suggestion, SuggestError> {
            assert!(history.is_empty() || !patient_id.is_empty());
            let mut source = Chunk::new("Blood pressure 120/80.", ChunkCategory::NarrativeText);
            source.tag_patient(patient_id);
            Ok(Suggestion {
                answer: "Ask about home readings.".into(),
                sources: vec![source],
            })
        }
    }

    async fn await_hits(mock: &httpmock::Mock<'_>, expected: usize) {
        for _ in 0..100 {
            if mock.hits_async().await >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("callback mock never reached {expected} hits");
    }

    #[tokio::test]
    async fn process_file_acknowledges_and_posts_success_callback() {
        let server = MockServer::start_async().await;
        let file_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/files/report.pdf");
                then.status(200).body("%PDF-1.4");
            })
            .await;
        let callback_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/callback")
                    .body_contains("\"status\":\"success\"")
                    .body_contains("\"raw_text\":\"Patient is stable.\"")
                    .body_contains("\"mortal_readable\":\"Patient is stable.\"");
                then.status(200);
            })
            .await;

        let service = Arc::new(StubService::new(false));
        let app = create_router(service.clone());

        let payload = json!({
            "url": server.url("/files/report.pdf"),
            "callback_url": server.url("/callback"),
            "patient_id": "patient-1"
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
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"\"OK\"");

        await_hits(&callback_mock, 1).await;
        file_mock.assert_async().await;
        let calls = service.extract_calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("report.pdf".to_string(), "patient-1".to_string())]
        );
    }

    #[tokio::test]
    async fn unreachable_url_posts_error_callback_and_never_success() {
        let server = MockServer::start_async().await;
        let error_callback = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/callback")
                    .body_contains("\"status\":\"error\"");
                then.status(200);
            })
            .await;
        let success_callback = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/callback")
                    .body_contains("\"status\":\"success\"");
                then.status(200);
            })
            .await;

        let service = Arc::new(StubService::new(false));
        let app = create_router(service.clone());

        let payload = json!({
            "url": server.url("/files/missing.pdf"),
            "callback_url": server.url("/callback"),
            "patient_id": "patient-1"
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

        // The request is acknowledged before the download is even attempted.
        assert_eq!(response.status(), StatusCode::CREATED);

        await_hits(&error_callback, 1).await;
        assert_eq!(success_callback.hits_async().await, 0);
        // The pipeline never ran: the download failed first.
        assert!(service.extract_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_posts_error_callback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/files/report.pdf");
                then.status(200).body("%PDF-1.4");
            })
            .await;
        let error_callback = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/callback")
                    .body_contains("\"status\":\"error\"")
                    .body_contains("simulated extraction failure");
                then.status(200);
            })
            .await;

        let service = Arc::new(StubService::new(true));
        let app = create_router(service);

        let payload = json!({
            "url": server.url("/files/report.pdf"),
            "callback_url": server.url("/callback"),
            "patient_id": "patient-1"
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

        await_hits(&error_callback, 1).await;
    }

    #[tokio::test]
    async fn suggestions_round_trip_returns_answer_and_sources() {
        let service = Arc::new(StubService::new(false));
        let app = create_router(service);

        let payload = json!({
            "patient_id": "patient-1",
            "chat_history": [
                {"is_organisation_message": false, "content": "My pressure felt high."}
            ]
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
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["answer"], "Ask about home readings.");
        assert_eq!(json["sources"][0]["metadata"]["patient_id"], "patient-1");
    }

    #[test]
    fn file_name_falls_back_when_url_has_no_segment() {
        assert_eq!(file_name_from_url("https://host/a/report.pdf"), "report.pdf");
        assert_eq!(
            file_name_from_url("https://host/a/report.pdf?token=1"),
            "report.pdf"
        );
        assert_eq!(file_name_from_url("https://host/"), "document");
    }
}
