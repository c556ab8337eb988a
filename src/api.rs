//! HTTP surface for Summery AI.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload` – Fetch a document by locator (form field `file_url`), then chunk, embed,
//!   and index it. Returns the upload session id used to scope later questions.
//! - `POST /ingest` – Same as `/upload` for a PDF sent directly (multipart field `file`).
//! - `POST /extract` – Return the text of an uploaded PDF (multipart field `file`).
//! - `POST /summarize` – Summarize a PDF (`file`) or raw text (`text_content`), optionally
//!   narrated (`audio` = `none` | `best_effort` | `required`). Audio is returned as base64.
//! - `POST /flashcards` – Generate question/answer cards from a PDF (`file`) or text (`text`).
//! - `POST /chat` – Answer a question (`{"message", "sessionId", "fileName"}`) from indexed
//!   chunks.
//! - `GET /metrics` – Observe service counters.
//!
//! Request bodies may be as large as the configured document limit plus
//! [`MULTIPART_OVERHEAD_BYTES`]. Errors are returned as `{"error": message}` with a status
//! derived from the failure kind.

use crate::extraction::ExtractionError;
use crate::processing::{
    AskError, AskRequest, AudioMode, Flashcard, FlashcardError, IngestionError, IngestionOutcome,
    PreparationError, ProcessingApi, StudyInput, SummarizeError, SummaryOptions,
    flashcards::DEFAULT_FLASHCARD_COUNT,
};
use crate::storage::StorageError;
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Headroom above the document limit for multipart boundaries, headers, and text fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the HTTP router exposing the processing API surface.
///
/// `max_document_bytes` sizes the request body limit so uploads the extractor accepts are
/// never cut off by the transport.
pub fn create_router<S>(service: Arc<S>, max_document_bytes: usize) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/ingest", post(ingest_document::<S>))
        .route("/extract", post(extract_text::<S>))
        .route("/summarize", post(summarize::<S>))
        .route("/flashcards", post(flashcards::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(
            max_document_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .with_state(service)
}

/// Form body for `POST /upload`.
#[derive(Deserialize)]
struct UploadForm {
    #[serde(default)]
    file_url: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    #[serde(rename = "sessionId")]
    session_id: String,
    file_name: String,
    chunks_indexed: usize,
    chunk_size: usize,
}

/// Fetch a document by locator and index it.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Form(form): Form<UploadForm>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: ProcessingApi,
{
    let locator = match form.file_url {
        None => return Err(AppError::bad_request("No file URL provided")),
        Some(url) if url.trim().is_empty() => {
            return Err(AppError::bad_request("Empty file URL provided"));
        }
        Some(url) => url,
    };

    let outcome = service.ingest_locator(locator.trim()).await?;
    Ok(Json(UploadResponse::from_outcome(outcome)))
}

impl UploadResponse {
    fn from_outcome(outcome: IngestionOutcome) -> Self {
        tracing::info!(
            session_id = %outcome.session_id,
            file_name = %outcome.file_name,
            chunks = outcome.records.len(),
            "Upload indexed"
        );
        Self {
            message: "File processed and uploaded successfully",
            chunks_indexed: outcome.records.len(),
            session_id: outcome.session_id,
            file_name: outcome.file_name,
            chunk_size: outcome.chunk_size,
        }
    }
}

/// Index a PDF sent in the request body.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: ProcessingApi,
{
    let input = MultipartInput::read(multipart).await?;
    let Some(document) = input.file.filter(|bytes| !bytes.is_empty()) else {
        return Err(AppError::bad_request("No file provided"));
    };
    let file_name = input
        .file_name
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    let outcome = service.ingest_document(document, &file_name).await?;
    Ok(Json(UploadResponse::from_outcome(outcome)))
}

const DEFAULT_UPLOAD_NAME: &str = "document.pdf";

/// Multipart fields collected from a request: the uploaded file plus plain text fields.
#[derive(Default)]
struct MultipartInput {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    fields: HashMap<String, String>,
}

impl MultipartInput {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut input = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "file" {
                input.file_name = field.file_name().and_then(base_name);
                input.file = Some(field.bytes().await?.to_vec());
            } else {
                input.fields.insert(name, field.text().await?);
            }
        }
        Ok(input)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn into_study_input(mut self, text_field: &str) -> StudyInput {
        StudyInput {
            document: self.file.take(),
            text: self.fields.remove(text_field),
        }
    }
}

/// Last path segment of a client-supplied file name.
fn base_name(raw: &str) -> Option<String> {
    raw.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

/// Return the text of an uploaded PDF.
async fn extract_text<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: ProcessingApi,
{
    let input = MultipartInput::read(multipart).await?;
    let Some(document) = input.file else {
        return Err(AppError::from(PreparationError::MissingInput));
    };
    let extracted_text = service.extract_text(&document)?;
    Ok(Json(json!({ "extracted_text": extracted_text })))
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_error: Option<String>,
}

/// Summarize a PDF or raw text, optionally with narration.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: ProcessingApi,
{
    let input = MultipartInput::read(multipart).await?;
    let audio = match input.field("audio") {
        None => AudioMode::default(),
        Some(raw) => raw.parse::<AudioMode>().map_err(|_| {
            AppError::bad_request(format!(
                "Invalid audio mode '{raw}' (expected none, best_effort, or required)"
            ))
        })?,
    };
    let options = SummaryOptions {
        audio,
        ..Default::default()
    };

    let result = service
        .summarize(input.into_study_input("text_content"), options)
        .await?;
    Ok(Json(SummarizeResponse {
        summary: result.summary,
        audio: result.audio.map(|bytes| BASE64.encode(bytes)),
        audio_error: result.audio_error,
    }))
}

#[derive(Serialize)]
struct FlashcardsResponse {
    flashcards: Vec<Flashcard>,
}

/// Generate flashcards from a PDF or raw text.
async fn flashcards<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<FlashcardsResponse>, AppError>
where
    S: ProcessingApi,
{
    let input = MultipartInput::read(multipart).await?;
    let count = match input.field("count") {
        None => DEFAULT_FLASHCARD_COUNT,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| AppError::bad_request(format!("Invalid flashcard count '{raw}'")))?,
    };

    let flashcards = service
        .flashcards(input.into_study_input("text"), count)
        .await?;
    Ok(Json(FlashcardsResponse { flashcards }))
}

/// Body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
    #[serde(default, rename = "fileName")]
    file_name: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct ChatResponse {
    message: String,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    sources: Vec<crate::processing::AnswerSource>,
}

/// Answer a question from the chunks indexed for a session.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: ProcessingApi,
{
    let answer = service
        .ask(AskRequest {
            question: request.message,
            session_id: request.session_id,
            file_name: request.file_name,
            top_k: request.top_k,
        })
        .await?;
    Ok(Json(ChatResponse {
        message: answer.message,
        session_id: answer.session_id,
        sources: answer.sources,
    }))
}

/// Return the current service counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// Error rendered as `{"error": message}` with a matching status code.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "Request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn extraction_status(error: &ExtractionError) -> StatusCode {
    match error {
        ExtractionError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ExtractionError::Empty => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn storage_status(error: &StorageError) -> StatusCode {
    match error {
        StorageError::InvalidLocator { .. }
        | StorageError::LocalDisabled
        | StorageError::HostNotAllowed(_) => StatusCode::BAD_REQUEST,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        StorageError::Fetch(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), format!("Invalid multipart body: {}", error.body_text()))
    }
}

impl From<PreparationError> for AppError {
    fn from(error: PreparationError) -> Self {
        let status = match &error {
            PreparationError::MissingInput => StatusCode::BAD_REQUEST,
            PreparationError::Extraction(inner) => extraction_status(inner),
            PreparationError::InputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        Self::new(status, error.to_string())
    }
}

impl From<IngestionError> for AppError {
    fn from(error: IngestionError) -> Self {
        let status = match &error {
            IngestionError::Storage(inner) => storage_status(inner),
            IngestionError::Extraction(inner) => extraction_status(inner),
            IngestionError::Indexing { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, error.to_string())
    }
}

impl From<SummarizeError> for AppError {
    fn from(error: SummarizeError) -> Self {
        match error {
            SummarizeError::Input(inner) => inner.into(),
            other => Self::new(StatusCode::BAD_GATEWAY, other.to_string()),
        }
    }
}

impl From<FlashcardError> for AppError {
    fn from(error: FlashcardError) -> Self {
        match error {
            FlashcardError::Input(inner) => inner.into(),
            other => Self::new(StatusCode::BAD_GATEWAY, other.to_string()),
        }
    }
}

impl From<AskError> for AppError {
    fn from(error: AskError) -> Self {
        let status = match &error {
            AskError::MissingQuestion => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        Answer, AnswerSource, AskError, AskRequest, AudioMode, Flashcard, FlashcardError,
        IngestionError, IngestionOutcome, IngestionRecord, InputSource, PreparationError,
        ProcessingApi, StudyInput, SummarizeError, SummaryOptions, SummaryResult,
    };
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const BOUNDARY: &str = "summery-test-boundary";
    const TEST_DOCUMENT_LIMIT: usize = 8 * 1024 * 1024;

    #[derive(Default)]
    struct StubProcessingService {
        locators: Mutex<Vec<String>>,
        summary_options: Mutex<Vec<SummaryOptions>>,
        flashcard_counts: Mutex<Vec<usize>>,
        questions: Mutex<Vec<AskRequest>>,
        documents: Mutex<Vec<(String, usize)>>,
    }

    fn require_input(input: &StudyInput) -> Result<(), PreparationError> {
        let has_document = input.document.as_ref().is_some_and(|bytes| !bytes.is_empty());
        let has_text = input.text.as_ref().is_some_and(|text| !text.trim().is_empty());
        if has_document || has_text {
            Ok(())
        } else {
            Err(PreparationError::MissingInput)
        }
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn ingest_locator(&self, locator: &str) -> Result<IngestionOutcome, IngestionError> {
            if locator.contains("..") {
                return Err(StorageError::InvalidLocator {
                    locator: locator.into(),
                    reason: "path escapes the storage root".into(),
                }
                .into());
            }
            self.locators.lock().expect("locators").push(locator.into());
            Ok(IngestionOutcome {
                session_id: "session-1".into(),
                file_name: "notes.pdf".into(),
                chunk_size: 1000,
                records: vec![IngestionRecord {
                    session_id: "session-1".into(),
                    file_name: "notes.pdf".into(),
                    chunk_ordinal: 0,
                    text: "Cells divide.\n".into(),
                }],
            })
        }

        async fn ingest_document(
            &self,
            document: Vec<u8>,
            file_name: &str,
        ) -> Result<IngestionOutcome, IngestionError> {
            self.documents
                .lock()
                .expect("documents")
                .push((file_name.into(), document.len()));
            Ok(IngestionOutcome {
                session_id: "session-2".into(),
                file_name: file_name.into(),
                chunk_size: 1000,
                records: Vec::new(),
            })
        }

        fn extract_text(&self, document: &[u8]) -> Result<String, PreparationError> {
            Ok(String::from_utf8_lossy(document).into_owned())
        }

        async fn summarize(
            &self,
            input: StudyInput,
            options: SummaryOptions,
        ) -> Result<SummaryResult, SummarizeError> {
            require_input(&input)?;
            self.summary_options
                .lock()
                .expect("options")
                .push(options);
            let audio = (options.audio != AudioMode::Skip).then(|| b"ID3".to_vec());
            Ok(SummaryResult {
                summary: "Short summary.".into(),
                audio,
                audio_error: None,
                input_tokens: 3,
                source: InputSource::Text,
            })
        }

        async fn flashcards(
            &self,
            input: StudyInput,
            count: usize,
        ) -> Result<Vec<Flashcard>, FlashcardError> {
            require_input(&input)?;
            self.flashcard_counts.lock().expect("counts").push(count);
            if input.text.as_deref() == Some("huge") {
                return Err(PreparationError::InputTooLarge {
                    measured: 2_000_000,
                    limit: 1_048_576,
                }
                .into());
            }
            Ok((0..count)
                .map(|i| Flashcard {
                    front: format!("Q{i}"),
                    back: format!("A{i}"),
                })
                .collect())
        }

        async fn ask(&self, request: AskRequest) -> Result<Answer, AskError> {
            if request.question.trim().is_empty() {
                return Err(AskError::MissingQuestion);
            }
            self.questions.lock().expect("questions").push(request.clone());
            Ok(Answer {
                message: "ATP stores energy.".into(),
                session_id: request.session_id,
                sources: vec![AnswerSource {
                    record_id: Some("session-1_notes.pdf_chunk_0".into()),
                    score: 0.9,
                }],
            })
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 2,
                chunks_indexed: 7,
                last_chunk_size: Some(1000),
                ..Default::default()
            }
        }
    }

    fn multipart_body(parts: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            if *name == "file" {
                body.push_str(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\n\
                     Content-Type: application/pdf\r\n\r\n",
                );
            } else {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                ));
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(uri: &str, parts: &[(&str, &str)]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("request")
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn upload_requires_file_url() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);

        let missing = app.clone().oneshot(form_request("")).await.expect("response");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(missing).await["error"], "No file URL provided");

        let empty = app
            .oneshot(form_request("file_url="))
            .await
            .expect("response");
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(empty).await["error"], "Empty file URL provided");
    }

    #[tokio::test]
    async fn upload_returns_session_id() {
        let service = Arc::new(StubProcessingService::default());
        let app = create_router(service.clone(), TEST_DOCUMENT_LIMIT);

        let response = app
            .oneshot(form_request(
                "file_url=https%3A%2F%2Fbucket.s3.amazonaws.com%2Fnotes.pdf",
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["sessionId"], "session-1");
        assert_eq!(json["chunks_indexed"], 1);
        assert_eq!(
            service.locators.lock().expect("locators")[0],
            "https://bucket.s3.amazonaws.com/notes.pdf"
        );
    }

    #[tokio::test]
    async fn upload_maps_invalid_locator_to_bad_request() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(form_request("file_url=..%2Fsecret.pdf"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extract_returns_text() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(multipart_request("/extract", &[("file", "page text")]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["extracted_text"], "page text");
    }

    #[tokio::test]
    async fn extract_accepts_documents_above_the_transport_default() {
        let document = format!("%PDF-1.5\n{}", "A".repeat(3 * 1024 * 1024));
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(multipart_request("/extract", &[("file", document.as_str())]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(
            json["extracted_text"].as_str().map(str::len),
            Some(document.len())
        );
    }

    #[tokio::test]
    async fn bodies_above_the_document_limit_are_rejected() {
        let document = format!("%PDF-1.5\n{}", "A".repeat(3 * 1024 * 1024));
        let app = create_router(Arc::new(StubProcessingService::default()), 1024);
        let response = app
            .oneshot(multipart_request("/extract", &[("file", document.as_str())]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn ingest_indexes_uploaded_file_under_its_name() {
        let service = Arc::new(StubProcessingService::default());
        let app = create_router(service.clone(), TEST_DOCUMENT_LIMIT);

        let response = app
            .clone()
            .oneshot(multipart_request("/ingest", &[("file", "%PDF-1.5 body")]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["sessionId"], "session-2");
        assert_eq!(json["file_name"], "notes.pdf");
        assert_eq!(
            *service.documents.lock().expect("documents"),
            vec![("notes.pdf".to_string(), 13)]
        );

        let missing = app
            .oneshot(multipart_request("/ingest", &[("text", "no file")]))
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(missing).await["error"], "No file provided");
    }

    #[test]
    fn client_file_names_keep_only_the_last_segment() {
        assert_eq!(super::base_name("../../etc/notes.pdf").as_deref(), Some("notes.pdf"));
        assert_eq!(super::base_name("C:\\docs\\bio.pdf").as_deref(), Some("bio.pdf"));
        assert_eq!(super::base_name(".."), None);
        assert_eq!(super::base_name(""), None);
    }

    #[test]
    fn disallowed_document_host_is_a_client_error() {
        assert_eq!(
            super::storage_status(&StorageError::HostNotAllowed("10.0.0.5".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn extract_without_file_is_bad_request() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(multipart_request("/extract", &[("text", "ignored")]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file or text provided");
    }

    #[tokio::test]
    async fn summarize_returns_base64_audio() {
        let service = Arc::new(StubProcessingService::default());
        let app = create_router(service.clone(), TEST_DOCUMENT_LIMIT);

        let response = app
            .oneshot(multipart_request(
                "/summarize",
                &[("text_content", "Cells divide.")],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["summary"], "Short summary.");
        assert_eq!(json["audio"], "SUQz");
        assert!(json.get("audio_error").is_none());
        assert_eq!(
            service.summary_options.lock().expect("options")[0].audio,
            AudioMode::BestEffort
        );
    }

    #[tokio::test]
    async fn summarize_honors_audio_mode_and_rejects_unknown_values() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);

        let skipped = app
            .clone()
            .oneshot(multipart_request(
                "/summarize",
                &[("text_content", "Cells divide."), ("audio", "none")],
            ))
            .await
            .expect("response");
        assert_eq!(skipped.status(), StatusCode::OK);
        assert_eq!(json_body(skipped).await["audio"], Value::Null);

        let invalid = app
            .oneshot(multipart_request(
                "/summarize",
                &[("text_content", "Cells divide."), ("audio", "loud")],
            ))
            .await
            .expect("response");
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summarize_without_input_is_bad_request() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(multipart_request("/summarize", &[("text_content", "")]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file or text provided");
    }

    #[tokio::test]
    async fn flashcards_default_count_and_oversized_input() {
        let service = Arc::new(StubProcessingService::default());
        let app = create_router(service.clone(), TEST_DOCUMENT_LIMIT);

        let response = app
            .clone()
            .oneshot(multipart_request("/flashcards", &[("text", "Enzymes.")]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["flashcards"].as_array().map(Vec::len), Some(10));
        assert_eq!(json["flashcards"][0], json!({"front": "Q0", "back": "A0"}));

        let too_large = app
            .oneshot(multipart_request("/flashcards", &[("text", "huge")]))
            .await
            .expect("response");
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            *service.flashcard_counts.lock().expect("counts"),
            vec![10, 10]
        );
    }

    #[tokio::test]
    async fn chat_round_trips_session_id() {
        let service = Arc::new(StubProcessingService::default());
        let app = create_router(service.clone(), TEST_DOCUMENT_LIMIT);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "message": "What stores energy?",
                            "sessionId": "session-1",
                            "fileName": "notes.pdf"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "ATP stores energy.");
        assert_eq!(json["sessionId"], "session-1");
        let questions = service.questions.lock().expect("questions");
        assert_eq!(questions[0].question, "What stores energy?");
        assert_eq!(questions[0].file_name.as_deref(), Some("notes.pdf"));
        assert_eq!(questions[0].top_k, None);
    }

    #[tokio::test]
    async fn metrics_exposes_counters() {
        let app = create_router(Arc::new(StubProcessingService::default()), TEST_DOCUMENT_LIMIT);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["documents_ingested"], 2);
        assert_eq!(json["chunks_indexed"], 7);
        assert_eq!(json["last_chunk_size"], 1000);
    }
}
