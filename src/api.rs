//! HTTP surface for the document portal.
//!
//! - `GET /health` – liveness check.
//! - `POST /analyze` – multipart `file` (PDF); returns the extracted metadata.
//! - `POST /compare` – multipart `reference` and `actual` (PDFs); returns page-wise rows.
//! - `POST /chat/index` – multipart `files` (repeatable), optional `session_id` and
//!   `use_session_dirs` (default `true`); builds a chat index.
//! - `POST /chat/query` – JSON `{ question, session_id?, history? }`; answers from an index.
//! - `GET /metrics` – pipeline counters.
//!
//! Failures return `{ "detail": "..." }` with 400, 404 or 500 depending on the cause.

use crate::error::{DocumentError, ErrorClass};
use crate::loader::UploadedFile;
use crate::service::{ChatIndexRequest, ChatQuery, PortalApi};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router over a portal implementation.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PortalApi + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_document::<S>))
        .route("/compare", post(compare_documents::<S>))
        .route("/chat/index", post(chat_index::<S>))
        .route("/chat/query", post(chat_query::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

async fn health() -> Json<Value> {
    tracing::info!("Health check passed");
    Json(json!({ "status": "ok", "service": "document-portal" }))
}

/// Multipart fields collected from a request.
#[derive(Default)]
struct Form {
    files: Vec<(String, UploadedFile)>,
    fields: Vec<(String, String)>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|error| invalid(error.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|error| invalid(error.body_text()))?;
                    form.files.push((name, UploadedFile::new(file_name, bytes.to_vec())));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|error| invalid(error.body_text()))?;
                    form.fields.push((name, text));
                }
            }
        }
        Ok(form)
    }

    fn take_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        let position = self
            .files
            .iter()
            .position(|(field, _)| field == name)
            .ok_or_else(|| invalid(format!("missing file field '{name}'")))?;
        Ok(self.files.remove(position).1)
    }

    fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (matching, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Response, AppError>
where
    S: PortalApi,
{
    let mut form = Form::read(multipart).await?;
    let file = form.take_file("file")?;
    let metadata = service.analyze_document(file).await?;
    Ok(Json(metadata).into_response())
}

async fn compare_documents<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Response, AppError>
where
    S: PortalApi,
{
    let mut form = Form::read(multipart).await?;
    let reference = form.take_file("reference")?;
    let actual = form.take_file("actual")?;
    let report = service.compare_documents(reference, actual).await?;
    Ok(Json(report).into_response())
}

async fn chat_index<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Response, AppError>
where
    S: PortalApi,
{
    let mut form = Form::read(multipart).await?;
    let use_session_dirs = match form.field("use_session_dirs") {
        None => true,
        Some(value) => parse_bool(value)
            .ok_or_else(|| invalid(format!("invalid boolean for use_session_dirs: {value}")))?,
    };
    let request = ChatIndexRequest {
        session_id: form.field("session_id").map(str::to_string),
        use_session_dirs,
        files: form.take_files("files"),
    };
    let outcome = service.index_chat(request).await?;
    Ok(Json(outcome).into_response())
}

async fn chat_query<S>(
    State(service): State<Arc<S>>,
    Json(query): Json<ChatQuery>,
) -> Result<Response, AppError>
where
    S: PortalApi,
{
    let reply = service.query_chat(query).await?;
    Ok(Json(reply).into_response())
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: PortalApi,
{
    Json(service.metrics_snapshot()).into_response()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError(DocumentError::InvalidInput(message.into()))
}

struct AppError(DocumentError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.class() {
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = self.0.report();
        if status.is_server_error() {
            tracing::error!(error = %detail, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %detail, "Request rejected");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<DocumentError> for AppError {
    fn from(inner: DocumentError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::analysis::{DocumentMetadata, PageChange, PageCount};
    use crate::error::DocumentError;
    use crate::index::IndexError;
    use crate::loader::UploadedFile;
    use crate::metrics::MetricsSnapshot;
    use crate::retrieval::RetrievalError;
    use crate::service::{
        ChatIndexOutcome, ChatIndexRequest, ChatQuery, ChatReply, ComparisonReport, PortalApi,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docportal-test-boundary";

    #[derive(Default)]
    struct StubPortal {
        index_calls: Mutex<Vec<ChatIndexRequest>>,
        compared: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PortalApi for StubPortal {
        async fn analyze_document(
            &self,
            upload: UploadedFile,
        ) -> Result<DocumentMetadata, DocumentError> {
            Ok(DocumentMetadata {
                summary: vec![format!("{} bytes", upload.bytes.len())],
                title: upload.name,
                author: vec![],
                date_created: "unknown".into(),
                last_modified_date: "unknown".into(),
                publisher: "unknown".into(),
                language: "English".into(),
                page_count: PageCount::Count(1),
                sentiment_tone: "Neutral".into(),
            })
        }

        async fn compare_documents(
            &self,
            reference: UploadedFile,
            actual: UploadedFile,
        ) -> Result<ComparisonReport, DocumentError> {
            self.compared.lock().await.push((reference.name, actual.name));
            Ok(ComparisonReport {
                session_id: "session_cmp".into(),
                rows: vec![PageChange {
                    page: "1".into(),
                    changes: "NO CHANGE".into(),
                }],
            })
        }

        async fn index_chat(
            &self,
            request: ChatIndexRequest,
        ) -> Result<ChatIndexOutcome, DocumentError> {
            let outcome = ChatIndexOutcome {
                session_id: request.session_id.clone().or(Some("session_new".into())),
                indexed_files: request.files.len(),
                chunks: 3,
                skipped_duplicates: 0,
            };
            self.index_calls.lock().await.push(request);
            Ok(outcome)
        }

        async fn query_chat(&self, query: ChatQuery) -> Result<ChatReply, DocumentError> {
            match query.session_id.as_deref() {
                Some("session_missing") => Err(RetrievalError::Index(IndexError::NotFound(
                    PathBuf::from("faiss_index/session_missing"),
                ))
                .into()),
                _ => Ok(ChatReply {
                    answer: format!("echo: {}", query.question),
                    sources: vec![],
                }),
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                questions_answered: 4,
                ..MetricsSnapshot::default()
            }
        }
    }

    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Body {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(parts))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = create_router(Arc::new(StubPortal::default()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_index_collects_repeated_files_and_fields() {
        let service = Arc::new(StubPortal::default());
        let app = create_router(service.clone());

        let response = app
            .oneshot(multipart_request(
                "/chat/index",
                &[
                    ("files", Some("a.txt"), "alpha"),
                    ("files", Some("b.md"), "beta"),
                    ("session_id", None, "session_abc"),
                    ("use_session_dirs", None, "false"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["indexed_files"], 2);
        assert_eq!(json["session_id"], "session_abc");

        let calls = service.index_calls.lock().await;
        assert!(!calls[0].use_session_dirs);
        assert_eq!(calls[0].files[1].name, "b.md");
        assert_eq!(calls[0].files[0].bytes, b"alpha");
    }

    #[tokio::test]
    async fn chat_index_defaults_to_session_dirs() {
        let service = Arc::new(StubPortal::default());
        let app = create_router(service.clone());
        let response = app
            .oneshot(multipart_request("/chat/index", &[("files", Some("a.txt"), "x")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(service.index_calls.lock().await[0].use_session_dirs);
    }

    #[tokio::test]
    async fn compare_requires_both_files() {
        let service = Arc::new(StubPortal::default());
        let app = create_router(service.clone());
        let response = app
            .oneshot(multipart_request(
                "/compare",
                &[("reference", Some("v1.pdf"), "%PDF")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("actual"));
        assert!(service.compared.lock().await.is_empty());
    }

    #[tokio::test]
    async fn compare_returns_rows_and_session() {
        let app = create_router(Arc::new(StubPortal::default()));
        let response = app
            .oneshot(multipart_request(
                "/compare",
                &[
                    ("reference", Some("v1.pdf"), "%PDF"),
                    ("actual", Some("v2.pdf"), "%PDF"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["session_id"], "session_cmp");
        assert_eq!(json["rows"][0]["Changes"], "NO CHANGE");
    }

    #[tokio::test]
    async fn analyze_returns_pascal_case_metadata() {
        let app = create_router(Arc::new(StubPortal::default()));
        let response = app
            .oneshot(multipart_request("/analyze", &[("file", Some("report.pdf"), "%PDF")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["Title"], "report.pdf");
        assert_eq!(json["PageCount"], 1);
    }

    #[tokio::test]
    async fn chat_query_maps_missing_index_to_404() {
        let app = create_router(Arc::new(StubPortal::default()));
        let payload = json!({ "question": "hi", "session_id": "session_missing" });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat/query")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("session_missing"));
    }

    #[tokio::test]
    async fn chat_query_answers_with_history() {
        let app = create_router(Arc::new(StubPortal::default()));
        let payload = json!({
            "question": "and then?",
            "history": [
                { "role": "user", "content": "first" },
                { "role": "assistant", "content": "reply" }
            ]
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat/query")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["answer"], "echo: and then?");
    }

    #[tokio::test]
    async fn metrics_expose_counters() {
        let app = create_router(Arc::new(StubPortal::default()));
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["questions_answered"], 4);
        assert!(json.get("last_chunk_size").is_none());
    }
}
