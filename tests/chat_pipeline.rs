use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use docportal::api::create_router;
use docportal::config::Config;
use docportal::embedding::HashEmbeddingClient;
use docportal::llm::{ChatMessage, ChatModel, ChatModelError};
use docportal::service::PortalService;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "pipeline-boundary";
const POLICY_PDF: &[u8] = include_bytes!("fixtures/two_pages.pdf");

/// Answers with the first line of the retrieved context so tests can see what was retrieved.
struct ContextEcho {
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatModel for ContextEcho {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatModelError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let system = &messages[0].content;
        if system.contains("standalone question") {
            return Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default());
        }
        let context = system.rsplit("\n\n").next().unwrap_or_default();
        Ok(context.lines().next().unwrap_or_default().to_string())
    }

    fn model_name(&self) -> &str {
        "context-echo"
    }
}

fn app(root: &std::path::Path) -> (Router, Arc<ContextEcho>) {
    let mut config = Config::with_storage(root.join("data"), root.join("faiss_index"));
    config.retriever_top_k = 1;
    let model = Arc::new(ContextEcho {
        prompts: Mutex::new(Vec::new()),
    });
    let service = PortalService::with_clients(
        config,
        Arc::new(HashEmbeddingClient::new(128)),
        model.clone(),
    )
    .expect("service");
    (create_router(Arc::new(service)), model)
}

fn upload_request(files: &[(&str, &[u8])], fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri("/chat/index")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("request")
}

fn query_request(payload: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat/query")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn multi_document_session_answers_from_its_own_index() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (app, model) = app(temp.path());

    let (status, indexed) = send(
        &app,
        upload_request(
            &[
                ("shipping.txt", "Orders ship within three business days.".as_bytes()),
                ("returns.md", "Returned items are refunded within fourteen days.".as_bytes()),
                ("diagram.png", "not a document".as_bytes()),
            ],
            &[("session_id", "session_pipeline")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{indexed}");
    assert_eq!(indexed["session_id"], "session_pipeline");
    assert_eq!(indexed["indexed_files"], 2);
    assert!(temp.path().join("faiss_index/session_pipeline/index.json").is_file());

    let (status, reply) = send(
        &app,
        query_request(json!({
            "question": "When are returned items refunded?",
            "session_id": "session_pipeline"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["answer"], "Returned items are refunded within fourteen days.");
    assert!(reply["sources"][0]["source"].as_str().unwrap().ends_with(".md"));

    let (_, follow_up) = send(
        &app,
        query_request(json!({
            "question": "How fast do orders ship?",
            "session_id": "session_pipeline"
        })),
    )
    .await;
    assert_eq!(follow_up["answer"], "Orders ship within three business days.");
    // Second turn carries server-side history, so it is rewritten before retrieval.
    assert_eq!(model.prompts.lock().unwrap().len(), 3);

    let (_, metrics) = send(
        &app,
        Request::get("/metrics").body(Body::empty()).expect("request"),
    )
    .await;
    assert_eq!(metrics["documents_ingested"], 2);
    assert_eq!(metrics["questions_answered"], 2);
}

#[tokio::test]
async fn single_document_mode_accepts_only_pdfs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (app, _) = app(temp.path());
    let (status, body) = send(
        &app,
        upload_request(
            &[("notes.txt", "plain text".as_bytes())],
            &[("use_session_dirs", "false")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("notes.txt"));
}

#[tokio::test]
async fn only_unsupported_files_is_bad_request() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (app, _) = app(temp.path());
    let upload = upload_request(&[("sheet.xlsx", "cells".as_bytes())], &[]);
    let (status, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "no valid documents loaded");
}

#[tokio::test]
async fn querying_before_indexing_is_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (app, _) = app(temp.path());
    let (status, body) = send(&app, query_request(json!({ "question": "anything?" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().starts_with("index not found"));
}

#[tokio::test]
async fn single_document_mode_uses_the_shared_index_and_resets_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (app, model) = app(temp.path());
    let index_policy =
        || upload_request(&[("policy.pdf", POLICY_PDF)], &[("use_session_dirs", "false")]);

    let (status, indexed) = send(&app, index_policy()).await;
    assert_eq!(status, StatusCode::OK, "{indexed}");
    assert!(indexed["session_id"].is_null());
    assert_eq!(indexed["indexed_files"], 1);
    assert_eq!(indexed["chunks"], 2);
    assert!(temp.path().join("faiss_index/index.json").is_file());

    let (status, reply) = send(
        &app,
        query_request(json!({ "question": "When are refunds issued?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["answer"], "Refunds are issued within fourteen days.");
    assert_eq!(reply["sources"][0]["page"], 0);

    let (_, follow_up) = send(
        &app,
        query_request(json!({ "question": "How fast do orders ship?" })),
    )
    .await;
    assert_eq!(follow_up["answer"], "Orders ship within three business days.");
    assert_eq!(follow_up["sources"][0]["page"], 1);
    // Answer only, then rewrite and answer.
    assert_eq!(model.prompts.lock().unwrap().len(), 3);

    let (status, _) = send(&app, index_policy()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        query_request(json!({ "question": "When are refunds issued?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Re-indexing cleared the shared history, so no rewrite call.
    assert_eq!(model.prompts.lock().unwrap().len(), 4);
}
