
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use test_utils::*;
use tower::ServiceExt;

use doc_quiz::clients::{MockClient, MockHandle, OpenAIClient, OpenAIConfig, OpenAIModel};
use doc_quiz::core::{LowLevelClient, QuizGenerator, TOOL_NAME};
use doc_quiz::document::{fetch_document, DocumentSource, HttpDocumentSource};
use doc_quiz::error::{AIError, FetchError, OpenAIError};
use doc_quiz::quota::QuotaPolicy;
use doc_quiz::server::{router, SharedPipeline};
use doc_quiz::store::{MemoryStore, WriteStage};
use doc_quiz::{ErrorKind, Submission, SubmissionPipeline};

const URL: &str = "https://react.dev/reference/react/useLayoutEffect";

fn app(quota: QuotaPolicy) -> (Router, Arc<MockHandle>, MemoryStore) {
    app_with_page(StaticPage::new(PAGE_HTML), quota)
}

fn app_with_page(page: Arc<StaticPage>, quota: QuotaPolicy) -> (Router, Arc<MockHandle>, MemoryStore) {
    let (client, model) = MockClient::new();
    let client: Box<dyn LowLevelClient> = Box::new(client);
    let store = MemoryStore::new();
    let pipeline: SharedPipeline = SubmissionPipeline::new(
        QuizGenerator::new(client),
        page,
        Arc::new(store.clone()),
        quota,
    );
    (router(pipeline), model, store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _, _) = app(QuotaPolicy::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn insecure_url_maps_to_bad_request() {
    let (app, model, store) = app(QuotaPolicy::default());
    let response = app
        .oneshot(post_json("/api/quiz", json!({"documentUrl": "ftp://example.com"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "insecure-url");
    assert_eq!(model.call_count(), 0);
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn missing_url_is_invalid() {
    let (app, _, _) = app(QuotaPolicy::default());
    let response = app.oneshot(post_json("/api/quiz", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["kind"], "invalid-url");
}

#[tokio::test]
async fn quota_maps_to_too_many_requests() {
    let (app, _, _) = app(QuotaPolicy { ceiling: 0, ..QuotaPolicy::default() });
    let response = app.oneshot(post_json("/api/quiz", json!({"url": URL}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"]["kind"], "quota-exceeded");
}

#[tokio::test]
async fn generation_error_hides_provider_detail() {
    let (app, model, _) = app(QuotaPolicy::default());
    model.add_response(doc_quiz::clients::MockResponse::Error("secret upstream detail".into()));

    let response = app.oneshot(post_json("/api/quiz", json!({"url": URL}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let raw = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(raw.contains("generation-error"));
    assert!(!raw.contains("secret upstream detail"));
}

#[tokio::test]
async fn created_set_can_be_read_back() {
    let (app, model, store) = app(QuotaPolicy::default());
    model.add_arguments(quiz_arguments());

    let mut request = post_json("/api/quiz", json!({"documentUrl": URL}));
    request.headers_mut().insert("x-user-id", "alice".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["quizSetId"].as_str().unwrap().to_string();
    assert_eq!(created["quizzes"].as_array().unwrap().len(), 5);
    assert_eq!(created["quizzes"][0]["answerIndex"], 2);
    assert_eq!(store.quiz_sets()[0].user_id.as_deref(), Some("alice"));

    let response = app
        .oneshot(Request::builder().uri(format!("/api/quiz-sets/{}", id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["id"], id.as_str());
    assert_eq!(view["quizzes"].as_array().unwrap().len(), 5);
    assert_eq!(view["quizzes"][1]["options"][0]["index"], 1);
}

#[tokio::test]
async fn unknown_or_incomplete_set_is_not_found() {
    let (app, model, store) = app(QuotaPolicy::default());
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/quiz-sets/qs_nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    model.add_arguments(quiz_arguments());
    store.fail_at(Some(WriteStage::Quizzes));
    let response = app.clone().oneshot(post_json("/api/quiz", json!({"url": URL}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["kind"], "persistence-error");

    let dangling = store.quiz_sets()[0].id.clone();
    let response = app
        .oneshot(Request::builder().uri(format!("/api/quiz-sets/{}", dangling)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_emits_one_created_event() {
    let (app, model, store) = app(QuotaPolicy::default());
    model.add_arguments(quiz_arguments());

    let response = app.oneshot(post_json("/api/quiz/stream", json!({"url": URL}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let raw = String::from_utf8(body_bytes(response).await).unwrap();

    assert_eq!(raw.matches("event: created").count(), 1);
    assert!(raw.contains(&format!("\"quizSetId\":\"{}\"", store.quiz_sets()[0].id)));
}

#[tokio::test]
async fn stream_closes_without_event_on_failure() {
    let (app, _, _) = app(QuotaPolicy::default());
    let response = app
        .oneshot(post_json("/api/quiz/stream", json!({"url": "http://example.com"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let raw = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(!raw.contains("event: created"));
}

#[tokio::test]
async fn http_source_fetches_and_reports_status() {
    let pages = Router::new()
        .route("/doc", get(|| async { axum::response::Html(PAGE_HTML) }))
        .route("/gone", get(|| async { StatusCode::GONE }));
    let addr = spawn(pages).await;
    let source = HttpDocumentSource::new().unwrap();

    let url = Url::parse(&format!("http://{}/doc", addr)).unwrap();
    let document = fetch_document(&source, &url).await.unwrap();
    assert_eq!(document.title, "useLayoutEffect – React");
    assert!(document.corpus.starts_with("useLayoutEffect\n"));

    let url = Url::parse(&format!("http://{}/gone", addr)).unwrap();
    let err = source.fetch_html(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 410, .. }));
}

async fn fake_completions(Json(body): Json<Value>) -> Json<Value> {
    let tool = body["tools"][0]["function"]["name"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": tool, "arguments": quiz_arguments()}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
}

fn openai_client(addr: SocketAddr, prefix: &str) -> OpenAIClient {
    OpenAIClient::new(OpenAIConfig {
        api_key: "sk-test".into(),
        model: OpenAIModel::Gpt35Turbo1106,
        base_url: format!("http://{}/{}", addr, prefix),
    })
}

#[tokio::test]
async fn openai_client_round_trips_tool_call() {
    let api = Router::new()
        .route("/ok/chat/completions", post(fake_completions))
        .route("/limited/chat/completions", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
        .route("/denied/chat/completions", post(|| async { StatusCode::UNAUTHORIZED }));
    let addr = spawn(api).await;

    let generator = QuizGenerator::new(openai_client(addr, "ok"));
    let raw = generator.generate_raw("Some text.").await.unwrap();
    assert_eq!(raw, quiz_arguments());

    let request = QuizGenerator::<OpenAIClient>::build_request("x");
    let calls = openai_client(addr, "ok").ask_with_tools(request.clone()).await.unwrap();
    assert_eq!(calls[0].name, TOOL_NAME);

    let err = openai_client(addr, "limited").ask_with_tools(request.clone()).await.unwrap_err();
    assert!(matches!(err, AIError::OpenAI(OpenAIError::RateLimit)));

    let err = openai_client(addr, "denied").ask_with_tools(request).await.unwrap_err();
    assert!(matches!(err, AIError::OpenAI(OpenAIError::Authentication)));
}

#[tokio::test]
async fn body_that_is_not_json_gets_taxonomy_error() {
    let (app, model, store) = app(QuotaPolicy::default());
    let request = Request::builder()
        .method("POST")
        .uri("/api/quiz")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "invalid-url");
    assert!(body["error"]["message"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/quiz")
        .header("content-type", "text/plain")
        .body(Body::from(json!({"url": URL}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["kind"], "invalid-url");

    let request = Request::builder()
        .method("POST")
        .uri("/api/quiz/stream")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!String::from_utf8(body_bytes(response).await).unwrap().contains("event: created"));

    assert_eq!(model.call_count(), 0);
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn disconnected_client_does_not_abort_submission() {
    let (app, model, store) =
        app_with_page(StaticPage::slow(PAGE_HTML, Duration::from_millis(100)), QuotaPolicy::default());
    model.add_arguments(quiz_arguments());

    let gave_up = tokio::time::timeout(
        Duration::from_millis(20),
        app.oneshot(post_json("/api/quiz", json!({"url": URL}))),
    )
    .await;
    assert!(gave_up.is_err());

    assert_eq!(wait_for_rows(&store, 26).await, 26);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn redirect_off_https_is_refused() {
    let pages = Router::new()
        .route("/doc", get(|| async { axum::response::Html(PAGE_HTML) }))
        .route("/bounce", get(|| async { axum::response::Redirect::temporary("/doc") }));
    let addr = spawn(pages).await;
    let source = HttpDocumentSource::new().unwrap();

    let url = Url::parse(&format!("http://{}/bounce", addr)).unwrap();
    let err = source.fetch_html(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn unreachable_host_is_fetch_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpDocumentSource::new().unwrap();
    let url = Url::parse(&format!("http://{}/doc", addr)).unwrap();
    let err = source.fetch_html(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));

    let (client, model) = MockClient::new();
    let store = MemoryStore::new();
    let pipeline = SubmissionPipeline::new(
        QuizGenerator::new(client),
        Arc::new(source),
        Arc::new(store.clone()),
        QuotaPolicy::default(),
    );
    let err = pipeline.run(Submission::new(format!("https://{}/doc", addr))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchError);
    assert_eq!(model.call_count(), 0);
    assert_eq!(store.row_count(), 0);
}
