use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use serde_json::{Value, json};

use ollama_gateway::middleware::ErrorEnvelope;
use ollama_gateway::{
    BoxError, ChatModel, Failure, Message, Request, ResponseBody, Router, Settings, app,
};

/// Replies with the last message's content, prefixed.
struct Echo;

#[async_trait]
impl ChatModel for Echo {
    fn model(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, messages: Vec<Message>) -> Result<Message, Failure> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(Message { role: "assistant".to_owned(), content: format!("echo: {last}") })
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<ResponseBody, Failure> {
        let chunks: String = messages
            .iter()
            .map(|m| format!("{}\n", json!({"message": {"role": "assistant", "content": m.content.as_str()}})))
            .collect();
        Ok(Full::new(Bytes::from(chunks))
            .map_err(|never| -> BoxError { match never {} })
            .boxed_unsync())
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn envelope(&self) -> ErrorEnvelope {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn request_id(&self) -> &str {
        self.headers["x-request-id"].to_str().unwrap()
    }
}

fn gateway() -> Router {
    gateway_with(Settings::default())
}

fn gateway_with(settings: Settings) -> Router {
    app::create_app(&settings, Arc::new(Echo))
}

async fn send(router: &Router, method: Method, uri: &str, body: &str) -> Reply {
    send_with(router, http::Request::builder().method(method).uri(uri), body).await
}

async fn send_with(router: &Router, builder: http::request::Builder, body: &str) -> Reply {
    let req = builder.body(Full::new(Bytes::from(body.to_owned()))).unwrap();
    let res = router.handle(req).await;
    let (parts, body) = res.into_parts();
    Reply { status: parts.status, headers: parts.headers, body: body.collect().await.unwrap().to_bytes() }
}

// ── Built-in routes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn healthcheck_reports_healthy() {
    let reply = send(&gateway(), Method::GET, "/healthcheck", "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"status": "Healthy"}));
}

#[tokio::test]
async fn root_serves_the_welcome_page() {
    let reply = send(&gateway(), Method::GET, "/", "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers["content-type"], "text/html; charset=utf-8");

    let page = String::from_utf8(reply.body.to_vec()).unwrap();
    assert!(page.contains("<title>Welcome</title>"));
    assert!(page.contains("<h1>Welcome to the Kubert Agent service!</h1>"));
}

#[tokio::test]
async fn endpoints_lists_every_route() {
    let reply = send(&gateway(), Method::GET, "/endpoints/", "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"endpoints": [
            {"path": "/healthcheck", "name": "healthcheck"},
            {"path": "/", "name": "root"},
            {"path": "/endpoints/", "name": "endpoints"},
            {"path": "/ollama/{*path}", "name": "ollama_chat"},
        ]})
    );
}

// ── Request ids ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_response_gets_a_fresh_request_id() {
    let router = gateway();
    let a = send(&router, Method::GET, "/healthcheck", "").await;
    let b = send(&router, Method::GET, "/healthcheck", "").await;
    let missing = send(&router, Method::GET, "/missing", "").await;

    for reply in [&a, &b, &missing] {
        assert_eq!(uuid::Uuid::parse_str(reply.request_id()).unwrap().get_version_num(), 4);
    }
    assert_ne!(a.request_id(), b.request_id());
}

// ── Error pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_path_is_a_404_envelope_with_the_request_id() {
    let reply = send(&gateway(), Method::GET, "/does-not-exist", "").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let envelope = reply.envelope();
    assert_eq!(envelope.code, 404);
    assert_eq!(envelope.name, "HTTPException");
    assert_eq!(envelope.description, format!("[Request Id: {}], Not Found", reply.request_id()));
}

#[tokio::test]
async fn wrong_method_is_a_405_envelope() {
    let reply = send(&gateway(), Method::POST, "/healthcheck", "").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.headers["allow"], "GET");
    assert_eq!(reply.envelope().name, "HTTPException");
}

#[tokio::test]
async fn raised_failures_are_rendered_with_their_status_and_name() {
    async fn forbidden(_req: Request) -> Result<&'static str, Failure> {
        Err(Failure::forbidden("Forbidden action"))
    }
    async fn rule(_req: Request) -> Result<&'static str, Failure> {
        Err(Failure::command_not_allowed("Command Not Allowed"))
    }
    async fn generic(_req: Request) -> Result<&'static str, Failure> {
        Err(Failure::error("Custom error occurred"))
    }

    let router = gateway().get("/forbidden", forbidden).get("/rule", rule).get("/generic", generic);

    let cases = [
        ("/forbidden", StatusCode::FORBIDDEN, "ForbiddenError", "Forbidden action"),
        ("/rule", StatusCode::FORBIDDEN, "CommandNotAllowedError", "Command Not Allowed"),
        ("/generic", StatusCode::INTERNAL_SERVER_ERROR, "Error", "Custom error occurred"),
    ];
    for (path, status, name, description) in cases {
        let reply = send(&router, Method::GET, path, "").await;
        assert_eq!(reply.status, status, "{path}");

        let envelope = reply.envelope();
        assert_eq!(envelope.code, status.as_u16());
        assert_eq!(envelope.name, name);
        assert_eq!(envelope.description, format!("[Request Id: {}], {description}", reply.request_id()));
    }
}

#[tokio::test]
async fn panicking_handler_is_an_unexpected_error() {
    async fn explode(_req: Request) -> &'static str {
        panic!("index out of bounds");
    }

    let reply = send(&gateway().get("/explode", explode), Method::GET, "/explode", "").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

    let envelope = reply.envelope();
    assert_eq!(envelope.name, "UnexpectedError");
    assert!(envelope.description.ends_with("An unexpected error occurred."));
    assert!(!envelope.description.contains("index out of bounds"));
}

// ── Timeout ───────────────────────────────────────────────────────────────────

async fn slow(_req: Request) -> &'static str {
    tokio::time::sleep(Duration::from_secs(10)).await;
    "late"
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out_with_504() {
    let settings = Settings { request_timeout: Duration::from_secs(1), ..Settings::default() };
    let router = gateway_with(settings).get("/slow", slow);

    let reply = send(&router, Method::GET, "/slow", "").await;
    assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(reply.json(), json!({"detail": "Request timed out"}));
    assert!(reply.headers.contains_key("x-request-id"));
}

#[tokio::test(start_paused = true)]
async fn handler_within_the_bound_is_untouched() {
    let settings = Settings { request_timeout: Duration::from_secs(30), ..Settings::default() };
    let router = gateway_with(settings).get("/slow", slow);

    let reply = send(&router, Method::GET, "/slow", "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "late");
}

#[tokio::test(start_paused = true)]
async fn stalled_request_body_times_out_with_504() {
    let settings = Settings { request_timeout: Duration::from_secs(1), ..Settings::default() };
    let router = gateway_with(settings);

    // Half a JSON document, then the client goes quiet.
    let chunks = futures_util::stream::iter([Ok::<_, Infallible>(Frame::data(Bytes::from_static(b"{")))])
        .chain(futures_util::stream::pending());
    let req = http::Request::builder()
        .method(Method::POST)
        .uri("/ollama/invoke")
        .body(StreamBody::new(chunks))
        .unwrap();

    let res = router.handle(req).await;
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn broken_request_body_is_a_400_envelope() {
    let chunks = futures_util::stream::iter([Err::<Frame<Bytes>, _>(std::io::Error::other("reset by peer"))]);
    let req = http::Request::builder()
        .method(Method::POST)
        .uri("/ollama/invoke")
        .body(StreamBody::new(chunks))
        .unwrap();

    let (parts, body) = gateway().handle(req).await.into_parts();
    assert_eq!(parts.status, StatusCode::BAD_REQUEST);

    let envelope: ErrorEnvelope = serde_json::from_slice(&body.collect().await.unwrap().to_bytes()).unwrap();
    assert!(envelope.description.ends_with("Unreadable request body: reset by peer"));
}

// ── CORS ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cross_origin_requests_are_allowed() {
    let router = gateway();

    let simple = http::Request::builder()
        .method(Method::GET)
        .uri("/healthcheck")
        .header("origin", "http://ui.example");
    let reply = send_with(&router, simple, "").await;
    assert_eq!(reply.headers["access-control-allow-origin"], "http://ui.example");
    assert_eq!(reply.headers["access-control-allow-credentials"], "true");

    let preflight = http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/ollama/invoke")
        .header("origin", "http://ui.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type");
    let reply = send_with(&router, preflight, "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers["access-control-allow-methods"].to_str().unwrap().contains("POST"));
    assert_eq!(reply.headers["access-control-allow-headers"], "content-type");
    assert!(reply.headers.contains_key("x-request-id"));
}

// ── Model route ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invoke_wraps_the_model_reply() {
    let reply = send(&gateway(), Method::POST, "/ollama/invoke", r#"{"input": "hello"}"#).await;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    assert_eq!(body["output"], json!({"role": "assistant", "content": "echo: hello"}));
    assert!(uuid::Uuid::parse_str(body["metadata"]["run_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn batch_keeps_input_order() {
    let body = json!({"inputs": ["one", [{"role": "user", "content": "two"}], "three"]}).to_string();
    let reply = send(&gateway(), Method::POST, "/ollama/batch", &body).await;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    let contents: Vec<_> = body["output"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(contents, ["echo: one", "echo: two", "echo: three"]);
    assert_eq!(body["metadata"]["run_ids"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn stream_is_ndjson() {
    let reply = send(&gateway(), Method::POST, "/ollama/stream", r#"{"input": "hi"}"#).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers["content-type"], "application/x-ndjson");

    let text = String::from_utf8(reply.body.to_vec()).unwrap();
    let first: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["message"]["content"], "hi");
}

#[tokio::test]
async fn model_route_rejections() {
    let router = gateway();

    let reply = send(&router, Method::POST, "/ollama/summarize", "{}").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&router, Method::GET, "/ollama/invoke", "").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.headers["allow"], "POST");

    let reply = send(&router, Method::POST, "/ollama/invoke", r#"{"prompt": "hi"}"#).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let envelope = reply.envelope();
    assert_eq!(envelope.name, "HTTPException");
    assert!(envelope.description.contains("missing field `input`"));
}
