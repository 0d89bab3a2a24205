//! The model-serving client and the `/ollama/*` route.
//!
//! [`ChatModel`] is the seam between the route and the network: the route
//! only ever sees the trait, [`OllamaClient`] is the production
//! implementation talking to Ollama's `POST /api/chat`.
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | POST | `/ollama/invoke` | `{"input": …}` | `{"output": message, "metadata": {"run_id"}}` |
//! | POST | `/ollama/batch` | `{"inputs": [ … ]}` | `{"output": [message], "metadata": {"run_ids"}}` |
//! | POST | `/ollama/stream` | `{"input": …}` | upstream NDJSON chunks, as they arrive |
//!
//! An input is either a bare string (sent as one user message) or a list of
//! `{role, content}` messages.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use http::Method;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::failure::Failure;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::{BoxError, ContentType, IntoResponse, Json, Response, ResponseBody};
use crate::router::Router;

/// One chat turn.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_owned(), content: content.into() }
    }
}

/// What a caller may send as a single model input.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatInput {
    Text(String),
    Messages(Vec<Message>),
}

impl ChatInput {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Messages(messages) => messages,
        }
    }
}

/// A chat model reachable by the gateway.
#[async_trait]
pub trait ChatModel: Send + Sync + 'static {
    /// Model identifier, as the model server knows it.
    fn model(&self) -> &str;

    /// One complete reply.
    async fn invoke(&self, messages: Vec<Message>) -> Result<Message, Failure>;

    /// The reply as the model server streams it (NDJSON).
    async fn stream(&self, messages: Vec<Message>) -> Result<ResponseBody, Failure>;
}

// ── Ollama client ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Message,
}

#[derive(Deserialize)]
struct UpstreamError {
    error: String,
}

/// [`ChatModel`] backed by an Ollama server.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    model: String,
    chat_url: Url,
    client: Client,
}

impl OllamaClient {
    /// `base_url` is the server root, e.g. `http://localhost:11434` or
    /// `https://ollama.example.com`.
    pub fn new(model: impl Into<String>, base_url: &str) -> Result<Self, Error> {
        let invalid = |reason: String| Error::ModelUrl { url: base_url.to_owned(), reason };

        let chat_url = Url::parse(&format!("{}/api/chat", base_url.trim_end_matches('/')))
            .map_err(|e| invalid(e.to_string()))?;
        if !matches!(chat_url.scheme(), "http" | "https") || chat_url.host_str().is_none() {
            return Err(invalid("expected an http:// or https:// URL with a host".to_owned()));
        }

        let client = Client::builder().build()?;
        Ok(Self { model: model.into(), chat_url, client })
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response, Failure> {
        debug!(model = %self.model, messages = messages.len(), stream, "calling model server");

        let res = self
            .client
            .post(self.chat_url.clone())
            .json(&ChatRequest { model: &self.model, messages, stream })
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.chat_url, "model server unreachable: {e}");
                Failure::http(502u16, format!("Model server unreachable: {e}"))
            })?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.bytes().await.unwrap_or_default();
        let detail = match serde_json::from_slice::<UpstreamError>(&body) {
            Ok(upstream) => upstream.error,
            Err(_) => String::from_utf8_lossy(&body).into_owned(),
        };
        warn!(status = status.as_u16(), %detail, "model server returned an error");
        Err(Failure::http(status.as_u16(), detail))
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, messages: Vec<Message>) -> Result<Message, Failure> {
        let body = self
            .send(&messages, false)
            .await?
            .bytes()
            .await
            .map_err(|e| Failure::http(502u16, format!("Model server connection lost: {e}")))?;

        serde_json::from_slice::<ChatResponse>(&body)
            .map(|reply| reply.message)
            .map_err(|e| Failure::http(502u16, format!("Invalid response from model server: {e}")))
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<ResponseBody, Failure> {
        let chunks = self
            .send(&messages, true)
            .await?
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(|e| -> BoxError { Box::new(e) });
        Ok(StreamBody::new(chunks).boxed_unsync())
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct InvokeRequest {
    input: ChatInput,
}

#[derive(Deserialize)]
struct BatchRequest {
    inputs: Vec<ChatInput>,
}

#[derive(Serialize)]
struct InvokeResponse {
    output: Message,
    metadata: RunMetadata,
}

#[derive(Serialize)]
struct RunMetadata {
    run_id: Uuid,
}

#[derive(Serialize)]
struct BatchResponse {
    output: Vec<Message>,
    metadata: BatchMetadata,
}

#[derive(Serialize)]
struct BatchMetadata {
    run_ids: Vec<Uuid>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Operation {
    Invoke,
    Batch,
    Stream,
}

impl Operation {
    fn parse(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "invoke" => Some(Self::Invoke),
            "batch" => Some(Self::Batch),
            "stream" => Some(Self::Stream),
            _ => None,
        }
    }
}

/// Registers `/ollama/{*path}` on `router`, served by `model`.
pub fn mount(router: Router, model: Arc<dyn ChatModel>) -> Router {
    router.any("/ollama/{*path}", ollama_chat(model))
}

fn ollama_chat(model: Arc<dyn ChatModel>) -> impl Handler {
    move |req: Request| {
        let model = Arc::clone(&model);
        async move { dispatch(model.as_ref(), req).await }
    }
}

async fn dispatch(model: &dyn ChatModel, req: Request) -> Result<Response, Failure> {
    let operation = Operation::parse(req.param("path").unwrap_or_default())
        .ok_or_else(Failure::not_found)?;
    if req.method() != Method::POST {
        return Err(Failure::method_not_allowed([Method::POST]));
    }
    debug!(model = model.model(), ?operation, "model request");

    match operation {
        Operation::Invoke => {
            let InvokeRequest { input } = req.json()?;
            let output = model.invoke(input.into_messages()).await?;
            Ok(Json(InvokeResponse { output, metadata: RunMetadata { run_id: Uuid::new_v4() } })
                .into_response())
        }
        Operation::Batch => {
            let BatchRequest { inputs } = req.json()?;
            let mut output = Vec::with_capacity(inputs.len());
            let mut run_ids = Vec::with_capacity(inputs.len());
            for input in inputs {
                output.push(model.invoke(input.into_messages()).await?);
                run_ids.push(Uuid::new_v4());
            }
            Ok(Json(BatchResponse { output, metadata: BatchMetadata { run_ids } }).into_response())
        }
        Operation::Stream => {
            let InvokeRequest { input } = req.json()?;
            let body = model.stream(input.into_messages()).await?;
            Ok(Response::builder().stream(ContentType::NdJson, body))
        }
    }
}
