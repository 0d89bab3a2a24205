//! Outgoing HTTP response type and the conversion traits handlers rely on.
//!
//! Handlers return anything implementing [`IntoOutcome`]: a plain
//! [`Response`], a [`Json`] value, a [`StatusCode`], a string, or a
//! `Result<T, E>` where `T: IntoResponse` and `E: Into<Failure>`. The `Err`
//! side is rendered by the error pipeline, never by the handler.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use serde::Serialize;

use crate::failure::Failure;

/// Error type of streamed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type handed to hyper.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types the gateway actually sends.
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,        // text/html; charset=utf-8
    Json,        // application/json
    NdJson,      // application/x-ndjson  (Ollama streaming)
    Text,        // text/plain; charset=utf-8
}

impl ContentType {
    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::NdJson      => "application/x-ndjson",
            Self::Text        => "text/plain; charset=utf-8",
        })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

pub(crate) enum Body {
    Full(Bytes),
    Stream(ResponseBody),
}

/// An outgoing HTTP response.
///
/// ```rust
/// use ollama_gateway::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::json(br#"{"status":"Healthy"}"#.to_vec());
/// Response::html("<h1>hi</h1>");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::GATEWAY_TIMEOUT)
///     .bytes(ContentType::Json, br#"{"detail":"Request timed out"}"#.to_vec());
/// ```
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
}

impl Response {
    /// `200 OK`, `application/json`, body already serialized.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::builder().bytes(ContentType::Text, body)
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::builder().bytes(ContentType::Html, body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    /// Converts into the hyper representation.
    pub fn into_inner(self) -> http::Response<ResponseBody> {
        let body = match self.body {
            Body::Full(bytes) => Full::new(bytes)
                .map_err(|never| -> BoxError { match never {} })
                .boxed_unsync(),
            Body::Stream(stream) => stream,
        };

        let mut res = http::Response::new(body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    /// Terminate with a typed, fully buffered body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, Body::Full(body.into()))
    }

    /// Terminate with a streamed body. Chunks are forwarded as they arrive.
    pub fn stream(self, content_type: ContentType, body: ResponseBody) -> Response {
        self.finish(content_type, Body::Stream(body))
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Body::Full(Bytes::new()), headers: self.headers, status: self.status }
    }

    fn finish(mut self, content_type: ContentType, body: Body) -> Response {
        self.headers.insert(CONTENT_TYPE, content_type.header_value());
        Response { body, headers: self.headers, status: self.status }
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// Serializes `T` as the response body.
#[derive(Debug)]
pub struct Json<T>(pub T);

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion of a successful handler value into a [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => Response::json(bytes),
            Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// What a handler produces: a response, or a failure for the error pipeline.
pub type Outcome = Result<Response, Failure>;

/// Conversion of a handler's return value into an [`Outcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

macro_rules! outcome_from_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $ty {
                fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
            }
        )*
    };
}

outcome_from_response!(Response, &'static str, String, StatusCode);

impl<T: Serialize> IntoOutcome for Json<T> {
    fn into_outcome(self) -> Outcome {
        serde_json::to_vec(&self.0)
            .map(Response::json)
            .map_err(Failure::unexpected)
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoResponse,
    E: Into<Failure>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}
