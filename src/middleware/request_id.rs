//! Correlation ids.
//!
//! Every request gets a fresh UUID v4 before anything else runs. The id lives
//! on the [`Request`] for the request's lifetime, tags every log line emitted
//! inside the request's span, prefixes error descriptions, and is echoed back
//! in the `X-Request-ID` response header.

use std::fmt;

use http::HeaderValue;
use http::header::HeaderName;
use tracing::Instrument;
use uuid::Uuid;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Response header carrying the correlation id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque per-request correlation id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    fn header_value(&self) -> HeaderValue {
        // A hyphenated UUID is always a valid header value.
        HeaderValue::from_str(&self.0.hyphenated().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// The outermost stage. The router runs it for every request; it is not
/// registrable with [`Router::layer`](crate::Router::layer).
pub(crate) struct AssignRequestId;

impl Middleware for AssignRequestId {
    fn call<'a>(&'a self, mut req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        let id = RequestId::generate();
        let span = tracing::info_span!(
            "request",
            request_id = %id,
            method = %req.method(),
            path = %req.path(),
        );
        req.set_request_id(id.clone());

        Box::pin(
            async move {
                let mut response = next.run(req).await;
                response.headers_mut().insert(X_REQUEST_ID.clone(), id.header_value());
                response
            }
            .instrument(span),
        )
    }
}
