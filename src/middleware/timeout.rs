//! Request timeout.
//!
//! Bounds the time spent in everything below this layer. When the bound is
//! hit, the in-flight future is dropped (which cancels it, and with it any
//! model-server call it was awaiting) and a `504` is returned.
//!
//! The `504` body is `{"detail": "Request timed out"}`, built here and not
//! through the error pipeline, so it does not have the `code/name/description`
//! envelope shape. Existing clients match on it.

use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{ContentType, Response};

const TIMED_OUT_BODY: &[u8] = br#"{"detail":"Request timed out"}"#;

#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Middleware for Timeout {
    fn call<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = req.path().to_owned();
            match tokio::time::timeout(self.duration(), next.run(req)).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(%path, timeout_secs = self.duration().as_secs_f64(), "request timed out");
                    timed_out()
                }
            }
        })
    }
}

fn timed_out() -> Response {
    Response::builder()
        .status(StatusCode::GATEWAY_TIMEOUT)
        .bytes(ContentType::Json, TIMED_OUT_BODY)
}
