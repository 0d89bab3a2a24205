//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. Every request runs through the same fixed shape:
//!
//! ```text
//! request_id  ─┐  always first: assigns the correlation id, sets X-Request-ID
//!   layer 1    │  registered with Router::layer, in registration order
//!   layer …    │  (cors, timeout in the assembled app)
//!   errors     │  always last: runs the handler, renders any Failure
//!   handler   ─┘
//! ```
//!
//! The first and last stages are not registrable. A layer therefore always
//! sees a request that already carries its [`RequestId`](request_id::RequestId),
//! and always receives a finished [`Response`], never a raw failure.

pub mod cors;
pub mod errors;
pub mod request_id;
pub mod timeout;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;

use crate::failure::Failure;
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::{BoxError, Response};

pub use cors::Cors;
pub use errors::ErrorEnvelope;
pub use request_id::RequestId;
pub use timeout::Timeout;

/// A registrable request/response interceptor.
///
/// ```rust,no_run
/// use ollama_gateway::middleware::{Middleware, Next};
/// use ollama_gateway::{BoxFuture, Request, Response};
///
/// struct Audit;
///
/// impl Middleware for Audit {
///     fn call<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
///         Box::pin(async move {
///             let path = req.path().to_owned();
///             let res = next.run(req).await;
///             tracing::info!(%path, status = %res.status_code(), "audited");
///             res
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// What the innermost stage will run once the layers are done.
pub(crate) enum Endpoint {
    /// A matched handler, and the request body it still has to wait for.
    /// `None` when the body is already on the [`Request`].
    Handler(BoxedHandler, Option<RequestBody>),
    /// The router refused the request before any handler matched.
    Rejected(Failure),
}

/// An incoming body that has not been read yet.
pub(crate) type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    layers: &'a [Box<dyn Middleware>],
    endpoint: Endpoint,
}

impl<'a> Next<'a> {
    pub(crate) fn new(layers: &'a [Box<dyn Middleware>], endpoint: Endpoint) -> Self {
        Self { layers, endpoint }
    }

    /// Runs the remaining layers, then the handler through the error pipeline.
    pub async fn run(self, req: Request) -> Response {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.call(req, Next::new(rest, self.endpoint)).await,
            None => errors::respond(self.endpoint, req).await,
        }
    }
}
