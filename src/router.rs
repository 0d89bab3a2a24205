//! Radix-tree request router.
//!
//! One tree per HTTP method plus one method-agnostic tree for routes that
//! dispatch on their own. O(path-length) lookup. The router also owns the
//! middleware chain and is the single entry point for a request:
//! [`Router::handle`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::Method;
use http_body_util::BodyExt;
use matchit::Router as MatchitRouter;
use serde::Serialize;

use crate::failure::Failure;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::request_id::AssignRequestId;
use crate::middleware::{Endpoint, Middleware, Next};
use crate::request::Request;
use crate::response::{BoxError, ResponseBody};

/// One registered route, as listed by `/endpoints/`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RouteInfo {
    pub path: String,
    pub name: String,
}

type Params = HashMap<String, String>;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
///
/// ```rust,no_run
/// # use ollama_gateway::{Request, Response, Router};
/// # use ollama_gateway::middleware::Timeout;
/// # async fn healthcheck(_: Request) -> Response { Response::text("") }
/// # async fn proxy(_: Request) -> Response { Response::text("") }
/// Router::new()
///     .get("/healthcheck", healthcheck)
///     .any("/ollama/{*path}", proxy)
///     .layer(Timeout::from_secs(300));
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    any: MatchitRouter<BoxedHandler>,
    info: Vec<RouteInfo>,
    catalog: OnceLock<Arc<[RouteInfo]>>,
    layers: Vec<Box<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`;
    /// `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let name = handler.name();
        let tree = self.routes.entry(method).or_default();
        insert(tree, path, handler);
        self.record(path, name);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// Register a handler for every method on `path`.
    ///
    /// Method-specific routes take precedence. The handler is responsible for
    /// rejecting methods it does not support.
    pub fn any(mut self, path: &str, handler: impl Handler) -> Self {
        let name = handler.name();
        insert(&mut self.any, path, handler);
        self.record(path, name);
        self
    }

    /// Append a middleware. Layers run in registration order, after the
    /// request id is assigned and before the error pipeline.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Box::new(middleware));
        self
    }

    /// Every registered route, in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.info
    }

    fn record(&mut self, path: &str, name: &str) {
        self.info.push(RouteInfo { path: path.to_owned(), name: name.to_owned() });
        self.catalog = OnceLock::new();
    }

    fn catalog(&self) -> Arc<[RouteInfo]> {
        Arc::clone(self.catalog.get_or_init(|| Arc::from(self.info.clone())))
    }

    /// Resolves a handler, or the failure the client should see.
    ///
    /// A path known under another method is `405`, an unknown path `404`.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Result<(BoxedHandler, Params), Failure> {
        let matched = self
            .routes
            .get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok());

        if let Some(matched) = matched {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Ok((Arc::clone(matched.value), params));
        }

        let allowed: Vec<Method> = self
            .routes
            .iter()
            .filter(|(m, tree)| *m != method && tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() { Err(Failure::not_found()) } else { Err(Failure::method_not_allowed(allowed)) }
    }

    /// Runs one request through the full chain and returns the hyper response.
    ///
    /// Never fails: every rejection (unreadable body, unknown route, handler
    /// failure or panic) comes back as a rendered response. The body is left
    /// unread until the innermost stage, so registered layers bound it too.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = body.map_err(|e| -> BoxError { e.into() }).boxed_unsync();

        let mut request = Request::new(parts, Bytes::new(), self.catalog());
        let endpoint = match self.lookup(request.method(), request.path()) {
            Ok((handler, params)) => {
                request.set_params(params);
                Endpoint::Handler(handler, Some(body))
            }
            Err(failure) => Endpoint::Rejected(failure),
        };

        let stage = AssignRequestId;
        stage.call(request, Next::new(&self.layers, endpoint)).await.into_inner()
    }
}

fn insert(tree: &mut MatchitRouter<BoxedHandler>, path: &str, handler: impl Handler) {
    tree.insert(path, handler.into_boxed_handler())
        .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
}
