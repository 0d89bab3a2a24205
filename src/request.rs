//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::failure::Failure;
use crate::middleware::request_id::RequestId;
use crate::router::RouteInfo;

/// An incoming HTTP request.
///
/// By the time a handler sees it the body has been read in full.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) request_id: Option<RequestId>,
    pub(crate) routes: Arc<[RouteInfo]>,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, routes: Arc<[RouteInfo]>) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            request_id: None,
            routes,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/ollama/{*path}`, `req.param("path")` on `/ollama/invoke`
    /// returns `Some("invoke")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Correlation id assigned to this request, if the request-id stage ran.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Every route registered on the router that dispatched this request.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Deserializes the body as JSON.
    ///
    /// A body that does not parse is a `422` [`Failure::Http`] carrying the
    /// parser message.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        serde_json::from_slice(&self.body).map_err(|e| Failure::http(422u16, e.to_string()))
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_request_id(&mut self, id: RequestId) {
        self.request_id = Some(id);
    }
}

#[cfg(test)]
impl Request {
    /// Bare request for unit tests that never touch the router.
    pub(crate) fn for_test(method: Method, uri: &str, body: &'static [u8]) -> Self {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        Self::new(parts, Bytes::from_static(body), Arc::from(Vec::new()))
    }
}
