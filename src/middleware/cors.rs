//! Cross-origin resource sharing.
//!
//! Answers preflight `OPTIONS` requests itself and decorates every other
//! response to a request carrying an `Origin` header. Requests without an
//! `Origin` pass through untouched.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, HeaderMap, HeaderValue, ORIGIN,
    VARY,
};
use http::{Method, StatusCode};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{ContentType, Response};

const ALLOWED_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

#[derive(Clone, Debug)]
pub enum AllowOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Cors {
    origins: AllowOrigins,
    credentials: bool,
    expose_all: bool,
}

impl Cors {
    /// Every origin, method and header allowed, credentials allowed, every
    /// response header exposed.
    pub fn permissive() -> Self {
        Self { origins: AllowOrigins::Any, credentials: true, expose_all: true }
    }

    /// Only the listed origins. Credentials allowed, nothing exposed.
    pub fn allow_origins(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            origins: AllowOrigins::List(origins.into_iter().map(Into::into).collect()),
            credentials: true,
            expose_all: false,
        }
    }

    fn allows(&self, origin: &str) -> bool {
        match &self.origins {
            AllowOrigins::Any => true,
            AllowOrigins::List(list) => list.iter().any(|o| o == origin),
        }
    }

    /// Value of `Access-Control-Allow-Origin` for an allowed `origin`.
    ///
    /// With credentials the literal `*` is not honored by browsers, so the
    /// origin is echoed back instead.
    fn allow_origin_value(&self, origin: &HeaderValue) -> HeaderValue {
        match (&self.origins, self.credentials) {
            (AllowOrigins::Any, false) => HeaderValue::from_static("*"),
            _ => origin.clone(),
        }
    }

    fn decorate(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin_value(origin));
        headers.append(VARY, HeaderValue::from_static("Origin"));
        if self.credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }

    fn preflight(&self, req: &Request, origin: &HeaderValue) -> Response {
        let mut res = Response::builder().bytes(ContentType::Text, "OK");
        let headers = res.headers_mut();

        self.decorate(origin, headers);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
        if let Some(requested) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }

        res
    }
}

impl Middleware for Cors {
    fn call<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(origin) = req.headers().get(ORIGIN).cloned() else {
                return next.run(req).await;
            };
            let allowed = origin.to_str().is_ok_and(|o| self.allows(o));

            let is_preflight = req.method() == Method::OPTIONS
                && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD);
            if is_preflight {
                if !allowed {
                    return Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .bytes(ContentType::Text, "Disallowed CORS origin");
                }
                return self.preflight(&req, &origin);
            }

            let mut res = next.run(req).await;
            if allowed {
                self.decorate(&origin, res.headers_mut());
                if self.expose_all {
                    res.headers_mut()
                        .insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("*"));
                }
            }
            res
        })
    }
}
