//! The error response pipeline.
//!
//! One function, [`render`], turns any failure into the client-facing
//! envelope:
//!
//! ```json
//! {"code": 403, "name": "ForbiddenError", "description": "[Request Id: …], Forbidden action"}
//! ```
//!
//! It runs as the innermost stage around every handler, and for router-level
//! rejections (unknown path, wrong method) and handler panics, so the shape is
//! the same no matter where the failure was raised.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::Endpoint;
use super::request_id::RequestId;
use crate::failure::{Failure, HttpStatus};
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Wire shape of every rendered failure.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub name: String,
    pub description: String,
}

/// Reads the body, runs the endpoint and renders a failed outcome.
///
/// The body is read here, inside every registered layer, so a client that
/// stalls mid-body is bounded by the timeout like a slow handler is.
pub(crate) async fn respond(endpoint: Endpoint, mut req: Request) -> Response {
    let request_id = req.request_id().cloned();

    let failure = match endpoint {
        Endpoint::Rejected(failure) => failure,
        Endpoint::Handler(handler, body) => {
            if let Some(body) = body {
                match body.collect().await {
                    Ok(collected) => req.set_body(collected.to_bytes()),
                    Err(e) => {
                        let failure = Failure::http(400u16, format!("Unreadable request body: {e}"));
                        return render(&failure, request_id.as_ref());
                    }
                }
            }
            match AssertUnwindSafe(handler.call(req)).catch_unwind().await {
                Ok(Ok(response)) => return response,
                Ok(Err(failure)) => failure,
                Err(panic) => Failure::unexpected(anyhow::anyhow!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        }
    };

    if let Failure::Unexpected(source) = &failure {
        debug!("unexpected failure source: {source:?}");
    }

    render(&failure, request_id.as_ref())
}

/// Converts a failure into the JSON envelope response.
///
/// The description is prefixed with `[Request Id: <id>], ` when an id is
/// known. Status codes outside 100–599 are sent as 500.
pub fn render(failure: &dyn HttpStatus, request_id: Option<&RequestId>) -> Response {
    let mut description = failure.description().into_owned();
    if let Some(id) = request_id {
        description = format!("[Request Id: {id}], {description}");
    }

    error!("Error handler: {description}");

    let code = match failure.status_code() {
        code @ 100..=599 => code,
        _ => 500,
    };
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let envelope = ErrorEnvelope { code, name: failure.name().to_owned(), description };
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut res = Response::builder().status(status).bytes(ContentType::Json, body);
    res.headers_mut().extend(failure.headers());
    res
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::BodyExt;

    use super::*;
    use crate::handler::Handler;

    async fn envelope_of(res: Response) -> (StatusCode, ErrorEnvelope) {
        let status = res.status_code();
        let body: Bytes = res.into_inner().into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn http_failure_without_request_id() {
        let (status, env) = envelope_of(render(&Failure::http(404u16, "Not Found"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            env,
            ErrorEnvelope {
                code: 404,
                name: "HTTPException".to_owned(),
                description: "Not Found".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn base_error_with_custom_description() {
        let (status, env) = envelope_of(render(&Failure::error("Custom error occurred"), None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(env.code, 500);
        assert_eq!(env.name, "Error");
        assert_eq!(env.description, "Custom error occurred");
    }

    #[tokio::test]
    async fn forbidden_and_command_not_allowed_are_403() {
        let (status, env) = envelope_of(render(&Failure::forbidden("Forbidden action"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(env.name, "ForbiddenError");
        assert_eq!(env.description, "Forbidden action");

        let (status, env) =
            envelope_of(render(&Failure::command_not_allowed("Command Not Allowed"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(env.name, "CommandNotAllowedError");
    }

    #[tokio::test]
    async fn request_id_prefixes_description() {
        let id = RequestId::generate();
        let (_, env) = envelope_of(render(&Failure::forbidden("Forbidden action"), Some(&id))).await;
        assert_eq!(env.description, format!("[Request Id: {id}], Forbidden action"));
    }

    #[tokio::test]
    async fn out_of_range_status_is_coerced_to_500() {
        for bogus in [42u16, 600, 999] {
            let (status, env) = envelope_of(render(&Failure::http(bogus, "weird"), None)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(env.code, 500);
            assert_eq!(env.name, "HTTPException");
        }
    }

    #[tokio::test]
    async fn panicking_handler_becomes_unexpected_error() {
        async fn explode(_req: Request) -> Response {
            panic!("boom");
        }

        let req = Request::for_test(http::Method::GET, "/explode", b"");
        let res = respond(Endpoint::Handler(explode.into_boxed_handler(), None), req).await;
        let (status, env) = envelope_of(res).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(env.name, "UnexpectedError");
        assert_eq!(env.description, crate::failure::DEFAULT_DESCRIPTION);
    }
}
