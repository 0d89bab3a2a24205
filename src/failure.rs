//! Request-level failures.
//!
//! Anything a handler can go wrong with is a [`Failure`]. Handlers return
//! `Result<T, Failure>` and the error pipeline
//! ([`middleware::errors`](crate::middleware::errors)) turns the failure into
//! the JSON envelope the client sees. Nothing downstream of a handler ever
//! inspects a failure except through [`HttpStatus`].

use std::borrow::Cow;

use http::header::{ALLOW, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use thiserror::Error;

/// Description used when a failure carries none of its own.
pub const DEFAULT_DESCRIPTION: &str = "An unexpected error occurred.";

const BUSINESS_LOGIC_DESCRIPTION: &str = "A business logic error occurred.";
const FORBIDDEN_DESCRIPTION: &str = "Forbidden: insufficient roles";
const COMMAND_NOT_ALLOWED_DESCRIPTION: &str = "Command Not Allowed";

/// Anything that knows which HTTP status and description it maps to.
///
/// The error pipeline only talks to this trait, so adding a failure kind
/// never touches the rendering code.
pub trait HttpStatus {
    /// Raw status code. May be out of the valid range; the pipeline coerces.
    fn status_code(&self) -> u16;

    /// Wire identifier of the failure kind (`"ForbiddenError"`, ...).
    fn name(&self) -> &'static str;

    /// Human-readable description sent to the client.
    fn description(&self) -> Cow<'_, str>;

    /// Extra response headers the status calls for.
    fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }
}

/// A classified failure raised while handling a request.
#[derive(Debug, Error)]
pub enum Failure {
    /// Generic base failure.
    #[error("{}", describe(.description, DEFAULT_DESCRIPTION))]
    Error { description: Option<String> },

    #[error("{}", describe(.description, BUSINESS_LOGIC_DESCRIPTION))]
    BusinessLogic { description: Option<String> },

    /// A command ran and failed. Business-logic kind, 400.
    #[error("{}", describe(.description, BUSINESS_LOGIC_DESCRIPTION))]
    CommandExecution { description: Option<String> },

    /// Caller lacks the roles for the action.
    #[error("{}", describe(.description, FORBIDDEN_DESCRIPTION))]
    Forbidden { description: Option<String> },

    /// A business rule forbids the action regardless of roles.
    #[error("{}", describe(.description, COMMAND_NOT_ALLOWED_DESCRIPTION))]
    CommandNotAllowed { description: Option<String> },

    /// Plain HTTP error with a caller-chosen status and detail.
    #[error("{status}: {detail}")]
    Http { status: u16, detail: String },

    /// `405` for a known path. Renders as `HTTPException` with an `Allow`
    /// header listing `allowed`.
    #[error("405: Method Not Allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    /// Catch-all for panics and unclassified errors. The source is logged,
    /// never sent to the client.
    #[error("An unexpected error occurred.")]
    Unexpected(#[source] anyhow::Error),
}

fn describe<'a>(description: &'a Option<String>, default: &'a str) -> &'a str {
    description.as_deref().unwrap_or(default)
}

impl Failure {
    pub fn error(description: impl Into<String>) -> Self {
        Self::Error { description: Some(description.into()) }
    }

    pub fn business_logic(description: impl Into<String>) -> Self {
        Self::BusinessLogic { description: Some(description.into()) }
    }

    pub fn command_execution(description: impl Into<String>) -> Self {
        Self::CommandExecution { description: Some(description.into()) }
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::Forbidden { description: Some(description.into()) }
    }

    pub fn command_not_allowed(description: impl Into<String>) -> Self {
        Self::CommandNotAllowed { description: Some(description.into()) }
    }

    /// An HTTP error with an explicit status and detail.
    pub fn http(status: impl Into<u16>, detail: impl Into<String>) -> Self {
        Self::Http { status: status.into(), detail: detail.into() }
    }

    /// `404 Not Found`, as raised by the router for unknown paths.
    pub fn not_found() -> Self {
        Self::http(StatusCode::NOT_FOUND, "Not Found")
    }

    /// `405 Method Not Allowed`. `allowed` is sorted and deduplicated.
    pub fn method_not_allowed(allowed: impl IntoIterator<Item = Method>) -> Self {
        let mut allowed: Vec<Method> = allowed.into_iter().collect();
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed.dedup();
        Self::MethodNotAllowed { allowed }
    }

    pub fn unexpected(source: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(source.into())
    }
}

impl HttpStatus for Failure {
    fn status_code(&self) -> u16 {
        match self {
            Self::Error { .. } | Self::Unexpected(_) => 500,
            Self::BusinessLogic { .. } | Self::CommandExecution { .. } => 400,
            Self::Forbidden { .. } | Self::CommandNotAllowed { .. } => 403,
            Self::Http { status, .. } => *status,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED.as_u16(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "Error",
            Self::BusinessLogic { .. } => "BusinessLogicError",
            Self::CommandExecution { .. } => "CommandExecutionError",
            Self::Forbidden { .. } => "ForbiddenError",
            Self::CommandNotAllowed { .. } => "CommandNotAllowedError",
            Self::Http { .. } | Self::MethodNotAllowed { .. } => "HTTPException",
            Self::Unexpected(_) => "UnexpectedError",
        }
    }

    fn description(&self) -> Cow<'_, str> {
        match self {
            Self::Http { detail, .. } => Cow::Borrowed(detail),
            Self::MethodNotAllowed { .. } => Cow::Borrowed("Method Not Allowed"),
            Self::Unexpected(_) => Cow::Borrowed(DEFAULT_DESCRIPTION),
            other => Cow::Owned(other.to_string()),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(allow) = self.allow_header() {
            headers.insert(ALLOW, allow);
        }
        headers
    }
}

impl Failure {
    fn allow_header(&self) -> Option<HeaderValue> {
        let Self::MethodNotAllowed { allowed } = self else { return None };
        let joined = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        HeaderValue::from_str(&joined).ok()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Self::Unexpected(e)
    }
}
