//! Unified startup / infrastructure error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::file::FileLoadError;

/// The error type returned by the gateway's fallible setup operations.
///
/// Request-level problems are [`Failure`](crate::Failure)s and end up as JSON
/// envelopes. This type surfaces everything that happens before or around
/// request handling: reading settings, loading the logging file, installing
/// the subscriber, binding a port.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FileLoad(#[from] FileLoadError),

    #[error("logging: {0}")]
    Logging(String),

    #[error("invalid model server url `{url}`: {reason}")]
    ModelUrl { url: String, reason: String },

    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
