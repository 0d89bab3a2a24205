//! # ollama-gateway
//!
//! A thin HTTP service exposing one Ollama model behind a small, uniform API.
//!
//! ## The contract
//!
//! The gateway does no inference. It forwards chat requests to an Ollama
//! server and owns only the request lifecycle around them:
//!
//! - Correlation ids: every response carries `X-Request-ID`, every log line
//!   inside a request carries the same id.
//! - Uniform errors: every failure becomes
//!   `{"code", "name", "description"}`, rendered in exactly one place.
//! - Timeouts: a request running past `REQUEST_TIMEOUT` is cancelled and
//!   answered with `504`.
//! - CORS, structured logging, graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ollama_gateway::{OllamaClient, Server, Settings, app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let model = OllamaClient::new(&settings.ollama_model, &settings.ollama_url)?;
//!     let router = app::create_app(&settings, Arc::new(model));
//!
//!     Server::bind(settings.socket_addr()?).serve(router).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Writing handlers
//!
//! A handler is any `async fn(Request) -> impl IntoOutcome`. Return
//! `Err(Failure)` and the error pipeline renders it:
//!
//! ```rust,no_run
//! use ollama_gateway::{Failure, Json, Request};
//!
//! async fn delete_model(req: Request) -> Result<Json<&'static str>, Failure> {
//!     if req.header("x-role") != Some("admin") {
//!         return Err(Failure::forbidden("Forbidden action"));
//!     }
//!     Ok(Json("deleted"))
//! }
//! ```

mod error;
mod failure;
mod file;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod config;
pub mod health;
pub mod logger;
pub mod middleware;
pub mod ollama;

pub use config::{ConfigError, Settings};
pub use error::Error;
pub use failure::{DEFAULT_DESCRIPTION, Failure, HttpStatus};
pub use file::{FileLoadError, load_json_file};
pub use handler::{BoxFuture, Handler};
pub use logger::{Logger, LoggingConfig};
pub use ollama::{ChatModel, Message, OllamaClient};
pub use request::Request;
pub use response::{
    BoxError, ContentType, IntoOutcome, IntoResponse, Json, Outcome, Response, ResponseBody,
    ResponseBuilder,
};
pub use router::{RouteInfo, Router};
pub use server::{Server, shutdown_signal};
