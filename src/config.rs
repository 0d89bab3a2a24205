//! Service settings.
//!
//! Values come from environment variables, with a `.env` file in the working
//! directory as fallback. Anything unset keeps its default.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `SERVER_LOG_LEVEL` | `info` |
//! | `APP_LOG_LEVEL` | `debug` |
//! | `LOGGING_PATH` | `logging.json` |
//! | `OLLAMA_MODEL` | `llama3.1:8b` |
//! | `OLLAMA_URL` | `http://ollama.kubert-assistant.svc.cluster.local:11434` |
//! | `REQUEST_TIMEOUT` | `300` (seconds) |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue { key: &'static str, value: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Level for the HTTP access log.
    pub server_log_level: String,
    /// Level for the gateway's own log lines.
    pub app_log_level: String,
    /// JSON logging configuration file.
    pub logging_path: PathBuf,
    pub ollama_model: String,
    pub ollama_url: String,
    /// Upper bound on one request's handling time.
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            server_log_level: "info".to_owned(),
            app_log_level: "debug".to_owned(),
            logging_path: PathBuf::from("logging.json"),
            ollama_model: "llama3.1:8b".to_owned(),
            ollama_url: "http://ollama.kubert-assistant.svc.cluster.local:11434".to_owned(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and reads settings from the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. `from_env` is this with
    /// `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(v) = lookup("HOST") {
            settings.host = v;
        }
        if let Some(v) = lookup("PORT") {
            settings.port = parse("PORT", v)?;
        }
        if let Some(v) = lookup("SERVER_LOG_LEVEL") {
            settings.server_log_level = v;
        }
        if let Some(v) = lookup("APP_LOG_LEVEL") {
            settings.app_log_level = v;
        }
        if let Some(v) = lookup("LOGGING_PATH") {
            settings.logging_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            settings.ollama_model = v;
        }
        if let Some(v) = lookup("OLLAMA_URL") {
            settings.ollama_url = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT") {
            settings.request_timeout = Duration::from_secs(parse("REQUEST_TIMEOUT", v)?);
        }

        Ok(settings)
    }

    /// The address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = parse("HOST", self.host.clone())?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidValue { key, reason: e.to_string(), value })
}
