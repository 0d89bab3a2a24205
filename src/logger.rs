//! Process-wide logging.
//!
//! Logging is set up once, explicitly, by [`Logger::init`] from a
//! [`LoggingConfig`] (usually loaded from `logging.json`) and the two levels in
//! [`Settings`]. The returned [`Logger`] is held by `main`; dropping it at
//! shutdown flushes the file writer, if any.
//!
//! Everything in the crate logs through plain `tracing` macros, which skip
//! formatting entirely when the level is disabled. Two targets matter:
//!
//! - [`LOG_TARGET`]: the gateway's own lines, at `app_log_level`.
//! - [`ACCESS_LOG_TARGET`]: one line per request, at `server_log_level`.
//!   Paths listed in `suppress_paths` never produce an access line.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Deserialize;
use tracing::{Level, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::config::Settings;
use crate::error::Error;

/// Target of the gateway's own log lines.
pub const LOG_TARGET: &str = "ollama_gateway";

/// Target of the per-request access log.
pub const ACCESS_LOG_TARGET: &str = "ollama_gateway::access";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static INSTALLED: OnceLock<FilterHandle> = OnceLock::new();

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Daily-rolling file output.
#[derive(Clone, Debug, Deserialize)]
pub struct FileOutput {
    pub directory: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub prefix: String,
}

fn default_file_prefix() -> String {
    "ollama-gateway".to_owned()
}

/// Shape of the JSON logging configuration file.
///
/// ```json
/// {
///   "level": "info",
///   "format": "json",
///   "targets": { "hyper": "warn" },
///   "suppress_paths": ["/metrics", "/healthcheck"],
///   "file": { "directory": "/var/log/gateway" }
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level for every target not listed elsewhere.
    pub level: String,
    pub format: LogFormat,
    /// Extra `target = level` directives.
    pub targets: BTreeMap<String, String>,
    /// Request paths that never produce an access-log line.
    pub suppress_paths: Vec<String>,
    pub file: Option<FileOutput>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Compact,
            targets: BTreeMap::new(),
            suppress_paths: vec!["/metrics".to_owned()],
            file: None,
        }
    }
}

/// Handle on the installed logging stack.
pub struct Logger {
    filter: FilterHandle,
    /// Directives from the config file, without the two settings-driven ones.
    base: String,
    server_level: String,
    app_level: Mutex<String>,
    suppress_paths: Arc<[String]>,
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Installs the global subscriber.
    ///
    /// Calling this again in the same process does not stack a second set of
    /// output layers: the already-installed filter is reloaded with the new
    /// levels and the output layers stay as first configured.
    ///
    /// `RUST_LOG`, when set, replaces the computed filter on first install.
    pub fn init(config: &LoggingConfig, settings: &Settings) -> Result<Self, Error> {
        let base = base_directives(config);
        let directives = directives(&base, &settings.app_log_level, &settings.server_log_level);
        let filter = parse_filter(&directives)?;

        if let Some(handle) = INSTALLED.get() {
            handle.reload(filter).map_err(|e| Error::Logging(e.to_string()))?;
            debug!(target: LOG_TARGET, %directives, "logging reconfigured");
            return Ok(Self::new(handle.clone(), base, config, settings, None));
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or(filter);
        let (filter, handle) = reload::Layer::new(filter);

        let stdout = match config.format {
            LogFormat::Compact => fmt::layer().compact().boxed(),
            LogFormat::Pretty => fmt::layer().pretty().boxed(),
            LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        };

        let (file, guard) = match &config.file {
            Some(out) => {
                let appender = tracing_appender::rolling::daily(&out.directory, &out.prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout)
            .with(file)
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;

        // A concurrent init lost the race for the global subscriber above, so
        // this set cannot fail for the winner.
        let handle = INSTALLED.get_or_init(|| handle).clone();
        debug!(target: LOG_TARGET, %directives, "logging initialized");

        Ok(Self::new(handle, base, config, settings, guard))
    }

    fn new(
        filter: FilterHandle,
        base: String,
        config: &LoggingConfig,
        settings: &Settings,
        guard: Option<WorkerGuard>,
    ) -> Self {
        Self {
            filter,
            base,
            server_level: settings.server_log_level.clone(),
            app_level: Mutex::new(settings.app_log_level.clone()),
            suppress_paths: config.suppress_paths.iter().cloned().collect(),
            _guard: guard,
        }
    }

    /// Changes the level of the gateway's own log lines at runtime.
    pub fn set_level(&self, level: &str) -> Result<(), Error> {
        let filter = parse_filter(&directives(&self.base, level, &self.server_level))?;
        self.filter.reload(filter).map_err(|e| Error::Logging(e.to_string()))?;
        if let Ok(mut current) = self.app_level.lock() {
            *current = level.to_owned();
        }
        Ok(())
    }

    pub fn level(&self) -> String {
        self.app_level.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Paths that must not produce access-log lines.
    pub fn suppressed_paths(&self) -> Arc<[String]> {
        Arc::clone(&self.suppress_paths)
    }
}

fn base_directives(config: &LoggingConfig) -> String {
    let mut out = config.level.clone();
    for (target, level) in &config.targets {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

fn directives(base: &str, app_level: &str, server_level: &str) -> String {
    format!("{base},{LOG_TARGET}={app_level},{ACCESS_LOG_TARGET}={server_level}")
}

fn parse_filter(directives: &str) -> Result<EnvFilter, Error> {
    EnvFilter::try_new(directives).map_err(|e| Error::Logging(format!("`{directives}`: {e}")))
}

// ── Retry attempts ────────────────────────────────────────────────────────────

/// Builds the retry-attempt message: attempt count, error summary and full
/// cause chain, or a note that no error was captured.
pub fn format_retry_attempt(attempt: u32, error: Option<&anyhow::Error>) -> String {
    match error {
        Some(e) => format!("Retrying for {attempt} time(s) due to: {e}\n{e:?}"),
        None => format!("Retrying for {attempt} time(s). No exception captured."),
    }
}

/// Logs a retry attempt at debug. The message is only built when debug is
/// enabled for [`LOG_TARGET`].
pub fn log_retry_attempt(attempt: u32, error: Option<&anyhow::Error>) {
    if tracing::enabled!(target: LOG_TARGET, Level::DEBUG) {
        debug!(target: LOG_TARGET, "{}", format_retry_attempt(attempt, error));
    }
}
