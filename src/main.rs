use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use ollama_gateway::{
    Logger, LoggingConfig, OllamaClient, Server, Settings, app, load_json_file,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("reading settings")?;

    let logging: LoggingConfig = load_json_file(&settings.logging_path)?;
    // Held until the end of main: dropping it flushes the file writer.
    let logger = Logger::init(&logging, &settings)?;

    let model = OllamaClient::new(&settings.ollama_model, &settings.ollama_url)?;
    info!(
        model = %settings.ollama_model,
        url = %settings.ollama_url,
        timeout_secs = settings.request_timeout.as_secs(),
        "starting ollama-gateway"
    );

    let router = app::create_app(&settings, Arc::new(model));

    Server::bind(settings.socket_addr()?)
        .suppress_access_log(logger.suppressed_paths())
        .drain_timeout(settings.request_timeout)
        .serve(router)
        .await?;

    drop(logger);
    Ok(())
}
