use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    config::{LogConfig, LogFormat},
    error::SensorError,
};

const APP_NAME: &str = "level-sensor";
const LOG_FILE: &str = "level-sensor.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process, dropping it flushes the log file.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, SensorError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_writer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false))
            .with(file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer)))
            .try_init(),
        LogFormat::Json => registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(APP_NAME.into(), std::io::stdout))
            .with(file_writer.map(|writer| BunyanFormattingLayer::new(APP_NAME.into(), writer)))
            .try_init(),
    };
    installed.map_err(|e| SensorError::Telemetry(e.to_string()))?;
    Ok(guard)
}
