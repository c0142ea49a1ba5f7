//! Logging setup
//!
//! Two layers over one registry: a daily-rotated file under the log
//! directory (plain or JSON lines) and a quiet stderr layer so log lines do
//! not interleave with the console transcript. `RUST_LOG` overrides the file
//! filter; `-v` raises the stderr level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::AppConfig;
use crate::core::{AgentError, AgentResult};

/// Log file name prefix; rotation appends the date
pub const LOG_FILE: &str = "voice-agent.log";

const DEFAULT_FILE_FILTER: &str = "voice_agent=info";

/// Stderr filter for a `-v` count
pub fn console_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "voice_agent=warn",
        1 => "voice_agent=info",
        2 => "voice_agent=debug",
        _ => "voice_agent=trace",
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_logging(config: &AppConfig) -> AgentResult<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER));

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let (json_layer, text_layer) = if config.log_json {
        let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
        (Some(layer.with_filter(file_filter)), None)
    } else {
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (None, Some(layer.with_filter(file_filter)))
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(console_filter(config.verbose)));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AgentError::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        "[Logging] Writing logs to {}",
        config.log_dir.join(LOG_FILE).display()
    );
    Ok(guard)
}
