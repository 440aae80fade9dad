//! Logging setup for the dose-calc tools
//!
//! Console output goes to stderr so command results on stdout stay clean.
//! `RUST_LOG`, when set, overrides the configured level.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-03-02T00:50:44.809112Z [WARN] Unknown special case: HEPARIN`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "warn,dose_calc=debug"
    pub level: String,
    /// Emit one JSON object per event instead of text
    pub enable_json: bool,
    /// Color the level tag
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_json: false,
            ansi: true,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            enable_json: config.json,
            ..Default::default()
        }
    }
}

/// Build the event filter, preferring `RUST_LOG` over the configured level
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(env_str) = std::env::var("RUST_LOG") {
        if !env_str.trim().is_empty() {
            return EnvFilter::try_new(&env_str)
                .map_err(|e| Error::Logging(format!("Invalid RUST_LOG '{}': {}", env_str, e)));
        }
    }
    EnvFilter::try_new(level)
        .map_err(|e| Error::Logging(format!("Invalid log level '{}': {}", level, e)))
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_with_config(config: &LogConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let console_layer = if config.enable_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_level(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Initialize text logging at a fixed level
pub fn init(level: &str) -> Result<()> {
    init_with_config(&LogConfig {
        level: level.to_string(),
        ..Default::default()
    })
}
