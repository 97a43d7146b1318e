//! Structured logging for the topicsql CLI
//!
//! Logs go to stderr (or a daily-rotated file) so stdout carries only the
//! rewritten SQL.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "topicsql.log";

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// JSON format (structured logging)
    Json,
    /// Single-line format
    Compact,
}

impl LogFormat {
    /// Parse from environment variable
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") => LogFormat::Pretty,
            Ok("compact") | Ok(_) => LogFormat::Compact,
            Err(_) => LogFormat::Compact,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr only
    Stderr,
    /// Log to file only
    File,
    /// Log to both stderr and file
    Both,
}

impl LogOutput {
    /// Parse from environment variable
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            Ok("stderr") | Ok(_) => LogOutput::Stderr,
            Err(_) => LogOutput::Stderr,
        }
    }
}

/// Initialize the logging system
///
/// Environment variables:
/// - `RUST_LOG`: Log level (e.g., "debug", "topicsql_rewrite=debug")
/// - `LOG_FORMAT`: Output format ("pretty", "json", "compact")
/// - `LOG_OUTPUT`: Where to write logs ("stderr", "file", "both")
/// - `LOG_DIR`: Directory for log files (default: "./logs")
///
/// Examples:
/// ```bash
/// # See every fallback the rewriter takes
/// RUST_LOG=topicsql_rewrite=debug topicsql rewrite "SELECT a FROM t"
///
/// # JSON to file
/// LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/topicsql topicsql shot < query.sql
/// ```
pub fn init() {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Filter out noisy third-party crates
    for directive in ["sqlx=warn", "tokio=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    match (output, format) {
        (LogOutput::Stderr, LogFormat::Pretty) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr).with_target(true))
                .init();
        }
        (LogOutput::Stderr, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
                .init();
        }
        (LogOutput::Stderr, LogFormat::Compact) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
        (LogOutput::File, _) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(file_appender()).with_ansi(false))
                .init();
        }
        (LogOutput::Both, format) => {
            let stderr_layer = match format {
                LogFormat::Pretty => fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .boxed(),
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .boxed(),
                LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
            };

            let file_layer = fmt::layer()
                .with_writer(file_appender())
                .with_ansi(false)
                .boxed();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
    }

    tracing::debug!(format = ?format, output = ?output, "logging initialized");
}

fn file_appender() -> RollingFileAppender {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&log_dir).ok();
    RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_env() {
        std::env::set_var("LOG_FORMAT", "json");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);

        std::env::set_var("LOG_FORMAT", "pretty");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);

        std::env::set_var("LOG_FORMAT", "compact");
        assert_eq!(LogFormat::from_env(), LogFormat::Compact);

        std::env::remove_var("LOG_FORMAT");
        assert_eq!(LogFormat::from_env(), LogFormat::Compact);
    }

    #[test]
    fn test_log_output_from_env() {
        std::env::set_var("LOG_OUTPUT", "file");
        assert_eq!(LogOutput::from_env(), LogOutput::File);

        std::env::set_var("LOG_OUTPUT", "both");
        assert_eq!(LogOutput::from_env(), LogOutput::Both);

        std::env::set_var("LOG_OUTPUT", "stderr");
        assert_eq!(LogOutput::from_env(), LogOutput::Stderr);

        std::env::remove_var("LOG_OUTPUT");
        assert_eq!(LogOutput::from_env(), LogOutput::Stderr);
    }
}
