//! Unified logging system
//!
//! Structured logging through `tracing-subscriber` with configurable output format

use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Log file path; stdout when unset
    pub log_file_path: Option<String>,
    /// Emit a record when spans close, with their duration
    pub log_span_close: bool,
    /// Extra filter directives on top of `level`, e.g. `sqlx=warn`
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            log_file_path: None,
            log_span_close: false,
            filter_directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Replace the base level, keeping any extra directives
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }
}

type InitResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// `RUST_LOG` replaces the configured level and directives entirely
fn build_filter(config: &LoggingConfig, rust_log: Option<&str>) -> InitResult<EnvFilter> {
    if let Some(spec) = rust_log.filter(|spec| !spec.trim().is_empty()) {
        return Ok(EnvFilter::try_new(spec)?);
    }

    let mut filter = EnvFilter::try_new(&config.level)?;
    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Initialize the logging system
pub fn init_logging(config: &LoggingConfig) -> InitResult<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(config, rust_log.as_deref())?;

    let writer = match &config.log_file_path {
        Some(log_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(io::stdout),
    };

    let span_events = if config.log_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_thread_ids(config.include_thread)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_thread_ids(config.include_thread)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_thread_ids(config.include_thread)
                    .with_writer(writer),
            )
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LoggingConfig = toml::from_str("format = \"json\"\nlevel = \"debug\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");
        // unspecified fields fall back to defaults
        assert!(config.filter_directives.is_empty());
        assert!(config.log_file_path.is_none());
    }

    #[test]
    fn test_level_bounds_own_crates() {
        let config = LoggingConfig::default().with_level("warn");
        let filter = build_filter(&config, None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_extra_directives_apply() {
        let mut config = LoggingConfig::default().with_level("warn");
        config.filter_directives = vec!["scouter_web=debug".to_string()];
        let filter = build_filter(&config, None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        config.filter_directives = vec!["scouter_web=loud".to_string()];
        assert!(build_filter(&config, None).is_err());
    }

    #[test]
    fn test_rust_log_overrides_config() {
        let mut config = LoggingConfig::default().with_level("trace");
        config.filter_directives = vec!["scouter_web=trace".to_string()];
        let filter = build_filter(&config, Some("error")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));

        // blank RUST_LOG falls back to the configured level
        let filter = build_filter(&config, Some("  ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
