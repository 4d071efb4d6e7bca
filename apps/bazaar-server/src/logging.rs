use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*};

use crate::config::LoggingConfig;

fn parse_level(s: &str) -> LevelFilter {
    match s.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Console layer plus an optional daily-rolling file layer.
pub fn init_logging(config: &LoggingConfig) {
    let stdout_log = fmt::layer()
        .compact()
        .with_filter(parse_level(&config.console_level));

    let file_log = config.file.as_ref().map(|file| {
        let path = Path::new(file);
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bazaar.log".to_string());

        fmt::layer()
            .compact()
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::daily(directory, file_name))
            .with_filter(parse_level(&config.file_level))
    });

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(file_log)
        .init();
}
