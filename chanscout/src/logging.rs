use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::ScanConfig;
use crate::errors::{SearchError, SearchResult};

/// Installs the global subscriber writing to the configured log file.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if the log
/// file cannot be opened, the level does not parse, or a subscriber is
/// already installed.
pub fn init_logging(config: &ScanConfig) -> SearchResult<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .map_err(|e| {
            SearchError::config_error(format!(
                "cannot open log file {}: {}",
                config.log_file.display(),
                e
            ))
        })?;

    let env_directives = std::env::var("RUST_LOG").ok();
    let filter = log_filter(env_directives.as_deref(), &config.log_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| SearchError::config_error(format!("failed to install logger: {}", e)))
}

fn log_filter(env_directives: Option<&str>, level: &str) -> SearchResult<EnvFilter> {
    let directives = match env_directives {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ => level,
    };
    EnvFilter::try_new(directives)
        .map_err(|e| SearchError::config_error(format!("invalid log level {:?}: {}", directives, e)))
}
