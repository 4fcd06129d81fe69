//! Logging
//!
//! Diagnostics go to stderr so that demo output on stdout stays clean.

use crate::config::DEFAULT_LOG_FILTER;
use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// # Arguments
/// * `log_level` - filter directive (trace, debug, info, warn, error, or a full
///   `EnvFilter` string); if `None` `RUST_LOG` is used, then the default
/// * `log_file` - also append plain-text logs to this file
///
/// # Examples
/// ```no_run
/// use sysdemo::utils::logger::init_logger;
///
/// init_logger(None, None).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = if let Some(level) = log_level {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(true)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing::debug!("Logger initialized");
    Ok(())
}
