//! Tracing subscriber setup.
//!
//! Logs always go to stderr: in `serve mcp` mode stdout carries the
//! protocol stream. The filter comes from `DOCVAL_LOG`, then `RUST_LOG`,
//! then defaults to `info`. `DOCVAL_LOG_FORMAT=json` switches to JSON lines.

use anyhow::Result;
use std::env;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "DOCVAL_LOG";
pub const LOG_FORMAT_ENV: &str = "DOCVAL_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Filter directives from the environment, or `info`.
fn filter_directives() -> String {
    env::var(LOG_ENV)
        .or_else(|_| env::var("RUST_LOG"))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging() -> Result<()> {
    let env_filter = EnvFilter::try_new(filter_directives()).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry();

    let installed = match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_filter(env_filter);
            registry.with(layer).try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_ansi(false)
                .with_filter(env_filter);
            registry.with(layer).try_init()
        }
    };
    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
    Ok(())
}
