//! Tracing setup for the CLI
//!
//! Command results go to stdout, so log events are written to stderr. `RUST_LOG`
//! replaces the configured level; database driver targets stay at `warn`
//! unless the filter names them.

use std::io;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    filter::ParseError,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

const DRIVER_DEFAULTS: &[(&str, &str)] = &[("sqlx", "sqlx=warn"), ("sea_orm", "sea_orm=warn")];

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("unknown log format '{0}', expected 'json' or 'pretty'")]
    UnknownFormat(String),
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryInitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(TelemetryInitError::UnknownFormat(value.to_string())),
        }
    }
}

/// Builds the event filter from `base` directives, adding the driver defaults
/// for targets `base` leaves unmentioned.
pub fn build_filter(base: &str) -> Result<EnvFilter, TelemetryInitError> {
    let mut filter = EnvFilter::try_new(base)?;
    for (target, directive) in DRIVER_DEFAULTS {
        if !base.contains(target) {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    Ok(filter)
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    let format: LogFormat = config.log_format.parse()?;
    let base = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.log_level.clone());
    let filter = build_filter(&base)?;

    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    // sqlx and sea-orm log through `log`
    let bridge = LogTracer::init();

    let layer = match format {
        LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(io::stderr).boxed(),
    };
    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
    {
        INSTALLED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    if let Err(err) = bridge {
        debug!(error = %err, "log bridge already installed");
    }
    Ok(())
}
