//! Runtime settings that are not part of a single extraction: logging, env fallbacks.
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const FETCH_TIMEOUT_ENV: &str = "APISPEC_FETCH_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogLevel {
    #[value(alias = "panic", alias = "fatal")]
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// `apispec` logs at this level; dependencies never go below `warn`.
    pub fn filter(&self) -> String {
        format!("warn,apispec={}", self.as_directive())
    }
}

/// Diagnostics go to stderr so stdout stays a clean document. `RUST_LOG` wins when set.
pub fn init_tracing(level: LogLevel) {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| level.filter());

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false));

    if subscriber.try_init().is_err() {
        tracing::warn!("tracing subscriber already initialised");
    }
}
