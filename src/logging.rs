//! Structured logging for the bridge.
//!
//! Library code only emits `tracing` events. Applications (and tests) opt in
//! to output by calling [`init`] or [`init_with_config`].
//!
//! Event targets:
//! - `glib_bridge::closure`: degraded closure calls, conversion failures
//! - `glib_bridge::signal`: definition, connection and emission
//! - `glib_bridge::subclass`: registration and trampolines
//! - `glib_bridge::handle`: invalid or double release
//! - `glib_bridge::callback`: panics caught at the native boundary
//! - `glib_bridge::value`: marshaler registration
//! - `glib`: warnings from the native runtime

use std::io;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,
    /// Log span enter/close events.
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Read `GLIB_BRIDGE_LOG_LEVEL`, `GLIB_BRIDGE_LOG_JSON` and
    /// `GLIB_BRIDGE_LOG_SPANS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("GLIB_BRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(config.level);
        }
        config.json_format = std::env::var("GLIB_BRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("GLIB_BRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Everything down to `trace`, with spans.
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            json_format: false,
            show_spans: true,
        }
    }

    fn directives(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        format!("glib_bridge={level},glib={level}")
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging from the environment.
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Install the global subscriber. Later calls are no-ops, as is losing the
/// race against a subscriber installed elsewhere.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.directives()));

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = if config.json_format {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_span_events(span_events)
                        .with_target(true),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_span_events(span_events)
                        .with_target(true)
                        .with_thread_ids(cfg!(debug_assertions)),
                )
                .try_init()
        };
        if result.is_err() {
            tracing::debug!(target: "glib_bridge", "a global subscriber was already installed");
        }
    });
}
