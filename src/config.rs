//! Process-wide bridge configuration.

use std::sync::{OnceLock, RwLock};

use crate::logging::LogConfig;

/// What releasing or dereferencing a dead handle does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidHandlePolicy {
    /// Log at error level and return `HandleInvalid`.
    #[default]
    Report,
    /// Panic at the offending call.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeConfig {
    pub log: LogConfig,
    pub handle_policy: InvalidHandlePolicy,
}

impl BridgeConfig {
    /// Logging settings plus `GLIB_BRIDGE_STRICT_HANDLES=1` for
    /// [`InvalidHandlePolicy::Panic`].
    pub fn from_env() -> Self {
        let strict = std::env::var("GLIB_BRIDGE_STRICT_HANDLES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            log: LogConfig::from_env(),
            handle_policy: if strict {
                InvalidHandlePolicy::Panic
            } else {
                InvalidHandlePolicy::Report
            },
        }
    }
}

static CONFIG: OnceLock<RwLock<BridgeConfig>> = OnceLock::new();

fn global() -> &'static RwLock<BridgeConfig> {
    CONFIG.get_or_init(|| RwLock::new(BridgeConfig::default()))
}

/// Replace the active configuration.
pub fn install(config: BridgeConfig) {
    match global().write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// The active configuration, or the default if none was installed.
pub fn current() -> BridgeConfig {
    global()
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

pub(crate) fn handle_policy() -> InvalidHandlePolicy {
    global()
        .read()
        .map(|c| c.handle_policy)
        .unwrap_or_default()
}
