use std::collections::HashMap;
use tracing::{debug, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const DEFAULT_DIRECTIVE: &str = "info";
const LOG_LEVEL: &str = "LOG_LEVEL";

/// `RUST_LOG` wins, then the launcher's `LOG_LEVEL`, then `info`.
pub fn directive(rust_log: Option<String>, log_level: Option<String>) -> String {
    rust_log
        .or(log_level)
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Handle on the installed filter. The launcher's `LOG_LEVEL` usually
/// arrives in the handoff, after logging is already up.
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevel {
    /// Re-reads `LOG_LEVEL` from the handed-off environment. A handed-off
    /// value beats the process one; `RUST_LOG` still beats both.
    pub fn apply_handoff(&self, environment: &HashMap<String, String>) {
        let handed_off = environment.get(LOG_LEVEL).cloned();
        let directive = directive(
            std::env::var("RUST_LOG").ok(),
            handed_off.or_else(|| std::env::var(LOG_LEVEL).ok()),
        );

        match EnvFilter::try_new(&directive) {
            Ok(filter) => match self.handle.reload(filter) {
                Ok(()) => debug!(%directive, "Applied job log level"),
                Err(e) => warn!(error = %e, "Failed to apply job log level"),
            },
            Err(e) => warn!(%directive, error = %e, "Ignoring invalid job log level"),
        }
    }
}

fn filter_from_process_env() -> EnvFilter {
    let directive = directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var(LOG_LEVEL).ok(),
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

pub fn init() -> LogLevel {
    let (filter, handle) = reload::Layer::new(filter_from_process_env());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    LogLevel { handle }
}
