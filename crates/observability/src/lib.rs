//! Process-wide tracing setup shared by every edugate binary and test harness.

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV: &str = "EDUGATE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable single-line output for local runs.
    Compact,
}

impl LogFormat {
    /// Read `EDUGATE_LOG_FORMAT` through `lookup`; unknown values mean JSON.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(LOG_FORMAT_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "compact" || v == "pretty" || v == "text" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// Initialize tracing for the process from `RUST_LOG` and `EDUGATE_LOG_FORMAT`.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    init_with(LogFormat::from_lookup(|key| std::env::var(key).ok()));
}

pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(?format, "tracing initialized");
    }
}
