use std::{env::var, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging section of the service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Compact }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`, and `RUST_LOG_FORMAT`
/// over `settings.format`.
pub fn init(settings: &LogSettings) -> Result<(), TryInitError> {
    let level = LevelFilter::from_str(&settings.level).unwrap_or(LevelFilter::INFO);
    let format = format_override().unwrap_or(settings.format);
    initialize_tracing(level, format)
}

fn format_override() -> Option<LogFormat> {
    let raw = var("RUST_LOG_FORMAT").ok()?;
    raw.parse()
        .inspect_err(|error| warn!("Ignoring RUST_LOG_FORMAT: {error}"))
        .ok()
}

fn initialize_tracing(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn settings_default_to_info_compact() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, LogFormat::Compact);
        assert_eq!(settings.format.to_string(), "compact");
    }
}
