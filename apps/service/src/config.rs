use std::{env, fmt, fs, io, path, time::Duration};

use logger::LogSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides `[database] path`
pub const DATABASE_PATH_ENV: &str = "SENTINEL_DATABASE_PATH";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub prober: ProberConfig,
    pub monitors: MonitorPolicy,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "sentinel.db".into(), pool_size: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause between the end of one cycle and the start of the next
    pub cycle_delay_seconds: u64,
    /// Monitors probed at once inside a cycle; 1 keeps checks sequential
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { cycle_delay_seconds: 10, max_concurrent_checks: 1 }
    }
}

impl SchedulerConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3_000,
            read_timeout_ms: 3_000,
            user_agent: concat!("sentinel/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ProberConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Rules applied when monitors are created or edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorPolicy {
    pub min_interval_seconds: u32,
    pub default_interval_seconds: u32,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self { min_interval_seconds: 30, default_interval_seconds: 300 }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sentinel/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("sentinel/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Cycle Delay (s)", &self.scheduler.cycle_delay_seconds)?;
        write_1(f, "Max Concurrent Checks", &self.scheduler.max_concurrent_checks)?;
        write_title_1(f, "Prober")?;
        write_1(f, "Connect Timeout (ms)", &self.prober.connect_timeout_ms)?;
        write_1(f, "Read Timeout (ms)", &self.prober.read_timeout_ms)?;
        write_1(f, "User Agent", &self.prober.user_agent)?;
        write_title_1(f, "Monitors")?;
        write_1(f, "Minimum Interval (s)", &self.monitors.min_interval_seconds)?;
        write_1(f, "Default Interval (s)", &self.monitors.default_interval_seconds)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/sentinel/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| Error::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply environment overrides on top of the file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env::var_os(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database.path = path.into();
        }
    }
}
