//! Configuration module for the zkv server.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "zkv")]
#[command(version)]
#[command(about = "A key-value server speaking a compressed text protocol", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (default: 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default: 8888)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// File the store is persisted to (default: config.txt)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Seconds between dirty checks of the store
    #[arg(long)]
    pub flush_interval: Option<u64>,

    /// Seconds between statistics reports
    #[arg(long)]
    pub stats_interval: Option<u64>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Skip writing the store one last time on shutdown
    #[arg(long)]
    pub no_final_flush: bool,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub stats: StatsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Backing file of the store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Seconds between dirty checks
    #[serde(default = "default_interval")]
    pub flush_interval_secs: u64,
    /// Write the store once more during shutdown
    #[serde(default = "default_final_flush")]
    pub final_flush: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            flush_interval_secs: default_interval(),
            final_flush: default_final_flush(),
        }
    }
}

/// Statistics reporting configuration
#[derive(Debug, Deserialize)]
pub struct StatsSection {
    /// Seconds between reports
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for StatsSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    crate::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    crate::DEFAULT_PORT
}

fn default_store_path() -> PathBuf {
    PathBuf::from(crate::DEFAULT_STORE_FILE)
}

fn default_interval() -> u64 {
    5
}

fn default_final_flush() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
    pub flush_interval: Duration,
    pub stats_interval: Duration,
    pub workers: Option<usize>,
    pub log_level: String,
    pub final_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolves already-parsed CLI arguments, reading the TOML file they name.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref config_path) => {
                let contents = std::fs::read_to_string(config_path)
                    .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
                toml::from_str(&contents)
                    .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
            }
            None => TomlConfig::default(),
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            store_path: cli.store.unwrap_or(toml_config.storage.path),
            flush_interval: Duration::from_secs(
                cli.flush_interval
                    .unwrap_or(toml_config.storage.flush_interval_secs)
                    .max(1),
            ),
            stats_interval: Duration::from_secs(
                cli.stats_interval
                    .unwrap_or(toml_config.stats.interval_secs)
                    .max(1),
            ),
            workers: cli.workers.or(toml_config.server.workers),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
            final_flush: !cli.no_final_flush && toml_config.storage.final_flush,
        }
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the worker thread count, defaulting to the hardware parallelism.
    pub fn worker_threads(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0:?}: {1}")]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0:?}: {1}")]
    TomlParse(PathBuf, #[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8888");
        assert_eq!(config.store_path, PathBuf::from("config.txt"));
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.stats_interval, Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
        assert!(config.final_flush);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 9999
            workers = 4

            [storage]
            path = "/var/lib/zkv/store.json"
            flush_interval_secs = 10
            final_flush = false

            [stats]
            interval_secs = 30

            [logging]
            level = "debug"
        "#;

        let toml_config: TomlConfig = toml::from_str(toml_str).unwrap();
        let config = Config::merge(CliArgs::default(), toml_config);

        assert_eq!(config.bind_address(), "0.0.0.0:9999");
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.worker_threads(), 4);
        assert_eq!(config.store_path, PathBuf::from("/var/lib/zkv/store.json"));
        assert_eq!(config.flush_interval, Duration::from_secs(10));
        assert_eq!(config.stats_interval, Duration::from_secs(30));
        assert_eq!(config.log_level, "debug");
        assert!(!config.final_flush);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            port = 9999

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();

        let cli = CliArgs::try_parse_from([
            "zkv",
            "--port",
            "7000",
            "--log-level",
            "trace",
            "--no-final-flush",
        ])
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.log_level, "trace");
        assert!(!config.final_flush);
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let cli = CliArgs::try_parse_from(["zkv", "--flush-interval", "0", "--stats-interval", "0"])
            .unwrap();
        let config = Config::merge(cli, TomlConfig::default());
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.stats_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        let err = Config::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_, _)));
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zkv.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let cli = CliArgs {
            config: Some(path),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_cli(cli).unwrap_err(),
            ConfigError::TomlParse(_, _)
        ));
    }
}
