//! Configuration module for the tally server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the tally server
#[derive(Parser, Debug)]
#[command(name = "tally-server")]
#[command(author = "tally-server authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-protocol voting server", long_about = None)]
pub struct CliArgs {
    /// Voting options (at least two single-word options)
    #[arg(value_name = "OPTIONS")]
    pub options: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:7777)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Number of connections served concurrently
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// File that receives one line per accepted request
    #[arg(long)]
    pub request_log: Option<PathBuf>,

    /// Seconds to wait for a client's request line (no limit when unset)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tally: TallyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Worker pool capacity
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Request line deadline in seconds
    pub read_timeout: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: default_workers(),
            read_timeout: None,
        }
    }
}

/// Voting options, used when none are given on the command line
#[derive(Debug, Deserialize, Default)]
pub struct TallyConfig {
    #[serde(default)]
    pub options: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Operator log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Request log path
    #[serde(default = "default_request_log")]
    pub request_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            request_log: default_request_log(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:7777".to_string()
}

fn default_workers() -> usize {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_log() -> PathBuf {
    PathBuf::from("log.txt")
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub options: Vec<String>,
    pub workers: usize,
    pub request_log: PathBuf,
    pub read_timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let options = if cli.options.is_empty() {
            toml_config.tally.options
        } else {
            cli.options
        };

        let workers = cli.workers.unwrap_or(toml_config.server.workers);
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            options: normalize_options(options)?,
            workers,
            request_log: cli
                .request_log
                .unwrap_or(toml_config.logging.request_log),
            read_timeout: cli
                .read_timeout
                .or(toml_config.server.read_timeout)
                .map(Duration::from_secs),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Validate option tokens and collapse duplicates, keeping first-seen order.
pub fn normalize_options<I>(options: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut distinct: Vec<String> = Vec::new();
    for option in options {
        if option.is_empty() || option.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidOption(option));
        }
        if !distinct.contains(&option) {
            distinct.push(option);
        }
    }

    if distinct.len() < 2 {
        return Err(ConfigError::TooFewOptions(distinct.len()));
    }
    Ok(distinct)
}
