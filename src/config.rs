use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::services::clusterer::{ClustererOptions, FeatureWeights};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub status_check: StatusCheckConfig,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Optional DDL file overriding the embedded schema
    pub ddl_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Background source status refresh settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusCheckConfig {
    /// Refresh interval in seconds (default: 1800)
    pub interval_secs: u64,
    /// Per-probe HTTP timeout in seconds (default: 10)
    pub probe_timeout_secs: u64,
    /// Whether the periodic refresh runs at startup (default: true)
    pub enabled: bool,
}

/// Clusterer tuning knobs, forwarded into [`ClustererOptions`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub eps: f64,
    pub min_samples: usize,
    pub similarity_threshold: f64,
    pub time_window_days: f64,
    pub n_topics: usize,
    pub title_tfidf_weight: f64,
    pub content_tfidf_weight: f64,
    pub entity_weight: f64,
    pub topic_weight: f64,
    pub time_proximity_weight: f64,
}

impl ClusteringConfig {
    pub fn to_options(&self) -> ClustererOptions {
        ClustererOptions {
            eps: self.eps,
            min_samples: self.min_samples,
            similarity_threshold: self.similarity_threshold,
            time_window_days: self.time_window_days,
            n_topics: self.n_topics,
            weights: FeatureWeights {
                title_tfidf: self.title_tfidf_weight,
                content_tfidf: self.content_tfidf_weight,
                entity: self.entity_weight,
                topic: self.topic_weight,
                time_proximity: self.time_proximity_weight,
            }
            .normalized(),
        }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "lantern")]
#[command(version, about = "Lantern - News Analysis Workbench")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g. "info,lantern=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Source status refresh interval in seconds (overrides config file)
    #[arg(long, value_name = "SECS")]
    pub status_interval_secs: Option<u64>,

    /// Enable/disable the periodic status refresh (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub status_enabled: Option<bool>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file
    /// support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with_args(&cli_args)
    }

    pub fn load_with_args(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Supported environment variables:
    /// - APP_SERVER_HOST, APP_SERVER_PORT
    /// - APP_DATABASE_URL
    /// - APP_LOG_LEVEL
    /// - APP_STATUS_INTERVAL_SECS, APP_STATUS_ENABLED
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(interval) = std::env::var("APP_STATUS_INTERVAL_SECS")
            && let Ok(interval) = interval.parse()
        {
            self.status_check.interval_secs = interval;
            tracing::info!(
                "Override status_check.interval_secs from env: {}",
                self.status_check.interval_secs
            );
        }

        if let Ok(enabled) = std::env::var("APP_STATUS_ENABLED")
            && let Ok(enabled) = enabled.parse()
        {
            self.status_check.enabled = enabled;
            tracing::info!("Override status_check.enabled from env: {}", enabled);
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(interval) = args.status_interval_secs {
            self.status_check.interval_secs = interval;
            tracing::info!("Override status_check.interval_secs from CLI: {}", interval);
        }

        if let Some(enabled) = args.status_enabled {
            self.status_check.enabled = enabled;
            tracing::info!("Override status_check.enabled from CLI: {}", enabled);
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.status_check.interval_secs == 0 {
            anyhow::bail!("status_check.interval_secs must be > 0");
        }
        if self.clustering.min_samples == 0 {
            anyhow::bail!("clustering.min_samples must be > 0");
        }
        if !(0.0..=1.0).contains(&self.clustering.eps) {
            anyhow::bail!("clustering.eps must be within 0..=1");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/lantern.db".to_string(), ddl_path: None }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,lantern=debug".to_string(),
            file: Some("logs/lantern.log".to_string()),
        }
    }
}

impl Default for StatusCheckConfig {
    fn default() -> Self {
        Self { interval_secs: 1800, probe_timeout_secs: 10, enabled: true }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        let options = ClustererOptions::default();
        Self {
            eps: options.eps,
            min_samples: options.min_samples,
            similarity_threshold: options.similarity_threshold,
            time_window_days: options.time_window_days,
            n_topics: options.n_topics,
            title_tfidf_weight: options.weights.title_tfidf,
            content_tfidf_weight: options.weights.content_tfidf,
            entity_weight: options.weights.entity,
            topic_weight: options.weights.topic,
            time_proximity_weight: options.weights.time_proximity,
        }
    }
}
