// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@trade";

/// Ingestion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Feed connection
    pub feed: FeedConfig,

    /// Queue and worker pool sizing
    pub pipeline: PipelineConfig,

    /// Storage, query and retention settings
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint of the trade stream
    pub url: String,

    /// Delay before the reconnect attempt after an abnormal close, in milliseconds
    pub reconnect_delay_ms: u64,

    /// Give up on a connection attempt after this many milliseconds
    pub handshake_timeout_ms: u64,
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of buffered events before new ones are dropped
    pub queue_capacity: usize,

    /// Number of concurrent persistence workers
    pub worker_count: usize,

    /// How long shutdown waits for workers to drain, in milliseconds
    pub shutdown_grace_ms: u64,
}

impl PipelineConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Symbol reported by the stats query
    pub stats_symbol: String,

    /// Drop trades older than this many hours (disabled when unset)
    pub retention_hours: Option<u64>,

    /// Period of the retention sweep in seconds
    pub retention_sweep_secs: u64,
}

impl StorageConfig {
    pub fn retention(&self) -> Option<chrono::Duration> {
        self.retention_hours
            .and_then(|hours| i64::try_from(hours).ok())
            .map(chrono::Duration::hours)
    }

    pub fn retention_sweep(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_secs.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

/// Read an optional setting. Set but unparseable values are rejected.
fn env_parse_opt<T: FromStr>(key: &str) -> AppResult<Option<T>> {
    env::var(key)
        .ok()
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid {} value: {}", key, value)))
        })
        .transpose()
}

fn env_parse<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    Ok(env_parse_opt(key)?.unwrap_or(default))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let feed = FeedConfig {
            url: env::var("FEED_URL").unwrap_or(defaults.feed.url),
            reconnect_delay_ms: env_parse("RECONNECT_DELAY_MS", defaults.feed.reconnect_delay_ms)?,
            handshake_timeout_ms: env_parse(
                "HANDSHAKE_TIMEOUT_MS",
                defaults.feed.handshake_timeout_ms,
            )?,
        };

        let pipeline = PipelineConfig {
            queue_capacity: env_parse("QUEUE_CAPACITY", defaults.pipeline.queue_capacity)?,
            worker_count: env_parse("WORKER_COUNT", defaults.pipeline.worker_count)?,
            shutdown_grace_ms: env_parse("SHUTDOWN_GRACE_MS", defaults.pipeline.shutdown_grace_ms)?,
        };

        let storage = StorageConfig {
            stats_symbol: env::var("STATS_SYMBOL").unwrap_or(defaults.storage.stats_symbol),
            retention_hours: env_parse_opt("RETENTION_HOURS")?,
            retention_sweep_secs: env_parse(
                "RETENTION_SWEEP_SECS",
                defaults.storage.retention_sweep_secs,
            )?,
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: env_parse("LOG_TO_FILE", false)?,
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            feed,
            pipeline,
            storage,
            logging,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        let url = Url::parse(&self.feed.url)
            .map_err(|e| AppError::Config(format!("Invalid FEED_URL {}: {}", self.feed.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(AppError::Config(format!(
                "FEED_URL must use ws or wss, got {}",
                url.scheme()
            )));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(AppError::Config("QUEUE_CAPACITY must be at least 1".to_string()));
        }

        if self.pipeline.worker_count == 0 {
            return Err(AppError::Config("WORKER_COUNT must be at least 1".to_string()));
        }

        if self.storage.stats_symbol.trim().is_empty() {
            return Err(AppError::Config("STATS_SYMBOL must not be empty".to_string()));
        }

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // tungstenite is chatty at debug
        builder.filter_module("tungstenite", log::LevelFilter::Warn);
        builder.filter_module("tokio_tungstenite", log::LevelFilter::Warn);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                url: DEFAULT_FEED_URL.to_string(),
                reconnect_delay_ms: 5_000,
                handshake_timeout_ms: 10_000,
            },
            pipeline: PipelineConfig {
                queue_capacity: 10_000,
                worker_count: 4,
                shutdown_grace_ms: 30_000,
            },
            storage: StorageConfig {
                stats_symbol: "BTCUSDT".to_string(),
                retention_hours: None,
                retention_sweep_secs: 3_600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
