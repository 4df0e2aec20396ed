// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Upper bound for order and deal timeouts (ten years).
pub const MAX_TIMEOUT_HOURS: u64 = 10 * 365 * 24;

/// Deal desk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Expiry coordinator configuration
    pub expiry: ExpiryConfig,

    /// Notification dispatch configuration
    pub dispatch: DispatchConfig,

    /// Record store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Expiry coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Seconds between expiry cycles
    pub check_interval_secs: u64,

    /// Age in hours after which an open order expires
    pub order_timeout_hours: u64,

    /// Age in hours after which an unconfirmed deal expires
    pub deal_timeout_hours: u64,

    /// Maximum orders and deals handled per scan
    pub batch_limit: usize,
}

impl ExpiryConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn order_timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(self.order_timeout_hours.min(MAX_TIMEOUT_HOURS) as i64)
    }

    pub fn deal_timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(self.deal_timeout_hours.min(MAX_TIMEOUT_HOURS) as i64)
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30 * 60,
            order_timeout_hours: 7 * 24,
            deal_timeout_hours: 24,
            batch_limit: 100,
        }
    }
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of the outbound notification queue
    pub queue_capacity: usize,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot file; in-memory only when unset
    pub snapshot_path: Option<String>,
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

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = ExpiryConfig::default();
        let expiry_config = ExpiryConfig {
            check_interval_secs: env::var("EXPIRY_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| defaults.check_interval_secs.to_string())
                .parse()
                .unwrap_or(defaults.check_interval_secs),
            order_timeout_hours: env::var("ORDER_TIMEOUT_HOURS")
                .unwrap_or_else(|_| defaults.order_timeout_hours.to_string())
                .parse()
                .unwrap_or(defaults.order_timeout_hours),
            deal_timeout_hours: env::var("DEAL_TIMEOUT_HOURS")
                .unwrap_or_else(|_| defaults.deal_timeout_hours.to_string())
                .parse()
                .unwrap_or(defaults.deal_timeout_hours),
            batch_limit: env::var("EXPIRY_BATCH_LIMIT")
                .unwrap_or_else(|_| defaults.batch_limit.to_string())
                .parse()
                .unwrap_or(defaults.batch_limit),
        };

        let dispatch_config = DispatchConfig {
            queue_capacity: env::var("NOTIFY_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
        };

        let store_config = StoreConfig {
            snapshot_path: env::var("STORE_SNAPSHOT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        };

        // Create Logging config
        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            expiry: expiry_config,
            dispatch: dispatch_config,
            store: store_config,
            logging: logging_config,
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

    /// Reject values the coordinator and dispatcher cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.expiry.check_interval_secs == 0 {
            return Err(AppError::Config(
                "EXPIRY_CHECK_INTERVAL_SECS must be positive".to_string(),
            ));
        }
        if self.expiry.deal_timeout_hours == 0 || self.expiry.order_timeout_hours == 0 {
            return Err(AppError::Config("Timeouts must be positive".to_string()));
        }
        if self.expiry.deal_timeout_hours > MAX_TIMEOUT_HOURS
            || self.expiry.order_timeout_hours > MAX_TIMEOUT_HOURS
        {
            return Err(AppError::Config(format!(
                "Timeouts must not exceed {} hours",
                MAX_TIMEOUT_HOURS
            )));
        }
        if self.expiry.batch_limit == 0 {
            return Err(AppError::Config(
                "EXPIRY_BATCH_LIMIT must be positive".to_string(),
            ));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(AppError::Config(
                "NOTIFY_QUEUE_CAPACITY must be positive".to_string(),
            ));
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

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        // Initialize the logger
        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expiry: ExpiryConfig::default(),
            dispatch: DispatchConfig {
                queue_capacity: 1024,
            },
            store: StoreConfig {
                snapshot_path: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
