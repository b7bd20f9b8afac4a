use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage layout and durability settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Critic capability settings.
    pub critic: CriticConfig,
}

/// Storage layout and locking configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the dataset file, its backups, and the lock file.
    pub dir: PathBuf,
    /// How long a mutation waits for the dataset lock before giving up.
    pub lock_timeout_ms: u64,
    /// How many rotated backups to keep.
    pub backup_count: usize,
    /// What to do when neither the live file nor any backup parses.
    pub recovery: RecoveryPolicy,
}

/// Policy for an unrecoverable dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Surface `CorruptDataset` to the caller.
    Strict,
    /// Discard the corrupt file and start from an empty dataset.
    StartEmpty,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub level: String,
    /// Output format for the stderr log layer.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Newline-delimited JSON output.
    Json,
}

/// Critic capability configuration.
///
/// The critic is optional: with no API key the server runs without it and
/// `process_thought` simply omits the critical response.
#[derive(Debug, Clone)]
pub struct CriticConfig {
    /// API key for the generation backend; `None` disables the critic.
    pub api_key: Option<String>,
    /// Base URL of the chat-completions endpoint.
    pub base_url: String,
    /// Model identifier to request.
    pub model: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage = StorageConfig {
            dir: PathBuf::from(
                env::var("MCP_STORAGE_DIR").unwrap_or_else(|_| "./data".to_string()),
            ),
            lock_timeout_ms: env::var("STORE_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            backup_count: env::var("STORE_BACKUP_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            recovery: match env::var("STORE_RECOVERY")
                .unwrap_or_else(|_| "strict".to_string())
                .to_lowercase()
                .as_str()
            {
                "start-empty" | "start_empty" => RecoveryPolicy::StartEmpty,
                "strict" => RecoveryPolicy::Strict,
                other => {
                    return Err(AppError::Config {
                        message: format!(
                            "STORE_RECOVERY must be 'strict' or 'start-empty', got '{}'",
                            other
                        ),
                    })
                }
            },
        };

        if storage.backup_count == 0 {
            return Err(AppError::Config {
                message: "STORE_BACKUP_COUNT must be at least 1".to_string(),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let critic = CriticConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("CRITIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: env::var("CRITIC_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_ms: env::var("CRITIC_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
        };

        Ok(Config {
            storage,
            logging,
            critic,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            critic: CriticConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            lock_timeout_ms: 5000,
            backup_count: 3,
            recovery: RecoveryPolicy::Strict,
        }
    }
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 30000,
        }
    }
}
