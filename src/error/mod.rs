use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Critic error: {0}")]
    Critic(#[from] CriticError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Validation failures on a thought record, rejected before any disk access
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("thought number must be positive, got {number}")]
    NonPositiveNumber { number: i64 },

    #[error("thought number {number} exceeds the supported maximum of 4294967295")]
    NumberTooLarge { number: i64 },

    #[error("total_thoughts {total} exceeds the supported maximum of 4294967295")]
    TotalTooLarge { total: i64 },

    #[error("thought content cannot be empty")]
    EmptyContent,

    #[error(
        "unknown stage '{value}' (expected one of: Problem Definition, \
         Research, Analysis, Synthesis, Conclusion)"
    )]
    UnknownStage { value: String },

    #[error("total_thoughts ({total}) must be positive and >= thought number ({number})")]
    TotalBelowNumber { number: i64, total: i64 },
}

/// Store layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid thought record: {0}")]
    Validation(#[from] ValidationError),

    #[error("Thought number {number} is already recorded in this session")]
    DuplicateNumber { number: u32 },

    #[error("Timed out after {waited_ms}ms waiting for lock on {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("Dataset at {path} is corrupt and no backup could be recovered")]
    CorruptDataset { path: PathBuf },

    #[error("Import from {path} failed: {message}")]
    Import { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Critic capability errors
#[derive(Debug, Error)]
pub enum CriticError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for McpError {
    fn from(err: StoreError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for critic operations
pub type CriticResult<T> = Result<T, CriticError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
