//! Error types for simpeval

use thiserror::Error;

/// Main error type for simpeval
#[derive(Error, Debug)]
pub enum SimpEvalError {
    #[error("Unknown task: {0}. Available tasks: {1}")]
    UnknownTask(String, String),

    #[error("Unknown sampler: {0}. Available samplers: {1}")]
    UnknownSampler(String, String),

    #[error("Environment variable {0} is not set")]
    MissingToken(String),

    #[error("Task '{0}' needs an equality checker, pass --judge-model")]
    MissingJudge(String),

    #[error("Unrecognized model option: {0}")]
    UnrecognizedOption(String),

    #[error("Invalid model args: {0}")]
    InvalidModelArgs(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Max retries ({attempts}) exceeded: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Result type alias for simpeval
pub type Result<T> = std::result::Result<T, SimpEvalError>;
