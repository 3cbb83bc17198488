use thiserror::Error;

/// Error types raised while building backends, generating or loading inputs.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Backend construction failed; fatal for that one model only
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Errors returned by the inference server
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// Server response or stream chunk could not be decoded
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Failure inside the in-process inference runtime
    #[error("Local runtime error: {0}")]
    LocalRuntime(String),
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts reqwest HTTP errors into BenchErrors
impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<serde_yaml::Error> for BenchError {
    fn from(err: serde_yaml::Error) -> Self {
        BenchError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::Config(err.to_string())
    }
}
