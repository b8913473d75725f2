/// Common error type for cross-crate APIs.
///
/// Keep this intentionally lightweight: the HTTP-facing crates wrap it for
/// Axum responses, the SDK never lets it escape (it normalizes into its own
/// envelope), and the Sandbox has its own error type entirely (policy
/// violations aren't an HTTP concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    ConfigInvalid = 1001,
    RedisError = 2002,
    SchemaInvalid = 3001,
    CertInvalid = 3002,
    NotFound = 3003,
    NetworkTimeout = 7001,
    NetworkError = 7002,
    Unknown = 9999,
}

#[derive(thiserror::Error, Debug)]
pub enum HoneycombError {
    #[error("configuration error ({code:?}): {message}")]
    Config { code: ErrorCode, message: String },

    #[error("redis error ({code:?}): {source}")]
    Redis { code: ErrorCode, source: redis::RedisError },

    #[error("claim validation failed ({code:?}): {message}")]
    ClaimsInvalid { code: ErrorCode, message: String },

    #[error("certificate invalid ({code:?}): {message}")]
    CertInvalid { code: ErrorCode, message: String },

    #[error("not found ({code:?}): {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("network error ({code:?}): {source}")]
    Network { code: ErrorCode, source: reqwest::Error },

    #[error("io error ({code:?}): {source}")]
    Io { code: ErrorCode, source: std::io::Error },

    #[error("serialization error ({code:?}): {source}")]
    Serialization { code: ErrorCode, source: serde_json::Error },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl HoneycombError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HoneycombError::Config { code, .. } => *code,
            HoneycombError::Redis { code, .. } => *code,
            HoneycombError::ClaimsInvalid { code, .. } => *code,
            HoneycombError::CertInvalid { code, .. } => *code,
            HoneycombError::NotFound { code, .. } => *code,
            HoneycombError::Network { code, .. } => *code,
            HoneycombError::Io { code, .. } => *code,
            HoneycombError::Serialization { code, .. } => *code,
            HoneycombError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigInvalid,
            message: msg.into(),
        }
    }

    pub fn claims_invalid(msg: impl Into<String>) -> Self {
        Self::ClaimsInvalid {
            code: ErrorCode::SchemaInvalid,
            message: msg.into(),
        }
    }

    pub fn cert_invalid(msg: impl Into<String>) -> Self {
        Self::CertInvalid {
            code: ErrorCode::CertInvalid,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::NotFound,
            message: msg.into(),
        }
    }
}

impl From<std::io::Error> for HoneycombError {
    fn from(value: std::io::Error) -> Self {
        Self::Io { code: ErrorCode::Unknown, source: value }
    }
}

impl From<reqwest::Error> for HoneycombError {
    fn from(value: reqwest::Error) -> Self {
        let code = if value.is_timeout() { ErrorCode::NetworkTimeout } else { ErrorCode::NetworkError };
        Self::Network { code, source: value }
    }
}

impl From<serde_json::Error> for HoneycombError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization { code: ErrorCode::Unknown, source: value }
    }
}

impl From<redis::RedisError> for HoneycombError {
    fn from(value: redis::RedisError) -> Self {
        Self::Redis { code: ErrorCode::RedisError, source: value }
    }
}
