//! Error types for intentgate operations.
//!
//! Every collaborator failure maps onto one variant of [`GateError`]. The
//! interceptor decides per variant and configured [`FailurePolicy`] whether
//! to let the page through; see [`GateError::is_fail_open`]. A conflict
//! between intentions is a decision the user makes, not an error.

use thiserror::Error;

use crate::config::FailurePolicy;

/// Result type alias for intentgate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Main error type for all intentgate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// The persistent key-value store could not be read or written.
    #[error("Storage unavailable: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The AI classifier failed (timeout, network, malformed response).
    #[error("Classifier error: {message}")]
    Classifier {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No classifier credentials are configured.
    #[error("Missing classifier credentials: {0}")]
    MissingCredentials(String),

    /// The navigation primitive failed.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// The entitlement check failed.
    #[error("Entitlement check failed: {0}")]
    Entitlement(String),

    /// Content extraction failed.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An operation was issued in a state that does not accept it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (STORE_xxx)
    StoreUnavailable,
    StoreCorrupted,

    // Classifier (CLS_xxx)
    ClsTimeout,
    ClsNetwork,
    ClsMalformedResponse,
    ClsMissingCredentials,

    // Interception (GATE_xxx)
    GateNavigation,
    GateEntitlement,
    GateInvalidState,

    // Extraction (EXT_xxx)
    ExtFailed,

    // Database (DB_xxx)
    DbOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,

    // Configuration
    Configuration,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StoreUnavailable => "STORE_001",
            ErrorCode::StoreCorrupted => "STORE_002",
            ErrorCode::ClsTimeout => "CLS_001",
            ErrorCode::ClsNetwork => "CLS_002",
            ErrorCode::ClsMalformedResponse => "CLS_003",
            ErrorCode::ClsMissingCredentials => "CLS_004",
            ErrorCode::GateNavigation => "GATE_002",
            ErrorCode::GateEntitlement => "GATE_003",
            ErrorCode::GateInvalidState => "GATE_004",
            ErrorCode::ExtFailed => "EXT_001",
            ErrorCode::DbOperationFailed => "DB_001",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::Configuration => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl GateError {
    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::StoreUnavailable,
            source: None,
        }
    }

    /// Create a storage error for a value that could not be decoded.
    pub fn corrupted(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: format!("value at '{}' is corrupted: {}", key, reason),
            code: ErrorCode::StoreCorrupted,
            source: None,
        }
    }

    /// Create a classifier error (network or provider failure).
    pub fn classifier(message: impl Into<String>) -> Self {
        Self::Classifier {
            message: message.into(),
            code: ErrorCode::ClsNetwork,
            source: None,
        }
    }

    /// Create a classifier timeout error.
    pub fn classifier_timeout(timeout_ms: u64) -> Self {
        Self::Classifier {
            message: format!("classifier did not answer within {}ms", timeout_ms),
            code: ErrorCode::ClsTimeout,
            source: None,
        }
    }

    /// Create a classifier error for an unusable response.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::Classifier {
            message: message.into(),
            code: ErrorCode::ClsMalformedResponse,
            source: None,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Storage { code, .. } => *code,
            Self::Classifier { code, .. } => *code,
            Self::MissingCredentials(_) => ErrorCode::ClsMissingCredentials,
            Self::Navigation(_) => ErrorCode::GateNavigation,
            Self::Entitlement(_) => ErrorCode::GateEntitlement,
            Self::Extraction(_) => ErrorCode::ExtFailed,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Database { code, .. } => *code,
            Self::InvalidState(_) => ErrorCode::GateInvalidState,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            Self::Io(_) => ErrorCode::Internal,
        }
    }

    /// Whether the interceptor should let the page through on this error.
    ///
    /// Under [`FailurePolicy::Open`] every failure allows the page. Under
    /// [`FailurePolicy::Closed`] the page is prompted instead, except when the
    /// navigator itself failed: the prompt cannot be shown then.
    pub fn is_fail_open(&self, policy: FailurePolicy) -> bool {
        match policy {
            FailurePolicy::Open => true,
            FailurePolicy::Closed => matches!(self, Self::Navigation(_)),
        }
    }

    /// Whether this error came from the AI classifier or its credentials.
    pub fn is_classifier(&self) -> bool {
        matches!(self, Self::Classifier { .. } | Self::MissingCredentials(_))
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Storage { .. } => Some("Check that the intention store is reachable"),
            Self::MissingCredentials(_) => {
                Some("Set OPENAI_API_KEY or ANTHROPIC_API_KEY to enable AI validation")
            }
            Self::Classifier { .. } => Some("Please check your LLM provider configuration"),
            Self::Configuration(_) => Some("Check the config file or INTENTGATE_* variables"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for GateError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
