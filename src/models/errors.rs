//! Centralized Error Handling Module
//!
//! Every internal failure carries a unique code so log lines can be
//! grepped and counted. Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - CLASSIFIER_xxx: risk-lookup backend errors
//! - STORAGE_xxx: blacklist file errors
//! - TOKEN_xxx: malformed token records
//! - CFG_xxx: configuration errors
//!
//! None of these escape the pipeline: they are absorbed into fail-closed
//! verdicts at the component boundaries.

use std::fmt;

/// Library-wide error type
#[derive(Debug)]
pub struct ScreenError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ScreenError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ScreenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Classifier Errors
    // ============================================
    /// Could not reach the risk API
    ClassifierConnectionFailed,
    /// Risk API did not answer in time
    ClassifierTimeout,
    /// Risk API rate limited us (HTTP 429)
    ClassifierRateLimited,
    /// Risk API returned 5xx
    ClassifierServerError,
    /// Risk API rejected the request (4xx other than 429)
    ClassifierRejected,
    /// Response body did not match the expected report shape
    ClassifierInvalidResponse,
    /// Backend unavailable (stub failure mode, no backend configured)
    ClassifierUnavailable,

    // ============================================
    // Storage Errors
    // ============================================
    /// Blacklist file could not be read
    StorageRead,
    /// Blacklist file is not a valid document
    StorageParse,
    /// Blacklist file could not be written
    StorageWrite,

    // ============================================
    // Token Errors
    // ============================================
    /// Token record has no usable `address`
    TokenMissingAddress,
    /// Token record is not an object
    TokenMalformed,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic
    // ============================================
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifierConnectionFailed => "CLASSIFIER_CONNECTION_FAILED",
            Self::ClassifierTimeout => "CLASSIFIER_TIMEOUT",
            Self::ClassifierRateLimited => "CLASSIFIER_RATE_LIMITED",
            Self::ClassifierServerError => "CLASSIFIER_SERVER_ERROR",
            Self::ClassifierRejected => "CLASSIFIER_REJECTED",
            Self::ClassifierInvalidResponse => "CLASSIFIER_INVALID_RESPONSE",
            Self::ClassifierUnavailable => "CLASSIFIER_UNAVAILABLE",

            Self::StorageRead => "STORAGE_READ",
            Self::StorageParse => "STORAGE_PARSE",
            Self::StorageWrite => "STORAGE_WRITE",

            Self::TokenMissingAddress => "TOKEN_MISSING_ADDRESS",
            Self::TokenMalformed => "TOKEN_MALFORMED",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Transport-level failures worth another attempt.
    /// A well-formed but negative verdict is never an error, so it never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ClassifierConnectionFailed
                | Self::ClassifierTimeout
                | Self::ClassifierRateLimited
                | Self::ClassifierServerError
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl ScreenError {
    pub fn missing_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TokenMissingAddress, msg)
    }

    pub fn malformed_token(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TokenMalformed, msg)
    }

    pub fn classifier_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ClassifierUnavailable, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn missing_env(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", key_name),
        )
    }

    /// Map an HTTP status from the risk API to an error
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::new(ErrorCode::ClassifierRateLimited, "Rate limited (HTTP 429)"),
            500..=599 => Self::new(
                ErrorCode::ClassifierServerError,
                format!("Server error (HTTP {})", status),
            ),
            _ => Self::new(
                ErrorCode::ClassifierRejected,
                format!("Request rejected (HTTP {})", status),
            ),
        }
    }
}

/// Library Result type
pub type ScreenResult<T> = Result<T, ScreenError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for ScreenError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::StorageRead, "IO error", err)
    }
}

impl From<reqwest::Error> for ScreenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ClassifierTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ClassifierConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::new(ErrorCode::ClassifierInvalidResponse, err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
        } else {
            Self::new(ErrorCode::ClassifierConnectionFailed, err.to_string())
        }
    }
}

impl From<serde_json::Error> for ScreenError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::StorageParse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ScreenError::missing_address("no address");
        assert_eq!(err.code, ErrorCode::TokenMissingAddress);
        assert_eq!(err.code_str(), "TOKEN_MISSING_ADDRESS");
        assert_eq!(err.to_string(), "[TOKEN_MISSING_ADDRESS] no address");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::ClassifierTimeout.is_retryable());
        assert!(ErrorCode::ClassifierRateLimited.is_retryable());
        assert!(ErrorCode::ClassifierServerError.is_retryable());
        assert!(!ErrorCode::ClassifierRejected.is_retryable());
        assert!(!ErrorCode::ClassifierInvalidResponse.is_retryable());
        assert!(!ErrorCode::StorageParse.is_retryable());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(ScreenError::from_status(429).code, ErrorCode::ClassifierRateLimited);
        assert_eq!(ScreenError::from_status(503).code, ErrorCode::ClassifierServerError);
        assert_eq!(ScreenError::from_status(401).code, ErrorCode::ClassifierRejected);
        assert_eq!(ScreenError::from_status(404).code, ErrorCode::ClassifierRejected);
    }
}
