//! Error types shared across the SDK.
//!
//! Every fallible operation returns [`Result`]. Failures that surface to the
//! platform are translated into response envelopes via
//! [`KasumiError::envelope_code`]; the HTTP layer itself always answers 200
//! for requests it could decode.

use thiserror::Error;

use crate::protocol::code;

/// Convenience alias used throughout the crate.
pub type Result<T, E = KasumiError> = std::result::Result<T, E>;

/// Unified error type for orchestration, dispatch, and remote calls.
#[derive(Error, Debug)]
pub enum KasumiError {
    /// A request was structurally valid JSON but violated the contract,
    /// e.g. `search_param` did not carry exactly one column/value pair.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller could not be authorized for the requested operation.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// No registered search strategy accepts the requested column.
    #[error("no registered search strategy accepts column `{column}`")]
    UnsupportedColumn { column: String },

    /// A spider raised an operational fault while producing results.
    #[error("spider `{spider}` failed: {message}")]
    Spider { spider: String, message: String },

    /// A dispatch did not finish within the configured deadline.
    #[error("search did not complete within {seconds}s")]
    Timeout { seconds: u64 },

    /// The remote service answered with a non-zero envelope code.
    #[error("kasumi service rejected the call (code {code}): {message}")]
    RemoteService { code: i64, message: String },

    /// The remote service throttled the caller; retrying immediately will
    /// not help because quotas reset on a daily boundary.
    #[error("kasumi service rate limit exceeded")]
    RateLimited,

    /// A token failed local validation before it was forwarded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A spider with the same name is already registered.
    #[error("a spider named `{0}` is already registered")]
    DuplicateSpider(String),

    /// A search strategy with the same name is already registered.
    #[error("a search strategy named `{0}` is already registered")]
    DuplicateStrategy(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote service could not be reached at all.
    #[error("transport error calling kasumi service: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O failure (listener setup, config file reads).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Payloads that could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Escape hatch for spider and strategy implementations.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KasumiError {
    /// Wrap an arbitrary spider failure with the spider's name so the
    /// envelope message identifies which source misbehaved.
    pub fn spider(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Spider {
            spider: name.into(),
            message: err.to_string(),
        }
    }

    /// Envelope code reported to the platform for this failure.
    pub fn envelope_code(&self) -> i64 {
        match self {
            Self::InvalidRequest(_) => code::INVALID_REQUEST,
            Self::Authorization(_) => code::UNAUTHORIZED,
            Self::UnsupportedColumn { .. } => code::UNSUPPORTED_COLUMN,
            Self::Spider { .. } => code::SPIDER_FAILURE,
            Self::Timeout { .. } => code::TIMEOUT,
            Self::RateLimited => code::RATE_LIMITED,
            Self::RemoteService { code, .. } => {
                if *code == code::RATE_LIMITED {
                    code::RATE_LIMITED
                } else {
                    code::REMOTE_FAILURE
                }
            }
            Self::InvalidToken(_) => code::UNAUTHORIZED,
            _ => code::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_codes_follow_taxonomy() {
        assert_eq!(
            KasumiError::Authorization("bad key".into()).envelope_code(),
            code::UNAUTHORIZED
        );
        assert_eq!(
            KasumiError::UnsupportedColumn {
                column: "name".into()
            }
            .envelope_code(),
            code::UNSUPPORTED_COLUMN
        );
        assert_eq!(KasumiError::RateLimited.envelope_code(), code::RATE_LIMITED);
        assert_eq!(
            KasumiError::Timeout { seconds: 30 }.envelope_code(),
            code::TIMEOUT
        );
        assert_eq!(
            KasumiError::Other(anyhow::anyhow!("boom")).envelope_code(),
            code::INTERNAL
        );
    }

    #[test]
    fn spider_helper_names_the_source() {
        let err = KasumiError::spider("popipa", "connection reset");
        assert_eq!(err.envelope_code(), code::SPIDER_FAILURE);
        assert!(err.to_string().contains("popipa"));
        assert!(err.to_string().contains("connection reset"));
    }
}
