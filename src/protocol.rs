//! Wire protocol shared with the Kasumi platform.
//!
//! Both directions of traffic speak the same envelope: a JSON object with a
//! numeric `code`, a human-readable `message`, and an operation-specific
//! `data` payload. `code` 0 means success; any other value carries the
//! failure class. Handled requests are always answered with HTTP 200 — the
//! status line only reports transport-level problems.
//!
//! # Inbound requests
//!
//! | Method | Path | Body | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/v1/info` | [`InfoRequest`] | Describe this app's search surface |
//! | `POST` | `/v1/search` | [`SearchRequest`] | Dispatch a search to registered spiders |
//! | `GET`  | `/health` | — | Liveness check (returns version) |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::KasumiError;
use crate::models::SearchResult;

/// Envelope codes reported in the `code` field of every response.
pub mod code {
    /// The operation succeeded; `data` carries the payload.
    pub const OK: i64 = 0;
    /// The request body violated the contract (e.g. malformed `search_param`).
    pub const INVALID_REQUEST: i64 = 1000;
    /// The caller presented a `remote_search_key` this app does not accept.
    pub const UNAUTHORIZED: i64 = 1001;
    /// No registered search strategy accepts the requested column.
    pub const UNSUPPORTED_COLUMN: i64 = 1002;
    /// A spider raised an operational fault mid-search.
    pub const SPIDER_FAILURE: i64 = 1003;
    /// The dispatch exceeded its deadline.
    pub const TIMEOUT: i64 = 1004;
    /// The remote service refused the call because a quota was exhausted.
    pub const RATE_LIMITED: i64 = 1005;
    /// The remote service answered with a failure envelope.
    pub const REMOTE_FAILURE: i64 = 1006;
    /// Unclassified internal failure.
    pub const INTERNAL: i64 = 1999;
}

/// Body of `POST /v1/info`.
///
/// The platform probes an app's search surface before routing user queries
/// to it; the key it presents must match the app's configured `search_key`.
/// The body is tolerated as an arbitrary mapping — a missing key decodes as
/// empty and is caught by authorization, not by the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoRequest {
    /// Shared secret identifying the platform to this app.
    #[serde(default)]
    pub remote_search_key: String,
}

/// Body of `POST /v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Shared secret identifying the platform to this app.
    pub remote_search_key: String,
    /// Exactly one column/value pair naming what to search for.
    pub search_param: BTreeMap<String, String>,
    /// Integer id of the end user driving this search, when known.
    #[serde(default)]
    pub uid: Option<u64>,
    /// Per-user credential relayed by the platform, stored in the user's
    /// session for later billed calls.
    #[serde(default)]
    pub user_token: Option<String>,
}

impl SearchRequest {
    /// Builds a minimal search request for the given column/value pair.
    pub fn new(
        remote_search_key: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut search_param = BTreeMap::new();
        search_param.insert(column.into(), value.into());
        Self {
            remote_search_key: remote_search_key.into(),
            search_param,
            uid: None,
            user_token: None,
        }
    }

    /// Attaches the end-user identity carried by the platform.
    pub fn with_user(mut self, uid: u64, user_token: impl Into<String>) -> Self {
        self.uid = Some(uid);
        self.user_token = Some(user_token.into());
        self
    }

    /// The single column/value pair this request asks about.
    ///
    /// Fails with [`KasumiError::InvalidRequest`] when `search_param` does
    /// not contain exactly one entry.
    pub fn search_pair(&self) -> Result<(&str, &str), KasumiError> {
        let mut entries = self.search_param.iter();
        let (column, value) = entries
            .next()
            .ok_or_else(|| KasumiError::InvalidRequest("search_param must not be empty".into()))?;
        if entries.next().is_some() {
            return Err(KasumiError::InvalidRequest(
                "search_param must contain exactly one column/value pair".into(),
            ));
        }
        Ok((column.as_str(), value.as_str()))
    }
}

/// Envelope answered from `POST /v1/search`.
///
/// Immutable once built; read through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    code: i64,
    message: String,
    #[serde(default)]
    data: Vec<SearchResult>,
}

impl SearchResponse {
    /// Successful envelope wrapping the collected results.
    pub fn ok(data: Vec<SearchResult>) -> Self {
        Self {
            code: code::OK,
            message: "success".to_string(),
            data,
        }
    }

    /// Failure envelope derived from the error's taxonomy.
    pub fn from_error(err: &KasumiError) -> Self {
        Self {
            code: err.envelope_code(),
            message: err.to_string(),
            data: Vec::new(),
        }
    }

    /// 0 on success, a [`code`] constant otherwise.
    pub fn code(&self) -> i64 {
        self.code
    }

    /// Human-readable summary of the outcome.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Collected search results; empty when [`Self::code`] is non-zero.
    pub fn data(&self) -> &[SearchResult] {
        &self.data
    }

    /// Consumes the envelope, yielding the collected results.
    pub fn into_data(self) -> Vec<SearchResult> {
        self.data
    }

    /// Whether the envelope reports success.
    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

/// Envelope answered from `POST /v1/info`.
///
/// Immutable once built; read through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    code: i64,
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl InfoResponse {
    /// Successful envelope wrapping the app description.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            code: code::OK,
            message: "success".to_string(),
            data,
        }
    }

    /// Failure envelope derived from the error's taxonomy.
    pub fn from_error(err: &KasumiError) -> Self {
        Self {
            code: err.envelope_code(),
            message: err.to_string(),
            data: serde_json::Value::Null,
        }
    }

    /// 0 on success, a [`code`] constant otherwise.
    pub fn code(&self) -> i64 {
        self.code
    }

    /// Human-readable summary of the outcome.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Free-form description of the app's search surface.
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Whether the envelope reports success.
    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}
