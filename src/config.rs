use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{KasumiError, Result};

/// Default public endpoint of the Kasumi service.
pub const DEFAULT_KASUMI_URL: &str = "http://kasumi.miduoduo.org:8196";

/// Application credentials and tuning knobs, immutable once constructed.
///
/// `app_id`, `token`, and `search_key` are issued by the platform when an
/// app is registered; everything else has a sensible default and can be
/// overridden in the TOML file or through the `with_*` builders.
#[derive(Debug, Deserialize, Clone)]
pub struct KasumiConfig {
    app_id: u64,
    token: String,
    search_key: String,
    #[serde(default = "default_kasumi_url")]
    kasumi_url: String,
    #[serde(default)]
    search_desc: BTreeMap<String, String>,
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_remote_timeout_secs")]
    remote_timeout_secs: u64,
    #[serde(default = "default_remote_max_retries")]
    remote_max_retries: u32,
    #[serde(default = "default_session_ttl_secs")]
    session_ttl_secs: u64,
}

fn default_kasumi_url() -> String {
    DEFAULT_KASUMI_URL.to_string()
}
fn default_bind() -> String {
    "127.0.0.1:8282".to_string()
}
fn default_max_results() -> usize {
    100
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_remote_timeout_secs() -> u64 {
    30
}
fn default_remote_max_retries() -> u32 {
    3
}
fn default_session_ttl_secs() -> u64 {
    3600
}

impl KasumiConfig {
    /// Builds a config from the platform-issued credentials, with every
    /// tuning knob at its default.
    pub fn new(app_id: u64, token: impl Into<String>, search_key: impl Into<String>) -> Self {
        Self {
            app_id,
            token: token.into(),
            search_key: search_key.into(),
            kasumi_url: default_kasumi_url(),
            search_desc: BTreeMap::new(),
            bind: default_bind(),
            max_results: default_max_results(),
            request_timeout_secs: default_request_timeout_secs(),
            remote_timeout_secs: default_remote_timeout_secs(),
            remote_max_retries: default_remote_max_retries(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }

    /// Loads and validates a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KasumiError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: KasumiConfig = toml::from_str(&content).map_err(|e| {
            KasumiError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the tuning knobs; credentials are intentionally not checked
    /// here since test and sandbox apps legitimately use empty secrets.
    pub fn validate(&self) -> Result<()> {
        if self.kasumi_url.is_empty() {
            return Err(KasumiError::Config("kasumi_url must not be empty".into()));
        }
        if self.bind.is_empty() {
            return Err(KasumiError::Config("bind must not be empty".into()));
        }
        if self.max_results == 0 {
            return Err(KasumiError::Config("max_results must be >= 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(KasumiError::Config(
                "request_timeout_secs must be >= 1".into(),
            ));
        }
        if self.remote_timeout_secs == 0 {
            return Err(KasumiError::Config(
                "remote_timeout_secs must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_kasumi_url(mut self, url: impl Into<String>) -> Self {
        self.kasumi_url = url.into();
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_remote_timeout_secs(mut self, secs: u64) -> Self {
        self.remote_timeout_secs = secs;
        self
    }

    pub fn with_remote_max_retries(mut self, retries: u32) -> Self {
        self.remote_max_retries = retries;
        self
    }

    /// `0` disables session eviction entirely.
    pub fn with_session_ttl_secs(mut self, secs: u64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    /// Declares a searchable column and its human-readable description.
    pub fn with_search_column(
        mut self,
        column: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.search_desc.insert(column.into(), description.into());
        self
    }

    /// Platform-issued application id.
    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Developer-side secret for billed operations.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Shared secret the platform presents on inbound search/info requests.
    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    /// Base URL of the remote service.
    pub fn kasumi_url(&self) -> &str {
        &self.kasumi_url
    }

    /// Searchable columns and their descriptions, as advertised via info.
    pub fn search_desc(&self) -> &BTreeMap<String, String> {
        &self.search_desc
    }

    /// Address `run_forever` listens on.
    pub fn bind(&self) -> &str {
        &self.bind
    }

    /// Upper bound on results collected per search dispatch.
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Deadline for one inbound search dispatch.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-attempt deadline for calls to the remote service.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// Retry budget for transient remote failures.
    pub fn remote_max_retries(&self) -> u32 {
        self.remote_max_retries
    }

    /// Idle lifetime of a session; `None` means sessions live for the
    /// whole process.
    pub fn session_ttl(&self) -> Option<Duration> {
        if self.session_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session_ttl_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_file_gets_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
app_id = 42
token = "dev-secret"
search_key = "platform-key"

[search_desc]
name = "Band member name"
"#
        )
        .unwrap();

        let config = KasumiConfig::from_file(file.path()).unwrap();
        assert_eq!(config.app_id(), 42);
        assert_eq!(config.kasumi_url(), DEFAULT_KASUMI_URL);
        assert_eq!(config.bind(), "127.0.0.1:8282");
        assert_eq!(config.max_results(), 100);
        assert_eq!(config.remote_max_retries(), 3);
        assert_eq!(config.session_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(
            config.search_desc().get("name").map(String::as_str),
            Some("Band member name")
        );
    }

    #[test]
    fn zero_max_results_is_rejected() {
        let config = KasumiConfig::new(1, "t", "k").with_max_results(0);
        assert!(matches!(
            config.validate(),
            Err(KasumiError::Config(_))
        ));
    }

    #[test]
    fn empty_secrets_are_allowed() {
        // Sandbox apps register with empty token/search_key.
        let config = KasumiConfig::new(0, "", "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_ttl_disables_eviction() {
        let config = KasumiConfig::new(1, "t", "k").with_session_ttl_secs(0);
        assert_eq!(config.session_ttl(), None);
    }

    #[test]
    fn missing_required_field_fails_parse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"app_id = 42"#).unwrap();
        assert!(matches!(
            KasumiConfig::from_file(file.path()),
            Err(KasumiError::Config(_))
        ));
    }
}
