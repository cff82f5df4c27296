//! Client for the remote Kasumi embedding service.
//!
//! All four embedding operations are thin proxies over `POST` endpoints of
//! the service configured in `kasumi_url`:
//!
//! | Path | Operation | Billing |
//! |------|-----------|---------|
//! | `/v1/embedding/text` | Embed a text | KaToken, per call |
//! | `/v1/embedding/similarity` | Similarity search over stored vectors | KaToken, per call |
//! | `/v1/embedding/item` | Fetch a stored vector by id | KaToken, per call |
//! | `/v1/embedding/insert` | Store a vector under an id | Free, 1000/day quota |
//!
//! Billed calls carry a [`Token`] plus its `token_type`; insert is
//! authorized by `app_id` + `search_key` alone.
//!
//! # Retry Strategy
//!
//! - HTTP 5xx (server error) → retry with exponential backoff
//! - Network errors → retry
//! - HTTP 429 → fail immediately as [`KasumiError::RateLimited`]; the
//!   insert quota resets on a daily boundary, so an immediate retry can
//!   never succeed
//! - Any other 4xx, or a non-zero envelope → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::KasumiConfig;
use crate::error::{KasumiError, Result};
use crate::models::EmbeddingItem;
use crate::protocol::code;
use crate::token::Token;

/// HTTP client bound to one app's credentials and service endpoint.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: Arc<KasumiConfig>,
}

/// Response envelope as the remote service answers it.
#[derive(Deserialize)]
struct RemoteEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct SimilarityData {
    items: Vec<EmbeddingItem>,
}

fn default_inserted() -> bool {
    true
}

#[derive(Deserialize)]
struct InsertData {
    /// The service omits this for plain inserts and sets it to `false`
    /// when the id already existed.
    #[serde(default = "default_inserted")]
    inserted: bool,
}

impl EmbeddingClient {
    /// Builds a client for the service named in the config.
    pub fn new(config: Arc<KasumiConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.remote_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    /// Embeds a text into a vector. Billed against `token`.
    pub async fn embed_text(&self, token: &Token, text: &str) -> Result<Vec<f32>> {
        let body = self.billed_body(token)?;
        let data = self
            .call("/v1/embedding/text", merge(body, json!({ "text": text })))
            .await?;
        let parsed: EmbeddingData = serde_json::from_value(data)?;
        Ok(parsed.embedding)
    }

    /// Finds the `limit` stored vectors most similar to `embedding`.
    /// Billed against `token`.
    pub async fn search_similarity(
        &self,
        token: &Token,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<EmbeddingItem>> {
        let body = self.billed_body(token)?;
        let data = self
            .call(
                "/v1/embedding/similarity",
                merge(body, json!({ "embedding": embedding, "limit": limit })),
            )
            .await?;
        let parsed: SimilarityData = serde_json::from_value(data)?;
        Ok(parsed.items)
    }

    /// Fetches the stored vector registered under `id`. Billed against
    /// `token`.
    pub async fn get_by_id(&self, token: &Token, id: &str) -> Result<EmbeddingItem> {
        let body = self.billed_body(token)?;
        let data = self
            .call("/v1/embedding/item", merge(body, json!({ "id": id })))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Stores `embedding` under `id` in the app's vector space.
    ///
    /// Free of KaToken cost but externally limited to 1000 inserts per app
    /// per day; the quota surfaces as [`KasumiError::RateLimited`]. Returns
    /// `false` when the service reports the id already existed.
    pub async fn insert(&self, embedding: &[f32], id: &str) -> Result<bool> {
        let body = json!({
            "app_id": self.config.app_id(),
            "search_key": self.config.search_key(),
            "embedding": embedding,
            "id": id,
        });
        let data = self.call("/v1/embedding/insert", body).await?;
        let parsed: InsertData = serde_json::from_value(data)?;
        Ok(parsed.inserted)
    }

    /// Common fields of a billed call: app identity plus the validated
    /// token and its trust level.
    fn billed_body(&self, token: &Token) -> Result<serde_json::Value> {
        let payload = token.for_billing()?;
        Ok(json!({
            "app_id": self.config.app_id(),
            "search_key": self.config.search_key(),
            "token_type": token.kind().as_str(),
            "token": payload,
        }))
    }

    /// POSTs `body` to `path` with retry/backoff and unwraps the response
    /// envelope, yielding its `data` payload.
    async fn call(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.config.kasumi_url().trim_end_matches('/'), path);
        let mut last_err: Option<KasumiError> = None;

        for attempt in 0..=self.config.remote_max_retries() {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(%url, attempt, delay_secs = delay.as_secs(), "retrying kasumi service call");
                tokio::time::sleep(delay).await;
            }

            debug!(%url, attempt, "calling kasumi service");
            let resp = self.http.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let envelope: RemoteEnvelope = response.json().await?;
                        if envelope.code != code::OK {
                            return Err(KasumiError::RemoteService {
                                code: envelope.code,
                                message: envelope.message,
                            });
                        }
                        return Ok(envelope.data);
                    }

                    // Quota exhausted — retrying cannot succeed today.
                    if status.as_u16() == 429 {
                        return Err(KasumiError::RateLimited);
                    }

                    // Server error — retry
                    if status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(KasumiError::RemoteService {
                            code: status.as_u16() as i64,
                            message: text,
                        });
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let text = response.text().await.unwrap_or_default();
                    return Err(KasumiError::RemoteService {
                        code: status.as_u16() as i64,
                        message: text,
                    });
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| KasumiError::RemoteService {
            code: -1,
            message: "remote call failed after retries".to_string(),
        }))
    }
}

/// Folds `extra`'s fields into `base`. Both are always JSON objects here.
fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base_map), serde_json::Value::Object(extra_map)) = (base.as_object_mut(), extra) {
        base_map.extend(extra_map);
    }
    base
}
