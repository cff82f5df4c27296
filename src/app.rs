//! The Kasumi facade.
//!
//! A host application builds one [`Kasumi`] at startup, registers its
//! spiders and strategies, and then either serves inbound platform traffic
//! via [`Kasumi::run_forever`] or issues outbound embedding calls directly.
//!
//! ```rust,no_run
//! use kasumi::traits::DefaultSearchStrategy;
//! use kasumi::{Kasumi, KasumiConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> kasumi::Result<()> {
//! let config = KasumiConfig::new(42, "dev-token", "platform-key")
//!     .with_search_column("name", "Band member name");
//!
//! let mut app = Kasumi::new(config)?;
//! let strategy = Arc::new(DefaultSearchStrategy::from_config(app.config()));
//! app.add_search_strategy(strategy)?;
//! // app.add_spider(Arc::new(MySpider::new()))?;
//!
//! app.run_forever().await
//! # }
//! ```
//!
//! Registration happens before serving, so the registries need no locking:
//! `run_forever` freezes the facade behind an `Arc` and every request sees
//! the same immutable spider/strategy sets. Sessions are the only shared
//! mutable state and carry their own synchronization.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::config::KasumiConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{KasumiError, Result};
use crate::models::{EmbeddingItem, SearchResult};
use crate::protocol::{InfoRequest, InfoResponse, SearchRequest, SearchResponse};
use crate::session::{Session, SessionStore};
use crate::token::Token;
use crate::traits::{SearchStrategy, Spider, SpiderRegistry, StrategyRegistry};

/// Orchestrator owning the registries, sessions, and the remote client.
pub struct Kasumi {
    config: Arc<KasumiConfig>,
    spiders: SpiderRegistry,
    strategies: StrategyRegistry,
    sessions: SessionStore,
    embedding: EmbeddingClient,
}

impl Kasumi {
    /// Builds the facade from a validated config.
    pub fn new(config: KasumiConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let embedding = EmbeddingClient::new(Arc::clone(&config))?;
        let sessions = SessionStore::new(config.session_ttl());
        Ok(Self {
            config,
            spiders: SpiderRegistry::new(),
            strategies: StrategyRegistry::new(),
            sessions,
            embedding,
        })
    }

    /// The app's immutable configuration.
    pub fn config(&self) -> &KasumiConfig {
        &self.config
    }

    /// Registers a data-source spider. Names must be unique.
    pub fn add_spider(&mut self, spider: Arc<dyn Spider>) -> Result<()> {
        let name = spider.name().to_string();
        let priority = spider.priority();
        self.spiders.register(spider)?;
        info!(spider = %name, priority, "registered spider");
        Ok(())
    }

    /// Registers a search strategy. Names must be unique; registration
    /// order decides which strategy claims a column first.
    pub fn add_search_strategy(&mut self, strategy: Arc<dyn SearchStrategy>) -> Result<()> {
        let name = strategy.name().to_string();
        self.strategies.register(strategy)?;
        info!(strategy = %name, "registered search strategy");
        Ok(())
    }

    /// Registered spiders.
    pub fn spiders(&self) -> &SpiderRegistry {
        &self.spiders
    }

    /// Registered spiders in descending priority order, registration order
    /// breaking ties. Strategies fan out in this order.
    pub fn spiders_by_priority(&self) -> Vec<Arc<dyn Spider>> {
        self.spiders.by_priority()
    }

    /// Registered search strategies.
    pub fn search_strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Active end-user sessions.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Fetches the session for `uid`, creating it on first contact.
    pub async fn session(&self, uid: u64) -> Arc<Session> {
        self.sessions.get_or_create(uid).await
    }

    /// The app's own plaintext credential for billed calls.
    pub fn developer_token(&self) -> Token {
        Token::plaintext(self.config.token())
    }

    /// Direct handle on the remote embedding client.
    pub fn embedding(&self) -> &EmbeddingClient {
        &self.embedding
    }

    // ═══════════════════════════════════════════════════════════════════
    // Remote embedding proxies
    // ═══════════════════════════════════════════════════════════════════

    /// Embeds `text`, billed to the app's own token.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embedding
            .embed_text(&self.developer_token(), text)
            .await
    }

    /// Embeds `text`, billed to the given token (e.g. one relayed by an
    /// end user's session).
    pub async fn embed_text_as(&self, token: &Token, text: &str) -> Result<Vec<f32>> {
        self.embedding.embed_text(token, text).await
    }

    /// Finds stored vectors similar to `embedding`, billed to the app's
    /// own token.
    pub async fn search_embedding_similarity(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<EmbeddingItem>> {
        self.embedding
            .search_similarity(&self.developer_token(), embedding, limit)
            .await
    }

    /// Similarity search billed to the given token.
    pub async fn search_embedding_similarity_as(
        &self,
        token: &Token,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<EmbeddingItem>> {
        self.embedding.search_similarity(token, embedding, limit).await
    }

    /// Fetches a stored vector by id, billed to the app's own token.
    pub async fn get_embedding_by_id(&self, id: &str) -> Result<EmbeddingItem> {
        self.embedding
            .get_by_id(&self.developer_token(), id)
            .await
    }

    /// Fetch-by-id billed to the given token.
    pub async fn get_embedding_by_id_as(&self, token: &Token, id: &str) -> Result<EmbeddingItem> {
        self.embedding.get_by_id(token, id).await
    }

    /// Stores a vector under `id`. Free, but externally capped at 1000
    /// inserts per day; the cap surfaces as [`KasumiError::RateLimited`].
    pub async fn insert_embedding(&self, embedding: &[f32], id: &str) -> Result<bool> {
        self.embedding.insert(embedding, id).await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Inbound request handlers
    // ═══════════════════════════════════════════════════════════════════

    /// Answers a platform info probe.
    ///
    /// Handled failures never escape: they are folded into a non-zero
    /// envelope here.
    pub async fn handle_request_info(&self, request: &InfoRequest) -> InfoResponse {
        match self.dispatch_info(request) {
            Ok(data) => InfoResponse::ok(data),
            Err(err) => {
                warn!(code = err.envelope_code(), error = %err, "info request failed");
                InfoResponse::from_error(&err)
            }
        }
    }

    /// Answers a platform search request.
    ///
    /// Handled failures never escape: they are folded into a non-zero
    /// envelope here.
    pub async fn handle_request_search(&self, request: &SearchRequest) -> SearchResponse {
        match self.dispatch_search(request).await {
            Ok(results) => {
                info!(results = results.len(), "search dispatched");
                SearchResponse::ok(results)
            }
            Err(err) => {
                warn!(code = err.envelope_code(), error = %err, "search request failed");
                SearchResponse::from_error(&err)
            }
        }
    }

    fn authorize(&self, remote_search_key: &str) -> Result<()> {
        if remote_search_key != self.config.search_key() {
            return Err(KasumiError::Authorization(
                "remote_search_key does not match this app's search_key".into(),
            ));
        }
        Ok(())
    }

    fn dispatch_info(&self, request: &InfoRequest) -> Result<serde_json::Value> {
        self.authorize(&request.remote_search_key)?;

        let strategies: Vec<_> = self
            .strategies
            .strategies()
            .iter()
            .map(|s| {
                json!({
                    "name": s.name(),
                    "description": s.description(),
                    "possible_columns": s.possible_columns(),
                })
            })
            .collect();
        let spiders: Vec<_> = self
            .spiders
            .spiders()
            .iter()
            .map(|s| json!({ "name": s.name(), "priority": s.priority() }))
            .collect();

        Ok(json!({
            "app_id": self.config.app_id(),
            "version": env!("CARGO_PKG_VERSION"),
            "search_desc": self.config.search_desc(),
            "strategies": strategies,
            "spiders": spiders,
        }))
    }

    /// The dispatch pipeline: authorize, pick a strategy by column, run it
    /// under the request deadline, and collect at most `max_results`.
    async fn dispatch_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.authorize(&request.remote_search_key)?;

        let (column, value) = request.search_pair()?;

        // Track the caller before fan-out so spiders run against an
        // up-to-date session.
        if let Some(uid) = request.uid {
            let session = self.sessions.get_or_create(uid).await;
            if let Some(user_token) = &request.user_token {
                session.set_user_token(user_token.clone()).await;
            }
        }

        let strategy = self.strategies.for_column(column).ok_or_else(|| {
            KasumiError::UnsupportedColumn {
                column: column.to_string(),
            }
        })?;

        let deadline = self.config.request_timeout();
        let max_results = self.config.max_results();

        tokio::time::timeout(deadline, async {
            let stream = strategy.search(self, column, value).await?;
            stream.take(max_results).try_collect::<Vec<_>>().await
        })
        .await
        .map_err(|_| KasumiError::Timeout {
            seconds: deadline.as_secs(),
        })?
    }

    /// Serves inbound platform traffic until the process is terminated or
    /// the listener fails.
    ///
    /// Consumes the facade: registration is over once serving begins. Only
    /// transport-level failures (e.g. the bind address is taken) surface
    /// as errors; handled request failures are answered as envelopes.
    pub async fn run_forever(self) -> Result<()> {
        crate::server::serve(Arc::new(self)).await
    }
}
