//! Extension traits for spiders and search strategies.
//!
//! This module provides the trait-based extension system of the SDK. Host
//! applications implement [`Spider`] for each data source they can answer
//! queries from, and optionally [`SearchStrategy`] for custom fan-out or
//! ranking policies; both are registered on the [`Kasumi`] facade at
//! startup.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    Kasumi                     │
//! │  ┌────────────────┐    ┌───────────────────┐  │
//! │  │ SpiderRegistry │    │ StrategyRegistry  │  │
//! │  │  db / fs / api │    │ default / dedup / │  │
//! │  │    spiders     │    │   custom (Rust)   │  │
//! │  └───────┬────────┘    └─────────┬─────────┘  │
//! └──────────┼───────────────────────┼────────────┘
//!            ▼                       ▼
//!     spider.search()      priority-ordered merge
//!            └───────────┬───────────┘
//!                        ▼
//!       handle_request_search() → envelope
//! ```
//!
//! # Usage
//!
//! ```rust
//! use kasumi::traits::{DefaultSearchStrategy, SpiderRegistry, StrategyRegistry};
//! use std::sync::Arc;
//!
//! let mut spiders = SpiderRegistry::new();
//! // spiders.register(Arc::new(MySpider::new()))?;
//!
//! let mut strategies = StrategyRegistry::new();
//! strategies.register(Arc::new(DefaultSearchStrategy::new(["name"]))).unwrap();
//! ```

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use sha2::{Digest, Sha256};

use crate::app::Kasumi;
use crate::error::{KasumiError, Result};
use crate::models::SearchResult;

/// Lazy, finite sequence of search results.
///
/// Spiders and strategies hand results back as a stream so a slow backing
/// store only produces as many records as the dispatcher actually consumes;
/// the result-count bound stops pulling once it is satisfied.
pub type SearchStream = BoxStream<'static, Result<SearchResult>>;

/// Wraps already-materialized results as a [`SearchStream`].
pub fn results_stream(results: Vec<SearchResult>) -> SearchStream {
    Box::pin(stream::iter(results.into_iter().map(Ok)))
}

// ═══════════════════════════════════════════════════════════════════════
// Spider Trait
// ═══════════════════════════════════════════════════════════════════════

/// A data source that answers column/value queries from its own store.
///
/// Implement this trait once per backing store the host application can
/// search. Spiders only read; any mutation of the backing store happens
/// outside the search path.
///
/// # Lifecycle
///
/// 1. The spider is registered via [`Kasumi::add_spider`].
/// 2. A search strategy selects it, typically by descending
///    [`priority`](Spider::priority) with registration order breaking ties.
/// 3. [`search`](Spider::search) is called with the query pair and yields
///    a lazy stream of matches.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use kasumi::models::SearchResult;
/// use kasumi::traits::{results_stream, SearchStream, Spider};
/// use kasumi::Result;
///
/// pub struct PopipaSpider;
///
/// #[async_trait]
/// impl Spider for PopipaSpider {
///     fn name(&self) -> &str { "Popipa" }
///     fn priority(&self) -> i32 { 1 }
///
///     async fn search(&self, column: &str, value: &str) -> Result<SearchStream> {
///         let mut results = Vec::new();
///         if column == "name" && value == "Arisa" {
///             results.push(SearchResult::from_columns(
///                 [("name", "Arisa Ichigaya"), ("band", "Poppin'Party")],
///                 &[],
///                 &[],
///             ));
///         }
///         Ok(results_stream(results))
///     }
/// }
/// ```
#[async_trait]
pub trait Spider: Send + Sync {
    /// Stable, non-empty identifier. Registration rejects duplicates.
    fn name(&self) -> &str;

    /// Ordering weight: higher-priority spiders are consulted first when
    /// several can answer the same column. Ties keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Searches the backing store for records matching `value` in `column`.
    ///
    /// "No matches" is an empty stream, not an error; fail only on genuine
    /// operational faults such as an unreachable store. Called on the tokio
    /// runtime and free to perform I/O.
    async fn search(&self, column: &str, value: &str) -> Result<SearchStream>;
}

// ═══════════════════════════════════════════════════════════════════════
// SearchStrategy Trait
// ═══════════════════════════════════════════════════════════════════════

/// A policy deciding which spiders answer a query, and in what order.
///
/// Strategies see the whole [`Kasumi`] facade so they can enumerate the
/// registered spiders; they must hand back a `'static` stream, so anything
/// borrowed from the facade has to be cloned out before the stream is built
/// (spider handles are `Arc`s precisely for this).
///
/// Dispatch consults [`possible_columns`](SearchStrategy::possible_columns)
/// before invoking a strategy: the first registered strategy claiming the
/// requested column wins.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Stable, non-empty identifier. Registration rejects duplicates.
    fn name(&self) -> &str;

    /// One-line description surfaced through the info endpoint.
    fn description(&self) -> &str;

    /// Query columns this strategy understands.
    fn possible_columns(&self) -> &[String];

    /// Produces the merged result stream for one query.
    ///
    /// Must reject columns outside
    /// [`possible_columns`](SearchStrategy::possible_columns) with
    /// [`KasumiError::UnsupportedColumn`] rather than silently yielding
    /// nothing.
    async fn search(&self, app: &Kasumi, column: &str, value: &str) -> Result<SearchStream>;
}

/// Attributes a failure to the spider that raised it, unless it already
/// names one.
fn spider_fault(name: &str, err: KasumiError) -> KasumiError {
    match err {
        e @ KasumiError::Spider { .. } => e,
        e => KasumiError::spider(name, e),
    }
}

/// Consults every spider in descending priority order and concatenates
/// their streams. Shared by the built-in strategies.
fn fan_out(spiders: Vec<Arc<dyn Spider>>, column: &str, value: &str) -> SearchStream {
    let column = column.to_string();
    let value = value.to_string();
    Box::pin(try_stream! {
        for spider in spiders {
            let name = spider.name().to_string();
            let mut results = spider
                .search(&column, &value)
                .await
                .map_err(|e| spider_fault(&name, e))?;
            while let Some(item) = results.next().await {
                let item = item.map_err(|e| spider_fault(&name, e))?;
                yield item;
            }
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Strategies
// ═══════════════════════════════════════════════════════════════════════

/// The standard fan-out policy.
///
/// Consults every registered spider in descending priority order
/// (registration order breaking ties) and concatenates each spider's
/// results in that order, without deduplication.
pub struct DefaultSearchStrategy {
    columns: Vec<String>,
}

impl DefaultSearchStrategy {
    /// Builds the strategy for the given set of supported columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the strategy from the columns a config declares in its
    /// `search_desc` table.
    pub fn from_config(config: &crate::config::KasumiConfig) -> Self {
        Self::new(config.search_desc().keys().cloned())
    }

    fn supports(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[async_trait]
impl SearchStrategy for DefaultSearchStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn description(&self) -> &str {
        "Consults every registered spider in descending priority order and concatenates their results"
    }

    fn possible_columns(&self) -> &[String] {
        &self.columns
    }

    async fn search(&self, app: &Kasumi, column: &str, value: &str) -> Result<SearchStream> {
        if !self.supports(column) {
            return Err(KasumiError::UnsupportedColumn {
                column: column.to_string(),
            });
        }
        Ok(fan_out(app.spiders_by_priority(), column, value))
    }
}

/// Like [`DefaultSearchStrategy`], but drops records already seen.
///
/// Two records are duplicates when every field agrees on key and content;
/// the first occurrence (from the highest-priority spider) survives.
pub struct DedupSearchStrategy {
    columns: Vec<String>,
}

impl DedupSearchStrategy {
    /// Builds the strategy for the given set of supported columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Content fingerprint used to detect duplicate records across spiders.
    pub fn fingerprint(result: &SearchResult) -> String {
        let mut hasher = Sha256::new();
        for field in result.fields() {
            hasher.update(field.key().as_bytes());
            hasher.update([0x1f]);
            hasher.update(field.content().as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl SearchStrategy for DedupSearchStrategy {
    fn name(&self) -> &str {
        "dedup"
    }

    fn description(&self) -> &str {
        "Priority-ordered fan-out that drops records already produced by an earlier spider"
    }

    fn possible_columns(&self) -> &[String] {
        &self.columns
    }

    async fn search(&self, app: &Kasumi, column: &str, value: &str) -> Result<SearchStream> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(KasumiError::UnsupportedColumn {
                column: column.to_string(),
            });
        }
        let mut merged = fan_out(app.spiders_by_priority(), column, value);
        Ok(Box::pin(try_stream! {
            let mut seen = HashSet::new();
            while let Some(item) = merged.next().await {
                let item = item?;
                if seen.insert(Self::fingerprint(&item)) {
                    yield item;
                }
            }
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registries
// ═══════════════════════════════════════════════════════════════════════

/// Registry of data-source spiders.
///
/// Spiders are shared handles: the registry holds an `Arc` to each so
/// strategies can clone them into `'static` result streams. Names must be
/// unique; registering a second spider under an existing name fails rather
/// than making dispatch ambiguous.
pub struct SpiderRegistry {
    spiders: Vec<Arc<dyn Spider>>,
}

impl SpiderRegistry {
    /// Create an empty spider registry.
    pub fn new() -> Self {
        Self {
            spiders: Vec::new(),
        }
    }

    /// Register a spider, rejecting duplicate names.
    pub fn register(&mut self, spider: Arc<dyn Spider>) -> Result<()> {
        if self.spiders.iter().any(|s| s.name() == spider.name()) {
            return Err(KasumiError::DuplicateSpider(spider.name().to_string()));
        }
        self.spiders.push(spider);
        Ok(())
    }

    /// All registered spiders, in registration order.
    pub fn spiders(&self) -> &[Arc<dyn Spider>] {
        &self.spiders
    }

    /// All registered spiders in descending priority order; spiders with
    /// equal priority keep their registration order.
    pub fn by_priority(&self) -> Vec<Arc<dyn Spider>> {
        let mut ordered = self.spiders.to_vec();
        ordered.sort_by_key(|s| Reverse(s.priority()));
        ordered
    }

    /// Find a spider by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Spider>> {
        self.spiders
            .iter()
            .find(|s| s.name() == name)
            .map(Arc::clone)
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.spiders.is_empty()
    }

    /// Return the count of registered spiders.
    pub fn len(&self) -> usize {
        self.spiders.len()
    }
}

impl Default for SpiderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of search strategies.
///
/// Dispatch picks the first registered strategy whose
/// [`possible_columns`](SearchStrategy::possible_columns) contains the
/// requested column, so registration order is a deliberate part of the
/// routing policy.
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn SearchStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty strategy registry.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Register a strategy, rejecting duplicate names.
    pub fn register(&mut self, strategy: Arc<dyn SearchStrategy>) -> Result<()> {
        if self.strategies.iter().any(|s| s.name() == strategy.name()) {
            return Err(KasumiError::DuplicateStrategy(strategy.name().to_string()));
        }
        self.strategies.push(strategy);
        Ok(())
    }

    /// All registered strategies, in registration order.
    pub fn strategies(&self) -> &[Arc<dyn SearchStrategy>] {
        &self.strategies
    }

    /// Find a strategy by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn SearchStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(Arc::clone)
    }

    /// First registered strategy accepting the given column.
    pub fn for_column(&self, column: &str) -> Option<Arc<dyn SearchStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.possible_columns().iter().any(|c| c == column))
            .map(Arc::clone)
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Return the count of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedSpider {
        name: &'static str,
        priority: i32,
    }

    #[async_trait]
    impl Spider for NamedSpider {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn search(&self, _column: &str, _value: &str) -> Result<SearchStream> {
            Ok(results_stream(Vec::new()))
        }
    }

    #[test]
    fn spider_registry_rejects_duplicate_names() {
        let mut registry = SpiderRegistry::new();
        registry
            .register(Arc::new(NamedSpider {
                name: "popipa",
                priority: 0,
            }))
            .unwrap();

        let err = registry
            .register(Arc::new(NamedSpider {
                name: "popipa",
                priority: 9,
            }))
            .unwrap_err();
        assert!(matches!(err, KasumiError::DuplicateSpider(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn by_priority_sorts_descending_and_keeps_registration_order_on_ties() {
        let mut registry = SpiderRegistry::new();
        for (name, priority) in [("low", 1), ("first-high", 5), ("second-high", 5), ("top", 9)] {
            registry
                .register(Arc::new(NamedSpider { name, priority }))
                .unwrap();
        }

        let names: Vec<_> = registry
            .by_priority()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["top", "first-high", "second-high", "low"]);
    }

    #[test]
    fn strategy_registry_routes_to_first_matching_registration() {
        let mut registry = StrategyRegistry::new();
        registry
            .register(Arc::new(DefaultSearchStrategy::new(["name"])))
            .unwrap();
        registry
            .register(Arc::new(DedupSearchStrategy::new(["name", "band"])))
            .unwrap();

        assert_eq!(registry.for_column("name").unwrap().name(), "default");
        assert_eq!(registry.for_column("band").unwrap().name(), "dedup");
        assert!(registry.for_column("album").is_none());
    }

    #[test]
    fn strategy_registry_rejects_duplicate_names() {
        let mut registry = StrategyRegistry::new();
        registry
            .register(Arc::new(DefaultSearchStrategy::new(["name"])))
            .unwrap();
        let err = registry
            .register(Arc::new(DefaultSearchStrategy::new(["band"])))
            .unwrap_err();
        assert!(matches!(err, KasumiError::DuplicateStrategy(_)));
    }

    #[test]
    fn fingerprint_distinguishes_content_but_ignores_flags() {
        let plain = SearchResult::from_columns([("name", "Arisa")], &[], &[]);
        let flagged = SearchResult::from_columns([("name", "Arisa")], &["name"], &[]);
        let other = SearchResult::from_columns([("name", "Kasumi")], &[], &[]);

        assert_eq!(
            DedupSearchStrategy::fingerprint(&plain),
            DedupSearchStrategy::fingerprint(&flagged)
        );
        assert_ne!(
            DedupSearchStrategy::fingerprint(&plain),
            DedupSearchStrategy::fingerprint(&other)
        );
    }
}
