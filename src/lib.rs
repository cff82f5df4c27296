//! # Kasumi SDK
//!
//! Rust SDK for the Kasumi remote search-and-embedding service.
//!
//! A host application registers data-source **spiders** and ranking
//! **strategies** on a [`Kasumi`] facade, serves the platform's inbound
//! search/info callbacks, and proxies outbound embedding operations to the
//! remote service.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  POST /v1/search,/v1/info  ┌─────────────────┐
//! │   Kasumi   │───────────────────────────▶│  Kasumi facade  │
//! │  platform  │◀───────────────────────────│  (this crate)   │
//! └─────┬──────┘      envelope responses    └───────┬─────────┘
//!       │                                           │
//!       │  POST /v1/embedding/*             spiders │ strategies
//!       ▲                                           ▼
//!       └──────────── outbound proxy ────── host data sources
//! ```
//!
//! ## Quick Start
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
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`models`] | Search results and embedding vectors |
//! | [`protocol`] | Wire envelopes and request bodies |
//! | [`traits`] | Spider/strategy contracts and registries |
//! | [`app`] | The orchestrating facade |
//! | [`session`] | Per-user session store |
//! | [`embedding`] | Client for the remote embedding service |
//! | [`server`] | Platform-facing HTTP server |
//! | [`token`] | Caller credentials and trust levels |
//! | [`error`] | Unified error type and envelope codes |

pub mod app;
pub mod config;
pub mod embedding;
pub mod error;
pub mod models;
pub mod protocol;
pub mod server;
pub mod session;
pub mod token;
pub mod traits;

pub use app::Kasumi;
pub use config::KasumiConfig;
pub use error::{KasumiError, Result};
