//! # Metacrawl Core
//!
//! Concurrent multi-source metadata crawling and merge resolution.
//!
//! ## Overview
//!
//! This crate looks up one catalogued item in several independent, unreliable
//! sources at once and reconciles whatever comes back into a single record:
//!
//! - **Source adapter contract** every remote source implements
//! - **Adapter registry** with per-adapter usage and health statistics
//! - **Crawl engine** with bounded fan-out, retries, timeouts and cancellation
//! - **Merge resolver** with per-field strategies, a conflict ledger and a
//!   completeness score
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | `SourceAdapter` trait and `AdapterError` |
//! | [`adapters`] | Built-in adapters (`JsonApiAdapter`) |
//! | [`circuit_breaker`] | Circuit breaker for adapter upstream calls |
//! | [`config`] | Engine and adapter settings |
//! | [`context`] | Cancellation and deadline propagation |
//! | [`domain`] | `Identifier`, `Record`, `UtcDateTime` |
//! | [`engine`] | `CrawlEngine`, `CrawlResult`, `EngineStats` |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`merger`] | `Merger`, `MergeConfig`, `MergeResult` |
//! | [`registry`] | `AdapterRegistry`, `AdapterStats` |
//! | [`retry`] | Retry policy and error classification |
//! | [`throttling`] | Rate limiting support |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use metacrawl_core::{
//!     AdapterSettings, CrawlContext, CrawlEngine, EngineConfig, Identifier, JsonApiAdapter,
//!     Merger,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CrawlEngine::new(EngineConfig::default())?;
//!     let settings = AdapterSettings::new("https://api.example.test");
//!     let javdb = JsonApiAdapter::connect("javdb", settings)?;
//!     engine.register_adapter("javdb", Arc::new(javdb));
//!
//!     let ctx = CrawlContext::new();
//!     let id = Identifier::parse("ABP-123")?;
//!     let results = engine.crawl_movie(&ctx, &id, &[] as &[&str]).await?;
//!
//!     let merged = Merger::default().merge_results(&results)?;
//!     println!("{} (quality {:.2})", merged.merged_record, merged.merge_stats.quality_score);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Caller         │
//! └────────┬────────┘
//!          │ crawl_movie / crawl_batch
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Crawl Engine   │────▶│ Adapter Registry │
//! └────────┬────────┘     └──────────────────┘
//!          │ one task per adapter
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Source Adapter  │────▶│ HTTP Client      │
//! │ (trait)         │     │ (reqwest/fixture)│
//! └────────┬────────┘     └──────────────────┘
//!          │ Vec<CrawlResult>
//!          ▼
//! ┌─────────────────┐
//! │ Merge Resolver  │──▶ MergeResult
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapter failures never abort a crawl; they are reported per adapter inside
//! each [`CrawlResult`]:
//!
//! ```rust
//! use metacrawl_core::{AdapterErrorKind, CrawlResult};
//!
//! fn describe(result: &CrawlResult) -> &'static str {
//!     match result.error().map(|error| error.kind()) {
//!         None => "ok",
//!         Some(AdapterErrorKind::NotFound) => "source has no such item",
//!         Some(AdapterErrorKind::DeadlineExceeded) => "source too slow",
//!         Some(_) => "source failed",
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod adapter;
pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod merger;
pub mod registry;
pub mod retry;
pub mod throttling;

// Re-export the adapter contract
pub use adapter::{AdapterError, AdapterErrorKind, AdapterFuture, SourceAdapter};

// Re-export built-in adapters
pub use adapters::JsonApiAdapter;

// Re-export circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Re-export configuration
pub use config::{AdapterSettings, EngineConfig, RateLimit};

// Re-export context
pub use context::CrawlContext;

// Re-export domain types
pub use domain::{Identifier, Provenance, Record, UtcDateTime};

// Re-export engine types
pub use engine::{
    CrawlEngine, CrawlResult, EngineStats, ProgressCallback, ProgressEvent, ProgressStage,
    ENGINE_SOURCE,
};

// Re-export error types
pub use error::{CoreError, CrawlError, MergeError, ValidationError};

// Re-export HTTP client types
pub use http_client::{
    FixtureHttpClient, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Re-export merger types
pub use merger::{
    quality_score, Field, FieldStrategy, MergeConfig, MergeResult, MergeStats, Merger,
    SourceRanking, MERGED_SOURCE,
};

// Re-export registry types
pub use registry::{AdapterRegistry, AdapterStats};

// Re-export retry types
pub use retry::{should_retry, Backoff, RetryPolicy};

// Re-export throttling
pub use throttling::Throttle;
