//! Source adapter contract and adapter-level errors.
//!
//! This module defines the contract (`SourceAdapter`) every remote metadata
//! source implements, along with the structured [`AdapterError`] the crawl
//! engine attaches to failed [`CrawlResult`](crate::CrawlResult)s.
//!
//! # Operations
//!
//! | Operation | Returns | Description |
//! |-----------|---------|-------------|
//! | [`fetch`](SourceAdapter::fetch) | [`Record`] | One record by identifier |
//! | [`search`](SourceAdapter::search) | `Vec<Record>` | Records matching a keyword |
//! | [`is_available`](SourceAdapter::is_available) | `bool` | Reachability probe |
//! | [`close`](SourceAdapter::close) | `()` | Release held resources |
//!
//! # Example
//!
//! ```rust,ignore
//! use metacrawl_core::{CrawlContext, Identifier, JsonApiAdapter, SourceAdapter};
//!
//! async fn lookup(adapter: &JsonApiAdapter) -> Result<(), metacrawl_core::AdapterError> {
//!     let ctx = CrawlContext::new();
//!     let id = Identifier::parse("ABP-123").expect("non-empty");
//!     let record = adapter.fetch(&ctx, &id).await?;
//!     println!("{record}");
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{CrawlContext, Identifier, Record};

/// Boxed future returned by adapter operations.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    NotFound,
    Validation,
    Cancelled,
    DeadlineExceeded,
    Unavailable,
    RateLimited,
    Parse,
    Internal,
}

/// Structured error produced by a source adapter.
///
/// The rendered message of the permanent kinds always contains the phrase the
/// retry classifier looks for, so errors surfaced through other layers keep
/// their classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterError {
    kind: AdapterErrorKind,
    message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(identifier: &str) -> Self {
        Self::new(
            AdapterErrorKind::NotFound,
            format!("movie not found: '{identifier}'"),
        )
    }

    pub fn validation(message: impl AsRef<str>) -> Self {
        Self::new(
            AdapterErrorKind::Validation,
            format!("validation failed: {}", message.as_ref()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(AdapterErrorKind::Cancelled, "context canceled")
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(AdapterErrorKind::DeadlineExceeded, "context deadline exceeded")
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::RateLimited, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Parse, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> AdapterErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            AdapterErrorKind::NotFound => "adapter.not_found",
            AdapterErrorKind::Validation => "adapter.validation",
            AdapterErrorKind::Cancelled => "adapter.cancelled",
            AdapterErrorKind::DeadlineExceeded => "adapter.deadline_exceeded",
            AdapterErrorKind::Unavailable => "adapter.unavailable",
            AdapterErrorKind::RateLimited => "adapter.rate_limited",
            AdapterErrorKind::Parse => "adapter.parse",
            AdapterErrorKind::Internal => "adapter.internal",
        }
    }

    /// Whether the error ended the attempt because the crawl context finished.
    pub const fn is_context_error(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::Cancelled | AdapterErrorKind::DeadlineExceeded
        )
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for AdapterError {}

/// Source adapter contract.
///
/// One implementation exists per remote source. Adapters are created once at
/// startup, shared behind `Arc` across concurrent crawl tasks, and closed at
/// shutdown through the registry.
///
/// # Cancellation
///
/// `fetch` and `search` receive the call's [`CrawlContext`] and should stop
/// promptly once it is done. The engine also drops in-flight futures when the
/// context deadline passes, so blocking work must not be hidden inside them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and tolerate concurrent calls.
pub trait SourceAdapter: Send + Sync {
    /// Stable adapter name, also used as the source ranking key.
    fn name(&self) -> &str;

    /// Item categories this source can describe.
    fn supported_types(&self) -> Vec<String>;

    /// Fetches the record for one identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] with kind [`AdapterErrorKind::NotFound`] when
    /// the source has no such item; transport problems should use
    /// `Unavailable` or `RateLimited` so the engine retries them.
    fn fetch<'a>(
        &'a self,
        ctx: &'a CrawlContext,
        identifier: &'a Identifier,
    ) -> AdapterFuture<'a, Result<Record, AdapterError>>;

    /// Searches the source by free-text keyword.
    fn search<'a>(
        &'a self,
        ctx: &'a CrawlContext,
        keyword: &'a str,
    ) -> AdapterFuture<'a, Result<Vec<Record>, AdapterError>>;

    /// Cheap reachability probe used by engine health checks.
    fn is_available<'a>(&'a self, ctx: &'a CrawlContext) -> AdapterFuture<'a, bool>;

    /// Releases resources held by the adapter.
    fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}
