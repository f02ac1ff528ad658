use thiserror::Error;

/// Validation and contract errors exposed by `metacrawl-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identifier cannot be empty")]
    EmptyIdentifier,

    #[error("record identifier is required")]
    MissingRecordIdentifier,
    #[error("record title is required")]
    MissingRecordTitle,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("config field '{field}' must be greater than zero")]
    ZeroConfigValue { field: &'static str },
    #[error("retry backoff factor must be a finite number >= 1, got {value}")]
    InvalidBackoffFactor { value: String },
    #[error("adapter base_url cannot be empty")]
    EmptyBaseUrl,
    #[error("'{field}' must be an http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },
}

/// Call-level failures of the crawl engine.
///
/// Individual adapter failures are never reported here; they live in
/// [`CrawlResult`](crate::CrawlResult) instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("no adapters resolved for identifier '{identifier}'")]
    NoAdaptersResolved { identifier: String },

    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] ValidationError),
}

/// Failures of the merge resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("no valid records to merge")]
    NoValidRecords,

    #[error("records describe different identifiers: '{expected}' and '{found}'")]
    MixedIdentifiers { expected: String, found: String },

    #[error("merged record validation failed: {0}")]
    ValidationFailed(#[source] ValidationError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
