//! Engine and adapter configuration.
//!
//! Values are constructed by the caller (typically from its own config file
//! layer) and checked with `validate()` before use; nothing here reads files
//! or the environment.

use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::ValidationError;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound for one whole `crawl_movie` call, retries included.
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
    /// Cancel sibling adapter tasks as soon as one adapter fails.
    pub fail_fast: bool,
    /// Adapter tasks running at once across all identifiers.
    pub max_concurrent_adapters: usize,
    /// Identifiers crawled at once by `crawl_batch`.
    pub max_concurrent_identifiers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            fail_fast: false,
            max_concurrent_adapters: 8,
            max_concurrent_identifiers: 4,
        }
    }
}

impl EngineConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_concurrency(mut self, adapters: usize, identifiers: usize) -> Self {
        self.max_concurrent_adapters = adapters;
        self.max_concurrent_identifiers = identifiers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_timeout.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "default_timeout",
            });
        }
        if self.max_concurrent_adapters == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "max_concurrent_adapters",
            });
        }
        if self.max_concurrent_identifiers == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "max_concurrent_identifiers",
            });
        }
        if self.retry.enabled && self.retry.max_retries == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "retry.max_retries",
            });
        }
        self.retry.backoff.validate()
    }
}

/// Request budget for one adapter: `quota_limit` calls per `quota_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl RateLimit {
    pub fn per_second(quota_limit: u32) -> Self {
        Self {
            quota_window: Duration::from_secs(1),
            quota_limit,
        }
    }
}

/// Base settings shared by HTTP-backed adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSettings {
    pub base_url: String,
    /// Per-request transport timeout.
    pub timeout: Duration,
    pub rate_limit: Option<RateLimit>,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl AdapterSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(15),
            rate_limit: None,
            proxy: None,
            user_agent: format!("metacrawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Base URL without trailing slashes, ready for path joining.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let base_url = self.normalized_base_url();
        if base_url.is_empty() {
            return Err(ValidationError::EmptyBaseUrl);
        }
        if !is_http_url(base_url) {
            return Err(ValidationError::InvalidUrl {
                field: "base_url",
                value: self.base_url.clone(),
            });
        }
        if let Some(proxy) = &self.proxy {
            let valid = is_http_url(proxy) || proxy.starts_with("socks5://");
            if !valid {
                return Err(ValidationError::InvalidUrl {
                    field: "proxy",
                    value: proxy.clone(),
                });
            }
        }
        if self.timeout.is_zero() {
            return Err(ValidationError::ZeroConfigValue { field: "timeout" });
        }
        if let Some(rate_limit) = self.rate_limit {
            if rate_limit.quota_limit == 0 || rate_limit.quota_window.is_zero() {
                return Err(ValidationError::ZeroConfigValue { field: "rate_limit" });
            }
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
