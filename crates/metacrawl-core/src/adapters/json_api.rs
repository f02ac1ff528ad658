use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::adapter::{AdapterError, AdapterFuture, SourceAdapter};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::AdapterSettings;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::throttling::Throttle;
use crate::{CrawlContext, Identifier, Record, UtcDateTime};

/// Adapter for metadata services that expose records as JSON.
///
/// | Operation | Request |
/// |-----------|---------|
/// | `fetch` | `GET {base}/movies/{identifier}` → one record |
/// | `search` | `GET {base}/search?q={keyword}` → array of records |
/// | `is_available` | `GET {base}/health` → any 2xx |
///
/// Record bodies use the same field names as [`Record`]'s serde form. A body
/// without an identifier inherits the requested one.
pub struct JsonApiAdapter {
    name: String,
    settings: AdapterSettings,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: CircuitBreaker,
    throttle: Option<Throttle>,
    closed: AtomicBool,
}

impl JsonApiAdapter {
    /// Adapter over a caller-supplied transport.
    pub fn new(
        name: impl Into<String>,
        settings: AdapterSettings,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, AdapterError> {
        settings
            .validate()
            .map_err(|error| AdapterError::validation(error.to_string()))?;

        let name = name.into();
        Ok(Self {
            circuit_breaker: CircuitBreaker::new(name.clone(), CircuitBreakerConfig::default()),
            throttle: settings.rate_limit.map(Throttle::new),
            name,
            settings,
            http_client,
            closed: AtomicBool::new(false),
        })
    }

    /// Adapter over a reqwest transport built from `settings`.
    pub fn connect(
        name: impl Into<String>,
        settings: AdapterSettings,
    ) -> Result<Self, AdapterError> {
        settings
            .validate()
            .map_err(|error| AdapterError::validation(error.to_string()))?;
        let client = ReqwestHttpClient::from_settings(&settings)?;
        Self::new(name, settings, Arc::new(client))
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = CircuitBreaker::new(self.name.clone(), config);
        self
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    fn movie_url(&self, identifier: &Identifier) -> String {
        format!(
            "{}/movies/{}",
            self.settings.normalized_base_url(),
            urlencoding::encode(identifier.as_str())
        )
    }

    fn search_url(&self, keyword: &str) -> String {
        format!(
            "{}/search?q={}",
            self.settings.normalized_base_url(),
            urlencoding::encode(keyword)
        )
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.settings.normalized_base_url())
    }

    /// Issues one GET through breaker, throttle and context, mapping HTTP
    /// statuses to adapter errors.
    async fn get(
        &self,
        ctx: &CrawlContext,
        url: String,
        not_found: impl FnOnce() -> AdapterError,
    ) -> Result<HttpResponse, AdapterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AdapterError::unavailable(format!(
                "adapter '{}' is closed",
                self.name
            )));
        }
        self.circuit_breaker.check()?;
        if let Some(throttle) = &self.throttle {
            throttle.acquire(ctx).await?;
        }

        debug!("{} GET {}", self.name, url);
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout(self.settings.timeout);

        let outcome = match ctx.run(self.http_client.execute(request)).await {
            Ok(Ok(response)) => status_to_result(response, not_found),
            Ok(Err(transport)) => Err(AdapterError::from(transport)),
            Err(context) => Err(context),
        };

        match &outcome {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(error) => self.circuit_breaker.record_failure(error),
        }
        outcome
    }

    fn stamp(&self, mut record: Record, url: &str) -> Record {
        record.provenance.source = self.name.clone();
        if record.provenance.source_url.is_none() {
            record.provenance.source_url = Some(url.to_owned());
        }
        if record.provenance.fetched_at.is_none() {
            record.provenance.fetched_at = Some(UtcDateTime::now());
        }
        record
    }
}

fn status_to_result(
    response: HttpResponse,
    not_found: impl FnOnce() -> AdapterError,
) -> Result<HttpResponse, AdapterError> {
    match response.status {
        200..=299 => Ok(response),
        404 => Err(not_found()),
        429 => Err(AdapterError::rate_limited("upstream returned status 429")),
        status @ 500..=599 => Err(AdapterError::unavailable(format!(
            "upstream returned status {status}"
        ))),
        status => Err(AdapterError::internal(format!(
            "unexpected upstream status {status}"
        ))),
    }
}

impl SourceAdapter for JsonApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_types(&self) -> Vec<String> {
        vec![String::from("movie")]
    }

    fn fetch<'a>(
        &'a self,
        ctx: &'a CrawlContext,
        identifier: &'a Identifier,
    ) -> AdapterFuture<'a, Result<Record, AdapterError>> {
        Box::pin(async move {
            let url = self.movie_url(identifier);
            let response = self
                .get(ctx, url.clone(), || AdapterError::not_found(identifier.as_str()))
                .await?;

            let mut record: Record = serde_json::from_str(&response.body).map_err(|error| {
                AdapterError::parse(format!("{}: malformed record body: {error}", self.name))
            })?;
            if !record.has_identifier() {
                record.identifier = identifier.as_str().to_owned();
            }
            record
                .validate()
                .map_err(|error| AdapterError::validation(error.to_string()))?;

            Ok(self.stamp(record, &url))
        })
    }

    fn search<'a>(
        &'a self,
        ctx: &'a CrawlContext,
        keyword: &'a str,
    ) -> AdapterFuture<'a, Result<Vec<Record>, AdapterError>> {
        Box::pin(async move {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                return Err(AdapterError::validation("search keyword cannot be empty"));
            }

            let url = self.search_url(keyword);
            let response = match self
                .get(ctx, url.clone(), || AdapterError::not_found(keyword))
                .await
            {
                Ok(response) => response,
                Err(error) if error.kind() == crate::AdapterErrorKind::NotFound => {
                    return Ok(Vec::new())
                }
                Err(error) => return Err(error),
            };

            let records: Vec<Record> = serde_json::from_str(&response.body).map_err(|error| {
                AdapterError::parse(format!("{}: malformed search body: {error}", self.name))
            })?;

            Ok(records
                .into_iter()
                .filter(Record::has_identifier)
                .map(|record| self.stamp(record, &url))
                .collect())
        })
    }

    fn is_available<'a>(&'a self, ctx: &'a CrawlContext) -> AdapterFuture<'a, bool> {
        Box::pin(async move {
            if self.circuit_breaker.state() == CircuitState::Open {
                return false;
            }
            self.get(ctx, self.health_url(), || AdapterError::unavailable("no health endpoint"))
                .await
                .is_ok()
        })
    }

    fn close(&self) -> Result<(), AdapterError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
