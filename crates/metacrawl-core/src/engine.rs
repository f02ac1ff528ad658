//! Concurrent multi-adapter crawl orchestration.
//!
//! [`CrawlEngine::crawl_movie`] fans one identifier out to every requested
//! adapter at once, retries transient failures, and bounds the whole call by
//! the configured timeout. [`CrawlEngine::crawl_batch`] adds a second level of
//! concurrency across identifiers.
//!
//! ```text
//! crawl_batch ──▶ identifier permits (max_concurrent_identifiers)
//!      │
//!      ▼
//! crawl_movie ──▶ adapter permits (max_concurrent_adapters)
//!      │
//!      ├──▶ task: fetch → retry → CrawlResult ─┐
//!      ├──▶ task: fetch → retry → CrawlResult ─┼──▶ mpsc ──▶ Vec<CrawlResult>
//!      └──▶ task: fetch → retry → CrawlResult ─┘            (arrival order)
//! ```
//!
//! The two permit pools are independent, so identifier tasks waiting on
//! adapter permits can never starve each other of identifier permits.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterError, SourceAdapter};
use crate::registry::{rolling_average, serialize_millis, AdapterRegistry, AdapterStats};
use crate::retry::should_retry;
use crate::{
    CoreError, CrawlContext, CrawlError, EngineConfig, Identifier, MergeResult, Merger, Record,
    UtcDateTime,
};

/// Source name used for synthetic results produced by the engine itself.
pub const ENGINE_SOURCE: &str = "engine";

/// Outcome of crawling one identifier through one adapter.
///
/// Holds either a record or an error, never both and never neither.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    pub source: String,
    pub outcome: Result<Record, AdapterError>,
    /// Wall time spent in the adapter task, retries and backoff included.
    pub duration: Duration,
    pub timestamp: UtcDateTime,
    /// Number of `fetch` calls made.
    pub attempts: u32,
}

impl CrawlResult {
    pub fn success(source: impl Into<String>, record: Record, duration: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: Ok(record),
            duration,
            timestamp: UtcDateTime::now(),
            attempts: 1,
        }
    }

    pub fn failure(source: impl Into<String>, error: AdapterError, duration: Duration) -> Self {
        Self {
            source: source.into(),
            outcome: Err(error),
            duration,
            timestamp: UtcDateTime::now(),
            attempts: 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn record(&self) -> Option<&Record> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AdapterError> {
        self.outcome.as_ref().err()
    }

    pub fn into_record(self) -> Option<Record> {
        self.outcome.ok()
    }
}

#[derive(Serialize)]
struct CrawlResultView<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
    timestamp: UtcDateTime,
    attempts: u32,
}

impl Serialize for CrawlResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        CrawlResultView {
            source: &self.source,
            record: self.record(),
            error: self.error().map(ToString::to_string),
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            timestamp: self.timestamp,
            attempts: self.attempts,
        }
        .serialize(serializer)
    }
}

/// Aggregate counters across every adapter task the engine has run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub total_requests: u64,
    pub successful_crawls: u64,
    pub failed_crawls: u64,
    #[serde(rename = "average_latency_ms", serialize_with = "serialize_millis")]
    pub average_latency: Duration,
    pub adapter_stats: BTreeMap<String, AdapterStats>,
    pub last_reset: UtcDateTime,
}

#[derive(Debug)]
struct EngineCounters {
    total_requests: u64,
    successful_crawls: u64,
    failed_crawls: u64,
    average_latency: Duration,
    last_reset: UtcDateTime,
}

impl EngineCounters {
    fn new() -> Self {
        Self {
            total_requests: 0,
            successful_crawls: 0,
            failed_crawls: 0,
            average_latency: Duration::ZERO,
            last_reset: UtcDateTime::now(),
        }
    }

    fn record(&mut self, result: &CrawlResult) {
        self.total_requests += 1;
        if result.is_success() {
            self.successful_crawls += 1;
        } else {
            self.failed_crawls += 1;
        }
        self.average_latency = rolling_average(self.average_latency, result.duration);
    }
}

/// Stage reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Connecting,
    Retrying,
    Succeeded,
    Failed,
}

/// Progress notification for one adapter task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub adapter: String,
    pub identifier: String,
    pub stage: ProgressStage,
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct EngineInner {
    registry: Arc<AdapterRegistry>,
    config: EngineConfig,
    counters: Mutex<EngineCounters>,
    adapter_permits: Arc<Semaphore>,
    identifier_permits: Arc<Semaphore>,
    progress: RwLock<Option<ProgressCallback>>,
}

/// Crawl orchestrator. Cheap to clone; clones share registry, stats and permits.
#[derive(Clone)]
pub struct CrawlEngine {
    inner: Arc<EngineInner>,
}

impl CrawlEngine {
    pub fn new(config: EngineConfig) -> Result<Self, CrawlError> {
        Self::with_registry(config, Arc::new(AdapterRegistry::new()))
    }

    pub fn with_registry(
        config: EngineConfig,
        registry: Arc<AdapterRegistry>,
    ) -> Result<Self, CrawlError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                adapter_permits: Arc::new(Semaphore::new(config.max_concurrent_adapters)),
                identifier_permits: Arc::new(Semaphore::new(config.max_concurrent_identifiers)),
                registry,
                config,
                counters: Mutex::new(EngineCounters::new()),
                progress: RwLock::new(None),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.inner.registry
    }

    /// Registers an adapter. Intended for setup, before crawling starts.
    pub fn register_adapter(&self, name: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        self.inner.registry.register(name, adapter);
    }

    /// Registered adapter names in sorted order.
    pub fn available_adapters(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        *self
            .inner
            .progress
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Crawls one identifier through the named adapters, or all registered
    /// adapters when `adapter_names` is empty.
    ///
    /// Returns one [`CrawlResult`] per resolved adapter, in completion order.
    ///
    /// # Errors
    ///
    /// Fails only with [`CrawlError::NoAdaptersResolved`] when none of the
    /// requested names (or no adapter at all) is registered. Adapter failures
    /// are reported inside the results.
    pub async fn crawl_movie<S>(
        &self,
        ctx: &CrawlContext,
        identifier: &Identifier,
        adapter_names: &[S],
    ) -> Result<Vec<CrawlResult>, CrawlError>
    where
        S: AsRef<str>,
    {
        let adapters = self.resolve_adapters(identifier, adapter_names)?;
        let started = Instant::now();
        let call_ctx = ctx.with_timeout(self.inner.config.default_timeout);

        info!(
            "crawling '{}' with {} adapter(s): {}",
            identifier,
            adapters.len(),
            adapters
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (sender, mut receiver) = mpsc::channel(adapters.len());
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(adapters.len());

        for (name, adapter) in adapters {
            let engine = self.clone();
            let sender = sender.clone();
            let ctx = call_ctx.clone();
            let identifier = identifier.clone();
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let result = engine
                    .crawl_single(&ctx, &task_name, adapter.as_ref(), &identifier)
                    .await;
                // The receiver lives until every sender is gone.
                let _ = sender.send(result).await;
            });
            handles.push((name, handle));
        }
        drop(sender);

        let mut results = Vec::with_capacity(handles.len());
        while let Some(result) = receiver.recv().await {
            if self.inner.config.fail_fast && !result.is_success() && !call_ctx.is_cancelled() {
                warn!(
                    "fail-fast: '{}' failed for '{}'; cancelling remaining adapters",
                    result.source, identifier
                );
                call_ctx.cancel();
            }
            results.push(result);
        }

        for (name, handle) in handles {
            if let Err(join_error) = handle.await {
                warn!("adapter task '{}' for '{}' aborted: {}", name, identifier, join_error);
                let result = CrawlResult::failure(
                    name,
                    AdapterError::internal(format!("adapter task aborted: {join_error}")),
                    started.elapsed(),
                );
                self.record_stats(&result);
                results.push(result);
            }
        }

        let succeeded = results.iter().filter(|result| result.is_success()).count();
        info!(
            "crawled '{}': {}/{} adapter(s) succeeded in {:?}",
            identifier,
            succeeded,
            results.len(),
            started.elapsed()
        );

        Ok(results)
    }

    /// Crawls one identifier and merges the successful records.
    ///
    /// Call-level crawl failures surface as [`CoreError::Crawl`]; an item no
    /// adapter could supply surfaces as [`CoreError::Merge`].
    pub async fn crawl_and_merge<S>(
        &self,
        ctx: &CrawlContext,
        identifier: &Identifier,
        adapter_names: &[S],
        merger: &Merger,
    ) -> Result<MergeResult, CoreError>
    where
        S: AsRef<str>,
    {
        let results = self.crawl_movie(ctx, identifier, adapter_names).await?;
        Ok(merger.merge_results(&results)?)
    }

    /// Crawls several identifiers concurrently.
    ///
    /// An identifier whose crawl fails at call level gets a single synthetic
    /// result with source [`ENGINE_SOURCE`] instead of aborting the batch.
    /// Duplicate identifiers are crawled once.
    pub async fn crawl_batch<S>(
        &self,
        ctx: &CrawlContext,
        identifiers: &[Identifier],
        adapter_names: &[S],
    ) -> HashMap<Identifier, Vec<CrawlResult>>
    where
        S: AsRef<str>,
    {
        let adapter_names = adapter_names
            .iter()
            .map(|name| name.as_ref().to_owned())
            .collect::<Arc<[String]>>();
        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(identifiers.len());

        for identifier in identifiers {
            if !seen.insert(identifier.clone()) {
                continue;
            }

            let engine = self.clone();
            let ctx = ctx.clone();
            let names = Arc::clone(&adapter_names);
            let task_identifier = identifier.clone();
            let permits = Arc::clone(&self.inner.identifier_permits);

            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let _permit = match ctx.run(permits.acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(closed)) => {
                        return vec![engine_failure(
                            AdapterError::internal(closed.to_string()),
                            started,
                        )];
                    }
                    Err(error) => return vec![engine_failure(error, started)],
                };

                match engine.crawl_movie(&ctx, &task_identifier, &names[..]).await {
                    Ok(results) => results,
                    Err(error) => {
                        warn!("batch crawl of '{}' failed: {}", task_identifier, error);
                        vec![engine_failure(
                            AdapterError::internal(error.to_string()),
                            started,
                        )]
                    }
                }
            });
            handles.push((identifier.clone(), handle, Instant::now()));
        }

        let mut output = HashMap::with_capacity(handles.len());
        for (identifier, handle, started) in handles {
            let results = handle.await.unwrap_or_else(|join_error| {
                warn!("batch task for '{}' aborted: {}", identifier, join_error);
                vec![engine_failure(
                    AdapterError::internal(format!("batch task aborted: {join_error}")),
                    started,
                )]
            });
            output.insert(identifier, results);
        }
        output
    }

    /// True when at least one registered adapter reports itself available.
    pub async fn is_healthy(&self, ctx: &CrawlContext) -> bool {
        for (name, adapter) in self.inner.registry.get_all() {
            match ctx.run(adapter.is_available(ctx)).await {
                Ok(true) => return true,
                Ok(false) => debug!("adapter '{}' reported unavailable", name),
                Err(error) => {
                    debug!("health probe interrupted: {}", error);
                    return false;
                }
            }
        }
        false
    }

    /// Independent snapshot of engine and per-adapter statistics.
    pub fn stats(&self) -> EngineStats {
        let counters = self
            .inner
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        EngineStats {
            total_requests: counters.total_requests,
            successful_crawls: counters.successful_crawls,
            failed_crawls: counters.failed_crawls,
            average_latency: counters.average_latency,
            last_reset: counters.last_reset,
            adapter_stats: self.inner.registry.all_stats(),
        }
    }

    pub fn reset_stats(&self) {
        *self
            .inner
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = EngineCounters::new();
        self.inner.registry.reset_stats();
    }

    /// Closes every registered adapter; returns those that failed to close.
    pub fn close(&self) -> Vec<(String, AdapterError)> {
        self.inner.registry.close()
    }

    fn resolve_adapters<S>(
        &self,
        identifier: &Identifier,
        adapter_names: &[S],
    ) -> Result<Vec<(String, Arc<dyn SourceAdapter>)>, CrawlError>
    where
        S: AsRef<str>,
    {
        let requested = if adapter_names.is_empty() {
            self.inner.registry.names()
        } else {
            dedupe_names(adapter_names)
        };

        let mut resolved = Vec::with_capacity(requested.len());
        for name in requested {
            match self.inner.registry.get(&name) {
                Some(adapter) => resolved.push((name, adapter)),
                None => warn!("adapter '{}' is not registered; skipping", name),
            }
        }

        if resolved.is_empty() {
            return Err(CrawlError::NoAdaptersResolved {
                identifier: identifier.to_string(),
            });
        }
        Ok(resolved)
    }

    async fn crawl_single(
        &self,
        ctx: &CrawlContext,
        name: &str,
        adapter: &dyn SourceAdapter,
        identifier: &Identifier,
    ) -> CrawlResult {
        let started = Instant::now();
        let timestamp = UtcDateTime::now();
        let policy = &self.inner.config.retry;
        let max_attempts = policy.max_attempts();
        let mut attempts = 0;

        let permits = Arc::clone(&self.inner.adapter_permits);
        let outcome = match ctx.run(permits.acquire_owned()).await {
            Ok(Ok(_permit)) => {
                self.emit(name, identifier, ProgressStage::Connecting, 1, started);

                loop {
                    if let Some(error) = ctx.err() {
                        break Err(error);
                    }
                    attempts += 1;

                    let result = ctx
                        .run(adapter.fetch(ctx, identifier))
                        .await
                        .and_then(|fetched| fetched);

                    let error = match result {
                        Ok(record) => break Ok(record),
                        Err(error) => error,
                    };

                    if attempts >= max_attempts || !should_retry(&error) {
                        break Err(error);
                    }

                    debug!(
                        "'{}' attempt {}/{} for '{}' failed: {}",
                        name, attempts, max_attempts, identifier, error
                    );
                    self.emit(
                        name,
                        identifier,
                        ProgressStage::Retrying,
                        attempts + 1,
                        started,
                    );

                    if let Err(error) = ctx.sleep(policy.delay_for_retry(attempts - 1)).await {
                        break Err(error);
                    }
                }
            }
            Ok(Err(closed)) => Err(AdapterError::internal(closed.to_string())),
            Err(error) => Err(error),
        };

        let outcome = outcome.map(|mut record| {
            if record.provenance.source.is_empty() {
                record.provenance.source = name.to_owned();
            }
            if record.provenance.fetched_at.is_none() {
                record.provenance.fetched_at = Some(UtcDateTime::now());
            }
            record
        });

        let stage = match &outcome {
            Ok(_) => ProgressStage::Succeeded,
            Err(error) => {
                warn!(
                    "'{}' failed for '{}' after {} attempt(s): {}",
                    name, identifier, attempts, error
                );
                ProgressStage::Failed
            }
        };
        self.emit(name, identifier, stage, attempts, started);

        let result = CrawlResult {
            source: name.to_owned(),
            outcome,
            duration: started.elapsed(),
            timestamp,
            attempts,
        };
        self.record_stats(&result);
        result
    }

    fn record_stats(&self, result: &CrawlResult) {
        self.inner
            .registry
            .update_stats(&result.source, result.is_success(), result.duration);
        self.inner
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(result);
    }

    fn emit(
        &self,
        adapter: &str,
        identifier: &Identifier,
        stage: ProgressStage,
        attempt: u32,
        started: Instant,
    ) {
        let callback = self
            .inner
            .progress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(&ProgressEvent {
                adapter: adapter.to_owned(),
                identifier: identifier.to_string(),
                stage,
                attempt,
                max_attempts: self.inner.config.retry.max_attempts(),
                elapsed: started.elapsed(),
            });
        }
    }
}

fn engine_failure(error: AdapterError, started: Instant) -> CrawlResult {
    CrawlResult {
        attempts: 0,
        ..CrawlResult::failure(ENGINE_SOURCE, error, started.elapsed())
    }
}

fn dedupe_names<S>(names: &[S]) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref().trim();
        if !name.is_empty() && seen.insert(name) {
            output.push(name.to_owned());
        }
    }

    output
}
