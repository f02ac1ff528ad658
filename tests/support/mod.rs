//! Scripted source adapters shared by the behavior tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metacrawl_core::{
    AdapterError, AdapterFuture, CrawlContext, EngineConfig, Identifier, Record, RetryPolicy,
    SourceAdapter,
};

/// What a scripted adapter does on each `fetch`.
#[derive(Debug, Clone)]
pub enum Script {
    /// Sleeps, then returns a record titled after the adapter.
    Succeed { delay: Duration },
    /// Fails every attempt with the given error.
    Fail(AdapterError),
    /// Fails the first `failures` attempts, then succeeds.
    Flaky { failures: u32, error: AdapterError },
    /// Panics inside the adapter task.
    Panic,
    /// Holds a slot in `gauge` for `delay`, then succeeds.
    Tracked { gauge: Arc<InFlight>, delay: Duration },
}

/// Counts concurrent `fetch` calls and remembers the highest count seen.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlightSlot<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightSlot { gauge: self }
    }
}

struct InFlightSlot<'a> {
    gauge: &'a InFlight,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedAdapter {
    name: String,
    script: Script,
    available: bool,
    attempts: AtomicU32,
}

impl ScriptedAdapter {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_owned(),
            script,
            available: true,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn succeeding(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(name, Script::Succeed { delay }))
    }

    pub fn failing(name: &str, error: AdapterError) -> Arc<Self> {
        Arc::new(Self::new(name, Script::Fail(error)))
    }

    pub fn flaky(name: &str, failures: u32) -> Arc<Self> {
        Arc::new(Self::new(
            name,
            Script::Flaky {
                failures,
                error: AdapterError::unavailable("connection reset by peer"),
            },
        ))
    }

    pub fn tracked(name: &str, gauge: &Arc<InFlight>, delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(
            name,
            Script::Tracked {
                gauge: Arc::clone(gauge),
                delay,
            },
        ))
    }

    pub fn unavailable(name: &str) -> Arc<Self> {
        Arc::new(Self {
            available: false,
            ..Self::new(name, Script::Succeed { delay: Duration::ZERO })
        })
    }

    /// Number of `fetch` calls seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_types(&self) -> Vec<String> {
        vec![String::from("movie")]
    }

    fn fetch<'a>(
        &'a self,
        _ctx: &'a CrawlContext,
        identifier: &'a Identifier,
    ) -> AdapterFuture<'a, Result<Record, AdapterError>> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.script {
                Script::Succeed { delay } => {
                    if !delay.is_zero() {
                        tokio::time::sleep(*delay).await;
                    }
                    Ok(Record::new(identifier.as_str())
                        .with_title(format!("{} from {}", identifier, self.name)))
                }
                Script::Fail(error) => Err(error.clone()),
                Script::Flaky { failures, error } => {
                    if attempt <= *failures {
                        Err(error.clone())
                    } else {
                        Ok(Record::new(identifier.as_str()).with_title("recovered"))
                    }
                }
                Script::Tracked { gauge, delay } => {
                    let _slot = gauge.enter();
                    tokio::time::sleep(*delay).await;
                    Ok(Record::new(identifier.as_str()).with_title("tracked"))
                }
                Script::Panic => panic!("scripted adapter '{}' panicked", self.name),
            }
        })
    }

    fn search<'a>(
        &'a self,
        _ctx: &'a CrawlContext,
        _keyword: &'a str,
    ) -> AdapterFuture<'a, Result<Vec<Record>, AdapterError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn is_available<'a>(&'a self, _ctx: &'a CrawlContext) -> AdapterFuture<'a, bool> {
        Box::pin(async move { self.available })
    }
}

/// Engine config with millisecond backoff so retry tests stay fast.
pub fn fast_config(max_retries: u32) -> EngineConfig {
    EngineConfig::default().with_retry(RetryPolicy::fixed(Duration::from_millis(1), max_retries))
}

pub fn id(value: &str) -> Identifier {
    Identifier::parse(value).expect("valid identifier")
}
