use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::adapter::{AdapterError, SourceAdapter};
use crate::UtcDateTime;

/// Error rate at or above which an adapter is reported unhealthy.
const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// Live usage and health counters for one registered adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterStats {
    pub name: String,
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    #[serde(rename = "average_latency_ms", serialize_with = "serialize_millis")]
    pub average_latency: Duration,
    pub last_request: Option<UtcDateTime>,
    pub is_healthy: bool,
}

impl AdapterStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_count: 0,
            success_count: 0,
            error_count: 0,
            average_latency: Duration::ZERO,
            last_request: None,
            is_healthy: true,
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.request_count as f64
    }

    fn record(&mut self, success: bool, duration: Duration) {
        self.request_count += 1;
        self.last_request = Some(UtcDateTime::now());
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.average_latency = rolling_average(self.average_latency, duration);
        self.is_healthy = self.error_rate() < UNHEALTHY_ERROR_RATE;
    }
}

/// Named adapter instances plus their statistics.
///
/// The adapter map is read-mostly and sits behind an `RwLock`, so lookups
/// from concurrent crawl tasks never contend with each other. Statistics have
/// their own mutex.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn SourceAdapter>>>,
    stats: Mutex<HashMap<String, AdapterStats>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under `name`, replacing any previous adapter and
    /// its statistics.
    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        let name = name.into();
        let previous = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), adapter);
        if previous.is_some() {
            warn!("adapter '{}' was already registered; replacing it", name);
        } else {
            debug!("registered adapter '{}'", name);
        }

        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), AdapterStats::new(name));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Snapshot of every registered adapter.
    pub fn get_all(&self) -> HashMap<String, Arc<dyn SourceAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records one finished crawl attempt. Unknown names are ignored.
    pub fn update_stats(&self, name: &str, success: bool, duration: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = stats.get_mut(name) {
            entry.record(success, duration);
        }
    }

    pub fn stats(&self, name: &str) -> Option<AdapterStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn all_stats(&self) -> BTreeMap<String, AdapterStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, stats)| (name.clone(), stats.clone()))
            .collect()
    }

    pub fn reset_stats(&self) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, entry) in stats.iter_mut() {
            *entry = AdapterStats::new(name.clone());
        }
    }

    /// Closes every adapter, continuing past individual failures.
    ///
    /// Returns the adapters that failed to close along with their errors.
    pub fn close(&self) -> Vec<(String, AdapterError)> {
        let adapters = self.get_all();
        let mut failures = Vec::new();

        for (name, adapter) in adapters {
            if let Err(error) = adapter.close() {
                warn!("failed to close adapter '{}': {}", name, error);
                failures.push((name, error));
            }
        }

        failures.sort_by(|left, right| left.0.cmp(&right.0));
        failures
    }
}

/// First sample is taken as-is; afterwards the average halves toward each new sample.
pub(crate) fn rolling_average(current: Duration, sample: Duration) -> Duration {
    if current.is_zero() {
        sample
    } else {
        (current + sample) / 2
    }
}

pub(crate) fn serialize_millis<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterFuture;
    use crate::{CrawlContext, Identifier, Record};

    struct NamedAdapter {
        name: &'static str,
        fail_close: bool,
    }

    impl SourceAdapter for NamedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn supported_types(&self) -> Vec<String> {
            vec![String::from("movie")]
        }

        fn fetch<'a>(
            &'a self,
            _ctx: &'a CrawlContext,
            identifier: &'a Identifier,
        ) -> AdapterFuture<'a, Result<Record, AdapterError>> {
            Box::pin(async move { Ok(Record::new(identifier.as_str()).with_source(self.name)) })
        }

        fn search<'a>(
            &'a self,
            _ctx: &'a CrawlContext,
            _keyword: &'a str,
        ) -> AdapterFuture<'a, Result<Vec<Record>, AdapterError>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn is_available<'a>(&'a self, _ctx: &'a CrawlContext) -> AdapterFuture<'a, bool> {
            Box::pin(async move { true })
        }

        fn close(&self) -> Result<(), AdapterError> {
            if self.fail_close {
                Err(AdapterError::internal("socket already closed"))
            } else {
                Ok(())
            }
        }
    }

    fn adapter(name: &'static str) -> Arc<dyn SourceAdapter> {
        Arc::new(NamedAdapter {
            name,
            fail_close: false,
        })
    }

    #[test]
    fn registers_and_looks_up_by_name() {
        let registry = AdapterRegistry::new();
        registry.register("javdb", adapter("javdb"));
        registry.register("avwiki", adapter("avwiki"));

        assert_eq!(registry.names(), vec!["avwiki", "javdb"]);
        assert_eq!(registry.get("javdb").map(|a| a.name().to_owned()), Some("javdb".into()));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.get_all().len(), 2);
        assert_eq!(registry.stats("avwiki"), Some(AdapterStats::new("avwiki")));
    }

    #[test]
    fn update_stats_tracks_latency_and_health() {
        let registry = AdapterRegistry::new();
        registry.register("javdb", adapter("javdb"));

        registry.update_stats("javdb", true, Duration::from_millis(100));
        registry.update_stats("javdb", false, Duration::from_millis(300));

        let stats = registry.stats("javdb").expect("stats exist");
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.average_latency, Duration::from_millis(200));
        assert!(!stats.is_healthy, "50% error rate is unhealthy");
        assert!(stats.last_request.is_some());

        registry.update_stats("javdb", true, Duration::from_millis(200));
        let stats = registry.stats("javdb").expect("stats exist");
        assert!(stats.is_healthy);
    }

    #[test]
    fn update_stats_ignores_unknown_adapters() {
        let registry = AdapterRegistry::new();
        registry.update_stats("ghost", true, Duration::from_millis(1));
        assert!(registry.stats("ghost").is_none());
    }

    #[test]
    fn reset_stats_zeroes_counters() {
        let registry = AdapterRegistry::new();
        registry.register("javdb", adapter("javdb"));
        registry.update_stats("javdb", false, Duration::from_millis(50));

        registry.reset_stats();

        assert_eq!(registry.stats("javdb"), Some(AdapterStats::new("javdb")));
    }

    #[test]
    fn close_continues_past_failures() {
        let registry = AdapterRegistry::new();
        registry.register("a", adapter("a"));
        registry.register(
            "b",
            Arc::new(NamedAdapter {
                name: "b",
                fail_close: true,
            }),
        );
        registry.register("c", adapter("c"));

        let failures = registry.close();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
    }

    #[test]
    fn stats_serialize_latency_in_millis() {
        let mut stats = AdapterStats::new("javdb");
        stats.average_latency = Duration::from_millis(1500);

        let json = serde_json::to_value(&stats).expect("serializable");
        assert_eq!(json["average_latency_ms"], 1500);
        assert_eq!(json["is_healthy"], true);
    }
}
