use std::sync::Arc;
use std::time::Duration;

use metacrawl_core::{
    AdapterErrorKind, AdapterSettings, CircuitBreakerConfig, CircuitState, CrawlContext,
    CrawlEngine, EngineConfig, FixtureHttpClient, HttpError, HttpResponse, Identifier,
    JsonApiAdapter, Merger, RateLimit, RetryPolicy, SourceAdapter,
};

const BASE: &str = "https://api.example.test";

const RECORD_BODY: &str = r#"{
    "identifier": "ABP-123",
    "title": "Example title",
    "actress": ["A", "B"],
    "genre": ["Drama"],
    "release_date": "2024-01-01",
    "runtime": "120min"
}"#;

struct AdapterCase {
    label: &'static str,
    source: Arc<dyn SourceAdapter>,
}

/// Every adapter variant under test, each wired to the same canned upstream.
fn adapter_cases() -> Vec<AdapterCase> {
    vec![
        AdapterCase {
            label: "plain",
            source: Arc::new(json_adapter("javdb", AdapterSettings::new(BASE), fixture())),
        },
        AdapterCase {
            label: "trailing-slash + rate-limited",
            source: Arc::new(json_adapter(
                "javdb",
                AdapterSettings::new(format!("{BASE}/"))
                    .with_rate_limit(RateLimit::per_second(50))
                    .with_timeout(Duration::from_secs(2)),
                fixture(),
            )),
        },
    ]
}

fn fixture() -> Arc<FixtureHttpClient> {
    Arc::new(
        FixtureHttpClient::new()
            .with_response(format!("{BASE}/movies/ABP-123"), HttpResponse::ok_json(RECORD_BODY))
            .with_response(
                format!("{BASE}/search?q=example%20title"),
                HttpResponse::ok_json(format!("[{RECORD_BODY}, {{\"identifier\": \"\"}}]")),
            )
            .with_response(format!("{BASE}/health"), HttpResponse::ok_json("{}")),
    )
}

fn json_adapter(
    name: &str,
    settings: AdapterSettings,
    client: Arc<FixtureHttpClient>,
) -> JsonApiAdapter {
    JsonApiAdapter::new(name, settings, client).expect("valid settings")
}

fn id(value: &str) -> Identifier {
    Identifier::parse(value).expect("valid identifier")
}

// =============================================================================
// Contract: shared by every adapter variant
// =============================================================================

#[tokio::test]
async fn fetch_returns_a_valid_attributed_record_for_all_adapters() {
    let ctx = CrawlContext::new();

    for case in adapter_cases() {
        let record = case
            .source
            .fetch(&ctx, &id("ABP-123"))
            .await
            .unwrap_or_else(|error| panic!("adapter '{}' fetch failed: {error}", case.label));

        assert!(record.validate().is_ok(), "adapter '{}': valid record", case.label);
        assert_eq!(record.identifier, "ABP-123", "adapter '{}'", case.label);
        assert_eq!(record.source(), case.source.name(), "adapter '{}'", case.label);
        assert_eq!(record.actress, vec!["A", "B"], "adapter '{}'", case.label);
        assert_eq!(record.runtime_minutes(), Some(120), "adapter '{}'", case.label);
        assert_eq!(record.year(), Some(2024), "adapter '{}'", case.label);
        assert!(
            record.provenance.fetched_at.is_some(),
            "adapter '{}': fetch time stamped",
            case.label
        );
        assert_eq!(
            record.provenance.source_url.as_deref(),
            Some("https://api.example.test/movies/ABP-123"),
            "adapter '{}'",
            case.label
        );
    }
}

#[tokio::test]
async fn unknown_identifiers_are_not_found_for_all_adapters() {
    let ctx = CrawlContext::new();

    for case in adapter_cases() {
        let error = case
            .source
            .fetch(&ctx, &id("NOPE-000"))
            .await
            .expect_err("fixture has no such movie");

        assert_eq!(error.kind(), AdapterErrorKind::NotFound, "adapter '{}'", case.label);
        assert!(error.to_string().contains("movie not found"));
    }
}

#[tokio::test]
async fn search_drops_records_without_identifier_for_all_adapters() {
    let ctx = CrawlContext::new();

    for case in adapter_cases() {
        let records = case
            .source
            .search(&ctx, "example title")
            .await
            .unwrap_or_else(|error| panic!("adapter '{}' search failed: {error}", case.label));

        assert_eq!(records.len(), 1, "adapter '{}'", case.label);
        assert_eq!(records[0].identifier, "ABP-123");

        let none = case
            .source
            .search(&ctx, "nothing matches")
            .await
            .expect("404 search is an empty result");
        assert!(none.is_empty());
    }
}

#[tokio::test]
async fn adapters_report_availability_and_support_movies() {
    let ctx = CrawlContext::new();

    for case in adapter_cases() {
        assert!(case.source.is_available(&ctx).await, "adapter '{}'", case.label);
        assert!(case.source.supported_types().contains(&String::from("movie")));
        assert!(case.source.close().is_ok());
    }
}

// =============================================================================
// JSON adapter: upstream failure mapping
// =============================================================================

#[tokio::test]
async fn upstream_errors_map_to_adapter_error_kinds() {
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_response(format!("{BASE}/movies/BUSY-1"), HttpResponse::new(503, "busy"))
            .with_response(format!("{BASE}/movies/LIMIT-1"), HttpResponse::new(429, ""))
            .with_response(format!("{BASE}/movies/BAD-1"), HttpResponse::ok_json("{not json"))
            .with_response(
                format!("{BASE}/movies/NOTITLE-1"),
                HttpResponse::ok_json(r#"{"identifier": "NOTITLE-1"}"#),
            )
            .with_error(
                format!("{BASE}/movies/DOWN-1"),
                HttpError::new("connection refused"),
            ),
    );
    let adapter = json_adapter("javdb", AdapterSettings::new(BASE), client)
        .with_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 100,
            open_timeout: Duration::from_secs(60),
        });
    let ctx = CrawlContext::new();

    let cases = [
        ("BUSY-1", AdapterErrorKind::Unavailable),
        ("LIMIT-1", AdapterErrorKind::RateLimited),
        ("BAD-1", AdapterErrorKind::Parse),
        ("NOTITLE-1", AdapterErrorKind::Validation),
        ("DOWN-1", AdapterErrorKind::Unavailable),
    ];
    for (identifier, expected) in cases {
        let error = adapter
            .fetch(&ctx, &id(identifier))
            .await
            .expect_err("every case fails");
        assert_eq!(error.kind(), expected, "identifier '{identifier}'");
    }
}

#[tokio::test]
async fn body_without_identifier_inherits_the_requested_one() {
    let client = Arc::new(FixtureHttpClient::new().with_response(
        format!("{BASE}/movies/SSIS-001"),
        HttpResponse::ok_json(r#"{"title": "Untagged"}"#),
    ));
    let adapter = json_adapter("javdb", AdapterSettings::new(BASE), client);

    let record = adapter
        .fetch(&CrawlContext::new(), &id("SSIS-001"))
        .await
        .expect("record parses");

    assert_eq!(record.identifier, "SSIS-001");
}

#[tokio::test]
async fn repeated_upstream_failures_open_the_circuit() {
    // Given: An upstream that always answers 503 and a breaker threshold of 2
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_response(format!("{BASE}/movies/ABP-123"), HttpResponse::new(503, "")),
    );
    let adapter = json_adapter("javdb", AdapterSettings::new(BASE), Arc::clone(&client))
        .with_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(60),
        });
    let ctx = CrawlContext::new();

    // When: Three fetches are made
    for _ in 0..3 {
        let _ = adapter.fetch(&ctx, &id("ABP-123")).await;
    }

    // Then: The third never reaches the upstream and the adapter reports unavailable
    assert_eq!(adapter.circuit_state(), CircuitState::Open);
    assert_eq!(client.requests().len(), 2);
    assert!(!adapter.is_available(&ctx).await);
}

// =============================================================================
// JSON adapter: end to end through the engine
// =============================================================================

#[tokio::test]
async fn engine_crawls_and_merges_json_sources() {
    // Given: Two JSON sources with different titles for the same item
    let javbus = Arc::new(FixtureHttpClient::new().with_response(
        "https://javbus.example.test/movies/ABP-123",
        HttpResponse::ok_json(r#"{"identifier": "ABP-123", "title": "Short", "actress": ["A"]}"#),
    ));
    let dmm = Arc::new(FixtureHttpClient::new().with_response(
        "https://dmm.example.test/movies/ABP-123",
        HttpResponse::ok_json(
            r#"{"identifier": "ABP-123", "title": "A much longer title", "actress": ["B"]}"#,
        ),
    ));
    let config =
        EngineConfig::default().with_retry(RetryPolicy::fixed(Duration::from_millis(1), 3));
    let engine = CrawlEngine::new(config).expect("valid config");
    engine.register_adapter(
        "javbus",
        Arc::new(json_adapter(
            "javbus",
            AdapterSettings::new("https://javbus.example.test"),
            javbus,
        )),
    );
    engine.register_adapter(
        "dmm",
        Arc::new(json_adapter("dmm", AdapterSettings::new("https://dmm.example.test"), dmm)),
    );

    // When: The item is crawled and merged
    let results = engine
        .crawl_movie(&CrawlContext::new(), &id("ABP-123"), &[] as &[&str])
        .await
        .expect("adapters resolve");
    let merged = Merger::default().merge_results(&results).expect("mergeable");

    // Then: Ranking, strategies and the conflict ledger all apply
    assert_eq!(merged.sources_used, vec!["javbus", "dmm"]);
    assert_eq!(
        merged.merged_record.title.as_deref(),
        Some("A much longer title")
    );
    assert_eq!(merged.merged_record.actress, vec!["A", "B"]);
    assert!(merged.merge_stats.quality_score > 0.0);
}

#[tokio::test]
async fn not_found_from_a_json_source_is_requested_once() {
    let client = Arc::new(FixtureHttpClient::new());
    let config =
        EngineConfig::default().with_retry(RetryPolicy::fixed(Duration::from_millis(1), 5));
    let engine = CrawlEngine::new(config).expect("valid config");
    engine.register_adapter(
        "javdb",
        Arc::new(json_adapter("javdb", AdapterSettings::new(BASE), Arc::clone(&client))),
    );

    let results = engine
        .crawl_movie(&CrawlContext::new(), &id("NOPE-000"), &["javdb"])
        .await
        .expect("adapter resolves");

    assert!(!results[0].is_success());
    assert_eq!(client.requests().len(), 1);
}
