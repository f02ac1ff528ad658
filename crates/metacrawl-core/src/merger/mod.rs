//! Merge resolver.
//!
//! Reconciles the records several sources returned for one identifier into a
//! single record, a conflict ledger, and a completeness score.
//!
//! | Step | Behavior |
//! |------|----------|
//! | Filter | Records without an identifier are dropped |
//! | Rank | Stable sort by [`SourceRanking`] weight, highest first |
//! | Resolve | Each [`Field`] is resolved with its [`FieldStrategy`] |
//! | Ledger | Scalar fields with differing values are listed in `conflicts_found` |
//! | Score | [`quality_score`] over the merged record |
//! | Validate | The merged record must have an identifier and a title |
//!
//! ```rust
//! use metacrawl_core::{Merger, Record};
//!
//! let merger = Merger::default();
//! let result = merger
//!     .merge(&[
//!         Record::new("X").with_title("short"),
//!         Record::new("X").with_title("a very long title"),
//!     ])
//!     .expect("mergeable");
//!
//! assert_eq!(result.merged_record.title.as_deref(), Some("a very long title"));
//! ```

mod config;
mod field;
mod score;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use self::field::{conflict, resolve_list, resolve_scalar, Candidate};
use crate::{CoreError, CrawlResult, MergeError, Record};

pub use config::{Field, FieldStrategy, MergeConfig, SourceRanking};
pub use score::{quality_score, QUALITY_WEIGHTS};

/// Provenance source of every merged record.
pub const MERGED_SOURCE: &str = "merged";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeStats {
    pub total_sources: usize,
    /// Non-empty raw values seen per field; list fields count entries.
    pub fields_merged: BTreeMap<Field, usize>,
    pub strategies_used: BTreeMap<Field, FieldStrategy>,
    pub quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    pub merged_record: Record,
    /// Contributing sources in ranked order.
    pub sources_used: Vec<String>,
    pub conflicts_found: BTreeMap<Field, Vec<String>>,
    pub merge_stats: MergeStats,
}

impl MergeResult {
    /// Pretty-printed JSON for whatever layer reports merged records.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merges records describing the same identifier.
    ///
    /// # Errors
    ///
    /// - [`MergeError::NoValidRecords`] when no record has an identifier.
    /// - [`MergeError::MixedIdentifiers`] when the records disagree on it.
    /// - [`MergeError::ValidationFailed`] when no source supplied a title.
    pub fn merge(&self, records: &[Record]) -> Result<MergeResult, MergeError> {
        let mut ranked = records
            .iter()
            .filter(|record| record.has_identifier())
            .collect::<Vec<_>>();
        if ranked.is_empty() {
            return Err(MergeError::NoValidRecords);
        }

        ranked.sort_by_key(|record| Reverse(self.config.ranking.weight(record.source())));

        let identifier = ranked[0].identifier.trim();
        if let Some(other) = ranked
            .iter()
            .find(|record| record.identifier.trim() != identifier)
        {
            return Err(MergeError::MixedIdentifiers {
                expected: identifier.to_owned(),
                found: other.identifier.trim().to_owned(),
            });
        }

        let mut merged = Record::new(identifier);
        let mut conflicts_found = BTreeMap::new();
        let mut fields_merged = BTreeMap::new();
        let mut strategies_used = BTreeMap::new();

        for field in Field::ALL {
            let strategy = self.config.strategy_for(field);
            strategies_used.insert(field, strategy);

            if field.is_list() {
                let candidates = ranked
                    .iter()
                    .filter_map(|record| {
                        let values = list_field(record, field)?;
                        values.iter().any(|value| !value.is_empty()).then_some(Candidate {
                            value: values.as_slice(),
                            fetched_at: record.provenance.fetched_at,
                        })
                    })
                    .collect::<Vec<_>>();
                if candidates.is_empty() {
                    continue;
                }

                let raw_count = candidates
                    .iter()
                    .flat_map(|candidate| candidate.value.iter())
                    .filter(|value| !value.is_empty())
                    .count();
                fields_merged.insert(field, raw_count);

                if let Some(slot) = list_field_mut(&mut merged, field) {
                    *slot = resolve_list(strategy, &candidates, self.config.limit_for(field));
                }
            } else {
                let candidates = ranked
                    .iter()
                    .filter_map(|record| {
                        let value = scalar_field(record, field)?;
                        (!value.is_empty()).then_some(Candidate {
                            value,
                            fetched_at: record.provenance.fetched_at,
                        })
                    })
                    .collect::<Vec<_>>();
                if candidates.is_empty() {
                    continue;
                }

                fields_merged.insert(field, candidates.len());
                if let Some(values) = conflict(&candidates) {
                    conflicts_found.insert(field, values);
                }
                if let Some(slot) = scalar_field_mut(&mut merged, field) {
                    *slot = resolve_scalar(strategy, &candidates);
                }
            }
        }

        merged.provenance.source = MERGED_SOURCE.to_owned();
        merged.provenance.source_url = None;
        merged.provenance.fetched_at = ranked
            .iter()
            .filter_map(|record| record.provenance.fetched_at)
            .max();

        let quality_score = quality_score(&merged);
        merged.validate().map_err(MergeError::ValidationFailed)?;

        debug!(
            "merged '{}' from {} source(s): quality {:.2}, {} conflict(s)",
            merged.identifier,
            ranked.len(),
            quality_score,
            conflicts_found.len()
        );

        Ok(MergeResult {
            sources_used: ranked
                .iter()
                .map(|record| record.source().to_owned())
                .collect(),
            merge_stats: MergeStats {
                total_sources: ranked.len(),
                fields_merged,
                strategies_used,
                quality_score,
            },
            conflicts_found,
            merged_record: merged,
        })
    }

    /// Merges the records of the successful crawl results.
    pub fn merge_results(&self, results: &[CrawlResult]) -> Result<MergeResult, MergeError> {
        let records = results
            .iter()
            .filter_map(CrawlResult::record)
            .cloned()
            .collect::<Vec<_>>();
        self.merge(&records)
    }
}

fn scalar_field(record: &Record, field: Field) -> Option<&str> {
    let value = match field {
        Field::Title => &record.title,
        Field::Plot => &record.plot,
        Field::Cover => &record.cover,
        Field::ReleaseDate => &record.release_date,
        Field::Runtime => &record.runtime,
        Field::Director => &record.director,
        Field::Producer => &record.producer,
        Field::Publisher => &record.publisher,
        Field::Series => &record.series,
        Field::Actress | Field::Genre | Field::Preview => return None,
    };
    value.as_deref()
}

fn scalar_field_mut(record: &mut Record, field: Field) -> Option<&mut Option<String>> {
    match field {
        Field::Title => Some(&mut record.title),
        Field::Plot => Some(&mut record.plot),
        Field::Cover => Some(&mut record.cover),
        Field::ReleaseDate => Some(&mut record.release_date),
        Field::Runtime => Some(&mut record.runtime),
        Field::Director => Some(&mut record.director),
        Field::Producer => Some(&mut record.producer),
        Field::Publisher => Some(&mut record.publisher),
        Field::Series => Some(&mut record.series),
        Field::Actress | Field::Genre | Field::Preview => None,
    }
}

fn list_field(record: &Record, field: Field) -> Option<&Vec<String>> {
    match field {
        Field::Actress => Some(&record.actress),
        Field::Genre => Some(&record.genre),
        Field::Preview => Some(&record.preview),
        _ => None,
    }
}

fn list_field_mut(record: &mut Record, field: Field) -> Option<&mut Vec<String>> {
    match field {
        Field::Actress => Some(&mut record.actress),
        Field::Genre => Some(&mut record.genre),
        Field::Preview => Some(&mut record.preview),
        _ => None,
    }
}
