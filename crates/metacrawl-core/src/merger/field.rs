//! Per-field value selection.

use std::collections::HashSet;

use super::config::FieldStrategy;
use crate::UtcDateTime;

/// One source's non-empty value for a field. Slices of candidates are always
/// in ranked order, highest-ranked source first.
#[derive(Debug)]
pub(crate) struct Candidate<'a, T: ?Sized> {
    pub value: &'a T,
    pub fetched_at: Option<UtcDateTime>,
}

pub(crate) fn resolve_scalar(
    strategy: FieldStrategy,
    candidates: &[Candidate<'_, str>],
) -> Option<String> {
    let chosen = match strategy {
        FieldStrategy::PreferFirst | FieldStrategy::PreferBestQuality | FieldStrategy::Combine => {
            candidates.first()
        }
        FieldStrategy::PreferLongest => max_by_strict(candidates, |value| value.chars().count()),
        FieldStrategy::PreferMostRecent => most_recent(candidates),
    };
    chosen.map(|candidate| candidate.value.to_owned())
}

pub(crate) fn resolve_list(
    strategy: FieldStrategy,
    candidates: &[Candidate<'_, [String]>],
    limit: Option<usize>,
) -> Vec<String> {
    let mut values = match strategy {
        FieldStrategy::Combine => dedupe(
            candidates
                .iter()
                .flat_map(|candidate| candidate.value.iter().map(String::as_str)),
        ),
        FieldStrategy::PreferFirst | FieldStrategy::PreferBestQuality => {
            candidates.first().map(non_empty_entries).unwrap_or_default()
        }
        FieldStrategy::PreferLongest => {
            max_by_strict(candidates, |list| list.iter().filter(|v| !v.is_empty()).count())
                .map(non_empty_entries)
                .unwrap_or_default()
        }
        FieldStrategy::PreferMostRecent => most_recent(candidates)
            .map(non_empty_entries)
            .unwrap_or_default(),
    };

    if let Some(limit) = limit {
        values.truncate(limit);
    }
    values
}

/// Exact, order-preserving de-duplication that drops empty strings.
pub(crate) fn dedupe<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_empty() && seen.insert(*value))
        .map(str::to_owned)
        .collect()
}

/// Raw values in ranked order when at least two of them differ.
pub(crate) fn conflict(candidates: &[Candidate<'_, str>]) -> Option<Vec<String>> {
    let distinct = candidates
        .iter()
        .map(|candidate| candidate.value)
        .collect::<HashSet<_>>()
        .len();
    (distinct > 1).then(|| {
        candidates
            .iter()
            .map(|candidate| candidate.value.to_owned())
            .collect()
    })
}

fn non_empty_entries(candidate: &Candidate<'_, [String]>) -> Vec<String> {
    candidate
        .value
        .iter()
        .filter(|value| !value.is_empty())
        .cloned()
        .collect()
}

/// Largest by `key`; the earliest (highest-ranked) candidate wins ties.
fn max_by_strict<'c, 'a, T, K>(
    candidates: &'c [Candidate<'a, T>],
    key: impl Fn(&T) -> K,
) -> Option<&'c Candidate<'a, T>>
where
    T: ?Sized,
    K: Ord,
{
    let mut best: Option<(&Candidate<'a, T>, K)> = None;
    for candidate in candidates {
        let candidate_key = key(candidate.value);
        let replace = match &best {
            Some((_, best_key)) => candidate_key > *best_key,
            None => true,
        };
        if replace {
            best = Some((candidate, candidate_key));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Candidate with the latest fetch time; unknown times lose to known ones.
fn most_recent<'c, 'a, T: ?Sized>(
    candidates: &'c [Candidate<'a, T>],
) -> Option<&'c Candidate<'a, T>> {
    let mut best: Option<&Candidate<'a, T>> = None;
    for candidate in candidates {
        let replace = best.map_or(true, |current| candidate.fetched_at > current.fetched_at);
        if replace {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: &str) -> Candidate<'_, str> {
        stamped(value, None)
    }

    fn stamped(value: &str, fetched_at: Option<UtcDateTime>) -> Candidate<'_, str> {
        Candidate { value, fetched_at }
    }

    fn list(values: &[String]) -> Candidate<'_, [String]> {
        Candidate {
            value: values,
            fetched_at: None,
        }
    }

    #[test]
    fn longest_prefers_higher_rank_on_ties() {
        let candidates = [scalar("abc"), scalar("xyz"), scalar("ab")];
        assert_eq!(
            resolve_scalar(FieldStrategy::PreferLongest, &candidates).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn longest_counts_characters_not_bytes() {
        let candidates = [scalar("日本語"), scalar("abcd")];
        assert_eq!(
            resolve_scalar(FieldStrategy::PreferLongest, &candidates).as_deref(),
            Some("abcd")
        );
    }

    #[test]
    fn most_recent_uses_fetch_time() {
        let older = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid");
        let newer = UtcDateTime::parse("2024-06-01T00:00:00Z").expect("valid");
        let candidates = [
            stamped("old", Some(older)),
            scalar("none"),
            stamped("new", Some(newer)),
        ];

        assert_eq!(
            resolve_scalar(FieldStrategy::PreferMostRecent, &candidates).as_deref(),
            Some("new")
        );
    }

    #[test]
    fn most_recent_without_times_keeps_rank_order() {
        let candidates = [scalar("first"), scalar("second")];
        assert_eq!(
            resolve_scalar(FieldStrategy::PreferMostRecent, &candidates).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn whole_list_strategies_still_truncate() {
        let first = vec![String::from("A"), String::from("B"), String::from("C")];
        let second = vec![String::from("D")];
        let candidates = [
            list(&first),
            list(&second),
        ];

        assert_eq!(
            resolve_list(FieldStrategy::PreferFirst, &candidates, Some(2)),
            vec!["A", "B"]
        );
    }

    #[test]
    fn conflict_needs_two_distinct_values() {
        assert_eq!(conflict(&[scalar("a"), scalar("a")]), None);
        assert_eq!(
            conflict(&[scalar("a"), scalar("b"), scalar("a")]),
            Some(vec![String::from("a"), String::from("b"), String::from("a")])
        );
    }
}
