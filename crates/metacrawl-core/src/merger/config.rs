use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reconciliation policy for one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStrategy {
    /// First non-empty value in ranked order.
    PreferFirst,
    /// Longest value by character count; ties go to the higher-ranked source.
    PreferLongest,
    /// Value from the most recently fetched record.
    PreferMostRecent,
    /// First non-empty value in ranked order; ranking already encodes quality.
    PreferBestQuality,
    /// Union of list values across sources, de-duplicated in first-seen order.
    Combine,
}

/// Record fields the merger reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Plot,
    Actress,
    Genre,
    Cover,
    Preview,
    ReleaseDate,
    Runtime,
    Director,
    Producer,
    Publisher,
    Series,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Title,
        Field::Plot,
        Field::Actress,
        Field::Genre,
        Field::Cover,
        Field::Preview,
        Field::ReleaseDate,
        Field::Runtime,
        Field::Director,
        Field::Producer,
        Field::Publisher,
        Field::Series,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Plot => "plot",
            Field::Actress => "actress",
            Field::Genre => "genre",
            Field::Cover => "cover",
            Field::Preview => "preview",
            Field::ReleaseDate => "release_date",
            Field::Runtime => "runtime",
            Field::Director => "director",
            Field::Producer => "producer",
            Field::Publisher => "publisher",
            Field::Series => "series",
        }
    }

    pub const fn is_list(self) -> bool {
        matches!(self, Field::Actress | Field::Genre | Field::Preview)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source name → trust weight. Higher weights win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRanking {
    weights: HashMap<String, i32>,
}

impl Default for SourceRanking {
    fn default() -> Self {
        Self::from_pairs([
            ("javbus", 10),
            ("javdb", 9),
            ("avwiki", 8),
            ("javlib", 7),
            ("dmm", 6),
            ("fc2", 5),
            (Self::UNKNOWN, 1),
        ])
    }
}

impl SourceRanking {
    /// Entry whose weight applies to unranked sources.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        Self {
            weights: pairs
                .into_iter()
                .map(|(name, weight)| (name.into(), weight))
                .collect(),
        }
    }

    pub fn with_weight(mut self, source: impl Into<String>, weight: i32) -> Self {
        self.weights.insert(source.into(), weight);
        self
    }

    /// Weight given to sources missing from the table.
    pub fn floor(&self) -> i32 {
        self.weights.get(Self::UNKNOWN).copied().unwrap_or(1)
    }

    pub fn weight(&self, source: &str) -> i32 {
        self.weights
            .get(source)
            .copied()
            .unwrap_or_else(|| self.floor())
    }
}

/// Merge resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub default_strategy: FieldStrategy,
    pub field_strategies: HashMap<Field, FieldStrategy>,
    pub ranking: SourceRanking,
    /// Zero means unlimited.
    pub max_actress_count: usize,
    /// Zero means unlimited.
    pub max_genre_count: usize,
    /// Zero means unlimited.
    pub max_preview_count: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let field_strategies = HashMap::from([
            (Field::Title, FieldStrategy::PreferLongest),
            (Field::Plot, FieldStrategy::PreferLongest),
            (Field::Actress, FieldStrategy::Combine),
            (Field::Genre, FieldStrategy::Combine),
            (Field::Preview, FieldStrategy::Combine),
            (Field::Cover, FieldStrategy::PreferBestQuality),
            (Field::ReleaseDate, FieldStrategy::PreferFirst),
        ]);

        Self {
            default_strategy: FieldStrategy::PreferBestQuality,
            field_strategies,
            ranking: SourceRanking::default(),
            max_actress_count: 10,
            max_genre_count: 15,
            max_preview_count: 0,
        }
    }
}

impl MergeConfig {
    pub fn with_strategy(mut self, field: Field, strategy: FieldStrategy) -> Self {
        self.field_strategies.insert(field, strategy);
        self
    }

    pub fn with_default_strategy(mut self, strategy: FieldStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_ranking(mut self, ranking: SourceRanking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_max_actress_count(mut self, count: usize) -> Self {
        self.max_actress_count = count;
        self
    }

    pub fn with_max_genre_count(mut self, count: usize) -> Self {
        self.max_genre_count = count;
        self
    }

    pub fn with_max_preview_count(mut self, count: usize) -> Self {
        self.max_preview_count = count;
        self
    }

    pub fn strategy_for(&self, field: Field) -> FieldStrategy {
        self.field_strategies
            .get(&field)
            .copied()
            .unwrap_or(self.default_strategy)
    }

    /// Maximum list length for a list field, `None` when unlimited.
    pub fn limit_for(&self, field: Field) -> Option<usize> {
        let limit = match field {
            Field::Actress => self.max_actress_count,
            Field::Genre => self.max_genre_count,
            Field::Preview => self.max_preview_count,
            _ => 0,
        };
        (limit > 0).then_some(limit)
    }
}
