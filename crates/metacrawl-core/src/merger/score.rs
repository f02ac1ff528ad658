use super::config::Field;
use crate::domain::non_empty;
use crate::Record;

/// Completeness weights; fields not listed do not affect the score.
pub const QUALITY_WEIGHTS: [(Field, f64); 8] = [
    (Field::Title, 1.0),
    (Field::Actress, 0.8),
    (Field::Cover, 0.6),
    (Field::Plot, 0.4),
    (Field::Genre, 0.3),
    (Field::ReleaseDate, 0.3),
    (Field::Director, 0.2),
    (Field::Producer, 0.2),
];

/// Weighted share of populated fields, in `[0, 1]`.
pub fn quality_score(record: &Record) -> f64 {
    let total: f64 = QUALITY_WEIGHTS.iter().map(|(_, weight)| weight).sum();
    let earned: f64 = QUALITY_WEIGHTS
        .iter()
        .filter(|(field, _)| is_populated(record, *field))
        .map(|(_, weight)| weight)
        .sum();

    if total > 0.0 {
        (earned / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub(crate) fn is_populated(record: &Record, field: Field) -> bool {
    match field {
        Field::Actress => record.actress.iter().any(|value| !value.is_empty()),
        Field::Genre => record.genre.iter().any(|value| !value.is_empty()),
        Field::Preview => record.preview.iter().any(|value| !value.is_empty()),
        Field::Title => non_empty(&record.title).is_some(),
        Field::Plot => non_empty(&record.plot).is_some(),
        Field::Cover => non_empty(&record.cover).is_some(),
        Field::ReleaseDate => non_empty(&record.release_date).is_some(),
        Field::Runtime => non_empty(&record.runtime).is_some(),
        Field::Director => non_empty(&record.director).is_some(),
        Field::Producer => non_empty(&record.producer).is_some(),
        Field::Publisher => non_empty(&record.publisher).is_some(),
        Field::Series => non_empty(&record.series).is_some(),
    }
}
