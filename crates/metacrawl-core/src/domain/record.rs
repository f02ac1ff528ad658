use serde::{Deserialize, Serialize};
use time::format_description;
use time::Date;

use crate::{UtcDateTime, ValidationError};

const RELEASE_DATE_FORMATS: [&str; 4] = [
    "[year]-[month]-[day]",
    "[year]/[month]/[day]",
    "[year].[month].[day]",
    "[year repr:full][month][day]",
];

/// Where a record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Adapter name the record was fetched through.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<UtcDateTime>,
}

/// Metadata describing one catalogued item, as reported by a single source.
///
/// Every field except `identifier` is optional. `Some("")` and an empty list
/// are treated the same as absent values everywhere in the crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actress: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Record {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.provenance.source = source.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.provenance.source_url = Some(url.into());
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: UtcDateTime) -> Self {
        self.provenance.fetched_at = Some(fetched_at);
        self
    }

    pub fn with_actress<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actress = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_genre<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genre = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(&self) -> &str {
        &self.provenance.source
    }

    /// Records with an empty identifier are discarded before merging.
    pub fn has_identifier(&self) -> bool {
        !self.identifier.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_identifier() {
            return Err(ValidationError::MissingRecordIdentifier);
        }
        if non_empty(&self.title).is_none() {
            return Err(ValidationError::MissingRecordTitle);
        }
        Ok(())
    }

    pub fn actress_display(&self) -> String {
        self.actress.join(", ")
    }

    pub fn genre_display(&self) -> String {
        self.genre.join(", ")
    }

    /// Runtime in whole minutes.
    ///
    /// Accepts plain minute counts (`"120"`, `"120min"`, `"120分钟"`) and clock
    /// notation (`"MM:SS"`, `"HH:MM:SS"`, seconds rounded to the nearest minute).
    /// Unparseable values yield `None`.
    pub fn runtime_minutes(&self) -> Option<u32> {
        let raw = non_empty(&self.runtime)?.to_lowercase();
        let cleaned = raw.replace("分钟", "").replace("min", "");
        let cleaned = cleaned.trim();

        if cleaned.contains(':') {
            let parts = cleaned
                .split(':')
                .map(|part| part.trim().parse::<u32>().ok())
                .collect::<Option<Vec<_>>>()?;
            return match parts.as_slice() {
                [minutes, seconds] => Some(minutes + (seconds + 30) / 60),
                [hours, minutes, seconds] => Some(hours * 60 + minutes + (seconds + 30) / 60),
                _ => None,
            };
        }

        cleaned.parse().ok()
    }

    /// Release year derived from `release_date`.
    pub fn year(&self) -> Option<i32> {
        let date = non_empty(&self.release_date)?.trim();

        for pattern in RELEASE_DATE_FORMATS {
            let Ok(items) = format_description::parse(pattern) else {
                continue;
            };
            if let Ok(parsed) = Date::parse(date, &items) {
                return Some(parsed.year());
            }
        }

        let prefix = date.get(..4)?;
        if !prefix.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
        let year = prefix.parse::<i32>().ok()?;
        (year > 1900 && year <= UtcDateTime::now().year()).then_some(year)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({})",
            self.identifier,
            self.title.as_deref().unwrap_or_default(),
            self.actress_display()
        )
    }
}

/// Returns the value when it is present and not an empty string.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_identifier_and_title() {
        assert_eq!(
            Record::default().with_title("t").validate(),
            Err(ValidationError::MissingRecordIdentifier)
        );
        assert_eq!(
            Record::new("ABP-123").validate(),
            Err(ValidationError::MissingRecordTitle)
        );
        assert_eq!(
            Record::new("ABP-123").with_title("").validate(),
            Err(ValidationError::MissingRecordTitle)
        );
        assert!(Record::new("ABP-123").with_title("t").validate().is_ok());
    }

    #[test]
    fn runtime_minutes_handles_common_notations() {
        let runtime = |value: &str| Record {
            runtime: Some(value.to_owned()),
            ..Record::new("X")
        };

        assert_eq!(runtime("120").runtime_minutes(), Some(120));
        assert_eq!(runtime("120min").runtime_minutes(), Some(120));
        assert_eq!(runtime("95分钟").runtime_minutes(), Some(95));
        assert_eq!(runtime("90:40").runtime_minutes(), Some(91));
        assert_eq!(runtime("2:00:10").runtime_minutes(), Some(120));
        assert_eq!(runtime("soon").runtime_minutes(), None);
        assert_eq!(Record::new("X").runtime_minutes(), None);
    }

    #[test]
    fn year_is_read_from_release_date() {
        let dated = |value: &str| Record {
            release_date: Some(value.to_owned()),
            ..Record::new("X")
        };

        assert_eq!(dated("2021-06-18").year(), Some(2021));
        assert_eq!(dated("2021/06/18").year(), Some(2021));
        assert_eq!(dated("2021.06.18").year(), Some(2021));
        assert_eq!(dated("20210618").year(), Some(2021));
        assert_eq!(dated("2019 spring").year(), Some(2019));
        assert_eq!(dated("1800-01-01 ?").year(), None);
        assert_eq!(dated("unknown").year(), None);
    }

    #[test]
    fn display_lists_actresses() {
        let record = Record::new("ABP-123")
            .with_title("Title")
            .with_actress(["A", "B"]);
        assert_eq!(record.to_string(), "[ABP-123] Title (A, B)");
    }
}
