//! # Domain Models
//!
//! Canonical domain types shared by the crawl engine and the merge resolver.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Identifier`] | Validated, non-empty item identifier |
//! | [`Record`] | Metadata bag returned by one source adapter |
//! | [`Provenance`] | Source name, URL and fetch time of a record |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! Identifiers are validated at construction; records are validated on demand
//! because adapters may legitimately return partial data:
//!
//! ```rust
//! use metacrawl_core::{Identifier, Record, ValidationError};
//!
//! let id = Identifier::parse(" ABP-123 ").expect("non-empty");
//! assert_eq!(id.as_str(), "ABP-123");
//!
//! let partial = Record::new(id.as_str());
//! assert_eq!(partial.validate(), Err(ValidationError::MissingRecordTitle));
//! ```

mod identifier;
mod record;
mod timestamp;

pub use identifier::Identifier;
pub(crate) use record::non_empty;
pub use record::{Provenance, Record};
pub use timestamp::UtcDateTime;
