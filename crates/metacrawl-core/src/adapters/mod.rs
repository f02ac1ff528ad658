//! Built-in source adapters.
//!
//! Site-specific scrapers live outside this crate and plug in through
//! [`SourceAdapter`](crate::SourceAdapter); only the generic JSON adapter ships here.

pub mod json_api;

pub use json_api::JsonApiAdapter;
