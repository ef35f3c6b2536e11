//! fieldsearch-text
//!
//! Tantivy-backed index store: five weighted columns plus stored display
//! metadata per document, phrase statistics pulled from the postings, and
//! BM25F ranking via `fieldsearch-core`.
pub mod tantivy_utils;
pub mod index;
pub mod match_stats;
pub mod query;
pub mod search;
pub mod suggest;

pub use index::{IndexStore, StoreOpener, StoreOptions};
