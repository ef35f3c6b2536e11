//! Shared domain layer for fieldsearch: types, errors, configuration,
//! text normalization, the field-statistics buffer and BM25F ranking.

pub mod config;
pub mod error;
pub mod normalize;
pub mod rank;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::{Error, IndexError, QueryError, RemoteSearchError, Result, SubmitError};
pub use rank::FieldWeights;
