//! Domain types shared by the index store and the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IndexError;

/// Number of weighted, searchable text columns on every document.
pub const WEIGHTED_FIELD_COUNT: usize = 5;

const KEY_SEPARATOR: char = '\u{1f}';

/// Composite document identity, unique within one named index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocKey {
    pub module_id: String,
    pub entity_id: String,
}

impl DocKey {
    pub fn new(module_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self { module_id: module_id.into(), entity_id: entity_id.into() }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        for (name, value) in [("module_id", &self.module_id), ("entity_id", &self.entity_id)] {
            if value.trim().is_empty() {
                return Err(IndexError::schema(format!("{name} must not be empty")));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(IndexError::schema(format!("{name} contains a reserved separator")));
            }
        }
        Ok(())
    }

    /// Single-token form used as the engine's delete/lookup term.
    pub fn composite(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.module_id, self.entity_id)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module_id, self.entity_id)
    }
}

/// One of the five weighted text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightSlot {
    Weight0,
    Weight1,
    Weight2,
    Weight3,
    Weight4,
}

impl WeightSlot {
    pub const ALL: [WeightSlot; WEIGHTED_FIELD_COUNT] =
        [Self::Weight0, Self::Weight1, Self::Weight2, Self::Weight3, Self::Weight4];

    pub fn index(self) -> usize {
        match self {
            Self::Weight0 => 0,
            Self::Weight1 => 1,
            Self::Weight2 => 2,
            Self::Weight3 => 3,
            Self::Weight4 => 4,
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            Self::Weight0 => "weight0",
            Self::Weight1 => "weight1",
            Self::Weight2 => "weight2",
            Self::Weight3 => "weight3",
            Self::Weight4 => "weight4",
        }
    }
}

/// Display metadata stored next to a document. Never searched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    pub title: String,
    pub subtitle: String,
    pub parent_title: String,
    pub uri: String,
    pub file_type: String,
    pub image_uri: String,
}

/// An indexable unit: key, ranking hints, five weighted strings and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: DocKey,
    #[serde(default)]
    pub language: String,
    #[serde(default = "default_boost")]
    pub boost: f64,
    #[serde(default)]
    pub searchable: [String; WEIGHTED_FIELD_COUNT],
    #[serde(default)]
    pub metadata: FileMetadata,
}

fn default_boost() -> f64 {
    1.0
}

impl Document {
    pub fn new(module_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            key: DocKey::new(module_id, entity_id),
            language: String::new(),
            boost: default_boost(),
            searchable: Default::default(),
            metadata: FileMetadata::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_text(mut self, slot: WeightSlot, text: impl Into<String>) -> Self {
        self.searchable[slot.index()] = text.into();
        self
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn text(&self, slot: WeightSlot) -> &str {
        &self.searchable[slot.index()]
    }

    /// Checks everything the store relies on. Runs before any mutation.
    pub fn validate(&self) -> Result<(), IndexError> {
        self.key.validate()?;
        if !self.boost.is_finite() || self.boost < 0.0 {
            return Err(IndexError::schema(format!(
                "boost must be a finite, non-negative number (got {})",
                self.boost
            )));
        }
        Ok(())
    }
}

/// Submission-order stamp of a reset. Documents carry the epoch they were
/// submitted under; a reset at epoch `E` removes every document stamped below `E`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// A ranked hit straight out of the index store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub key: DocKey,
    pub score: f64,
    pub language: String,
    pub metadata: FileMetadata,
}

/// A plausible alternative query for a near-miss search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub distance: u32,
}

/// One window of a store query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<ScoredDocument>,
    pub suggestions: Vec<Suggestion>,
    /// Number of matching documents before `offset`/`limit` were applied.
    pub total_hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, limit: usize, offset: usize) -> Self {
        Self { text: text.into(), limit, offset }
    }
}

/// Caller-facing view of a hit, decorated with favorite state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub subtitle: String,
    pub parent_title: String,
    pub uri: String,
    pub file_type: String,
    pub image_uri: String,
    pub module_id: String,
    pub entity_id: String,
    pub score: f64,
    pub is_favorited: bool,
}

impl SearchResult {
    pub fn key(&self) -> DocKey {
        DocKey::new(self.module_id.clone(), self.entity_id.clone())
    }
}

impl From<ScoredDocument> for SearchResult {
    fn from(doc: ScoredDocument) -> Self {
        let FileMetadata { title, subtitle, parent_title, uri, file_type, image_uri } = doc.metadata;
        Self {
            title,
            subtitle,
            parent_title,
            uri,
            file_type,
            image_uri,
            module_id: doc.key.module_id,
            entity_id: doc.key.entity_id,
            score: doc.score,
            is_favorited: false,
        }
    }
}

/// Which collaborator produced the results delivered to the local callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSource {
    Local,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub suggestions: Vec<Suggestion>,
    pub total_hits: usize,
    pub source: ResultSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_parts_are_schema_errors() {
        assert!(matches!(DocKey::new("", "e1").validate(), Err(IndexError::Schema(_))));
        assert!(matches!(DocKey::new("m1", "  ").validate(), Err(IndexError::Schema(_))));
        assert!(DocKey::new("m1", "e1").validate().is_ok());
    }

    #[test]
    fn separator_in_key_is_rejected() {
        let key = DocKey::new("m\u{1f}1", "e1");
        assert!(matches!(key.validate(), Err(IndexError::Schema(_))));
    }

    #[test]
    fn boost_must_be_finite_and_non_negative() {
        let doc = Document::new("m1", "e1");
        assert!(doc.clone().with_boost(0.0).validate().is_ok());
        assert!(doc.clone().with_boost(-1.0).validate().is_err());
        assert!(doc.with_boost(f64::NAN).validate().is_err());
    }

    #[test]
    fn scored_document_converts_to_undecorated_result() {
        let doc = ScoredDocument {
            key: DocKey::new("m1", "e1"),
            score: 1.5,
            language: "en".into(),
            metadata: FileMetadata { title: "Title".into(), parent_title: "Parent".into(), ..Default::default() },
        };
        let result = SearchResult::from(doc);
        assert_eq!(result.title, "Title");
        assert_eq!(result.parent_title, "Parent");
        assert_eq!(result.key(), DocKey::new("m1", "e1"));
        assert!(!result.is_favorited);
    }
}
