use std::sync::Arc;

use crate::error::{IndexError, QueryError, RemoteSearchError};
use crate::types::{DocKey, Document, Epoch, FileMetadata, SearchPage, SearchRequest, SearchResult};

/// One named full-text index: documents, their metadata, and ranked search.
pub trait SearchIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts or atomically replaces the document under its key.
    fn index(&self, document: &Document) -> Result<(), IndexError>;

    /// Like [`SearchIndex::index`], stamping the row with the reset epoch it was submitted under.
    fn index_at(&self, document: &Document, epoch: Epoch) -> Result<(), IndexError>;

    /// Succeeds whether or not the key exists.
    fn remove(&self, key: &DocKey) -> Result<(), IndexError>;

    /// Destroys every document.
    fn reset(&self) -> Result<(), IndexError>;

    /// Destroys every document stamped with an epoch below `epoch`.
    fn reset_before(&self, epoch: Epoch) -> Result<(), IndexError>;

    fn search(&self, text: &str, limit: usize, offset: usize) -> Result<SearchPage, QueryError>;

    fn metadata(&self, key: &DocKey) -> Result<Option<FileMetadata>, IndexError>;

    fn document_count(&self) -> Result<u64, IndexError>;

    /// Highest reset epoch stamped on any stored row, `None` when the index is empty.
    fn max_epoch(&self) -> Result<Option<Epoch>, IndexError>;
}

/// Creates the index backing a name. Called once per name per process.
pub trait IndexOpener: Send + Sync {
    fn open(&self, name: &str) -> Result<Arc<dyn SearchIndex>, IndexError>;
}

pub trait FavoriteLookup: Send + Sync {
    fn is_favorited(&self, result: &SearchResult) -> bool;
}

pub type RemoteCallback = Box<dyn FnOnce(Result<Vec<SearchResult>, RemoteSearchError>) + Send>;

/// Asynchronous remote source. Must return promptly and call `on_complete` later.
pub trait RemoteSearch: Send + Sync {
    fn search(&self, request: &SearchRequest, on_complete: RemoteCallback);
}

/// Synchronous fallback consulted when local and remote found nothing.
pub trait BackupSearch: Send + Sync {
    fn search(&self, request: &SearchRequest) -> anyhow::Result<Vec<SearchResult>>;
}

/// Names an entity on an external (OS-level or third-party) search surface.
pub trait AuxiliarySurface: Send + Sync {
    fn identifier(&self, file_id: &str, module_id: &str, metadata: &FileMetadata) -> String;
}

pub trait IndexListener: Send + Sync {
    fn files_indexed(&self, index_name: &str, keys: &[DocKey]);
}
