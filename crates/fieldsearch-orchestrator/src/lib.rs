//! fieldsearch-orchestrator
//!
//! Task-shaped façade over named full-text indexes: prioritised index,
//! remove, reset and search tasks, submission-order guarantees per key,
//! and fusion of local, remote and backup results.
pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod spool;
pub mod task;

pub use executor::{InlineExecutor, PriorityQueueExecutor, TaskExecutor};
pub use orchestrator::{IndexScope, IndexSource, OrchestratorBuilder, RemoteCompletion, SearchOrchestrator};
pub use task::{TaskDescriptor, TaskHandle, TaskId, TaskKind, TaskOutcome, TaskPriority};

/// The canonical searchable form of `text`, as stored in the weighted columns.
pub fn searchable_string(text: &str) -> String {
    fieldsearch_text::IndexStore::searchable_string(text)
}

/// Visible text of an HTML fragment, for callers that only have markup.
pub fn plain_text_from_html(markup: &str) -> String {
    fieldsearch_core::normalize::extract_plain_text(markup)
}
