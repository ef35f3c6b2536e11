//! Task descriptors, priorities and completion handles.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

use fieldsearch_core::types::DocKey;
use fieldsearch_core::{Error, Result};

/// Unique identifier of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered scheduling key. Compared lexicographically: `major` first, then `minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskPriority {
    pub major: u8,
    pub minor: u8,
}

impl TaskPriority {
    pub const SEARCH: Self = Self { major: 1, minor: 0 };
    pub const RESET: Self = Self { major: 0, minor: 3 };
    pub const INDEX: Self = Self { major: 0, minor: 2 };
    pub const REMOVE: Self = Self { major: 0, minor: 1 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Index,
    Remove,
    Reset,
    Search,
}

impl TaskKind {
    pub fn priority(self) -> TaskPriority {
        match self {
            Self::Search => TaskPriority::SEARCH,
            Self::Reset => TaskPriority::RESET,
            Self::Index => TaskPriority::INDEX,
            Self::Remove => TaskPriority::REMOVE,
        }
    }
}

/// What the execution substrate sees of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub index_name: String,
    pub payload: serde_json::Value,
}

impl TaskDescriptor {
    pub fn new(id: TaskId, kind: TaskKind, index_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { id, kind, priority: kind.priority(), index_name: index_name.into(), payload }
    }
}

/// A descriptor plus the work to run. Running consumes the task.
pub struct Task {
    pub descriptor: TaskDescriptor,
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    pub fn new(descriptor: TaskDescriptor, job: impl FnOnce() + Send + 'static) -> Self {
        Self { descriptor, job: Box::new(job) }
    }

    pub fn priority(&self) -> TaskPriority {
        self.descriptor.priority
    }

    pub fn run(self) {
        (self.job)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("descriptor", &self.descriptor).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Indexed { key: DocKey, auxiliary_id: Option<String> },
    Removed { key: DocKey, auxiliary_id: Option<String> },
    Reset,
    Searched { hits: usize },
    /// A later-submitted mutation (or reset) already decided this key's state.
    Superseded,
    Batch { indexed: usize, superseded: usize, failed: usize },
}

/// Resolves the matching [`TaskHandle`] exactly once.
#[derive(Debug)]
pub struct TaskCompleter {
    sender: oneshot::Sender<Result<TaskOutcome>>,
}

impl TaskCompleter {
    pub fn complete(self, outcome: Result<TaskOutcome>) {
        // The caller may have dropped its handle.
        let _ = self.sender.send(outcome);
    }
}

/// Caller side of a submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    receiver: oneshot::Receiver<Result<TaskOutcome>>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Waits for the task. A task dropped unrun (e.g. on executor shutdown) is an `Operation` error.
    pub async fn wait(self) -> Result<TaskOutcome> {
        let id = self.id;
        self.receiver
            .await
            .unwrap_or_else(|_| Err(Error::Operation(format!("task {id} was dropped before completing"))))
    }

    /// Non-blocking poll: `None` while the task is still pending.
    pub fn try_outcome(&mut self) -> Option<Result<TaskOutcome>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(Error::Operation(format!("task {} was dropped before completing", self.id))))
            }
        }
    }
}

pub fn completion(id: TaskId) -> (TaskCompleter, TaskHandle) {
    let (sender, receiver) = oneshot::channel();
    (TaskCompleter { sender }, TaskHandle { id, receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_outranks_every_mutation() {
        let search = TaskKind::Search.priority();
        for kind in [TaskKind::Index, TaskKind::Remove, TaskKind::Reset] {
            assert!(search > kind.priority(), "{kind:?}");
        }
        assert!(TaskKind::Index.priority() > TaskKind::Remove.priority());
    }

    #[test]
    fn handle_reports_completion_once() {
        let (completer, mut handle) = completion(TaskId::new());
        assert!(handle.try_outcome().is_none());
        completer.complete(Ok(TaskOutcome::Reset));
        assert!(matches!(handle.try_outcome(), Some(Ok(TaskOutcome::Reset))));
    }

    #[test]
    fn dropped_completer_is_an_operation_error() {
        let (completer, mut handle) = completion(TaskId::new());
        drop(completer);
        assert!(matches!(handle.try_outcome(), Some(Err(Error::Operation(_)))));
    }
}
