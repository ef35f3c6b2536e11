//! Task execution substrates.
//!
//! The orchestrator only shapes and submits tasks. Anything implementing
//! [`TaskExecutor`] can run them; two in-process substrates are provided.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tracing::debug;

use fieldsearch_core::SubmitError;

use crate::task::{Task, TaskDescriptor, TaskPriority};

pub trait TaskExecutor: Send + Sync {
    /// Accepts a task for eventual execution. The task must run at most once.
    fn submit(&self, task: Task) -> Result<(), SubmitError>;
}

/// Runs every task on the submitting thread, during `submit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: Task) -> Result<(), SubmitError> {
        task.run();
        Ok(())
    }
}

struct Queued {
    priority: TaskPriority,
    seq: u64,
    task: Task,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap: higher priority first, then earlier submission.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    shut_down: bool,
}

/// In-process priority queue drained explicitly by its owner.
///
/// Tasks run highest priority first and FIFO among equal priorities.
/// Nothing runs until `run_next`/`run_pending` is called.
#[derive(Default)]
pub struct PriorityQueueExecutor {
    state: Mutex<QueueState>,
}

impl PriorityQueueExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors of the queued tasks, in the order they would run.
    pub fn pending(&self) -> Vec<TaskDescriptor> {
        let state = self.state.lock();
        let mut queued: Vec<&Queued> = state.heap.iter().collect();
        queued.sort_by(|a, b| b.cmp(a));
        queued.into_iter().map(|q| q.task.descriptor.clone()).collect()
    }

    /// Runs the highest-priority task. Returns `false` when the queue is empty.
    pub fn run_next(&self) -> bool {
        // Popped under the lock, run outside it: jobs may submit more tasks.
        let next = self.state.lock().heap.pop();
        match next {
            Some(queued) => {
                debug!(task = %queued.task.descriptor.id, kind = ?queued.task.descriptor.kind, "Running task");
                queued.task.run();
                true
            }
            None => false,
        }
    }

    /// Drains the queue, including tasks submitted while draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Refuses further submissions and drops queued tasks unrun. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let dropped: Vec<Queued> = {
            let mut state = self.state.lock();
            state.shut_down = true;
            state.heap.drain().collect()
        };
        debug!(dropped = dropped.len(), "Executor shut down");
        dropped.len()
    }
}

impl TaskExecutor for PriorityQueueExecutor {
    fn submit(&self, task: Task) -> Result<(), SubmitError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(SubmitError::ShutDown);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Queued { priority: task.priority(), seq, task });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskDescriptor, TaskId, TaskKind};
    use std::sync::Arc;

    fn recording_task(kind: TaskKind, label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Task {
        let log = Arc::clone(log);
        Task::new(TaskDescriptor::new(TaskId::new(), kind, "default", serde_json::Value::Null), move || {
            log.lock().push(label);
        })
    }

    #[test]
    fn runs_by_priority_then_fifo() {
        let executor = PriorityQueueExecutor::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (kind, label) in [
            (TaskKind::Remove, "remove"),
            (TaskKind::Index, "index-1"),
            (TaskKind::Search, "search"),
            (TaskKind::Index, "index-2"),
            (TaskKind::Reset, "reset"),
        ] {
            executor.submit(recording_task(kind, label, &log)).expect("submit");
        }
        let planned: Vec<_> = executor.pending().into_iter().map(|d| d.kind).collect();
        assert_eq!(planned, vec![TaskKind::Search, TaskKind::Reset, TaskKind::Index, TaskKind::Index, TaskKind::Remove]);

        assert_eq!(executor.run_pending(), 5);
        assert_eq!(*log.lock(), vec!["search", "reset", "index-1", "index-2", "remove"]);
        assert!(executor.is_empty());
    }

    #[test]
    fn shutdown_rejects_and_drops() {
        let executor = PriorityQueueExecutor::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        executor.submit(recording_task(TaskKind::Index, "queued", &log)).expect("submit");
        assert_eq!(executor.shutdown(), 1);
        assert_eq!(
            executor.submit(recording_task(TaskKind::Index, "late", &log)).unwrap_err(),
            SubmitError::ShutDown
        );
        assert_eq!(executor.run_pending(), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn inline_runs_during_submit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        InlineExecutor.submit(recording_task(TaskKind::Search, "now", &log)).expect("submit");
        assert_eq!(*log.lock(), vec!["now"]);
    }
}
