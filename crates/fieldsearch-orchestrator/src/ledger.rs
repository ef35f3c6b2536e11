//! Submission-order bookkeeping for the mutations of one named index.
//!
//! Executors may run mutations in any order. Each mutation is stamped when
//! it is submitted; at execution the ledger decides whether it still
//! matters. A mutation loses to any later-submitted mutation of the same
//! key and to any later-submitted reset that already ran. A reset removes
//! exactly the rows stamped with an older epoch.
//!
//! Per-key history only matters while an older stamp can still arrive, so
//! it is dropped whenever no stamped mutation is outstanding. Stamps whose
//! task is dropped unrun and never released keep it until the next reset.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use fieldsearch_core::types::{DocKey, Epoch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStamp {
    pub generation: u64,
    pub epoch: Epoch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied<T> {
    Done(T),
    Superseded,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_generation: u64,
    current_epoch: Epoch,
    applied_reset: Option<Epoch>,
    applied_keys: HashMap<DocKey, u64>,
    outstanding: usize,
}

impl LedgerState {
    /// One stamp resolved. With none left, every future stamp is newer than all history.
    fn settle(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding == 0 {
            self.applied_keys.clear();
        }
    }
}

#[derive(Debug, Default)]
pub struct MutationLedger {
    state: Mutex<LedgerState>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger for an index whose stored rows carry epochs up to `epoch`.
    pub fn starting_at(epoch: Epoch) -> Self {
        Self { state: Mutex::new(LedgerState { current_epoch: epoch, ..LedgerState::default() }) }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.state.lock().current_epoch
    }

    pub fn stamp_mutation(&self) -> MutationStamp {
        let mut state = self.state.lock();
        let generation = state.next_generation;
        state.next_generation += 1;
        state.outstanding += 1;
        MutationStamp { generation, epoch: state.current_epoch }
    }

    /// Gives up a stamp whose task will never run.
    pub fn release(&self, _stamp: MutationStamp) {
        self.state.lock().settle();
    }

    /// Opens a new epoch; everything stamped before this call belongs to older ones.
    pub fn stamp_reset(&self) -> MutationStamp {
        let mut state = self.state.lock();
        let generation = state.next_generation;
        state.next_generation += 1;
        state.outstanding += 1;
        state.current_epoch = state.current_epoch.next();
        MutationStamp { generation, epoch: state.current_epoch }
    }

    /// Runs `apply` for `key` unless the stamp is already outdated.
    ///
    /// The ledger stays locked while `apply` runs so the check and the
    /// write cannot interleave with another mutation of this index.
    pub fn apply_keyed<T, E>(
        &self,
        key: &DocKey,
        stamp: MutationStamp,
        apply: impl FnOnce() -> Result<T, E>,
    ) -> Result<Applied<T>, E> {
        let mut state = self.state.lock();
        let outcome = if state.applied_reset.is_some_and(|reset| stamp.epoch < reset)
            || state.applied_keys.get(key).is_some_and(|&applied| applied > stamp.generation)
        {
            Ok(Applied::Superseded)
        } else {
            apply().map(|value| {
                state.applied_keys.insert(key.clone(), stamp.generation);
                Applied::Done(value)
            })
        };
        state.settle();
        outcome
    }

    /// Runs `apply` for a reset unless a newer reset already ran.
    pub fn apply_reset<T, E>(&self, stamp: MutationStamp, apply: impl FnOnce() -> Result<T, E>) -> Result<Applied<T>, E> {
        let mut state = self.state.lock();
        let outcome = if state.applied_reset.is_some_and(|reset| reset >= stamp.epoch) {
            Ok(Applied::Superseded)
        } else {
            apply().map(|value| {
                state.applied_reset = Some(stamp.epoch);
                // Older generations are rejected by the epoch check from now on.
                state.applied_keys.retain(|_, generation| *generation > stamp.generation);
                Applied::Done(value)
            })
        };
        state.settle();
        outcome
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.state.lock().applied_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Result<(), ()> {
        Ok(())
    }

    #[test]
    fn later_submission_wins_even_when_it_runs_first() {
        let ledger = MutationLedger::new();
        let key = DocKey::new("m", "e");
        let first = ledger.stamp_mutation();
        let second = ledger.stamp_mutation();
        assert_eq!(ledger.apply_keyed(&key, second, ok), Ok(Applied::Done(())));
        assert_eq!(ledger.apply_keyed(&key, first, ok), Ok(Applied::Superseded));
    }

    #[test]
    fn other_keys_are_independent() {
        let ledger = MutationLedger::new();
        let early = ledger.stamp_mutation();
        let late = ledger.stamp_mutation();
        assert_eq!(ledger.apply_keyed(&DocKey::new("m", "b"), late, ok), Ok(Applied::Done(())));
        assert_eq!(ledger.apply_keyed(&DocKey::new("m", "a"), early, ok), Ok(Applied::Done(())));
    }

    #[test]
    fn applied_reset_rejects_older_mutations_only() {
        let ledger = MutationLedger::new();
        let key = DocKey::new("m", "e");
        let before = ledger.stamp_mutation();
        let reset = ledger.stamp_reset();
        let after = ledger.stamp_mutation();
        assert_eq!(reset.epoch, Epoch(1));
        assert_eq!(after.epoch, Epoch(1));

        assert_eq!(ledger.apply_reset(reset, ok), Ok(Applied::Done(())));
        assert_eq!(ledger.apply_keyed(&key, before, ok), Ok(Applied::Superseded));
        assert_eq!(ledger.apply_keyed(&key, after, ok), Ok(Applied::Done(())));
    }

    #[test]
    fn older_reset_after_newer_one_is_superseded() {
        let ledger = MutationLedger::new();
        let first = ledger.stamp_reset();
        let second = ledger.stamp_reset();
        assert_eq!(ledger.apply_reset(second, ok), Ok(Applied::Done(())));
        assert_eq!(ledger.apply_reset(first, ok), Ok(Applied::Superseded));
    }

    #[test]
    fn failed_apply_records_nothing() {
        let ledger = MutationLedger::new();
        let key = DocKey::new("m", "e");
        let first = ledger.stamp_mutation();
        let second = ledger.stamp_mutation();
        assert_eq!(ledger.apply_keyed(&key, second, || Err::<(), _>("disk full")), Err("disk full"));
        assert_eq!(ledger.apply_keyed(&key, first, ok), Ok(Applied::Done(())));
    }

    #[test]
    fn reset_prunes_key_history() {
        let ledger = MutationLedger::new();
        let stamps: Vec<_> = (0..3).map(|_| ledger.stamp_mutation()).collect();
        let straggler = ledger.stamp_mutation();
        for (stamp, entity) in stamps.into_iter().zip(["a", "b", "c"]) {
            ledger.apply_keyed(&DocKey::new("m", entity), stamp, ok).expect("apply");
        }
        assert_eq!(ledger.tracked_keys(), 3);
        let reset = ledger.stamp_reset();
        ledger.apply_reset(reset, ok).expect("reset");
        assert_eq!(ledger.tracked_keys(), 0);
        ledger.release(straggler);
    }

    #[test]
    fn key_history_is_kept_only_while_older_stamps_are_outstanding() {
        let ledger = MutationLedger::new();
        let key = DocKey::new("m", "e");
        let older = ledger.stamp_mutation();
        let newer = ledger.stamp_mutation();
        assert_eq!(ledger.apply_keyed(&key, newer, ok), Ok(Applied::Done(())));
        assert_eq!(ledger.tracked_keys(), 1);
        assert_eq!(ledger.apply_keyed(&key, older, ok), Ok(Applied::Superseded));
        assert_eq!(ledger.tracked_keys(), 0);

        for entity in 0..100 {
            let stamp = ledger.stamp_mutation();
            ledger.apply_keyed(&DocKey::new("m", entity.to_string()), stamp, ok).expect("apply");
        }
        assert_eq!(ledger.tracked_keys(), 0);
    }

    #[test]
    fn released_stamps_let_history_go() {
        let ledger = MutationLedger::new();
        let dropped = ledger.stamp_mutation();
        let applied = ledger.stamp_mutation();
        ledger.apply_keyed(&DocKey::new("m", "e"), applied, ok).expect("apply");
        assert_eq!(ledger.tracked_keys(), 1);
        ledger.release(dropped);
        assert_eq!(ledger.tracked_keys(), 0);
    }

    #[test]
    fn resumed_ledger_continues_the_stored_epoch() {
        let ledger = MutationLedger::starting_at(Epoch(4));
        assert_eq!(ledger.stamp_mutation().epoch, Epoch(4));
        let reset = ledger.stamp_reset();
        assert_eq!(reset.epoch, Epoch(5));
        assert_eq!(ledger.current_epoch(), Epoch(5));
    }
}
