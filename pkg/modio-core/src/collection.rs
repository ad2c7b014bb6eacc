//! Mod collection entries and the per-entry transaction that brackets a
//! state transition (spec §3, §4.7). Grounded on design note
//! "Transactional entry state" (spec §9): the source holds a weak handle
//! to its target and rolls back on drop unless committed; in Rust this
//! becomes an explicit scope guard over the entry's atomic state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

use log::warn;

/// Retries reset to this count whenever an entry reaches `Installed`
/// (spec §4.7).
pub const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModState {
    InstallPending = 0,
    Installed = 1,
    UpdatePending = 2,
    Downloading = 3,
    Extracting = 4,
    UninstallPending = 5,
}

impl ModState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ModState::InstallPending,
            1 => ModState::Installed,
            2 => ModState::UpdatePending,
            3 => ModState::Downloading,
            4 => ModState::Extracting,
            5 => ModState::UninstallPending,
            _ => unreachable!("invalid ModState discriminant"),
        }
    }

    /// True for transitional states that must never be observed in the
    /// persisted collection (spec invariant 4).
    pub fn is_transitional(self) -> bool {
        matches!(self, ModState::Downloading | ModState::Extracting)
    }

    /// True for the three states the scheduler treats as "needs work"
    /// (spec §4.8 step 4).
    pub fn needs_work(self) -> bool {
        matches!(self, ModState::InstallPending | ModState::UpdatePending | ModState::UninstallPending)
    }
}

/// An atomic slot holding a `ModState`, so `current_state` can be read
/// without taking any lock (spec §5: "current_state ... are atomics").
pub struct AtomicModState(AtomicU8);

impl AtomicModState {
    pub fn new(state: ModState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ModState {
        ModState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: ModState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

pub struct ModCollectionEntry {
    pub id: u64,
    pub current_state: AtomicModState,
    rollback_state: Mutex<Option<ModState>>,
    transaction_active: AtomicBool,
    pub profile: Mutex<Option<serde_json::Value>>,
    pub local_user_subscribers: Mutex<HashSet<u64>>,
    pub path_on_disk: Mutex<Option<String>>,
    pub size_on_disk: Mutex<Option<u64>>,
    pub retries_remaining_this_session: Mutex<u32>,
    pub should_not_retry_this_session: AtomicBool,
    pub permanent_no_retry_reason: Mutex<Option<String>>,
}

impl ModCollectionEntry {
    pub fn new(id: u64, initial_state: ModState) -> Self {
        Self {
            id,
            current_state: AtomicModState::new(initial_state),
            rollback_state: Mutex::new(None),
            transaction_active: AtomicBool::new(false),
            profile: Mutex::new(None),
            local_user_subscribers: Mutex::new(HashSet::new()),
            path_on_disk: Mutex::new(None),
            size_on_disk: Mutex::new(None),
            retries_remaining_this_session: Mutex::new(DEFAULT_RETRIES),
            should_not_retry_this_session: AtomicBool::new(false),
            permanent_no_retry_reason: Mutex::new(None),
        }
    }

    /// `size_on_disk` is only meaningful once the entry is fully
    /// installed (spec invariant 2).
    pub fn size_on_disk_if_installed(&self) -> Option<u64> {
        if self.current_state.load() == ModState::Installed {
            *self.size_on_disk.lock().unwrap()
        } else {
            None
        }
    }

    pub fn should_retry(&self) -> bool {
        !self.should_not_retry_this_session.load(Ordering::SeqCst)
            && self.permanent_no_retry_reason.lock().unwrap().is_none()
            && *self.retries_remaining_this_session.lock().unwrap() > 0
    }

    pub fn has_been_retried_this_session(&self) -> bool {
        *self.retries_remaining_this_session.lock().unwrap() < DEFAULT_RETRIES
    }

    /// Begins a transaction: snapshots `current_state` into
    /// `rollback_state`. Attempting to nest a second transaction for the
    /// same entry logs and no-ops, returning `None` (spec §4.7).
    pub fn begin_transaction(&self) -> Option<EntryTransaction<'_>> {
        if self.transaction_active.swap(true, Ordering::SeqCst) {
            warn!("mod {}: attempted to start a nested transaction, ignoring", self.id);
            return None;
        }
        *self.rollback_state.lock().unwrap() = Some(self.current_state.load());
        Some(EntryTransaction { entry: self, committed: false })
    }

    fn commit_transaction(&self) {
        *self.rollback_state.lock().unwrap() = None;
        self.transaction_active.store(false, Ordering::SeqCst);
    }

    fn rollback_transaction(&self) {
        if let Some(state) = self.rollback_state.lock().unwrap().take() {
            self.current_state.store(state);
        }
        self.transaction_active.store(false, Ordering::SeqCst);
    }

    /// Classifies an error against the entry per spec §4.7 and updates
    /// retry bookkeeping accordingly.
    pub fn set_last_error(&self, classification: ErrorClassification) {
        match classification {
            ErrorClassification::RetryableInstall => {
                let mut retries = self.retries_remaining_this_session.lock().unwrap();
                if *retries > 0 {
                    *retries -= 1;
                }
                if *retries == 0 {
                    self.should_not_retry_this_session.store(true, Ordering::SeqCst);
                }
            }
            ErrorClassification::UnrecoverableInstall(reason) => {
                *self.permanent_no_retry_reason.lock().unwrap() = Some(reason);
            }
            ErrorClassification::DeleteDeferred | ErrorClassification::Other => {
                self.should_not_retry_this_session.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Resets session-local retry bookkeeping; called on reaching
    /// `Installed` (spec §4.7).
    pub fn reset_retries(&self) {
        *self.retries_remaining_this_session.lock().unwrap() = DEFAULT_RETRIES;
        self.should_not_retry_this_session.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum ErrorClassification {
    RetryableInstall,
    UnrecoverableInstall(String),
    DeleteDeferred,
    Other,
}

/// A scope guard: on drop without `commit()`, restores `current_state`
/// to its value when the transaction began.
pub struct EntryTransaction<'a> {
    entry: &'a ModCollectionEntry,
    committed: bool,
}

impl<'a> EntryTransaction<'a> {
    pub fn commit(mut self) {
        self.committed = true;
        self.entry.commit_transaction();
    }
}

impl<'a> Drop for EntryTransaction<'a> {
    fn drop(&mut self) {
        if !self.committed {
            self.entry.rollback_transaction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_transaction_rolls_back_on_drop() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        {
            let txn = entry.begin_transaction().unwrap();
            entry.current_state.store(ModState::Downloading);
            drop(txn);
        }
        assert_eq!(entry.current_state.load(), ModState::InstallPending);
    }

    #[test]
    fn committed_transaction_keeps_new_state() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        let txn = entry.begin_transaction().unwrap();
        entry.current_state.store(ModState::Installed);
        txn.commit();
        assert_eq!(entry.current_state.load(), ModState::Installed);
    }

    #[test]
    fn nested_transaction_is_rejected() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        let _txn = entry.begin_transaction().unwrap();
        assert!(entry.begin_transaction().is_none());
    }

    #[test]
    fn retryable_error_decrements_then_sets_should_not_retry_at_zero() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        for _ in 0..DEFAULT_RETRIES {
            entry.set_last_error(ErrorClassification::RetryableInstall);
        }
        assert!(!entry.should_retry());
    }

    #[test]
    fn reaching_installed_resets_retries() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        entry.set_last_error(ErrorClassification::RetryableInstall);
        entry.reset_retries();
        assert!(entry.should_retry());
        assert_eq!(*entry.retries_remaining_this_session.lock().unwrap(), DEFAULT_RETRIES);
    }

    #[test]
    fn size_on_disk_hidden_unless_installed() {
        let entry = ModCollectionEntry::new(1, ModState::InstallPending);
        *entry.size_on_disk.lock().unwrap() = Some(1024);
        assert_eq!(entry.size_on_disk_if_installed(), None);
        entry.current_state.store(ModState::Installed);
        assert_eq!(entry.size_on_disk_if_installed(), Some(1024));
    }
}
