//! The `mod_id -> entry` map itself, the pending subscription diff, and
//! the deferred-unsubscribe ledger (spec §3, §4.8). Kept separate from
//! `collection::ModCollectionEntry` the way the teacher splits a single
//! record's behavior from the container that owns many of them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::collection::{ModCollectionEntry, ModState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    Add(u64),
    Remove(u64),
}

#[derive(Default)]
pub struct ModCollection {
    entries: Mutex<HashMap<u64, Arc<ModCollectionEntry>>>,
    pending_diff: Mutex<VecDeque<(u64, SubscriptionChange)>>,
    deferred_unsubscribes: Mutex<Vec<u64>>,
}

impl ModCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mod_id: u64) -> Option<Arc<ModCollectionEntry>> {
        self.entries.lock().unwrap().get(&mod_id).cloned()
    }

    pub fn insert(&self, entry: Arc<ModCollectionEntry>) {
        self.entries.lock().unwrap().insert(entry.id, entry);
    }

    pub fn remove(&self, mod_id: u64) {
        self.entries.lock().unwrap().remove(&mod_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<ModCollectionEntry>> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    /// Queues a subscription delta for a given user to be applied on the
    /// next `flush_subscription_diff` call.
    pub fn queue_subscription_change(&self, user_id: u64, change: SubscriptionChange) {
        self.pending_diff.lock().unwrap().push_back((user_id, change));
    }

    pub fn queue_deferred_unsubscribe(&self, mod_id: u64) {
        let mut ledger = self.deferred_unsubscribes.lock().unwrap();
        if !ledger.contains(&mod_id) {
            ledger.push(mod_id);
        }
    }

    pub fn deferred_unsubscribes(&self) -> Vec<u64> {
        self.deferred_unsubscribes.lock().unwrap().clone()
    }

    pub fn remove_deferred_unsubscribe(&self, mod_id: u64) {
        self.deferred_unsubscribes.lock().unwrap().retain(|&id| id != mod_id);
    }

    /// Applies every queued subscription change (spec §4.8 step 1): a
    /// newly added mod id not already tracked gets a fresh
    /// `install_pending` entry; a removal drops that user from the local
    /// subscriber set, transitioning to `uninstall_pending` once it's
    /// empty.
    pub fn flush_subscription_diff(&self) {
        let changes: Vec<(u64, SubscriptionChange)> = self.pending_diff.lock().unwrap().drain(..).collect();
        for (user_id, change) in changes {
            match change {
                SubscriptionChange::Add(mod_id) => {
                    let mut entries = self.entries.lock().unwrap();
                    let entry = entries
                        .entry(mod_id)
                        .or_insert_with(|| Arc::new(ModCollectionEntry::new(mod_id, ModState::InstallPending)));
                    entry.local_user_subscribers.lock().unwrap().insert(user_id);
                }
                SubscriptionChange::Remove(mod_id) => {
                    let entries = self.entries.lock().unwrap();
                    if let Some(entry) = entries.get(&mod_id) {
                        let mut subscribers = entry.local_user_subscribers.lock().unwrap();
                        subscribers.remove(&user_id);
                        if subscribers.is_empty() && entry.current_state.load() == ModState::Installed {
                            entry.current_state.store(ModState::UninstallPending);
                        }
                    }
                }
            }
        }
    }

    /// Sorts entries by retry priority (spec §9 "two-pass partition"):
    /// entries that may retry precede those that may not; within "may
    /// retry", entries not yet retried this session precede those
    /// already counted down. Stable order within a segment otherwise.
    pub fn sort_by_retry_priority(&self) -> Vec<Arc<ModCollectionEntry>> {
        let mut entries = self.all();
        entries.sort_by_key(|e| (!e.should_retry(), e.has_been_retried_this_session()));
        entries
    }

    /// The first entry (by retry priority) whose state requires work,
    /// if any (spec §4.8 step 4, §8 property 8). An entry with a
    /// `permanent_no_retry_reason` is excluded outright rather than
    /// merely sorted last: spec invariant 5 requires it be skipped for
    /// the rest of the session and in future sessions until manually
    /// cleared, not just deprioritized behind retryable work.
    pub fn next_entry_needing_work(&self) -> Option<Arc<ModCollectionEntry>> {
        self.sort_by_retry_priority()
            .into_iter()
            .filter(|e| e.permanent_no_retry_reason.lock().unwrap().is_none())
            .find(|e| e.current_state.load().needs_work())
    }
}
