//! Per-operation progress reporting (spec §3 "Mod progress info", §4.4,
//! §9 "Shared-state lifetime"). The operation holds the only strong
//! reference; whoever wants to observe progress (or cancel by dropping
//! it) upgrades a `Weak` at each suspension resume. A failed upgrade is
//! the cancellation signal, matching the teacher's `Weak<SharedState>`
//! pattern for operations that must notice their host went away
//! mid-flight.

use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Initializing,
    Downloading,
    Extracting,
    Compressing,
    Uploading,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    current: u64,
    total: u64,
}

struct ModProgressInner {
    mod_id: u64,
    state: Mutex<ProgressState>,
    counters: Mutex<Counters>,
}

/// Owned by the host (or whoever launched the operation). Dropping this
/// is how a caller cancels an in-flight install/upload: the operation's
/// `ModProgressHandle::is_live()` starts failing on its next suspension.
#[derive(Clone)]
pub struct ModProgressInfo {
    inner: Arc<ModProgressInner>,
}

impl ModProgressInfo {
    pub fn new(mod_id: u64) -> Self {
        Self {
            inner: Arc::new(ModProgressInner {
                mod_id,
                state: Mutex::new(ProgressState::Initializing),
                counters: Mutex::new(Counters::default()),
            }),
        }
    }

    pub fn mod_id(&self) -> u64 {
        self.inner.mod_id
    }

    pub fn state(&self) -> ProgressState {
        *self.inner.state.lock().unwrap()
    }

    pub fn current(&self) -> u64 {
        self.inner.counters.lock().unwrap().current
    }

    pub fn total(&self) -> u64 {
        self.inner.counters.lock().unwrap().total
    }

    /// Hands the operation a weak handle it can upgrade at each
    /// suspension point to report progress and detect cancellation.
    pub fn handle(&self) -> ModProgressHandle {
        ModProgressHandle { weak: Arc::downgrade(&self.inner) }
    }
}

#[derive(Clone)]
pub struct ModProgressHandle {
    weak: Weak<ModProgressInner>,
}

impl ModProgressHandle {
    pub fn is_live(&self) -> bool {
        self.weak.upgrade().is_some()
    }

    pub fn set_state(&self, state: ProgressState) -> bool {
        match self.weak.upgrade() {
            Some(inner) => {
                *inner.state.lock().unwrap() = state;
                true
            }
            None => false,
        }
    }

    pub fn set_progress(&self, current: u64, total: u64) -> bool {
        match self.weak.upgrade() {
            Some(inner) => {
                let mut counters = inner.counters.lock().unwrap();
                counters.current = current;
                counters.total = total;
                true
            }
            None => false,
        }
    }
}
