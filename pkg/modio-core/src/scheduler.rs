//! The reconciliation scheduler (spec §4.8): each tick picks at most one
//! mod to act on and launches the matching operation under a
//! transaction. Split into a synchronous decision half (`Scheduler`,
//! fully unit-testable without any I/O — property 8) and an async
//! execution half (`ReconciliationLoop`, which actually drives the
//! chosen `Work` item to completion on the executor).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base_error::Result;
use log::info;
use modio_executor::{Executor, Timer};

use crate::collection::{ModCollectionEntry, ModState};
use crate::event_log::{EventLog, EventType};
use crate::mod_collection::ModCollection;
use crate::session::SessionData;

/// Sleep applied once the session's rate-limit flag is set, before the
/// scheduler checks again (spec §4.8).
pub const RATE_LIMIT_BACKOFF: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Clone)]
pub enum Work {
    Install(Arc<ModCollectionEntry>),
    Update(Arc<ModCollectionEntry>),
    Uninstall(Arc<ModCollectionEntry>),
    RetryUnsubscribe(u64),
}

pub struct Scheduler {
    pub collection: Arc<ModCollection>,
    session: Arc<SessionData>,
    rate_limit_logged: AtomicBool,
}

impl Scheduler {
    pub fn new(collection: Arc<ModCollection>, session: Arc<SessionData>) -> Self {
        Self { collection, session, rate_limit_logged: AtomicBool::new(false) }
    }

    /// Pure decision step: no I/O, safe to call every tick. Implements
    /// spec §4.8 steps 1, 2, 3, 4 as a single synchronous pass over
    /// process-local state.
    pub fn decide_next_work(&self) -> Option<Work> {
        if self.session.is_rate_limited() {
            if !self.rate_limit_logged.swap(true, Ordering::SeqCst) {
                info!("session rate-limited, scheduler pausing for {:?}", RATE_LIMIT_BACKOFF);
            }
            return None;
        }
        self.rate_limit_logged.store(false, Ordering::SeqCst);

        self.collection.flush_subscription_diff();

        if let Some(&mod_id) = self.collection.deferred_unsubscribes().first() {
            return Some(Work::RetryUnsubscribe(mod_id));
        }

        let entry = self.collection.next_entry_needing_work()?;
        let work = match entry.current_state.load() {
            ModState::InstallPending => Work::Install(entry),
            ModState::UpdatePending => Work::Update(entry),
            ModState::UninstallPending => Work::Uninstall(entry),
            _ => return None,
        };
        Some(work)
    }
}

/// Executes a chosen `Work` item. Implemented by `ops` against the real
/// HTTP/file/zip stack; a test double can implement it directly against
/// in-memory fixtures.
#[async_trait]
pub trait ReconciliationOps: Send + Sync {
    async fn run(&self, work: Work) -> Result<()>;
}

fn begin_event(work: &Work) -> Option<(u64, EventType)> {
    match work {
        Work::Install(e) => Some((e.id, EventType::BeginInstall)),
        Work::Update(e) => Some((e.id, EventType::BeginUpdate)),
        Work::Uninstall(e) => Some((e.id, EventType::BeginUninstall)),
        Work::RetryUnsubscribe(_) => None,
    }
}

fn end_event(work: &Work, success: bool) -> Option<(u64, EventType)> {
    if !success {
        return None;
    }
    match work {
        Work::Install(e) => Some((e.id, EventType::Installed)),
        Work::Update(e) => Some((e.id, EventType::Updated)),
        Work::Uninstall(e) => Some((e.id, EventType::Uninstalled)),
        Work::RetryUnsubscribe(_) => None,
    }
}

/// Wires `Scheduler`'s decisions to an executor: at most one `Work` item
/// in flight at a time (spec §4.8: "while an operation is active, the
/// scheduler launches no new work").
pub struct ReconciliationLoop {
    pub scheduler: Scheduler,
    active: Arc<AtomicBool>,
    pub event_log: Arc<Mutex<EventLog>>,
}

impl ReconciliationLoop {
    pub fn new(scheduler: Scheduler, event_log: Arc<Mutex<EventLog>>) -> Self {
        Self { scheduler, active: Arc::new(AtomicBool::new(false)), event_log }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// One scheduler tick: decides the next `Work` item (if any and if
    /// nothing is already in flight) and spawns it on `executor`.
    pub fn tick(&self, executor: &Executor, ops: Arc<dyn ReconciliationOps>) {
        if self.active.load(Ordering::SeqCst) {
            return;
        }
        let Some(work) = self.scheduler.decide_next_work() else {
            return;
        };

        if let Some((mod_id, event_type)) = begin_event(&work) {
            self.event_log.lock().unwrap().push(mod_id, event_type, 0);
        }

        self.active.store(true, Ordering::SeqCst);
        let active = self.active.clone();
        let event_log = self.event_log.clone();
        let work_for_result = work.clone();

        executor.spawn(async move {
            let result = ops.run(work).await;
            let success = result.is_ok();
            if let Some((mod_id, event_type)) = end_event(&work_for_result, success) {
                event_log.lock().unwrap().push(mod_id, event_type, 0);
            }
            active.store(false, Ordering::SeqCst);
        });
    }

    /// Sleeps for the rate-limit backoff, honoring cancellation the same
    /// way every other suspension point does.
    pub async fn rate_limit_backoff(&self) -> Result<()> {
        Timer::new(RATE_LIMIT_BACKOFF).wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigEnvironment};
    use crate::mod_collection::SubscriptionChange;

    fn test_session() -> Arc<SessionData> {
        SessionData::new(&Config {
            api_key: "k".to_string(),
            game_id: 42,
            portal: "none".to_string(),
            environment: ConfigEnvironment::Live,
            locale: "en".to_string(),
            platform_override: None,
            environment_override_host: None,
            root_path: "/tmp".to_string(),
        })
    }

    #[test]
    fn rate_limited_session_yields_no_work() {
        let collection = Arc::new(ModCollection::new());
        collection.insert(Arc::new(ModCollectionEntry::new(1, ModState::InstallPending)));
        let session = test_session();
        session.set_rate_limited(true);

        let scheduler = Scheduler::new(collection, session);
        assert!(scheduler.decide_next_work().is_none());
    }

    #[test]
    fn deferred_unsubscribe_takes_priority_over_state_work() {
        let collection = Arc::new(ModCollection::new());
        collection.insert(Arc::new(ModCollectionEntry::new(1, ModState::InstallPending)));
        collection.queue_deferred_unsubscribe(99);

        let scheduler = Scheduler::new(collection, test_session());
        match scheduler.decide_next_work() {
            Some(Work::RetryUnsubscribe(id)) => assert_eq!(id, 99),
            _ => panic!("expected a retry-unsubscribe work item"),
        }
    }

    #[test]
    fn flushes_subscription_diff_before_picking_work() {
        let collection = Arc::new(ModCollection::new());
        collection.queue_subscription_change(1, SubscriptionChange::Add(42));

        let scheduler = Scheduler::new(collection, test_session());
        match scheduler.decide_next_work() {
            Some(Work::Install(entry)) => assert_eq!(entry.id, 42),
            _ => panic!("expected an install work item for the newly subscribed mod"),
        }
    }

    #[test]
    fn no_work_when_nothing_needs_it() {
        let collection = Arc::new(ModCollection::new());
        collection.insert(Arc::new(ModCollectionEntry::new(1, ModState::Installed)));
        let scheduler = Scheduler::new(collection, test_session());
        assert!(scheduler.decide_next_work().is_none());
    }
}
