//! Concrete `ReconciliationOps` wiring the composed operations in `mods`
//! to the scheduler (spec §4.8). One `ModsOps` per session: it owns
//! nothing the collection doesn't already own, it just knows how to
//! reach the API and the storage root.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base_error::Result;
use modio_common::cancellation::CancellationFlag;

use crate::cache::ResponseCache;
use crate::mod_collection::ModCollection;
use crate::ops::http_ctx::HttpContext;
use crate::ops::mods;
use crate::progress::ModProgressInfo;
use crate::scheduler::{ReconciliationOps, Work};

pub struct ModsOps {
    pub ctx: HttpContext,
    pub collection: Arc<ModCollection>,
    pub cache: ResponseCache,
    pub storage_root: PathBuf,
}

impl ModsOps {
    /// Sweeps every currently-`installed` entry for a metadata change
    /// (spec §4.4). Meant to be called by the host on whatever cadence it
    /// likes; the scheduler itself never re-examines an `installed` entry
    /// on its own, since `next_entry_needing_work` only looks at the three
    /// `needs_work` states.
    pub async fn check_for_updates(&self) -> Result<()> {
        for entry in self.collection.all() {
            mods::check_for_update(&self.ctx, &self.cache, &entry).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReconciliationOps for ModsOps {
    async fn run(&self, work: Work) -> Result<()> {
        let cancel = CancellationFlag::new();

        match work {
            Work::Install(entry) | Work::Update(entry) => {
                let progress = ModProgressInfo::new(entry.id);
                mods::download_and_extract(&self.ctx, &self.cache, &self.storage_root, &entry, &progress.handle(), &cancel)
                    .await
            }
            Work::Uninstall(entry) => {
                let result = mods::uninstall(&entry, &self.storage_root, self.ctx.session.game_id).await;
                if result.is_ok() {
                    self.collection.remove(entry.id);
                }
                result
            }
            Work::RetryUnsubscribe(mod_id) => {
                mods::retry_unsubscribe(&self.ctx, &self.collection, mod_id).await
            }
        }
    }
}
