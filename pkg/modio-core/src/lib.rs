//! L4-L6: the mod management core built on top of the lower-level
//! `modio-http`, `modio-file`, and `modio-compression` crates. This
//! crate owns the mod collection state machine, the session/cache
//! layers, the reconciliation scheduler, and the composed operations
//! (`ops`) that actually move bytes around.

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod event_log;
pub mod mod_collection;
pub mod ops;
pub mod persisted;
pub mod progress;
pub mod scheduler;
pub mod session;

pub use cache::ResponseCache;
pub use collection::{EntryTransaction, ErrorClassification, ModCollectionEntry, ModState};
pub use config::{Config, ConfigEnvironment};
pub use event_log::{Event, EventLog, EventType};
pub use mod_collection::{ModCollection, SubscriptionChange};
pub use ops::{
    AuthenticatedUser, CreatedMod, DelegationToken, EntitlementPlatform, ExternalAuthProvider, FileArchiveSource,
    HttpContext, ModChanges, ModDependency, ModFile, ModFileDownload, ModProfile, ModTagOption, ModsOps, MutedUser,
    NewModProfile, ReportResourceType, UserEntitlement, WalletBalance, get_mod_gallery_image, get_mod_logo,
    get_user_avatar,
};
pub use persisted::{PersistedModEntry, PersistedModState, PersistedOAuth, PersistedUserMetadata};
pub use progress::{ModProgressHandle, ModProgressInfo, ProgressState};
pub use scheduler::{ReconciliationLoop, ReconciliationOps, Scheduler, Work};
pub use session::{OAuthToken, SessionData, SessionSnapshot, TokenStatus};
