//! Composed operations: the seam where `modio-core`'s state machinery
//! actually talks to the HTTP pipeline, the file service, and the zip
//! engine. Everything below this module stays free of those
//! dependencies so it can be unit tested without I/O.

pub mod absolute_url;
pub mod archive_source;
pub mod auth;
pub mod collections;
pub mod http_ctx;
pub mod media;
pub mod metadata;
pub mod moderation;
pub mod mods;
pub mod monetization;
pub mod reconcile;

pub use archive_source::FileArchiveSource;
pub use auth::{AuthenticatedUser, ExternalAuthProvider};
pub use http_ctx::HttpContext;
pub use media::{get_mod_gallery_image, get_mod_logo, get_user_avatar};
pub use metadata::{CreatedMod, ModChanges, ModDependency, ModTagOption, NewModProfile};
pub use moderation::{MutedUser, ReportResourceType};
pub use mods::{ModFile, ModFileDownload, ModProfile};
pub use monetization::{DelegationToken, EntitlementPlatform, UserEntitlement, WalletBalance};
pub use reconcile::ModsOps;
