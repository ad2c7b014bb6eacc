//! The persisted user metadata document (spec §6) and the collapsing
//! rule invariant 4 requires on serialization: a transitional
//! `current_state` (`downloading`/`extracting`) is never written out —
//! it collapses to its `rollback_state`, or to `install_pending` if none
//! is set.

use serde::{Deserialize, Serialize};

use crate::collection::{ModCollectionEntry, ModState};

/// Wire values for `OAuth.status` (spec §6: "0=valid,1=expired,2=invalid").
pub const OAUTH_STATUS_VALID: i32 = 0;
pub const OAUTH_STATUS_EXPIRED: i32 = 1;
pub const OAUTH_STATUS_INVALID: i32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedOAuth {
    pub expiry: i64,
    /// 0=valid, 1=expired, 2=invalid — see `OAUTH_STATUS_*`.
    pub status: i32,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedAvatar {
    pub filename: String,
    pub original: String,
    pub thumb_50x50: String,
    pub thumb_100x100: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedModState {
    InstallPending,
    Installed,
    UpdatePending,
    UninstallPending,
}

impl From<PersistedModState> for ModState {
    fn from(value: PersistedModState) -> Self {
        match value {
            PersistedModState::InstallPending => ModState::InstallPending,
            PersistedModState::Installed => ModState::Installed,
            PersistedModState::UpdatePending => ModState::UpdatePending,
            PersistedModState::UninstallPending => ModState::UninstallPending,
        }
    }
}

/// Collapses a possibly-transitional state per invariant 4: a
/// transitional state (`downloading`/`extracting`) is represented by
/// whatever it would roll back to, defaulting to `install_pending`.
fn collapse_state(current: ModState, rollback: Option<ModState>) -> PersistedModState {
    let effective = if current.is_transitional() {
        rollback.unwrap_or(ModState::InstallPending)
    } else {
        current
    };
    match effective {
        ModState::InstallPending | ModState::Downloading | ModState::Extracting => PersistedModState::InstallPending,
        ModState::Installed => PersistedModState::Installed,
        ModState::UpdatePending => PersistedModState::UpdatePending,
        ModState::UninstallPending => PersistedModState::UninstallPending,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModEntry {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Profile")]
    pub profile: Option<serde_json::Value>,
    #[serde(rename = "SubscriptionCount")]
    pub subscription_count: u32,
    #[serde(rename = "State")]
    pub state: PersistedModState,
    #[serde(rename = "SizeOnDisk")]
    pub size_on_disk: Option<u64>,
    #[serde(rename = "PathOnDisk")]
    pub path_on_disk: Option<String>,
    #[serde(rename = "NeverRetryCode")]
    pub never_retry_code: Option<String>,
    #[serde(rename = "NeverRetryCategory")]
    pub never_retry_category: Option<String>,
}

impl PersistedModEntry {
    /// Builds the persisted form of a live entry. `rollback` is the
    /// entry's in-progress transaction rollback target, if any; callers
    /// read it while still holding whatever lock guards that field.
    pub fn from_entry(entry: &ModCollectionEntry, rollback: Option<ModState>) -> Self {
        Self {
            id: entry.id,
            profile: entry.profile.lock().unwrap().clone(),
            subscription_count: entry.local_user_subscribers.lock().unwrap().len() as u32,
            state: collapse_state(entry.current_state.load(), rollback),
            size_on_disk: *entry.size_on_disk.lock().unwrap(),
            path_on_disk: entry.path_on_disk.lock().unwrap().clone(),
            never_retry_code: entry.permanent_no_retry_reason.lock().unwrap().clone(),
            never_retry_category: None,
        }
    }

    pub fn to_entry(&self) -> ModCollectionEntry {
        let entry = ModCollectionEntry::new(self.id, self.state.into());
        *entry.profile.lock().unwrap() = self.profile.clone();
        *entry.size_on_disk.lock().unwrap() = self.size_on_disk;
        *entry.path_on_disk.lock().unwrap() = self.path_on_disk.clone();
        *entry.permanent_no_retry_reason.lock().unwrap() = self.never_retry_code.clone();
        entry
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedUserMetadata {
    pub subscriptions: Vec<u64>,
    #[serde(rename = "DeferredUnsubscribes")]
    pub deferred_unsubscribes: Vec<u64>,
    #[serde(rename = "OAuth")]
    pub oauth: Option<PersistedOAuth>,
    #[serde(rename = "Profile")]
    pub profile: Option<serde_json::Value>,
    #[serde(rename = "Avatar")]
    pub avatar: Option<PersistedAvatar>,
    #[serde(rename = "Mods")]
    pub mods: Vec<PersistedModEntry>,
    #[serde(rename = "RootLocalStoragePath")]
    pub root_local_storage_path: Option<String>,
}

impl PersistedUserMetadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ModCollectionEntry;

    #[test]
    fn transitional_state_collapses_to_rollback_target() {
        assert_eq!(collapse_state(ModState::Downloading, Some(ModState::Installed)), PersistedModState::Installed);
        assert_eq!(collapse_state(ModState::Extracting, None), PersistedModState::InstallPending);
    }

    #[test]
    fn round_trips_through_json() {
        let meta = PersistedUserMetadata {
            subscriptions: vec![1, 2, 3],
            deferred_unsubscribes: vec![9],
            oauth: Some(PersistedOAuth { expiry: 123, status: OAUTH_STATUS_VALID, token: Some("tok".to_string()) }),
            profile: Some(serde_json::json!({"id": 5})),
            avatar: None,
            mods: vec![PersistedModEntry {
                id: 42,
                profile: None,
                subscription_count: 1,
                state: PersistedModState::Installed,
                size_on_disk: Some(1024),
                path_on_disk: Some("/root/42/mods/42".to_string()),
                never_retry_code: None,
                never_retry_category: None,
            }],
            root_local_storage_path: Some("/root".to_string()),
        };

        let json = meta.to_json().unwrap();
        let parsed = PersistedUserMetadata::from_json(&json).unwrap();
        assert_eq!(parsed.subscriptions, meta.subscriptions);
        assert_eq!(parsed.mods[0].id, 42);
        assert_eq!(parsed.mods[0].state, PersistedModState::Installed);
    }

    #[test]
    fn entry_round_trips_persisted_fields() {
        let entry = ModCollectionEntry::new(42, ModState::Installed);
        *entry.size_on_disk.lock().unwrap() = Some(2048);
        *entry.path_on_disk.lock().unwrap() = Some("/root/42/mods/42".to_string());

        let persisted = PersistedModEntry::from_entry(&entry, None);
        let restored = persisted.to_entry();

        assert_eq!(restored.id, entry.id);
        assert_eq!(restored.current_state.load(), entry.current_state.load());
        assert_eq!(*restored.size_on_disk.lock().unwrap(), *entry.size_on_disk.lock().unwrap());
        assert_eq!(*restored.path_on_disk.lock().unwrap(), *entry.path_on_disk.lock().unwrap());
    }
}
