//! Process-wide session data (spec §3): active credentials, rate-limit
//! flag, and the settings every public operation gates on. Grounded on
//! the teacher's pattern of a single shared, mutex-guarded state struct
//! with a cheap read-lock snapshot for host queries (spec §5: "a read
//! lock token is exposed for consistent snapshots").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base_error::{Result, UserDataError};

use crate::config::Config;
use modio_http::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Expired,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub token: String,
    /// Seconds since epoch.
    pub expiry: i64,
    pub status: TokenStatus,
}

impl OAuthToken {
    /// Downgrades an expired token to `Invalid` on observation, per spec
    /// §4.9: "an expired token downgrades to state invalid on
    /// observation".
    pub fn observe(&mut self, now_unix_seconds: i64) {
        if self.status == TokenStatus::Valid && now_unix_seconds >= self.expiry {
            self.status = TokenStatus::Invalid;
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == TokenStatus::Valid
    }
}

#[derive(Debug, Clone, Default)]
struct MutableSessionState {
    token: Option<OAuthToken>,
    authenticated_user_id: Option<u64>,
    last_validation_error: Option<String>,
}

/// A consistent point-in-time snapshot of the mutable parts of session
/// data, handed back to host queries without holding the lock open.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub token: Option<OAuthToken>,
    pub authenticated_user_id: Option<u64>,
    pub last_validation_error: Option<String>,
}

pub struct SessionData {
    pub api_key: String,
    pub game_id: u64,
    pub portal: String,
    pub environment: Environment,
    pub locale: String,
    pub platform_override: Option<String>,
    pub environment_override_host: Option<String>,
    rate_limited: AtomicBool,
    state: Mutex<MutableSessionState>,
}

impl SessionData {
    pub fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            api_key: config.api_key.clone(),
            game_id: config.game_id,
            portal: config.portal.clone(),
            environment: config.environment.into(),
            locale: config.locale.clone(),
            platform_override: config.platform_override.clone(),
            environment_override_host: config.environment_override_host.clone(),
            rate_limited: AtomicBool::new(false),
            state: Mutex::new(MutableSessionState::default()),
        })
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited.load(Ordering::SeqCst)
    }

    pub fn set_rate_limited(&self, value: bool) {
        self.rate_limited.store(value, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().unwrap();
        SessionSnapshot {
            token: state.token.clone(),
            authenticated_user_id: state.authenticated_user_id,
            last_validation_error: state.last_validation_error.clone(),
        }
    }

    pub fn bearer_token(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        match &state.token {
            Some(token) if token.is_usable() => Ok(token.token.clone()),
            _ => Err(UserDataError::InvalidUser.into()),
        }
    }

    /// Replaces the authenticated user. Per spec §4.9, if the new user
    /// differs from the previous one the caller must clear the
    /// user-scoped store (subscriptions, caches, tokens) *before* calling
    /// this, since this only updates session data itself.
    pub fn set_authenticated_user(&self, user_id: u64, token: OAuthToken) {
        let mut state = self.state.lock().unwrap();
        state.authenticated_user_id = Some(user_id);
        state.token = Some(token);
    }

    pub fn invalidate_token(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = state.token.as_mut() {
            token.status = TokenStatus::Invalid;
        }
    }

    pub fn set_last_validation_error(&self, message: impl Into<String>) {
        self.state.lock().unwrap().last_validation_error = Some(message.into());
    }

    pub fn authenticated_user_id(&self) -> Option<u64> {
        self.state.lock().unwrap().authenticated_user_id
    }
}
