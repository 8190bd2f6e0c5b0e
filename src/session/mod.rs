//! Session cache.
//!
//! One entry per authenticated chat identity, TTL-bound (24 hours by
//! default). The store owns the session lifecycle: created on successful OTP
//! exchange, refreshed on each authenticated action, deleted on logout or
//! TTL expiry. A session past its TTL is indistinguishable from an absent
//! one.
//!
//! The backing store is swappable behind [`SessionStore`]: Redis in
//! production ([`redis_store::RedisSessionStore`]), in-memory for tests and
//! single-process deployments ([`memory::InMemorySessionStore`]). All
//! operations are independent single-key reads/writes; two racing refreshes
//! from the same user may lose an update, which is acceptable because a
//! refresh always extends from "now".

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rbac::Role;

/// Redis key prefix for session entries.
pub const SESSION_PREFIX: &str = "tg_session:";
/// Redis key prefix for rate-limit counters.
pub const RATE_PREFIX: &str = "tg_rate:";

/// Errors from the session store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Cache backend failure.
    #[error("session store error: {0}")]
    Store(String),

    /// Stored payload could not be decoded.
    #[error("corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<redis::RedisError> for SessionError {
    fn from(value: redis::RedisError) -> Self {
        Self::Store(value.to_string())
    }
}

/// An authenticated operator session.
///
/// The access token is a bearer credential; the manual `Debug` impl redacts
/// it so sessions can be logged safely.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Telegram user id, also the cache key suffix.
    pub telegram_user_id: String,
    /// Backend admin id.
    pub admin_id: i64,
    /// Verified role from the backend.
    pub role: Role,
    /// Bearer token for backend calls.
    pub access_token: String,
    /// Optional display name.
    #[serde(default)]
    pub admin_name: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last authenticated action.
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    /// Create a fresh session stamped with the current time.
    #[must_use]
    pub fn new(
        telegram_user_id: String,
        admin_id: i64,
        role: Role,
        access_token: String,
        admin_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            telegram_user_id,
            admin_id,
            role,
            access_token,
            admin_name,
            created_at: now,
            last_activity: now,
        }
    }

    /// Update the last-activity timestamp to now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Display name, falling back to the admin id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.admin_name
            .clone()
            .unwrap_or_else(|| format!("Admin #{}", self.admin_id))
    }
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("telegram_user_id", &self.telegram_user_id)
            .field("admin_id", &self.admin_id)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .field("admin_name", &self.admin_name)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request is within the limit.
    pub allowed: bool,
    /// Requests remaining in the current window.
    pub remaining: u32,
}

/// TTL-bound key/value session storage.
///
/// The configured TTL applies to create and refresh alike; refresh always
/// extends from the current instant.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session under its user key with the full TTL.
    async fn create(&self, session: &UserSession) -> Result<(), SessionError>;

    /// Fetch the session for a user, or `None` when absent or expired.
    ///
    /// A corrupt payload is deleted and reported as absent.
    async fn get(&self, telegram_user_id: &str) -> Result<Option<UserSession>, SessionError>;

    /// Extend the TTL and update last-activity.
    async fn refresh(&self, session: &mut UserSession) -> Result<(), SessionError>;

    /// Remove the session. Returns `true` when an entry existed.
    async fn delete(&self, telegram_user_id: &str) -> Result<bool, SessionError>;

    /// Number of live sessions in the store.
    async fn count_active(&self) -> Result<u64, SessionError>;

    /// Fixed-window rate limiting for `action` by this user.
    async fn check_rate_limit(
        &self,
        telegram_user_id: &str,
        action: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> Result<RateDecision, SessionError>;
}

/// Cache key for a user's session entry.
#[must_use]
pub fn session_key(telegram_user_id: &str) -> String {
    format!("{SESSION_PREFIX}{telegram_user_id}")
}

/// Cache key for a user's rate-limit counter.
#[must_use]
pub fn rate_key(telegram_user_id: &str, action: &str) -> String {
    format!("{RATE_PREFIX}{telegram_user_id}:{action}")
}
