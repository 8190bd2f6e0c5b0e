//! In-memory session store.
//!
//! Mirrors the Redis store's TTL semantics for tests and single-process
//! deployments. Expiry is enforced lazily on lookup, so an entry past its
//! deadline behaves exactly like an absent one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{RateDecision, SessionError, SessionStore, UserSession};

struct Entry {
    session: UserSession,
    expires_at: Instant,
}

struct RateWindow {
    count: u64,
    window_end: Instant,
}

/// Process-local [`SessionStore`].
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
    rates: Mutex<HashMap<String, RateWindow>>,
}

impl InMemorySessionStore {
    /// Store with the given session TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
            rates: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &UserSession) -> Result<(), SessionError> {
        self.sessions.lock().expect("store lock").insert(
            session.telegram_user_id.clone(),
            Entry {
                session: session.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, telegram_user_id: &str) -> Result<Option<UserSession>, SessionError> {
        let mut sessions = self.sessions.lock().expect("store lock");
        match sessions.get(telegram_user_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.session.clone())),
            Some(_) => {
                sessions.remove(telegram_user_id);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    async fn refresh(&self, session: &mut UserSession) -> Result<(), SessionError> {
        session.touch();
        self.create(session).await
    }

    async fn delete(&self, telegram_user_id: &str) -> Result<bool, SessionError> {
        Ok(self
            .sessions
            .lock()
            .expect("store lock")
            .remove(telegram_user_id)
            .is_some())
    }

    async fn count_active(&self) -> Result<u64, SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("store lock");
        sessions.retain(|_, entry| entry.expires_at > now);
        Ok(sessions.len() as u64)
    }

    async fn check_rate_limit(
        &self,
        telegram_user_id: &str,
        action: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> Result<RateDecision, SessionError> {
        let key = super::rate_key(telegram_user_id, action);
        let now = Instant::now();
        let mut rates = self.rates.lock().expect("store lock");

        let window = rates.entry(key).or_insert_with(|| RateWindow {
            count: 0,
            window_end: now + Duration::from_secs(window_secs),
        });
        if window.window_end <= now {
            window.count = 0;
            window.window_end = now + Duration::from_secs(window_secs);
        }
        window.count += 1;

        let allowed = window.count <= u64::from(max_requests);
        let remaining = u64::from(max_requests).saturating_sub(window.count) as u32;
        Ok(RateDecision { allowed, remaining })
    }
}
