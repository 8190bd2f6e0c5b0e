//! Redis-backed session store.
//!
//! One `SETEX` key per session, one counter key per rate-limit window.
//! Redis serializes per-key writes, so no in-process locking is needed.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use super::{RateDecision, SessionError, SessionStore, UserSession, rate_key, session_key};

/// Session store over a Redis connection manager.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    /// Connect to Redis and verify the connection with a `PING`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        info!("connected to redis");
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &UserSession) -> Result<(), SessionError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(session_key(&session.telegram_user_id), payload, self.ttl_secs)
            .await?;
        info!(
            telegram_user_id = %session.telegram_user_id,
            role = %session.role,
            "session created"
        );
        Ok(())
    }

    async fn get(&self, telegram_user_id: &str) -> Result<Option<UserSession>, SessionError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(session_key(telegram_user_id)).await?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                // Drop the unreadable entry; treating it as absent forces a
                // clean re-login instead of a wedged session.
                warn!(%telegram_user_id, %err, "corrupt session payload, deleting");
                conn.del::<_, ()>(session_key(telegram_user_id)).await?;
                Ok(None)
            },
        }
    }

    async fn refresh(&self, session: &mut UserSession) -> Result<(), SessionError> {
        session.touch();
        let payload = serde_json::to_string(session)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(session_key(&session.telegram_user_id), payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, telegram_user_id: &str) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(session_key(telegram_user_id)).await?;
        if removed > 0 {
            info!(%telegram_user_id, "session deleted");
        }
        Ok(removed > 0)
    }

    async fn count_active(&self) -> Result<u64, SessionError> {
        let mut conn = self.conn.clone();
        let mut count = 0u64;
        let mut iter = conn
            .scan_match::<_, String>(format!("{}*", super::SESSION_PREFIX))
            .await?;
        while iter.next_item().await.is_some() {
            count += 1;
        }
        Ok(count)
    }

    async fn check_rate_limit(
        &self,
        telegram_user_id: &str,
        action: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> Result<RateDecision, SessionError> {
        let key = rate_key(telegram_user_id, action);
        let mut conn = self.conn.clone();

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        // First request in a window leaves the counter without an expiry.
        if ttl < 0 {
            conn.expire::<_, ()>(&key, window_secs as i64).await?;
        }

        let allowed = count <= u64::from(max_requests);
        let remaining = u64::from(max_requests).saturating_sub(count) as u32;
        if !allowed {
            warn!(%telegram_user_id, %action, "rate limit exceeded");
        }
        Ok(RateDecision { allowed, remaining })
    }
}
