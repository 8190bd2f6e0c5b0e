//! Mock backend for router and handler tests.
//!
//! Records every call and serves canned responses, so tests can assert both
//! the rendered reply and the exact number of backend calls made (permission
//! denials must make none).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ApiError, AuthGrant, Backend, ConfirmLinkOutcome, LinkRequest, OtpRequest, Page};
use crate::rbac::Module;

/// Canned, call-counting [`Backend`] implementation.
#[derive(Default)]
pub struct MockBackend {
    /// OTP token -> grant. Tokens are consumed on use: a second verification
    /// with the same token is rejected, mirroring backend single-use
    /// semantics.
    otp_grants: Mutex<HashMap<String, AuthGrant>>,
    /// Telegram user id -> grant served by `restore_session`. Unlike OTPs,
    /// a restore grant stays valid until the backend session would end.
    restore_grants: Mutex<HashMap<String, AuthGrant>>,
    /// Account-linking tokens accepted by `confirm_link`, consumed on use.
    link_tokens: Mutex<HashSet<String>>,
    /// Items served for every list call, keyed by module.
    list_items: Mutex<HashMap<Module, Vec<Value>>>,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Empty mock: every OTP is rejected, every list is empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-use OTP that authenticates as `role`.
    pub fn with_otp(self, token: &str, admin_id: i64, role: &str) -> Self {
        self.otp_grants.lock().expect("mock lock").insert(
            token.to_string(),
            AuthGrant {
                access_token: format!("jwt-{admin_id}"),
                token_type: "bearer".to_string(),
                admin_id,
                admin_name: Some(format!("Admin {admin_id}")),
                role: role.to_string(),
                telegram_user_id: String::new(),
                session_created: true,
            },
        );
        self
    }

    /// Serve a restore grant for `telegram_user_id`, as if the backend still
    /// held a live session for that user.
    pub fn with_restore(self, telegram_user_id: &str, admin_id: i64, role: &str) -> Self {
        self.restore_grants.lock().expect("mock lock").insert(
            telegram_user_id.to_string(),
            AuthGrant {
                access_token: format!("jwt-{admin_id}"),
                token_type: "bearer".to_string(),
                admin_id,
                admin_name: Some(format!("Admin {admin_id}")),
                role: role.to_string(),
                telegram_user_id: telegram_user_id.to_string(),
                session_created: false,
            },
        );
        self
    }

    /// Accept `token` once for account-linking confirmation.
    pub fn with_link_token(self, token: &str) -> Self {
        self.link_tokens
            .lock()
            .expect("mock lock")
            .insert(token.to_string());
        self
    }

    /// Serve `items` for list calls on `module`.
    pub fn with_items(self, module: Module, items: Vec<Value>) -> Self {
        self.list_items
            .lock()
            .expect("mock lock")
            .insert(module, items);
        self
    }

    /// Total number of backend calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn verify_otp(&self, request: &OtpRequest) -> Result<AuthGrant, ApiError> {
        self.record();
        let mut grants = self.otp_grants.lock().expect("mock lock");
        match grants.remove(&request.otp_token) {
            Some(mut grant) => {
                grant.telegram_user_id = request.telegram_user_id.clone();
                Ok(grant)
            },
            None => Err(ApiError::Unauthorized {
                detail: Some("Invalid or expired OTP token".to_string()),
            }),
        }
    }

    async fn logout(&self, _telegram_user_id: &str) -> Result<(), ApiError> {
        self.record();
        Ok(())
    }

    async fn restore_session(&self, telegram_user_id: &str) -> Result<AuthGrant, ApiError> {
        self.record();
        self.restore_grants
            .lock()
            .expect("mock lock")
            .get(telegram_user_id)
            .cloned()
            .ok_or(ApiError::NotFound {
                detail: Some("No active session".to_string()),
            })
    }

    async fn confirm_link(&self, request: &LinkRequest) -> Result<ConfirmLinkOutcome, ApiError> {
        self.record();
        if self
            .link_tokens
            .lock()
            .expect("mock lock")
            .remove(&request.token)
        {
            Ok(ConfirmLinkOutcome { user_id: Some(1) })
        } else {
            Err(ApiError::NotFound {
                detail: Some("Invalid or expired link token".to_string()),
            })
        }
    }

    async fn list(
        &self,
        _access_token: &str,
        module: Module,
        page: u32,
        page_size: u32,
    ) -> Result<Page, ApiError> {
        self.record();
        let items = self
            .list_items
            .lock()
            .expect("mock lock")
            .get(&module)
            .cloned()
            .unwrap_or_default();
        Ok(Page::from_response(Value::Array(items), page, page_size))
    }

    async fn detail(
        &self,
        _access_token: &str,
        module: Module,
        id: i64,
    ) -> Result<Value, ApiError> {
        self.record();
        let items = self
            .list_items
            .lock()
            .expect("mock lock")
            .get(&module)
            .cloned()
            .unwrap_or_default();
        items
            .into_iter()
            .find(|item| item.get("id").and_then(Value::as_i64) == Some(id))
            .ok_or(ApiError::NotFound { detail: None })
    }

    async fn dashboard_stats(&self, _access_token: &str) -> Result<Value, ApiError> {
        self.record();
        Ok(json!({ "total_users": 42, "active_events": 3 }))
    }
}
