//! Wire types for the backend REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OTP verification request body.
#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest {
    /// 8-character OTP, normalized to upper case.
    pub otp_token: String,
    /// Telegram user id as a string, matching the backend schema.
    pub telegram_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_last_name: Option<String>,
}

/// Successful OTP verification or session restore.
///
/// Carries everything needed to create the local session.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub admin_id: i64,
    #[serde(default)]
    pub admin_name: Option<String>,
    pub role: String,
    pub telegram_user_id: String,
    #[serde(default)]
    pub session_created: bool,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Deep-link account-linking request body.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRequest {
    pub token: String,
    pub telegram_chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_first_name: Option<String>,
}

/// Successful account-linking confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmLinkOutcome {
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// One page of a list endpoint.
///
/// The backend historically returns either a bare JSON array or an
/// `{items, total, total_pages}` envelope; both shapes normalize here.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Value>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl Page {
    /// Normalize a list response into a page.
    #[must_use]
    pub fn from_response(value: Value, page: u32, page_size: u32) -> Self {
        if let Value::Array(items) = value {
            let total = items.len() as u64;
            return Self {
                items,
                total,
                page,
                total_pages: 1,
            };
        }

        let items = value
            .get("items")
            .or_else(|| value.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = value
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);
        let total_pages = value
            .get("total_pages")
            .and_then(Value::as_u64)
            .map_or_else(
                || total.div_ceil(u64::from(page_size.max(1))).max(1),
                |n| n.max(1),
            );
        // Saturate rather than truncate if the backend reports something
        // wider than u32.
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);

        Self {
            items,
            total,
            page,
            total_pages,
        }
    }

    /// Whether there is a page after this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Whether there is a page before this one.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }
}
