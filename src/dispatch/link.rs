//! Deep-link account linking.
//!
//! Regular CRM users link their Telegram account by opening the bot via
//! `t.me/<bot>?start=link_<TOKEN>`; the token lands here as the `/start`
//! payload and is confirmed against the backend with the shared bot secret.
//! No session is created; linking is independent of admin authentication.

use tracing::{info, warn};

use super::{AppContext, Reply, TRY_AGAIN, UserInfo};
use crate::api::{ApiError, LinkRequest};

/// Confirm a linking token from a `/start link_<TOKEN>` payload.
pub async fn confirm(ctx: &AppContext, user: &UserInfo, token: &str) -> Reply {
    if token.is_empty() {
        return Reply::text("⚠️ This linking code is malformed. Request a new link in the app.");
    }

    let request = LinkRequest {
        token: token.to_string(),
        telegram_chat_id: user.id_string(),
        telegram_username: user.username.clone(),
        telegram_first_name: user.first_name.clone(),
    };

    match ctx.backend.confirm_link(&request).await {
        Ok(outcome) => {
            info!(user_id = user.id, crm_user_id = ?outcome.user_id, "account linked");
            Reply::text(
                "✅ <b>Account linked</b>\n\n\
                 Your Telegram account is now connected. You can return to the app.",
            )
        },
        Err(ApiError::Unauthorized { .. } | ApiError::NotFound { .. }) => Reply::text(
            "❌ <b>Link failed</b>\n\n\
             This linking code is invalid or has expired. Request a new link in the app.",
        ),
        Err(err) => {
            warn!(user_id = user.id, %err, "link confirmation failed");
            Reply::text(TRY_AGAIN)
        },
    }
}
