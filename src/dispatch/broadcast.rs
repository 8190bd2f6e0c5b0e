//! Broadcast announcements.
//!
//! Announcements are pushed to operators out of band; the bot's part is the
//! message shape and the mark-as-read acknowledgement button.

use tracing::info;

use super::{CallbackReply, Reply, UserInfo};
use crate::keyboard;

/// Announcement message with its mark-as-read button.
#[must_use]
pub fn announcement(broadcast_id: i64, text: &str) -> Reply {
    Reply::with_keyboard(
        format!("📢 <b>Announcement</b>\n\n{text}"),
        keyboard::broadcast_read(broadcast_id),
    )
}

/// Mark-as-read acknowledgement.
pub fn mark_read(user: &UserInfo, broadcast_id: i64) -> CallbackReply {
    info!(user_id = user.id, broadcast_id, "broadcast read");
    CallbackReply {
        answer: Some("✅ Marked as read".to_string()),
        show_alert: false,
        edit: None,
    }
}
