//! Admin panel: dashboard statistics and session overview.
//!
//! Gated on administrative roles, which is stricter than any per-module
//! grant: a role with full module access but no admin flag never sees this
//! panel.

use serde_json::Value;
use tracing::warn;

use super::{AppContext, CallbackReply, Reply};
use crate::format::escape_html;
use crate::keyboard;
use crate::rbac::RbacContext;
use crate::session::UserSession;

const ADMIN_ONLY: &str = "🚫 Administrator access required";

/// Open the admin panel menu.
pub fn open_menu(rbac: &RbacContext) -> CallbackReply {
    if !rbac.is_admin() {
        return CallbackReply::alert(ADMIN_ONLY);
    }
    CallbackReply::edit(
        "⚙️ Admin panel",
        Reply::with_keyboard("⚙️ <b>Admin panel</b>", keyboard::admin_menu()),
    )
}

/// Dashboard statistics from the backend analytics endpoint.
pub async fn dashboard(
    ctx: &AppContext,
    session: &UserSession,
    rbac: &RbacContext,
) -> CallbackReply {
    if !rbac.is_admin() {
        return CallbackReply::alert(ADMIN_ONLY);
    }

    match ctx.backend.dashboard_stats(&session.access_token).await {
        Ok(stats) => CallbackReply::edit(
            String::new(),
            Reply::with_keyboard(
                format!("📊 <b>Dashboard</b>\n\n{}", render_stats(&stats)),
                keyboard::back("menu:admin"),
            ),
        ),
        Err(err) => {
            warn!(%err, "dashboard stats failed");
            CallbackReply::alert("Statistics are unavailable right now.")
        },
    }
}

/// Session overview: how many operators are currently signed in.
pub async fn sessions_info(ctx: &AppContext, rbac: &RbacContext) -> CallbackReply {
    if !rbac.is_admin() {
        return CallbackReply::alert(ADMIN_ONLY);
    }

    match ctx.store.count_active().await {
        Ok(count) => CallbackReply::edit(
            String::new(),
            Reply::with_keyboard(
                format!(
                    "👥 <b>Active sessions</b>\n\n\
                     Currently signed in: <b>{count}</b>\n\n\
                     Sessions expire 24 hours after the last activity."
                ),
                keyboard::back("menu:admin"),
            ),
        ),
        Err(err) => {
            warn!(%err, "session count failed");
            CallbackReply::alert("Something went wrong. Please try again.")
        },
    }
}

/// Flatten a stats object into `key: value` lines. Nested values and
/// unexpected shapes degrade to their JSON rendering.
fn render_stats(stats: &Value) -> String {
    let Some(map) = stats.as_object() else {
        return escape_html(&stats.to_string());
    };
    if map.is_empty() {
        return "No data.".to_string();
    }
    map.iter()
        .map(|(key, value)| {
            let label = escape_html(&key.replace('_', " "));
            let rendered = match value {
                Value::String(s) => escape_html(s),
                other => escape_html(&other.to_string()),
            };
            format!("▫️ <b>{label}:</b> {rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_render_as_labelled_lines() {
        let text = render_stats(&json!({"total_users": 42, "active_events": 3}));
        assert!(text.contains("<b>total users:</b> 42"));
        assert!(text.contains("<b>active events:</b> 3"));
    }

    #[test]
    fn non_object_stats_degrade_to_json() {
        assert_eq!(render_stats(&json!("n/a")), "\"n/a\"");
        assert_eq!(render_stats(&json!({})), "No data.");
    }
}
