//! Content module browsing: paginated lists and record detail views.
//!
//! Every entry point checks the caller's permission before anything else;
//! a denied module never produces a backend request. Mutations are limited
//! to permission-aware buttons and a confirmation step; the actual editing
//! happens in the web admin panel.

use tracing::warn;

use super::{AppContext, CallbackReply, Reply};
use crate::api::ApiError;
use crate::format::{clamp_message, format_detail, format_list, module_emoji};
use crate::keyboard;
use crate::rbac::{Module, RbacContext};
use crate::session::UserSession;

/// Records per list page.
pub const PAGE_SIZE: u32 = 10;

const ACCESS_DENIED: &str = "🚫 Access denied";

fn api_failure(err: &ApiError) -> CallbackReply {
    if matches!(err, ApiError::Unauthorized { .. }) {
        return CallbackReply::alert("⚠️ Your session is no longer valid. Please /login again.");
    }
    warn!(%err, "backend request failed");
    CallbackReply::alert("Something went wrong. Please try again.")
}

/// Open a module's list at the given page.
pub async fn open_module(
    ctx: &AppContext,
    session: &UserSession,
    rbac: &RbacContext,
    module: Module,
    page: u32,
) -> CallbackReply {
    if !rbac.can_read(module) {
        return CallbackReply::alert(ACCESS_DENIED);
    }

    let page = page.max(1);
    match ctx
        .backend
        .list(&session.access_token, module, page, PAGE_SIZE)
        .await
    {
        Ok(listing) => {
            let header = format!("{} <b>{module}</b>\n\n", module_emoji(module));
            let body = format_list(module, &listing.items, listing.page, PAGE_SIZE);
            let markup =
                keyboard::list_page(module, &listing.items, listing.page, listing.total_pages);
            CallbackReply::edit(
                format!("{module}"),
                Reply::with_keyboard(clamp_message(header + &body), markup),
            )
        },
        Err(err) => api_failure(&err),
    }
}

/// Show a single record with its detail keyboard.
pub async fn view_record(
    ctx: &AppContext,
    session: &UserSession,
    rbac: &RbacContext,
    module: Module,
    id: i64,
) -> CallbackReply {
    if !rbac.can_read(module) {
        return CallbackReply::alert(ACCESS_DENIED);
    }

    match ctx.backend.detail(&session.access_token, module, id).await {
        Ok(record) => CallbackReply::edit(
            String::new(),
            Reply::with_keyboard(
                clamp_message(format_detail(module, &record)),
                keyboard::item_detail(module, id, rbac),
            ),
        ),
        Err(ApiError::NotFound { .. }) => {
            CallbackReply::alert("This record no longer exists.")
        },
        Err(err) => api_failure(&err),
    }
}

/// Edit button. Editing happens in the web admin panel; the bot only
/// enforces that the caller could edit at all.
pub fn edit_record(
    _session: &UserSession,
    rbac: &RbacContext,
    module: Module,
    _id: i64,
) -> CallbackReply {
    if !rbac.can_update(module) {
        return CallbackReply::alert(ACCESS_DENIED);
    }
    CallbackReply::alert("✏️ Editing is done in the web admin panel.")
}

/// Delete button: ask for confirmation.
pub fn delete_record(
    _session: &UserSession,
    rbac: &RbacContext,
    module: Module,
    id: i64,
) -> CallbackReply {
    if !rbac.can_delete(module) {
        return CallbackReply::alert(ACCESS_DENIED);
    }
    CallbackReply::edit(
        String::new(),
        Reply::with_keyboard(
            format!(
                "⚠️ <b>Delete record #{id}?</b>\n\nThis action cannot be undone."
            ),
            keyboard::confirmation(module, "delete", id),
        ),
    )
}

/// Confirmed delete. Record removal is done in the web admin panel; the
/// confirmation flow exists so the keyboard contract stays stable once the
/// backend endpoint is wired up.
pub fn confirm_delete(
    _session: &UserSession,
    rbac: &RbacContext,
    module: Module,
    _id: i64,
) -> CallbackReply {
    if !rbac.can_delete(module) {
        return CallbackReply::alert(ACCESS_DENIED);
    }
    CallbackReply::alert("🗑 Deletion is done in the web admin panel.")
}
