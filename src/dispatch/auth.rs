//! Authentication commands: /start, /login, /logout, /status, /menu, /help.
//!
//! The OTP exchange is the only path that creates a local session. The OTP
//! itself is owned by the backend (single-use, short expiry); this module
//! only validates the format before spending a backend call on it.

use std::str::FromStr;

use tracing::{info, warn};

use super::{AppContext, CallbackReply, Reply, TRY_AGAIN, UserInfo, link};
use crate::api::{ApiError, AuthGrant, OtpRequest};
use crate::format::format_session_info;
use crate::keyboard;
use crate::rbac::{RbacContext, Role};
use crate::session::UserSession;

/// Expected OTP length.
const OTP_LEN: usize = 8;

/// Prompt shown to unauthenticated users.
const LOGIN_PROMPT: &str = "🔐 <b>Welcome to the CRM admin bot</b>\n\n\
     To get started, generate a one-time password in the web admin panel \
     and send it here:\n\n\
     <code>/login YOUR_OTP</code>\n\n\
     The password is valid for 10 minutes and can be used once.";

/// Reply for commands that need a session when there is none.
pub const AUTH_REQUIRED: &str = "🔒 <b>Authentication required</b>\n\n\
     Use <code>/login YOUR_OTP</code> with a one-time password from the web \
     admin panel.";

fn welcome(session: &UserSession) -> Reply {
    let rbac = RbacContext::new(session.role);
    Reply::with_keyboard(
        format!(
            "👋 Welcome back, <b>{name}</b>!\n\n\
             {icon} Role: <code>{role}</code>\n\n\
             Choose a module:",
            name = crate::format::escape_html(&session.display_name()),
            icon = crate::format::role_emoji(session.role),
            role = session.role,
        ),
        keyboard::main_menu(&rbac),
    )
}

fn session_from_grant(user: &UserInfo, grant: &AuthGrant) -> Option<UserSession> {
    let Ok(role) = Role::from_str(&grant.role) else {
        warn!(user_id = user.id, role = %grant.role, "backend returned unknown role");
        return None;
    };
    Some(UserSession::new(
        user.id_string(),
        grant.admin_id,
        role,
        grant.access_token.clone(),
        grant.admin_name.clone(),
    ))
}

/// `/start`, optionally carrying a `link_<TOKEN>` deep-link payload.
///
/// For an unauthenticated admin, tries a backend session restore before
/// falling back to the login prompt, so a bot restart does not force a
/// re-login while the backend session is still alive.
pub async fn start(
    ctx: &AppContext,
    user: &UserInfo,
    session: Option<UserSession>,
    payload: Option<String>,
) -> Reply {
    if let Some(token) = payload.as_deref().and_then(|p| p.strip_prefix("link_")) {
        return link::confirm(ctx, user, token).await;
    }

    if let Some(session) = session {
        return welcome(&session);
    }

    match ctx.backend.restore_session(&user.id_string()).await {
        Ok(grant) => {
            let Some(session) = session_from_grant(user, &grant) else {
                return Reply::text(LOGIN_PROMPT);
            };
            if let Err(err) = ctx.store.create(&session).await {
                warn!(user_id = user.id, %err, "failed to cache restored session");
                return Reply::text(TRY_AGAIN);
            }
            info!(user_id = user.id, admin_id = session.admin_id, "session restored");
            welcome(&session)
        },
        Err(err) => {
            if err.is_transient() {
                warn!(user_id = user.id, %err, "session restore failed");
            }
            Reply::text(LOGIN_PROMPT)
        },
    }
}

/// `/login <OTP>`: exchange a one-time password for a session.
pub async fn login(
    ctx: &AppContext,
    user: &UserInfo,
    session: Option<UserSession>,
    token: Option<String>,
) -> Reply {
    if let Some(session) = session {
        return Reply::with_keyboard(
            format!(
                "✅ You are already logged in as <b>{}</b>.\n\nUse /logout first to switch accounts.",
                crate::format::escape_html(&session.display_name())
            ),
            keyboard::main_menu(&RbacContext::new(session.role)),
        );
    }

    let Some(token) = token else {
        return Reply::text(
            "Usage: <code>/login YOUR_OTP</code>\n\n\
             Generate a one-time password in the web admin panel.",
        );
    };

    // Reject malformed tokens locally; only well-formed ones cost a backend
    // call against the login rate budget.
    let token = token.trim().to_uppercase();
    if token.len() != OTP_LEN || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Reply::text(
            "⚠️ That does not look like a one-time password.\n\n\
             The OTP is 8 letters and digits, e.g. <code>A7B9C3D5</code>.",
        );
    }

    let request = OtpRequest {
        otp_token: token,
        telegram_user_id: user.id_string(),
        telegram_username: user.username.clone(),
        telegram_first_name: user.first_name.clone(),
        telegram_last_name: user.last_name.clone(),
    };

    match ctx.backend.verify_otp(&request).await {
        Ok(grant) => {
            let Some(session) = session_from_grant(user, &grant) else {
                return Reply::text(
                    "❌ Your account role is not supported by this bot. Contact an administrator.",
                );
            };
            if let Err(err) = ctx.store.create(&session).await {
                warn!(user_id = user.id, %err, "failed to cache session");
                return Reply::text(TRY_AGAIN);
            }
            info!(
                user_id = user.id,
                admin_id = session.admin_id,
                role = %session.role,
                "login successful"
            );
            welcome(&session)
        },
        Err(ApiError::Unauthorized { detail } | ApiError::NotFound { detail }) => {
            let detail = detail.unwrap_or_else(|| "Invalid or expired OTP token".to_string());
            Reply::text(format!(
                "❌ <b>Login failed</b>\n\n⚠️ {}\n\nGenerate a new OTP and try again.",
                crate::format::escape_html(&detail)
            ))
        },
        Err(err) if err.is_transient() => {
            warn!(user_id = user.id, %err, "otp verification failed");
            Reply::text(TRY_AGAIN)
        },
        Err(err) => Reply::text(crate::format::format_error(&err.to_string())),
    }
}

/// `/logout`: drop the cached session and notify the backend.
pub async fn logout(ctx: &AppContext, user: &UserInfo, session: Option<UserSession>) -> Reply {
    if session.is_none() {
        return Reply::text("You are not logged in.");
    }

    if let Err(err) = ctx.store.delete(&user.id_string()).await {
        warn!(user_id = user.id, %err, "failed to delete session");
        return Reply::text(TRY_AGAIN);
    }
    // Local logout already succeeded; a backend failure here only means the
    // backend session expires on its own.
    if let Err(err) = ctx.backend.logout(&user.id_string()).await {
        warn!(user_id = user.id, %err, "backend logout failed");
    }
    info!(user_id = user.id, "logged out");
    Reply::text("👋 <b>Logged out</b>\n\nUse /login with a new OTP to sign in again.")
}

/// Logout triggered from the main-menu button.
pub async fn logout_callback(
    ctx: &AppContext,
    user: &UserInfo,
    session: &UserSession,
) -> CallbackReply {
    let reply = logout(ctx, user, Some(session.clone())).await;
    CallbackReply::edit("👋 Logged out", reply)
}

/// `/status`: session summary, or the login prompt.
pub fn status(session: Option<&UserSession>) -> Reply {
    session.map_or_else(
        || Reply::text(AUTH_REQUIRED),
        |session| Reply::text(format_session_info(session)),
    )
}

/// `/menu`: the permission-filtered main menu.
pub fn menu(session: Option<&UserSession>) -> Reply {
    let Some(session) = session else {
        return Reply::text(AUTH_REQUIRED);
    };
    Reply::with_keyboard(
        "📱 <b>Main menu</b>\n\nChoose a module:",
        keyboard::main_menu(&RbacContext::new(session.role)),
    )
}

/// `/help`: command reference.
#[must_use]
pub fn help() -> Reply {
    Reply::text(
        "ℹ️ <b>Commands</b>\n\n\
         /start - start the bot\n\
         /login OTP - sign in with a one-time password\n\
         /logout - end the session\n\
         /status - session details\n\
         /menu - main menu\n\
         /help - this message\n\n\
         Sessions expire after 24 hours of inactivity.",
    )
}
