//! Inbound update routing.
//!
//! Every update flows through the same gates in order: rate limit, session
//! lookup (refreshing the TTL on a hit), then a per-action permission check.
//! A failed gate produces a user-visible message and stops; in particular a
//! permission denial never reaches the backend.
//!
//! The teloxide endpoints here are thin senders: all decisions live in
//! [`handle_command`] and [`handle_callback`], which are plain async
//! functions over [`AppContext`] so the router can be tested against a mock
//! backend and an in-memory session store.

pub mod admin;
pub mod auth;
pub mod broadcast;
pub mod content;
pub mod link;

use std::str::FromStr;
use std::sync::Arc;

use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::config::RateLimitConfig;
use crate::rbac::{Module, RbacContext};
use crate::session::{SessionStore, UserSession};

/// Window length for all rate limits, in seconds.
const RATE_WINDOW_SECS: u64 = 60;

/// Message shown for transient backend or store failures.
pub const TRY_AGAIN: &str =
    "❌ <b>Something went wrong</b>\n\n🔄 Please try again in a moment.";

/// Shared, immutable state for all handlers.
pub struct AppContext {
    /// Backend REST client.
    pub backend: Arc<dyn Backend>,
    /// Session cache.
    pub store: Arc<dyn SessionStore>,
    /// Per-user rate limits.
    pub rate_limits: RateLimitConfig,
}

impl AppContext {
    /// Bundle the shared services.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SessionStore>,
        rate_limits: RateLimitConfig,
    ) -> Self {
        Self {
            backend,
            store,
            rate_limits,
        }
    }
}

/// Identity of the Telegram user behind an update, decoupled from teloxide
/// types so handlers can be driven directly in tests.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserInfo {
    /// Identity with only an id, as used by most tests.
    #[must_use]
    pub fn bare(id: u64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }

    /// Backend-facing string form of the Telegram user id.
    #[must_use]
    pub fn id_string(&self) -> String {
        self.id.to_string()
    }
}

impl From<&teloxide::types::User> for UserInfo {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            id: user.id.0,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        }
    }
}

/// Parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`, optionally with a deep-link payload.
    Start { payload: Option<String> },
    /// `/login <OTP>`.
    Login { token: Option<String> },
    Logout,
    Status,
    Menu,
    Help,
}

impl Command {
    /// Parse a message text into a command. Non-commands and unknown
    /// commands yield `None` and are ignored by the router.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split_whitespace();
        let head = parts.next()?;
        let name = head.strip_prefix('/')?.split('@').next()?;
        let arg = parts.next().map(str::to_string);

        match name {
            "start" => Some(Self::Start { payload: arg }),
            "login" => Some(Self::Login { token: arg }),
            "logout" => Some(Self::Logout),
            "status" => Some(Self::Status),
            "menu" => Some(Self::Menu),
            "help" => Some(Self::Help),
            _ => None,
        }
    }

    /// Rate-limit bucket for this command.
    #[must_use]
    const fn rate_action(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            _ => "general",
        }
    }
}

/// Parsed inline-button callback data.
///
/// Grammar: `menu:{module|main|admin}`, `{module}:page:{n}`,
/// `{module}:view:{id}`, `{module}:edit:{id}`, `{module}:delete:{id}`,
/// `{module}:confirm_delete:{id}`, `action:logout`,
/// `admin:{stats|sessions}`, `broadcast:read:{id}`, `noop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    MainMenu,
    AdminMenu,
    OpenModule(Module),
    Page(Module, u32),
    View(Module, i64),
    Edit(Module, i64),
    Delete(Module, i64),
    ConfirmDelete(Module, i64),
    Logout,
    AdminStats,
    AdminSessions,
    BroadcastRead(i64),
    Noop,
}

impl CallbackAction {
    /// Parse callback data; unknown data yields `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == "noop" {
            return Some(Self::Noop);
        }
        if data == "action:logout" {
            return Some(Self::Logout);
        }

        let mut parts = data.splitn(3, ':');
        let head = parts.next()?;
        let verb = parts.next()?;
        let tail = parts.next();

        match (head, verb, tail) {
            ("menu", "main", None) => Some(Self::MainMenu),
            ("menu", "admin", None) => Some(Self::AdminMenu),
            ("menu", module, None) => Module::from_str(module).ok().map(Self::OpenModule),
            ("admin", "stats", None) => Some(Self::AdminStats),
            ("admin", "sessions", None) => Some(Self::AdminSessions),
            ("broadcast", "read", Some(id)) => id.parse().ok().map(Self::BroadcastRead),
            (module, verb, Some(arg)) => {
                let module = Module::from_str(module).ok()?;
                match verb {
                    "page" => arg.parse().ok().map(|n| Self::Page(module, n)),
                    "view" => arg.parse().ok().map(|id| Self::View(module, id)),
                    "edit" => arg.parse().ok().map(|id| Self::Edit(module, id)),
                    "delete" => arg.parse().ok().map(|id| Self::Delete(module, id)),
                    "confirm_delete" => arg.parse().ok().map(|id| Self::ConfirmDelete(module, id)),
                    _ => None,
                }
            },
            _ => None,
        }
    }
}

/// Outbound message: text plus an optional inline keyboard.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    /// Text-only reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    /// Reply with an inline keyboard.
    #[must_use]
    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Outcome of a callback interaction: a short answer (toast or alert) and
/// optionally an edit of the originating message.
#[derive(Debug, Clone, Default)]
pub struct CallbackReply {
    pub answer: Option<String>,
    pub show_alert: bool,
    pub edit: Option<Reply>,
}

impl CallbackReply {
    /// Silent acknowledgement.
    #[must_use]
    pub fn ack() -> Self {
        Self::default()
    }

    /// Blocking alert without editing the message.
    #[must_use]
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            answer: Some(text.into()),
            show_alert: true,
            ..Self::default()
        }
    }

    /// Toast answer plus a message edit.
    #[must_use]
    pub fn edit(answer: impl Into<String>, reply: Reply) -> Self {
        Self {
            answer: Some(answer.into()),
            show_alert: false,
            edit: Some(reply),
        }
    }
}

/// Look up the caller's session, refreshing its TTL on a hit.
///
/// A store failure is surfaced so callers render the generic retry message;
/// an absent or expired session is simply `None`.
async fn current_session(
    ctx: &AppContext,
    user: &UserInfo,
) -> Result<Option<UserSession>, crate::session::SessionError> {
    let Some(mut session) = ctx.store.get(&user.id_string()).await? else {
        return Ok(None);
    };
    ctx.store.refresh(&mut session).await?;
    debug!(user_id = user.id, admin_id = session.admin_id, "session refreshed");
    Ok(Some(session))
}

/// Route one chat command through the gates to its handler.
pub async fn handle_command(ctx: &AppContext, user: &UserInfo, command: Command) -> Reply {
    let (max_requests, action) = match command.rate_action() {
        "login" => (ctx.rate_limits.login_per_minute, "login"),
        action => (ctx.rate_limits.general_per_minute, action),
    };
    match ctx
        .store
        .check_rate_limit(&user.id_string(), action, max_requests, RATE_WINDOW_SECS)
        .await
    {
        Ok(decision) if !decision.allowed => {
            warn!(user_id = user.id, %action, "rate limited");
            return Reply::text(format!(
                "⏳ <b>Too many requests</b>\n\nPlease wait {RATE_WINDOW_SECS} seconds."
            ));
        },
        Ok(_) => {},
        Err(err) => {
            error!(user_id = user.id, %err, "rate limit check failed");
            return Reply::text(TRY_AGAIN);
        },
    }

    let session = match current_session(ctx, user).await {
        Ok(session) => session,
        Err(err) => {
            error!(user_id = user.id, %err, "session lookup failed");
            return Reply::text(TRY_AGAIN);
        },
    };

    info!(user_id = user.id, command = ?command, authenticated = session.is_some(), "command");

    match command {
        Command::Start { payload } => auth::start(ctx, user, session, payload).await,
        Command::Login { token } => auth::login(ctx, user, session, token).await,
        Command::Logout => auth::logout(ctx, user, session).await,
        Command::Status => auth::status(session.as_ref()),
        Command::Menu => auth::menu(session.as_ref()),
        Command::Help => auth::help(),
    }
}

/// Route one inline-button callback through the gates to its handler.
pub async fn handle_callback(ctx: &AppContext, user: &UserInfo, data: &str) -> CallbackReply {
    let Some(callback) = CallbackAction::parse(data) else {
        debug!(user_id = user.id, %data, "unknown callback data");
        return CallbackReply::ack();
    };

    if callback == CallbackAction::Noop {
        return CallbackReply::ack();
    }

    match ctx
        .store
        .check_rate_limit(
            &user.id_string(),
            "general",
            ctx.rate_limits.general_per_minute,
            RATE_WINDOW_SECS,
        )
        .await
    {
        Ok(decision) if !decision.allowed => {
            return CallbackReply::alert("⏳ Too many requests. Please slow down.");
        },
        Ok(_) => {},
        Err(err) => {
            error!(user_id = user.id, %err, "rate limit check failed");
            return CallbackReply::alert("Something went wrong. Please try again.");
        },
    }

    let session = match current_session(ctx, user).await {
        Ok(session) => session,
        Err(err) => {
            error!(user_id = user.id, %err, "session lookup failed");
            return CallbackReply::alert("Something went wrong. Please try again.");
        },
    };

    // Everything below the auth gate requires a live session.
    let Some(session) = session else {
        return CallbackReply::alert("⚠️ Session expired. Please /login again.");
    };
    let rbac = RbacContext::new(session.role);

    info!(user_id = user.id, role = %session.role, ?callback, "callback");

    match callback {
        CallbackAction::MainMenu => CallbackReply::edit(
            "🏠 Main menu",
            Reply::with_keyboard(
                "📱 <b>Main menu</b>\n\nChoose a module:",
                crate::keyboard::main_menu(&rbac),
            ),
        ),
        CallbackAction::OpenModule(module) => {
            content::open_module(ctx, &session, &rbac, module, 1).await
        },
        CallbackAction::Page(module, page) => {
            content::open_module(ctx, &session, &rbac, module, page).await
        },
        CallbackAction::View(module, id) => {
            content::view_record(ctx, &session, &rbac, module, id).await
        },
        CallbackAction::Edit(module, id) => content::edit_record(&session, &rbac, module, id),
        CallbackAction::Delete(module, id) => content::delete_record(&session, &rbac, module, id),
        CallbackAction::ConfirmDelete(module, id) => {
            content::confirm_delete(&session, &rbac, module, id)
        },
        CallbackAction::Logout => auth::logout_callback(ctx, user, &session).await,
        CallbackAction::AdminMenu => admin::open_menu(&rbac),
        CallbackAction::AdminStats => admin::dashboard(ctx, &session, &rbac).await,
        CallbackAction::AdminSessions => admin::sessions_info(ctx, &rbac).await,
        CallbackAction::BroadcastRead(id) => broadcast::mark_read(user, id),
        CallbackAction::Noop => CallbackReply::ack(),
    }
}

/// Build and run the long-polling dispatcher until shutdown.
pub async fn run(bot: Bot, ctx: Arc<AppContext>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_endpoint))
        .branch(Update::filter_callback_query().endpoint(callback_endpoint));

    info!("starting dispatcher with long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .default_handler(|update| async move {
            debug!(?update, "unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text("dispatcher error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn message_endpoint(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(command) = Command::parse(text) else {
        return Ok(());
    };

    let user = UserInfo::from(user);
    let reply = handle_command(&ctx, &user, command).await;

    let mut request = bot
        .send_message(msg.chat.id, reply.text)
        .parse_mode(ParseMode::Html);
    if let Some(keyboard) = reply.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

async fn callback_endpoint(
    bot: Bot,
    query: CallbackQuery,
    ctx: Arc<AppContext>,
) -> ResponseResult<()> {
    let user = UserInfo::from(&query.from);
    let data = query.data.clone().unwrap_or_default();

    let reply = handle_callback(&ctx, &user, &data).await;

    let mut answer = bot.answer_callback_query(query.id.clone());
    if let Some(text) = reply.answer.filter(|text| !text.is_empty()) {
        answer = answer.text(text).show_alert(reply.show_alert);
    }
    answer.await?;

    let Some(edit) = reply.edit else {
        return Ok(());
    };
    let Some(message) = query.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    let mut request = bot
        .edit_message_text(chat_id, message.id(), edit.text.clone())
        .parse_mode(ParseMode::Html);
    if let Some(keyboard) = edit.keyboard.clone() {
        request = request.reply_markup(keyboard);
    }
    if request.await.is_err() {
        // Message with media or too old to edit: send a fresh one instead.
        let mut send = bot
            .send_message(chat_id, edit.text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = edit.keyboard {
            send = send.reply_markup(keyboard);
        }
        send.await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(
            Command::parse("/start"),
            Some(Command::Start { payload: None })
        );
        assert_eq!(
            Command::parse("/start link_abc"),
            Some(Command::Start {
                payload: Some("link_abc".to_string())
            })
        );
        assert_eq!(
            Command::parse("/login A7B9C3D5"),
            Some(Command::Login {
                token: Some("A7B9C3D5".to_string())
            })
        );
        assert_eq!(Command::parse("/logout"), Some(Command::Logout));
        assert_eq!(Command::parse("  /help  "), Some(Command::Help));
    }

    #[test]
    fn parse_strips_bot_mention() {
        assert_eq!(Command::parse("/status@crmbot"), Some(Command::Status));
    }

    #[test]
    fn non_commands_are_ignored() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("/frobnicate"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn parse_callback_grammar() {
        assert_eq!(CallbackAction::parse("noop"), Some(CallbackAction::Noop));
        assert_eq!(
            CallbackAction::parse("menu:main"),
            Some(CallbackAction::MainMenu)
        );
        assert_eq!(
            CallbackAction::parse("menu:events"),
            Some(CallbackAction::OpenModule(Module::Events))
        );
        assert_eq!(
            CallbackAction::parse("events:page:3"),
            Some(CallbackAction::Page(Module::Events, 3))
        );
        assert_eq!(
            CallbackAction::parse("vacancies:view:17"),
            Some(CallbackAction::View(Module::Vacancies, 17))
        );
        assert_eq!(
            CallbackAction::parse("news:confirm_delete:4"),
            Some(CallbackAction::ConfirmDelete(Module::News, 4))
        );
        assert_eq!(
            CallbackAction::parse("action:logout"),
            Some(CallbackAction::Logout)
        );
        assert_eq!(
            CallbackAction::parse("broadcast:read:12"),
            Some(CallbackAction::BroadcastRead(12))
        );
    }

    #[test]
    fn malformed_callbacks_are_rejected() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("menu:payroll"), None);
        assert_eq!(CallbackAction::parse("events:page:NaN"), None);
        assert_eq!(CallbackAction::parse("events:launch:1"), None);
        assert_eq!(CallbackAction::parse("menu"), None);
    }

    #[test]
    fn login_uses_its_own_rate_bucket() {
        assert_eq!(Command::Login { token: None }.rate_action(), "login");
        assert_eq!(Command::Menu.rate_action(), "general");
    }
}
