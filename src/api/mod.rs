//! Backend API client.
//!
//! Thin async HTTP client for the CRM backend REST surface. The client builds
//! requests, attaches the bearer token, and converts HTTP-level failures into
//! a categorized [`ApiError`]. It performs no retries; callers decide whether
//! and how a failure is surfaced to the operator.
//!
//! The real client is behind the [`Backend`] trait so the router can be
//! exercised in tests against [`mock::MockBackend`] without network I/O.

mod types;

pub mod mock;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::rbac::Module;

pub use types::{AuthGrant, ConfirmLinkOutcome, LinkRequest, OtpRequest, Page};

/// Maximum length of a backend error detail shown to an operator.
const MAX_DETAIL_LEN: usize = 200;

/// Errors emitted by the backend client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Client construction failed.
    #[error("backend client configuration error: {0}")]
    Configuration(String),

    /// Backend rejected the credential (invalid/expired/used OTP or token).
    #[error("backend authorization rejected{}", detail_suffix(.detail))]
    Unauthorized {
        /// Sanitized backend detail, if any.
        detail: Option<String>,
    },

    /// Resource or token not found.
    #[error("backend resource not found{}", detail_suffix(.detail))]
    NotFound {
        /// Sanitized backend detail, if any.
        detail: Option<String>,
    },

    /// Request exceeded the configured timeout.
    #[error("backend request timed out")]
    Timeout,

    /// Could not reach the backend.
    #[error("backend connection failed: {0}")]
    Connect(String),

    /// Other transport failure.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// Backend returned a non-success status.
    #[error("backend error ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Sanitized error body.
        message: String,
    },

    /// Response body could not be parsed.
    #[error("malformed backend response: {0}")]
    Parse(String),

    /// The requested module has no backend endpoint in this client.
    #[error("module not served by the backend client: {0}")]
    Unsupported(Module),
}

impl ApiError {
    /// Sanitized detail suitable for an operator-facing message, when the
    /// failure category carries one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { detail } | Self::NotFound { detail } => detail.as_deref(),
            Self::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether this failure should be reported as a generic "try again"
    /// rather than a specific message.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::Transport(_) | Self::Parse(_)
        )
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_connect() {
            Self::Connect(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Remove HTML tags and collapse whitespace so backend error bodies can be
/// embedded in Telegram HTML messages, truncating to a display-safe length.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));

    let text = tag.replace_all(text, "");
    let text = space.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > MAX_DETAIL_LEN {
        let truncated: String = text.chars().take(MAX_DETAIL_LEN).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

/// Backend REST surface consumed by the bot.
///
/// All operations are single-shot; implementations must not retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchange a one-time password for an access token and role.
    ///
    /// The OTP is owned by the backend: single-use, short expiry. A used or
    /// expired token yields [`ApiError::Unauthorized`] or
    /// [`ApiError::NotFound`] on every attempt.
    async fn verify_otp(&self, request: &OtpRequest) -> Result<AuthGrant, ApiError>;

    /// Terminate the backend-side session for a Telegram user.
    async fn logout(&self, telegram_user_id: &str) -> Result<(), ApiError>;

    /// Re-issue an access token for a Telegram user whose backend session
    /// is still alive (used after a bot restart).
    async fn restore_session(&self, telegram_user_id: &str) -> Result<AuthGrant, ApiError>;

    /// Confirm a deep-link account-linking token for a regular user.
    async fn confirm_link(&self, request: &LinkRequest) -> Result<ConfirmLinkOutcome, ApiError>;

    /// List records of a content module, paginated.
    async fn list(
        &self,
        access_token: &str,
        module: Module,
        page: u32,
        page_size: u32,
    ) -> Result<Page, ApiError>;

    /// Fetch a single record of a content module.
    async fn detail(
        &self,
        access_token: &str,
        module: Module,
        id: i64,
    ) -> Result<Value, ApiError>;

    /// Dashboard statistics for administrative roles.
    async fn dashboard_stats(&self, access_token: &str) -> Result<Value, ApiError>;
}

/// List endpoint path for a content module, if the bot serves it.
#[must_use]
pub const fn list_path(module: Module) -> Option<&'static str> {
    match module {
        Module::Events => Some("/api/v2/events/"),
        Module::Courses => Some("/api/v2/courses/"),
        Module::Vacancies => Some("/api/v2/vacancies/"),
        Module::News => Some("/api/v2/news/"),
        Module::Projects => Some("/api/v2/projects/"),
        Module::Volunteers => Some("/api/v2/admin/volunteers/"),
        _ => None,
    }
}

/// Production backend client over HTTP.
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    link_secret: Option<String>,
}

impl CrmClient {
    /// Build a client from backend settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &BackendConfig, link_secret: Option<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            link_secret,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and map the response into JSON or a categorized error.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "backend response");

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(serde_json::json!({ "success": true }));
        }

        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(ApiError::from);
        }

        let detail = extract_detail(&body);
        warn!(status = status.as_u16(), "backend rejected request");
        match status.as_u16() {
            401 | 403 => Err(ApiError::Unauthorized { detail }),
            404 => Err(ApiError::NotFound { detail }),
            code => Err(ApiError::Rejected {
                status: code,
                message: detail.unwrap_or_else(|| status.to_string()),
            }),
        }
    }

    async fn get_authed(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        info!(%path, "backend request");
        self.execute(
            self.http
                .get(self.url(path))
                .bearer_auth(access_token)
                .query(query),
        )
        .await
    }
}

/// Pull the `detail` field out of an error body, falling back to the raw
/// (sanitized) text.
fn extract_detail(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    let detail = strip_tags(&detail);
    (!detail.is_empty()).then_some(detail)
}

#[async_trait]
impl Backend for CrmClient {
    async fn verify_otp(&self, request: &OtpRequest) -> Result<AuthGrant, ApiError> {
        let value = self
            .execute(
                self.http
                    .post(self.url("/api/v1/telegram-auth/verify-otp"))
                    .json(request),
            )
            .await?;
        let grant: AuthGrant = serde_json::from_value(value)?;
        info!(
            telegram_user_id = %request.telegram_user_id,
            admin_id = grant.admin_id,
            "otp verified"
        );
        Ok(grant)
    }

    async fn logout(&self, telegram_user_id: &str) -> Result<(), ApiError> {
        self.execute(
            self.http
                .post(self.url("/api/v1/telegram-auth/logout"))
                .json(&serde_json::json!({ "telegram_user_id": telegram_user_id })),
        )
        .await?;
        info!(%telegram_user_id, "backend logout");
        Ok(())
    }

    async fn restore_session(&self, telegram_user_id: &str) -> Result<AuthGrant, ApiError> {
        let value = self
            .execute(
                self.http
                    .post(self.url("/api/v1/telegram-auth/restore-session"))
                    .json(&serde_json::json!({ "telegram_user_id": telegram_user_id })),
            )
            .await?;
        let grant: AuthGrant = serde_json::from_value(value)?;
        info!(%telegram_user_id, "session restored");
        Ok(grant)
    }

    async fn confirm_link(&self, request: &LinkRequest) -> Result<ConfirmLinkOutcome, ApiError> {
        let secret = self.link_secret.as_deref().ok_or_else(|| {
            ApiError::Configuration("account linking requires telegram.link_secret".to_string())
        })?;

        let value = self
            .execute(
                self.http
                    .post(self.url("/api/v2/telegram/confirm-link"))
                    .header("X-Bot-Secret", secret)
                    .json(request),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list(
        &self,
        access_token: &str,
        module: Module,
        page: u32,
        page_size: u32,
    ) -> Result<Page, ApiError> {
        let path = list_path(module).ok_or(ApiError::Unsupported(module))?;
        let value = self
            .get_authed(
                path,
                access_token,
                &[
                    ("page", page.to_string()),
                    ("page_size", page_size.to_string()),
                ],
            )
            .await?;
        Ok(Page::from_response(value, page, page_size))
    }

    async fn detail(
        &self,
        access_token: &str,
        module: Module,
        id: i64,
    ) -> Result<Value, ApiError> {
        let base = list_path(module).ok_or(ApiError::Unsupported(module))?;
        let path = format!("{base}{id}/");
        self.get_authed(&path, access_token, &[]).await
    }

    async fn dashboard_stats(&self, access_token: &str) -> Result<Value, ApiError> {
        match self.get_authed("/api/v2/analytics/", access_token, &[]).await {
            Ok(value) => Ok(value),
            // Analytics is optional on older backends; degrade to a note.
            Err(err) if !matches!(err, ApiError::Unauthorized { .. }) => {
                warn!(%err, "analytics unavailable, returning placeholder");
                Ok(serde_json::json!({ "message": "Statistics not available" }))
            },
            Err(err) => Err(err),
        }
    }
}
