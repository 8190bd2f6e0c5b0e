//! crmbot - Telegram administrative client for the CRM backend.
//!
//! The bot authenticates operators against the CRM backend with a one-time
//! password, caches the resulting session in Redis, mirrors the backend's
//! RBAC table locally, and renders backend REST responses as chat messages
//! and inline keyboards.
//!
//! Control flow for every inbound update:
//!
//! ```text
//! update -> rate limit -> session lookup -> permission check
//!        -> backend call -> formatting -> outbound message
//! ```
//!
//! No component retries, reorders, or coordinates beyond issuing independent
//! HTTP requests and single-key Redis operations. Every failure is scoped to
//! the interaction that triggered it.
//!
//! # Modules
//!
//! - [`api`]: async HTTP client for the backend REST surface
//! - [`config`]: TOML configuration, read once at startup
//! - [`dispatch`]: command/callback routing with auth and RBAC gates
//! - [`format`]: backend records rendered as HTML text blocks
//! - [`keyboard`]: inline keyboard layouts filtered by permissions
//! - [`rbac`]: static role/module/operation permission table
//! - [`session`]: TTL-bound session store (Redis or in-memory)
//! - [`telemetry`]: tracing subscriber setup

pub mod api;
pub mod config;
pub mod dispatch;
pub mod format;
pub mod keyboard;
pub mod rbac;
pub mod session;
pub mod telemetry;
