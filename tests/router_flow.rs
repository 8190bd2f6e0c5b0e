//! End-to-end router tests over a mock backend and an in-memory session
//! store: login, browsing, permission denials, expiry, and rate limiting.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crmbot::api::mock::MockBackend;
use crmbot::config::RateLimitConfig;
use crmbot::dispatch::{AppContext, Command, UserInfo, handle_callback, handle_command};
use crmbot::rbac::Module;
use crmbot::session::memory::InMemorySessionStore;

fn context(backend: &Arc<MockBackend>, ttl: Duration, limits: RateLimitConfig) -> AppContext {
    AppContext::new(
        Arc::clone(backend) as Arc<dyn crmbot::api::Backend>,
        Arc::new(InMemorySessionStore::new(ttl)),
        limits,
    )
}

fn default_context(backend: &Arc<MockBackend>) -> AppContext {
    context(backend, Duration::from_secs(60), RateLimitConfig::default())
}

fn login_cmd(token: &str) -> Command {
    Command::Login {
        token: Some(token.to_string()),
    }
}

async fn login(ctx: &AppContext, user: &UserInfo, token: &str) {
    let reply = handle_command(ctx, user, login_cmd(token)).await;
    assert!(
        reply.text.contains("Welcome"),
        "login should succeed, got: {}",
        reply.text
    );
}

#[tokio::test]
async fn unauthenticated_commands_make_no_backend_calls() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    let reply = handle_command(&ctx, &user, Command::Menu).await;
    assert!(reply.text.contains("Authentication required"));
    assert!(reply.keyboard.is_none());

    let reply = handle_command(&ctx, &user, Command::Status).await;
    assert!(reply.text.contains("Authentication required"));

    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn unauthenticated_callback_is_rejected_without_backend_calls() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);

    let reply = handle_callback(&ctx, &UserInfo::bare(100), "menu:events").await;
    assert!(reply.show_alert);
    assert!(reply.answer.unwrap().contains("Session expired"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn login_then_browse_permitted_module() {
    let backend = Arc::new(
        MockBackend::new()
            .with_otp("A7B9C3D5", 7, "volunteer_admin")
            .with_items(
                Module::Volunteers,
                vec![json!({"id": 1, "full_name": "Aruzhan K.", "status": "active"})],
            ),
    );
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    let reply = handle_callback(&ctx, &user, "menu:volunteers").await;
    let edit = reply.edit.expect("list should render");
    assert!(edit.text.contains("Aruzhan K."));
    assert!(edit.keyboard.is_some());

    // verify_otp + list, nothing else.
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn denied_module_issues_no_backend_call() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "volunteer_admin"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;
    let after_login = backend.call_count();

    let reply = handle_callback(&ctx, &user, "menu:vacancies").await;
    assert!(reply.show_alert);
    assert!(reply.answer.unwrap().contains("Access denied"));
    assert!(reply.edit.is_none());
    assert_eq!(backend.call_count(), after_login);
}

#[tokio::test]
async fn read_only_role_sees_no_mutation_paths() {
    let backend = Arc::new(
        MockBackend::new()
            .with_otp("A7B9C3D5", 7, "government")
            .with_items(Module::Events, vec![json!({"id": 1, "title": "Forum"})]),
    );
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    // Reading works across content modules.
    let reply = handle_callback(&ctx, &user, "menu:events").await;
    assert!(reply.edit.expect("list should render").text.contains("Forum"));

    // Mutations are denied before any backend traffic.
    let before = backend.call_count();
    let reply = handle_callback(&ctx, &user, "events:edit:1").await;
    assert!(reply.answer.unwrap().contains("Access denied"));
    let reply = handle_callback(&ctx, &user, "events:delete:1").await;
    assert!(reply.answer.unwrap().contains("Access denied"));
    assert_eq!(backend.call_count(), before);
}

#[tokio::test]
async fn used_otp_is_rejected_for_the_next_user() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "administrator"));
    let ctx = default_context(&backend);

    login(&ctx, &UserInfo::bare(100), "A7B9C3D5").await;

    let reply = handle_command(&ctx, &UserInfo::bare(200), login_cmd("A7B9C3D5")).await;
    assert!(reply.text.contains("Login failed"));
}

#[tokio::test]
async fn malformed_otp_is_rejected_locally() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);

    let reply = handle_command(&ctx, &UserInfo::bare(100), login_cmd("nope")).await;
    assert!(reply.text.contains("does not look like"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn expired_session_behaves_as_unauthenticated() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "super_admin"));
    let ctx = context(&backend, Duration::ZERO, RateLimitConfig::default());
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    // TTL already elapsed: the session is gone, so the callback is treated
    // exactly like one from a user who never logged in.
    let reply = handle_callback(&ctx, &user, "menu:events").await;
    assert!(reply.show_alert);
    assert!(reply.answer.unwrap().contains("Session expired"));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn start_restores_a_live_backend_session() {
    let backend = Arc::new(MockBackend::new().with_restore("100", 7, "administrator"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    let reply = handle_command(&ctx, &user, Command::Start { payload: None }).await;
    assert!(reply.text.contains("Welcome"), "got: {}", reply.text);
    assert!(reply.keyboard.is_some());

    // The restored session is cached locally: the next command is served
    // without touching the backend again.
    let reply = handle_command(&ctx, &user, Command::Menu).await;
    assert!(reply.keyboard.is_some());
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn start_without_backend_session_prompts_for_login() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    let reply = handle_command(&ctx, &user, Command::Start { payload: None }).await;
    assert!(reply.text.contains("one-time password"), "got: {}", reply.text);
    assert_eq!(backend.call_count(), 1);

    // Still unauthenticated after the failed restore.
    let reply = handle_command(&ctx, &user, Command::Menu).await;
    assert!(reply.text.contains("Authentication required"));
}

#[tokio::test]
async fn start_skips_restore_when_already_logged_in() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "administrator"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    let reply = handle_command(&ctx, &user, Command::Start { payload: None }).await;
    assert!(reply.text.contains("Welcome"));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn deep_link_confirms_the_account_once() {
    let backend = Arc::new(MockBackend::new().with_link_token("abc123"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);
    let start = || Command::Start {
        payload: Some("link_abc123".to_string()),
    };

    let reply = handle_command(&ctx, &user, start()).await;
    assert!(reply.text.contains("Account linked"), "got: {}", reply.text);

    let reply = handle_command(&ctx, &user, start()).await;
    assert!(reply.text.contains("invalid or has expired"));
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn empty_deep_link_makes_no_backend_call() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);

    let reply = handle_command(
        &ctx,
        &UserInfo::bare(100),
        Command::Start {
            payload: Some("link_".to_string()),
        },
    )
    .await;
    assert!(reply.text.contains("malformed"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn logout_clears_the_session() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "administrator"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    let reply = handle_command(&ctx, &user, Command::Logout).await;
    assert!(reply.text.contains("Logged out"));

    let reply = handle_command(&ctx, &user, Command::Menu).await;
    assert!(reply.text.contains("Authentication required"));
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let backend = Arc::new(MockBackend::new());
    let ctx = context(
        &backend,
        Duration::from_secs(60),
        RateLimitConfig {
            login_per_minute: 2,
            general_per_minute: 30,
        },
    );
    let user = UserInfo::bare(100);

    for _ in 0..2 {
        let reply = handle_command(&ctx, &user, login_cmd("ZZZZZZZZ")).await;
        assert!(reply.text.contains("Login failed"));
    }

    let reply = handle_command(&ctx, &user, login_cmd("ZZZZZZZZ")).await;
    assert!(reply.text.contains("Too many requests"));
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn admin_panel_requires_an_administrative_role() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 7, "msb"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    let reply = handle_callback(&ctx, &user, "menu:admin").await;
    assert!(reply.answer.unwrap().contains("Administrator access required"));

    let reply = handle_callback(&ctx, &user, "admin:stats").await;
    assert!(reply.answer.unwrap().contains("Administrator access required"));
}

#[tokio::test]
async fn admin_dashboard_renders_stats() {
    let backend = Arc::new(MockBackend::new().with_otp("A7B9C3D5", 1, "super_admin"));
    let ctx = default_context(&backend);
    let user = UserInfo::bare(100);

    login(&ctx, &user, "A7B9C3D5").await;

    let reply = handle_callback(&ctx, &user, "admin:stats").await;
    let edit = reply.edit.expect("dashboard should render");
    assert!(edit.text.contains("Dashboard"));
    assert!(edit.text.contains("42"));

    let reply = handle_callback(&ctx, &user, "admin:sessions").await;
    let edit = reply.edit.expect("sessions view should render");
    assert!(edit.text.contains("Currently signed in: <b>1</b>"));
}

#[tokio::test]
async fn unknown_callback_data_is_ignored() {
    let backend = Arc::new(MockBackend::new());
    let ctx = default_context(&backend);

    let reply = handle_callback(&ctx, &UserInfo::bare(100), "garbage!!").await;
    assert!(reply.answer.is_none());
    assert!(reply.edit.is_none());
    assert_eq!(backend.call_count(), 0);
}
