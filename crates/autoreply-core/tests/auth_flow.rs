//! Sign-in, callback and logout behavior of the auth flow.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use autoreply_api::Method;
use autoreply_core::{AuthState, Error, PageContext, SESSION_STORAGE_KEY, Session, SessionStatus};
use common::{APP_URL, Harness, url};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_code_callback_authenticates_persists_and_strips_query() {
    let h = Harness::anonymous();
    h.transport.respond(
        Method::Post,
        "/auth/google/callback",
        200,
        json!({ "user": { "id": 1, "name": "A", "manual_review": true } }),
    );
    let mut auth = h.auth(&PageContext::new());

    assert_ok!(auth.mount(&url("http://localhost:3000/?code=abc123")).await);

    let AuthState::Authenticated(user) = auth.state() else {
        panic!("expected Authenticated, got {:?}", auth.state());
    };
    assert_eq!(user.name, "A");
    assert!(user.manual_review);
    assert!(h.session.is_active());

    let stored = h.storage.get(SESSION_STORAGE_KEY).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["user"]["id"], "1");
    assert_eq!(stored["user"]["name"], "A");

    assert_eq!(h.navigator.replacements(), vec![url(APP_URL)]);
    assert_eq!(
        h.transport.calls()[0].body,
        Some(json!({ "code": "abc123" }))
    );
}

#[tokio::test]
async fn test_provider_error_fails_without_contacting_backend() {
    let h = Harness::anonymous();
    let mut auth = h.auth(&PageContext::new());

    let err = assert_err!(
        auth.mount(&url("http://localhost:3000/?error=access_denied"))
            .await
    );

    assert!(matches!(err, Error::ProviderAuthFailed(ref m) if m == "access_denied"));
    assert!(matches!(auth.state(), AuthState::Failed(m) if m.contains("access_denied")));
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.session.status(), SessionStatus::Error);
    assert_eq!(h.navigator.replacements(), vec![url(APP_URL)]);
}

#[tokio::test]
async fn test_failed_exchange_still_strips_single_use_code() {
    let h = Harness::anonymous();
    h.transport.respond(
        Method::Post,
        "/auth/google/callback",
        400,
        json!({ "error": "invalid_grant" }),
    );
    let mut auth = h.auth(&PageContext::new());

    let err = assert_err!(auth.mount(&url("http://localhost:3000/?code=used&state=s1")).await);

    assert!(matches!(err, Error::ServerRejected { status: 400, .. }));
    assert!(matches!(auth.state(), AuthState::Failed(_)));
    assert!(!h.session.is_active());
    assert!(h.storage.get(SESSION_STORAGE_KEY).is_none());
    assert_eq!(h.navigator.replacements(), vec![url(APP_URL)]);
    // code exchange is never retried
    assert_eq!(h.transport.count(Method::Post, "/auth/google/callback"), 1);
}

#[tokio::test]
async fn test_exchange_without_user_is_provider_failure() {
    let h = Harness::anonymous();
    h.transport
        .respond(Method::Post, "/auth/google/callback", 200, json!({ "user": null }));
    let mut auth = h.auth(&PageContext::new());

    let err = assert_err!(auth.mount(&url("http://localhost:3000/?code=abc")).await);

    assert!(matches!(err, Error::ProviderAuthFailed(_)));
    assert!(!h.session.is_active());
    assert_eq!(h.navigator.replacements().len(), 1);
}

#[tokio::test]
async fn test_restored_session_authenticates_on_plain_mount() {
    let h = Harness::signed_in();
    let mut auth = h.auth(&PageContext::new());

    assert_ok!(auth.mount(&url(APP_URL)).await);

    assert!(auth.is_authenticated());
    assert!(h.transport.calls().is_empty());
    assert!(h.navigator.replacements().is_empty());
}

#[tokio::test]
async fn test_plain_mount_without_session_stays_anonymous() {
    let h = Harness::anonymous();
    let mut auth = h.auth(&PageContext::new());

    assert_ok!(auth.mount(&url(APP_URL)).await);

    assert_eq!(auth.state(), &AuthState::Anonymous);
    assert_eq!(h.session.snapshot(), Session::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_retries_auth_url_and_navigates() {
    let h = Harness::anonymous();
    h.transport.unreachable(Method::Get, "/auth/google");
    h.transport.unreachable(Method::Get, "/auth/google");
    h.transport.respond(
        Method::Get,
        "/auth/google",
        200,
        json!({ "auth_url": "https://accounts.google.com/o/oauth2/auth?client_id=x" }),
    );
    let mut auth = h.auth(&PageContext::new());

    assert_ok!(auth.sign_in().await);

    assert_eq!(h.transport.count(Method::Get, "/auth/google"), 3);
    assert_eq!(auth.state(), &AuthState::Redirecting);
    assert_eq!(
        h.navigator.navigations(),
        vec![url("https://accounts.google.com/o/oauth2/auth?client_id=x")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_failure_is_recoverable() {
    let h = Harness::anonymous();
    for _ in 0..3 {
        h.transport.unreachable(Method::Get, "/auth/google");
    }
    let mut auth = h.auth(&PageContext::new());

    let err = assert_err!(auth.sign_in().await);
    assert!(matches!(err, Error::NetworkUnreachable(_)));
    assert!(matches!(auth.state(), AuthState::Failed(_)));
    assert_eq!(h.transport.count(Method::Get, "/auth/google"), 3);
    assert!(h.navigator.navigations().is_empty());

    auth.reset();
    assert_eq!(auth.state(), &AuthState::Anonymous);

    h.transport.respond(
        Method::Get,
        "/auth/google",
        200,
        json!({ "auth_url": "https://accounts.google.com/o/oauth2/auth" }),
    );
    assert_ok!(auth.sign_in().await);
    assert_eq!(h.navigator.navigations().len(), 1);
}

#[tokio::test]
async fn test_sign_in_while_authenticated_is_rejected() {
    let h = Harness::signed_in();
    let mut auth = h.auth(&PageContext::new());
    assert_ok!(auth.mount(&url(APP_URL)).await);

    let err = assert_err!(auth.sign_in().await);

    assert!(err.is_invalid_local_state());
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_when_network_fails() {
    let h = Harness::signed_in();
    h.transport.unreachable(Method::Post, "/logout");
    let mut auth = h.auth(&PageContext::new());
    assert_ok!(auth.mount(&url(APP_URL)).await);

    let err = assert_err!(auth.logout().await);

    assert!(matches!(err, Error::NetworkUnreachable(_)));
    assert_eq!(h.session.snapshot(), Session::Absent);
    assert!(h.storage.get(SESSION_STORAGE_KEY).is_none());
    assert_eq!(auth.state(), &AuthState::Anonymous);
    assert_eq!(h.transport.count(Method::Post, "/logout"), 1);
}

#[tokio::test]
async fn test_logout_success() {
    let h = Harness::signed_in();
    h.transport.respond(Method::Post, "/logout", 200, json!({}));
    let mut auth = h.auth(&PageContext::new());
    assert_ok!(auth.mount(&url(APP_URL)).await);

    assert_ok!(auth.logout().await);

    assert!(!h.session.is_active());
    assert!(h.storage.get(SESSION_STORAGE_KEY).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_callback_result_dropped_after_leaving_login_page() {
    let h = Harness::anonymous();
    h.transport.respond_after(
        Method::Post,
        "/auth/google/callback",
        Duration::from_millis(500),
        200,
        json!({ "user": { "id": 1, "name": "A" } }),
    );
    let context = PageContext::new();
    let mut auth = h.auth(&context);

    let location = url("http://localhost:3000/?code=abc123");
    let (result, ()) = tokio::join!(auth.mount(&location), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        context.leave();
    });

    assert_ok!(result);
    assert!(!h.session.is_active());
    assert_eq!(h.session.status(), SessionStatus::Absent);
    assert_eq!(auth.state(), &AuthState::Anonymous);
    assert!(h.storage.get(SESSION_STORAGE_KEY).is_none());
    assert!(h.navigator.replacements().is_empty());
}

#[tokio::test]
async fn test_failed_exchange_keeps_restored_session() {
    let h = Harness::signed_in();
    let record = h.storage.get(SESSION_STORAGE_KEY);
    h.transport.respond(
        Method::Post,
        "/auth/google/callback",
        400,
        json!({ "error": "invalid_grant" }),
    );
    let mut auth = h.auth(&PageContext::new());

    let err = assert_err!(auth.mount(&url("http://localhost:3000/?code=stale")).await);

    assert!(matches!(err, Error::ServerRejected { status: 400, .. }));
    let AuthState::Authenticated(user) = auth.state() else {
        panic!("expected Authenticated, got {:?}", auth.state());
    };
    assert_eq!(user.name, "A");
    assert!(h.session.is_active());
    assert_eq!(h.storage.get(SESSION_STORAGE_KEY), record);
    assert_eq!(h.navigator.replacements(), vec![url(APP_URL)]);
}

#[tokio::test]
async fn test_provider_error_keeps_restored_session() {
    let h = Harness::signed_in();
    let mut auth = h.auth(&PageContext::new());

    assert_err!(auth.mount(&url("http://localhost:3000/?error=access_denied")).await);

    assert!(auth.is_authenticated());
    assert_eq!(h.session.status(), SessionStatus::Active);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_successful_exchange_replaces_restored_session() {
    let h = Harness::signed_in();
    h.transport.respond(
        Method::Post,
        "/auth/google/callback",
        200,
        json!({ "user": { "id": 2, "name": "B" } }),
    );
    let mut auth = h.auth(&PageContext::new());

    assert_ok!(auth.mount(&url("http://localhost:3000/?code=fresh")).await);

    assert_eq!(h.session.current_user().unwrap().name, "B");
    let stored: serde_json::Value =
        serde_json::from_str(&h.storage.get(SESSION_STORAGE_KEY).unwrap()).unwrap();
    assert_eq!(stored["user"]["id"], "2");
}

#[tokio::test]
async fn test_restored_session_survives_reload() {
    let h = Harness::anonymous();
    h.transport.respond(
        Method::Post,
        "/auth/google/callback",
        200,
        json!({ "user": { "id": 9, "name": "Reloaded", "profile_pic": "https://img.test/p.png" } }),
    );
    let mut auth = h.auth(&PageContext::new());
    assert_ok!(auth.mount(&url("http://localhost:3000/?code=abc")).await);

    // a new page load reads the same storage
    let reloaded = autoreply_core::SessionStore::restore(h.storage.clone());
    let user = reloaded.current_user().unwrap();
    assert_eq!(user.name, "Reloaded");
    assert_eq!(user.profile_pic.as_deref(), Some("https://img.test/p.png"));
}
