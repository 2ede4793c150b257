use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tower::ServiceExt;

use gamekeep::config::Config;
use gamekeep::services::ResetMailer;
use gamekeep::state::SharedState;

const STRONG_PASSWORD: &str = "Quartz!Harbor57";
const NEW_PASSWORD: &str = "Marble^Lantern26";

/// Captures raw tokens the way a mailbox would, since issuance only ever
/// hands them to the mailer.
struct CaptureMailer {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ResetMailer for CaptureMailer {
    async fn send_reset_token(&self, _email: &str, _username: &str, token: &str) {
        let _ = self.tx.send(token.to_string());
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.security.argon2.memory_cost_kib = 1024;
    config.security.argon2.time_cost = 1;
    config.security.reset.delay_min_ms = 0;
    config.security.reset.delay_max_ms = 0;
    config.maintenance.enabled = false;
    config.observability.metrics_enabled = false;
    config
}

struct TestHarness {
    app: Router,
    shared: Arc<SharedState>,
    tokens: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TestHarness {
    async fn next_token(&self) -> String {
        let mut rx = self.tokens.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for reset token")
            .expect("Mailer channel closed")
    }
}

async fn spawn_app() -> TestHarness {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(
        SharedState::with_mailer(test_config(), Arc::new(CaptureMailer { tx }))
            .await
            .expect("Failed to build shared state"),
    );
    let state = gamekeep::api::create_app_state(Arc::clone(&shared), None);
    let app = gamekeep::api::router(state)
        .await
        .expect("Failed to build router");

    TestHarness {
        app,
        shared,
        tokens: Mutex::new(rx),
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn register(app: &Router, username: &str, email: &str, password: &str) {
    let response = post_json(
        app,
        "/api/auth/register",
        json!({ "username": username, "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn request_reset(app: &Router, email: &str) -> Response {
    post_json(app, "/api/auth/password-reset/request", json!({ "email": email })).await
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

#[tokio::test]
async fn reset_requests_do_not_reveal_account_existence() {
    let harness = spawn_app().await;
    register(&harness.app, "casey_dev", "casey@example.com", STRONG_PASSWORD).await;

    // Unknown address, fresh issue, and suppressed reissue inside the resend
    // window must be indistinguishable.
    let unknown = request_reset(&harness.app, "ghost@example.com").await;
    assert_eq!(unknown.status(), StatusCode::OK);
    let unknown_body = body_bytes(unknown).await;

    let fresh = request_reset(&harness.app, "casey@example.com").await;
    assert_eq!(fresh.status(), StatusCode::OK);
    let fresh_body = body_bytes(fresh).await;

    let suppressed = request_reset(&harness.app, "casey@example.com").await;
    assert_eq!(suppressed.status(), StatusCode::OK);
    let suppressed_body = body_bytes(suppressed).await;

    assert_eq!(unknown_body, fresh_body);
    assert_eq!(fresh_body, suppressed_body);

    // Only one token was actually issued.
    harness.next_token().await;
    assert!(
        tokio::time::timeout(Duration::from_millis(200), async {
            harness.tokens.lock().await.recv().await
        })
        .await
        .is_err()
    );
}

#[tokio::test]
async fn origin_cap_is_the_only_distinguishable_outcome() {
    let harness = spawn_app().await;

    for i in 0..3 {
        let response = request_reset(&harness.app, &format!("nobody{i}@example.com")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = request_reset(&harness.app, "nobody3@example.com").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let harness = spawn_app().await;
    register(&harness.app, "casey_dev", "casey@example.com", STRONG_PASSWORD).await;

    let response = request_reset(&harness.app, "casey@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = harness.next_token().await;

    let response = get(
        &harness.app,
        &format!("/api/auth/password-reset/validate?token={token}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["data"]["valid"], true);

    // Policy applies to the replacement password before any token is spent.
    let response = post_json(
        &harness.app,
        "/api/auth/password-reset/complete",
        json!({ "token": token, "new_password": "weak" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &harness.app,
        "/api/auth/password-reset/complete",
        json!({ "token": token, "new_password": NEW_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Spent token: dead for completion and validation alike.
    let response = post_json(
        &harness.app,
        "/api/auth/password-reset/complete",
        json!({ "token": token, "new_password": NEW_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        &harness.app,
        &format!("/api/auth/password-reset/validate?token={token}"),
    )
    .await;
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["data"]["valid"], false);

    let response = post_json(
        &harness.app,
        "/api/auth/login",
        json!({ "identity": "casey_dev", "password": STRONG_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        &harness.app,
        "/api/auth/login",
        json!({ "identity": "casey_dev", "password": NEW_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn completed_reset_clears_a_lockout() {
    let harness = spawn_app().await;
    register(&harness.app, "casey_dev", "casey@example.com", STRONG_PASSWORD).await;

    for _ in 0..5 {
        let response = post_json(
            &harness.app,
            "/api/auth/login",
            json!({ "identity": "casey_dev", "password": "wrong-password" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let user = harness
        .shared
        .store
        .get_user_by_username("casey_dev")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(format!("{}", user.status), "locked");

    let response = request_reset(&harness.app, "casey@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = harness.next_token().await;

    let response = post_json(
        &harness.app,
        "/api/auth/password-reset/complete",
        json!({ "token": token, "new_password": NEW_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = harness
        .shared
        .store
        .get_user_by_username("casey_dev")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(format!("{}", user.status), "active");
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn reset_tokens_expire_on_the_ttl_boundary() {
    let harness = spawn_app().await;
    register(
        &harness.app,
        "casey_dev",
        "casey@example.com",
        STRONG_PASSWORD,
    )
    .await;

    let store = &harness.shared.store;
    let user = store
        .get_user_by_username("casey_dev")
        .await
        .unwrap()
        .unwrap();

    let token = gamekeep::auth::reset::generate_token();
    let digest = gamekeep::auth::reset::token_digest(&token);
    let issued = chrono::Utc::now();
    store
        .set_reset_token(user.id, &digest, issued + chrono::Duration::minutes(60))
        .await
        .unwrap();

    // One minute before expiry the digest resolves; one minute after it
    // does not.
    assert!(
        store
            .find_by_reset_digest(&digest, issued + chrono::Duration::minutes(59))
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        store
            .find_by_reset_digest(&digest, issued + chrono::Duration::minutes(61))
            .await
            .unwrap()
            .is_none()
    );

    // The conditional consume obeys the same boundary, so a late attempt
    // leaves the token unspent.
    let new_hash = harness
        .shared
        .hasher
        .hash_blocking(NEW_PASSWORD)
        .await
        .unwrap();
    assert!(
        !store
            .consume_reset(&digest, &new_hash, issued + chrono::Duration::minutes(61))
            .await
            .unwrap()
    );
    assert!(
        store
            .consume_reset(&digest, &new_hash, issued + chrono::Duration::minutes(59))
            .await
            .unwrap()
    );
}
