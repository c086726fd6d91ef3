//! Attack Scenario Tests
//!
//! Each test plays an attacker against the request gate and the lifecycle
//! callbacks, and checks that the attempt is rejected without leaking why.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use installgate_core::{InstallationRecord, SharedSecret, VerificationOptions};
use installgate_platform::{PlatformClient, PlatformClientConfig};
use installgate_receiver::{create_router, AppState, InstallationStore, ManhourSettings, MemoryStore};

const GENERIC_401: &str = "Invalid or missing credential";

// =============================================================================
// Test Helpers
// =============================================================================

fn setup(options: VerificationOptions) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let platform = PlatformClient::new(PlatformClientConfig::default()).unwrap();
    let state = Arc::new(AppState::new(store.clone(), options, platform, ManhourSettings::default()));
    (create_router(state), store)
}

async fn seeded() -> (Router, Arc<MemoryStore>) {
    let (router, store) = setup(VerificationOptions::default());
    store.upsert(record("install_A", b"secret-A")).await.unwrap();
    store.upsert(record("install_B", b"secret-B")).await.unwrap();
    (router, store)
}

fn record(id: &str, key: &[u8]) -> InstallationRecord {
    InstallationRecord {
        installation_id: id.to_string(),
        org_id: "org_1".to_string(),
        ones_base_url: "https://ones.example.com".to_string(),
        shared_secret: SharedSecret::from_bytes(key),
        callback_type: "install".to_string(),
        time_stamp: 1_755_065_823,
        app: None,
    }
}

fn sign(claims: &Value, alg: Algorithm, key: &[u8]) -> String {
    encode(&Header::new(alg), claims, &EncodingKey::from_secret(key)).unwrap()
}

fn claims(sub: &str, iat: i64, exp: i64) -> Value {
    json!({
        "iss": "https://ones.example.com",
        "sub": sub,
        "aud": "app_1",
        "iat": iat,
        "exp": exp,
        "uid": "mallory",
    })
}

fn fresh_claims(sub: &str) -> Value {
    let now = Utc::now().timestamp();
    claims(sub, now, now + 600)
}

fn with_auth(method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn settings_request(token: &str) -> Request<Body> {
    with_auth(
        Method::POST,
        "/settingPage/entries",
        Some(&format!("Bearer {}", token)),
        Some(json!({"user_uuid": "u", "language": "en", "timezone": "UTC"})),
    )
}

fn callback_body(id: &str, key: &[u8]) -> Value {
    json!({
        "installation_id": id,
        "org_id": "org_1",
        "ones_base_url": "https://ones.example.com",
        "shared_secret": SharedSecret::from_bytes(key).encoded(),
        "callback_type": "",
        "time_stamp": 1755065823,
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn assert_rejected(router: &Router, request: Request<Body>) {
    let (status, body) = send(router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["error"], GENERIC_401);
}

// =============================================================================
// Header Attacks
// =============================================================================

#[tokio::test]
async fn test_missing_and_malformed_headers() {
    let (router, _) = seeded().await;
    let token = sign(&fresh_claims("install_A"), Algorithm::HS256, b"secret-A");
    let body = Some(json!({"user_uuid": "u", "language": "en", "timezone": "UTC"}));

    let bad_headers = [
        None,
        Some(String::new()),
        Some("Bearer".to_string()),
        Some("Bearer ".to_string()),
        Some(format!("Basic {}", token)),
        Some(format!("bearer {}", token)),
        Some(format!("Bearer {} extra", token)),
        Some(format!("Bearer  {}", token)),
    ];

    for auth in bad_headers {
        let request = with_auth(Method::POST, "/settingPage/entries", auth.as_deref(), body.clone());
        assert_rejected(&router, request).await;
    }

    // Control: the same token in a well-formed header passes
    let (status, _) = send(&router, settings_request(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_garbage_token() {
    let (router, _) = seeded().await;
    assert_rejected(&router, settings_request("not-a-jwt")).await;
    assert_rejected(&router, settings_request("a.b.c")).await;
}

// =============================================================================
// Signature Attacks
// =============================================================================

#[tokio::test]
async fn test_cross_installation_forgery() {
    let (router, _) = seeded().await;

    // Holder of A's secret claims to be B
    let forged = sign(&fresh_claims("install_B"), Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&forged)).await;
}

#[tokio::test]
async fn test_unknown_installation() {
    let (router, _) = seeded().await;
    let token = sign(&fresh_claims("install_ghost"), Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&token)).await;
}

#[tokio::test]
async fn test_alg_none_rejected() {
    let (router, _) = seeded().await;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(fresh_claims("install_A").to_string());
    let unsigned = format!("{}.{}.", header, payload);

    assert_rejected(&router, settings_request(&unsigned)).await;
}

#[tokio::test]
async fn test_non_hmac_alg_header_rejected() {
    let (router, _) = seeded().await;

    let honest = sign(&fresh_claims("install_A"), Algorithm::HS256, b"secret-A");
    let parts: Vec<&str> = honest.split('.').collect();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let swapped = format!("{}.{}.{}", header, parts[1], parts[2]);

    assert_rejected(&router, settings_request(&swapped)).await;
}

#[tokio::test]
async fn test_other_hmac_variants_accepted() {
    let (router, _) = seeded().await;

    for alg in [Algorithm::HS384, Algorithm::HS512] {
        let token = sign(&fresh_claims("install_A"), alg, b"secret-A");
        let (status, _) = send(&router, settings_request(&token)).await;
        assert_eq!(status, StatusCode::OK, "{:?}", alg);
    }
}

// =============================================================================
// Temporal Attacks
// =============================================================================

#[tokio::test]
async fn test_expired_token() {
    let (router, _) = seeded().await;
    let now = Utc::now().timestamp();

    let token = sign(&claims("install_A", now - 7200, now - 3600), Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&token)).await;
}

#[tokio::test]
async fn test_recently_expired_token_rejected() {
    let (router, _) = seeded().await;
    let now = Utc::now().timestamp();

    let token = sign(&claims("install_A", now - 600, now - 30), Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&token)).await;
}

#[tokio::test]
async fn test_configured_leeway_accepts_recent_expiry() {
    let (router, store) = setup(VerificationOptions {
        leeway_secs: 60,
        ..VerificationOptions::default()
    });
    store.upsert(record("install_A", b"secret-A")).await.unwrap();
    let now = Utc::now().timestamp();

    let token = sign(&claims("install_A", now - 600, now - 30), Algorithm::HS256, b"secret-A");
    let (status, _) = send(&router, settings_request(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_future_issued_token() {
    let (router, _) = seeded().await;
    let now = Utc::now().timestamp();

    let token = sign(&claims("install_A", now + 3600, now + 7200), Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&token)).await;
}

#[tokio::test]
async fn test_audience_enforced_when_configured() {
    let (router, store) = setup(VerificationOptions {
        audience: Some("app_1".into()),
        ..VerificationOptions::default()
    });
    store.upsert(record("install_A", b"secret-A")).await.unwrap();

    let token = sign(&fresh_claims("install_A"), Algorithm::HS256, b"secret-A");
    let (status, _) = send(&router, settings_request(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let mut other = fresh_claims("install_A");
    other["aud"] = json!("app_2");
    let token = sign(&other, Algorithm::HS256, b"secret-A");
    assert_rejected(&router, settings_request(&token)).await;
}

// =============================================================================
// Lifecycle Attacks
// =============================================================================

#[tokio::test]
async fn test_secret_rotation_invalidates_old_tokens() {
    let (router, _) = seeded().await;
    let old = sign(&fresh_claims("install_A"), Algorithm::HS256, b"secret-A");

    let (status, _) = send(
        &router,
        with_auth(
            Method::POST,
            "/install_cb",
            Some(&format!("Bearer {}", old)),
            Some(callback_body("install_A", b"rotated-A")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Next request with a token under the old secret fails
    assert_rejected(&router, settings_request(&old)).await;

    let new = sign(&fresh_claims("install_A"), Algorithm::HS256, b"rotated-A");
    let (status, _) = send(&router, settings_request(&new)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_install_overwrite_without_credential() {
    let (router, store) = seeded().await;

    let request = with_auth(Method::POST, "/install_cb", None, Some(callback_body("install_A", b"attacker")));
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stored = store.get("install_A").await.unwrap();
    assert_eq!(stored.shared_secret.decode().unwrap(), b"secret-A");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_installs_cannot_overwrite_each_other() {
    let (router, store) = setup(VerificationOptions::default());

    let install = |key: &'static [u8]| {
        with_auth(Method::POST, "/install_cb", None, Some(callback_body("install_new", key)))
    };
    let ((first, _), (second, _)) = tokio::join!(
        send(&router, install(b"secret-first")),
        send(&router, install(b"secret-second")),
    );

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);

    let winner: &[u8] = if first == StatusCode::OK { b"secret-first" } else { b"secret-second" };
    let stored = store.get("install_new").await.unwrap();
    assert_eq!(stored.shared_secret.decode().unwrap(), winner);
}

#[tokio::test]
async fn test_install_overwrite_with_other_installation_credential() {
    let (router, store) = seeded().await;
    let token_b = sign(&fresh_claims("install_B"), Algorithm::HS256, b"secret-B");

    let request = with_auth(
        Method::POST,
        "/install_cb",
        Some(&format!("Bearer {}", token_b)),
        Some(callback_body("install_A", b"attacker")),
    );
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stored = store.get("install_A").await.unwrap();
    assert_eq!(stored.shared_secret.decode().unwrap(), b"secret-A");
}

#[tokio::test]
async fn test_lifecycle_callback_for_other_installation() {
    let (router, store) = seeded().await;
    let token_b = sign(&fresh_claims("install_B"), Algorithm::HS256, b"secret-B");

    for route in ["/uninstall_cb", "/enabled_cb", "/disabled_cb"] {
        let request = with_auth(
            Method::POST,
            route,
            Some(&format!("Bearer {}", token_b)),
            Some(callback_body("install_A", b"attacker")),
        );
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", route);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    let stored = store.get("install_A").await.unwrap();
    assert_eq!(stored.shared_secret.decode().unwrap(), b"secret-A");
    assert_eq!(stored.callback_type, "install");
}

#[tokio::test]
async fn test_gated_lifecycle_without_credential() {
    let (router, _) = seeded().await;
    let request = with_auth(Method::POST, "/disabled_cb", None, Some(callback_body("install_A", b"x")));
    assert_rejected(&router, request).await;
}
