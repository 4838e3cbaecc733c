use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use runner_client::api::ApiClient;
use runner_client::error::ClientError;
use runner_client::models::runner::ProfileFields;
use runner_client::observability::metrics::Metrics;
use runner_client::session::push::StaticRegistrar;
use runner_client::session::{PushRegistration, RestoreOutcome, Session};
use runner_client::storage::CredentialStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE: &str = "ExponentPushToken[device]";

fn runner(is_approved: bool, push_address: &str) -> Value {
    json!({
        "_id": "u1",
        "name": "Ada",
        "isApproved": is_approved,
        "isActive": false,
        "wallet": 1200,
        "expoPushToken": push_address
    })
}

fn credentials_path(dir: &TempDir) -> PathBuf {
    dir.path().join("credentials.json")
}

fn session_for(server: &MockServer, dir: &TempDir, device: Option<&str>) -> Session {
    let api = ApiClient::new(&server.uri(), Duration::from_secs(5), Metrics::new()).unwrap();
    Session::new(
        api,
        CredentialStore::new(credentials_path(dir)),
        Arc::new(StaticRegistrar::new(device.map(str::to_string))),
    )
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/runner-auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .mount(server)
        .await;
}

async fn mount_me(server: &MockServer, token: &str, runner: Value) {
    Mock::given(method("GET"))
        .and(path("/runner-auth/me"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "runner": runner })))
        .mount(server)
        .await;
}

async fn signed_in(server: &MockServer, dir: &TempDir, runner: Value) -> Session {
    mount_login(server, "tok").await;
    mount_me(server, "tok", runner).await;
    let session = session_for(server, dir, Some(DEVICE));
    session.sign_in("+2348011111111", "secret").await.unwrap();
    session
}

#[tokio::test]
async fn sign_in_persists_token_and_identity() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;

    assert!(session.is_authenticated());
    assert_eq!(session.identity().unwrap().name.as_deref(), Some("Ada"));

    let stored = CredentialStore::new(credentials_path(&dir)).load();
    assert_eq!(stored.token.as_deref(), Some("tok"));
    assert_eq!(stored.identity.unwrap().id, "u1");
}

#[tokio::test]
async fn rejected_credentials_leave_no_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/runner-auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));
    let err = session.sign_in("+2348011111111", "wrong").await.unwrap_err();

    assert!(matches!(err, ClientError::Auth(ref msg) if msg == "Invalid credentials"));
    assert!(!session.is_authenticated());
    assert!(CredentialStore::new(credentials_path(&dir)).load().token.is_none());
}

#[tokio::test]
async fn identity_fetch_failure_after_login_clears_the_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/runner-auth/me"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));
    let err = session.sign_in("+2348011111111", "secret").await.unwrap_err();

    assert!(err.is_auth());
    assert!(!session.is_authenticated());
    assert!(CredentialStore::new(credentials_path(&dir)).load().token.is_none());
}

#[tokio::test]
async fn restore_without_stored_token_reports_no_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let session = session_for(&server, &dir, Some(DEVICE));

    assert_eq!(session.restore_session().await, RestoreOutcome::NoSession);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn restore_with_expired_token_clears_the_store() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    CredentialStore::new(credentials_path(&dir))
        .save_token("stale")
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/runner-auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));

    assert_eq!(session.restore_session().await, RestoreOutcome::Expired);
    assert!(!session.is_authenticated());
    assert!(CredentialStore::new(credentials_path(&dir)).load().token.is_none());
}

#[tokio::test]
async fn restore_with_valid_token_restores_identity() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    CredentialStore::new(credentials_path(&dir))
        .save_token("tok")
        .unwrap();
    mount_me(&server, "tok", runner(true, DEVICE)).await;

    let session = session_for(&server, &dir, Some(DEVICE));

    match session.restore_session().await {
        RestoreOutcome::Restored(identity) => assert_eq!(identity.id, "u1"),
        other => panic!("expected restored session, got {other:?}"),
    }
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn push_address_is_written_only_when_it_differs() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PUT"))
        .and(path("/runner-auth/u1/expo-token"))
        .and(body_json(json!({ "expoPushToken": DEVICE })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(true, "ExponentPushToken[old]")).await;

    assert_eq!(
        session.identity().unwrap().expo_push_token.as_deref(),
        Some(DEVICE)
    );
    assert_eq!(
        session.register_push_address().await,
        PushRegistration::AlreadyCurrent
    );
}

#[tokio::test]
async fn push_address_matching_the_server_is_left_alone() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PUT"))
        .and(path("/runner-auth/u1/expo-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;

    assert_eq!(
        session.register_push_address().await,
        PushRegistration::AlreadyCurrent
    );
}

#[tokio::test]
async fn missing_push_capability_does_not_block_sign_in() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok").await;
    mount_me(&server, "tok", runner(true, "")).await;

    let session = session_for(&server, &dir, None);
    session.sign_in("+2348011111111", "secret").await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(
        session.register_push_address().await,
        PushRegistration::Unavailable
    );
}

#[tokio::test]
async fn complete_profile_passes_validation_message_through() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/runner-auth/complete-profile"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "NIN already in use" })),
        )
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));
    let fields = ProfileFields {
        phone: Some("+2348011111111".to_string()),
        nin: Some("12345678901".to_string()),
        ..ProfileFields::default()
    };
    let err = session.complete_profile(&fields).await.unwrap_err();

    assert_eq!(err.to_string(), "NIN already in use");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn complete_profile_establishes_the_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/runner-auth/complete-profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "fresh",
            "runner": runner(false, ""),
            "message": "Profile updated"
        })))
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));
    let fields = ProfileFields {
        name: Some("Ada".to_string()),
        ..ProfileFields::default()
    };
    let identity = session.complete_profile(&fields).await.unwrap();

    assert_eq!(identity.id, "u1");
    assert!(session.is_authenticated());
    let stored = CredentialStore::new(credentials_path(&dir)).load();
    assert_eq!(stored.token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn unapproved_runner_cannot_toggle() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PATCH"))
        .and(path("/runner/u1/toggleActive"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(false, DEVICE)).await;

    assert!(matches!(
        session.toggle_availability().await,
        Err(ClientError::NotApproved)
    ));
    assert!(!session.availability().displayed());
}

#[tokio::test]
async fn toggle_confirms_with_the_server() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PATCH"))
        .and(path("/runner/u1/toggleActive"))
        .and(body_json(json!({ "isActive": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isActive": true })))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;

    assert!(session.toggle_availability().await.unwrap());
    assert!(session.identity().unwrap().is_active);
    assert!(!session.availability().is_pending());
}

#[tokio::test]
async fn failed_toggle_rolls_back() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PATCH"))
        .and(path("/runner/u1/toggleActive"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;
    let err = session.toggle_availability().await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert!(!session.availability().displayed());
    assert!(!session.identity().unwrap().is_active);
}

#[tokio::test]
async fn overlapping_toggles_settle_on_the_server_value() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("PATCH"))
        .and(path("/runner/u1/toggleActive"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "isActive": true }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;
    let (first, second) = tokio::join!(session.toggle_availability(), session.toggle_availability());

    assert!(first.is_ok() && second.is_ok());
    assert!(!session.availability().is_pending());
    assert!(session.availability().displayed());
    assert!(session.identity().unwrap().is_active);
}

#[tokio::test]
async fn logout_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let session = signed_in(&server, &dir, runner(true, DEVICE)).await;

    session.logout();
    session.logout();

    assert!(!session.is_authenticated());
    assert!(session.credentials().unwrap_err().is_auth());
    assert!(CredentialStore::new(credentials_path(&dir)).load().token.is_none());
}

#[tokio::test]
async fn verification_code_round_trip_returns_server_messages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/runner-auth/send-code"))
        .and(body_json(json!({ "phone": "+2348011111111" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Code sent" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/runner-auth/verify-code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid code" })))
        .mount(&server)
        .await;

    let session = session_for(&server, &dir, Some(DEVICE));
    let sent = session.send_verification_code("+2348011111111").await.unwrap();
    assert_eq!(sent.message.as_deref(), Some("Code sent"));

    let err = session
        .verify_code("+2348011111111", "0000")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ref msg) if msg == "Invalid code"));
}
