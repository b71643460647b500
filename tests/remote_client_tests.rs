//! HTTP behavior of the remote client against a mock KV-v2 server.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde_json::json;
use vaultsync::errors::ErrorKind;
use vaultsync::remote::{RemoteClient, RemoteConfig, StaticIdentity, TOKEN_HEADER};
use vaultsync::state::{KvStore, MemoryStore, REMOTE_TOKEN_EXPIRY_KEY, REMOTE_TOKEN_KEY};
use vaultsync::vault::SecretType;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A structurally valid identity token that expires in an hour.
fn identity_jwt() -> String {
    let exp = Utc::now().timestamp() + 3600;
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{exp}}}"#))
    )
}

fn client_for(server: &MockServer, state: Arc<MemoryStore>) -> RemoteClient {
    let config = RemoteConfig {
        base_url: format!("{}/v1", server.uri()),
        ..RemoteConfig::default()
    };
    RemoteClient::new(config, Arc::new(StaticIdentity::new(identity_jwt())), state).unwrap()
}

/// State holding a store token valid for another hour.
fn state_with_token(token: &str) -> Arc<MemoryStore> {
    let state = Arc::new(MemoryStore::new());
    let expiry = Utc::now().timestamp_millis() + 3_600_000;
    state.set(REMOTE_TOKEN_KEY, token).unwrap();
    state
        .set(REMOTE_TOKEN_EXPIRY_KEY, &expiry.to_string())
        .unwrap();
    state
}

fn login_ok(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "auth": {"client_token": token, "lease_duration": 3600, "renewable": true}
    }))
}

fn listing(keys: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"data": {"keys": keys}}))
}

fn kv_secret(data: serde_json::Value, created_time: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "data": data,
            "metadata": {"created_time": created_time, "version": 1, "destroyed": false}
        }
    }))
}

// ============================================================================
// Token lifecycle
// ============================================================================

#[tokio::test]
async fn cached_valid_token_needs_no_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(login_ok("s.unused"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.cached"));
    assert!(client.is_token_valid());
    assert_eq!(client.get_token(false).await.unwrap(), "s.cached");
}

#[tokio::test]
async fn force_refresh_exchanges_exactly_once_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .and(body_partial_json(json!({"role": "default"})))
        .respond_with(login_ok("s.fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_with_token("s.cached");
    let client = client_for(&server, state.clone());

    assert_eq!(client.get_token(true).await.unwrap(), "s.fresh");
    assert_eq!(state.get(REMOTE_TOKEN_KEY).unwrap().as_deref(), Some("s.fresh"));

    let expiry: i64 = state
        .get(REMOTE_TOKEN_EXPIRY_KEY)
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    let expected = Utc::now().timestamp_millis() + 3_600_000;
    assert!((expected - expiry).abs() < 60_000, "expiry follows lease_duration");
    assert!(client.is_token_valid());
}

#[tokio::test]
async fn empty_cache_triggers_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(login_ok("s.first"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryStore::new()));
    assert_eq!(client.get_token(false).await.unwrap(), "s.first");
    // Second call is served from the cache.
    assert_eq!(client.get_token(false).await.unwrap(), "s.first");
}

#[tokio::test]
async fn rejected_exchange_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"errors": ["bad jwt"]})))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_with_token("s.cached");
    let client = client_for(&server, state.clone());

    let err = client.get_token(true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(client.current_token(), None);
    assert_eq!(state.get(REMOTE_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn out_of_range_lease_durations_are_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "s.forever", "lease_duration": 9_223_372_036_854_775_i64}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "s.negative", "lease_duration": -5}
        })))
        .mount(&server)
        .await;

    let state = Arc::new(MemoryStore::new());
    let client = client_for(&server, state.clone());

    assert_eq!(client.get_token(true).await.unwrap(), "s.forever");
    assert!(client.is_token_valid());

    // A negative lease yields a token that is already due for refresh.
    assert_eq!(client.get_token(true).await.unwrap(), "s.negative");
    assert!(!client.is_token_valid());
    let expiry: i64 = state
        .get(REMOTE_TOKEN_EXPIRY_KEY)
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert!(expiry <= Utc::now().timestamp_millis());
}

#[tokio::test]
async fn expired_identity_token_is_an_auth_error_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(login_ok("s.never"))
        .expect(0)
        .mount(&server)
        .await;

    let expired = format!(
        "h.{}.s",
        URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","exp":1000}"#)
    );
    let config = RemoteConfig {
        base_url: format!("{}/v1", server.uri()),
        ..RemoteConfig::default()
    };
    let client = RemoteClient::new(
        config,
        Arc::new(StaticIdentity::new(expired)),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    let err = client.get_token(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

// ============================================================================
// 403 handling
// ============================================================================

#[tokio::test]
async fn forbidden_then_success_refreshes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(login_ok("s.new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/db"))
        .and(header(TOKEN_HEADER, "s.old"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/db"))
        .and(header(TOKEN_HEADER, "s.new"))
        .respond_with(kv_secret(json!({"password": "pw"}), "2024-01-01T00:00:00Z"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.old"));
    let secret = client.get_secret("db").await.unwrap();
    assert_eq!(secret.data["password"], "pw");
    assert_eq!(client.current_token().as_deref(), Some("s.new"));
}

#[tokio::test]
async fn forbidden_twice_fails_without_third_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(login_ok("s.new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/db"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.old"));
    let err = client.get_secret("db").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
}

// ============================================================================
// Listing and reading
// ============================================================================

#[tokio::test]
async fn listing_expands_sub_collections_depth_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata"))
        .and(query_param("list", "true"))
        .and(header(TOKEN_HEADER, "s.tok"))
        .respond_with(listing(&["a", "folder/", "z"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata/folder"))
        .and(query_param("list", "true"))
        .respond_with(listing(&["b", "deeper/"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata/folder/deeper"))
        .respond_with(listing(&["c"]))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    let paths = client.list_secrets("").await.unwrap();
    assert_eq!(paths, vec!["a", "folder/b", "folder/deeper/c", "z"]);
}

#[tokio::test]
async fn listing_flattens_the_documented_example() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata"))
        .respond_with(listing(&["a", "folder/"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata/folder"))
        .respond_with(listing(&["b"]))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    assert_eq!(client.list_secrets("").await.unwrap(), vec!["a", "folder/b"]);
}

#[tokio::test]
async fn missing_collection_lists_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    assert!(client.list_secrets("").await.unwrap().is_empty());
    assert!(client.get_all_secrets().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_server_error_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    let err = client.list_secrets("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
}

#[tokio::test]
async fn get_secret_maps_payload_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/team/stripe"))
        .respond_with(kv_secret(
            json!({"name": "Stripe", "type": "api_key", "key": "sk_live"}),
            "2024-03-22T02:24:06.945319214Z",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    let secret = client.get_secret("team/stripe").await.unwrap();
    assert_eq!(secret.id, "stripe");
    assert_eq!(secret.name, "Stripe");
    assert_eq!(secret.secret_type, SecretType::ApiKey);
    assert_eq!(secret.data["key"], "sk_live");
    assert_eq!(secret.metadata.version, 1);
    assert!(secret.metadata.created_at().is_some());
}

#[tokio::test]
async fn get_all_secrets_skips_failing_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata"))
        .respond_with(listing(&["good", "bad", "also-good"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/good"))
        .respond_with(kv_secret(json!({"v": "1"}), "2024-01-01T00:00:00Z"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/data/also-good"))
        .respond_with(kv_secret(json!({"v": "2"}), "2024-01-02T00:00:00Z"))
        .mount(&server)
        .await;

    let client = client_for(&server, state_with_token("s.tok"));
    let ids: Vec<String> = client
        .get_all_secrets()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["good", "also-good"]);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_check_reflects_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"initialized": true, "sealed": false})))
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    assert!(client.health_check().await);

    let sealed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&sealed)
        .await;
    let client = client_for(&sealed, Arc::new(MemoryStore::new()));
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn health_check_is_unauthenticated_and_false_when_unreachable() {
    let server = MockServer::start().await;
    let base_url = format!("{}/v1", server.uri());
    drop(server);

    let config = RemoteConfig {
        base_url,
        request_timeout: std::time::Duration::from_secs(2),
        ..RemoteConfig::default()
    };
    let client = RemoteClient::new(
        config,
        Arc::new(StaticIdentity::none()),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    assert!(!client.health_check().await);
}
