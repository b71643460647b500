//! The secrets and sync stores a UI binds to.

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use vaultsync::app::secrets::{
    DELETE_FAILED, LEGACY_PLACEHOLDER_NAME, RETRIEVE_FAILED, SAVE_FAILED, UPDATE_FAILED,
};
use vaultsync::app::{SecretsStore, SyncStore};
use vaultsync::crypto::Argon2Params;
use vaultsync::errors::ErrorKind;
use vaultsync::state::MemoryStore;
use vaultsync::sync::{SyncManager, SyncStatus};
use vaultsync::vault::{FileVault, LegacySecret, Secret, SecretType, VaultGateway};

use common::{remote_secret, FakeRemote, MemoryVault, PASSWORD};

fn api_key(id: &str) -> Secret {
    Secret::new(
        id,
        "Stripe",
        SecretType::ApiKey,
        BTreeMap::from([("key".to_string(), "sk_live".to_string())]),
        Utc::now(),
    )
}

fn legacy_login() -> LegacySecret {
    LegacySecret {
        name: "orders".into(),
        login: "admin".into(),
        password: "hunter2".into(),
        host: "db.internal".into(),
    }
}

// ============================================================================
// SecretsStore
// ============================================================================

#[tokio::test]
async fn mutations_refresh_the_listing() {
    let vault = Arc::new(MemoryVault::default());
    let store = SecretsStore::new(vault.clone());

    store.add_secret(&api_key("stripe"), PASSWORD).await.unwrap();
    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.secrets.len(), 1);
    assert_eq!(snapshot.secrets[0].name, "Stripe");

    let mut renamed = api_key("stripe");
    renamed.name = "Stripe (live)".into();
    store.update_secret_by_id(&renamed, PASSWORD).await.unwrap();
    assert_eq!(store.secrets()[0].name, "Stripe (live)");

    store.delete_secret("stripe").await.unwrap();
    assert!(store.secrets().is_empty());
}

#[tokio::test]
async fn refresh_picks_up_writes_made_elsewhere() {
    let vault = Arc::new(MemoryVault::default());
    let store = SecretsStore::new(vault.clone());
    assert!(store.refresh_secrets().await.unwrap().is_empty());

    vault.save_secret(&api_key("stripe"), PASSWORD).await.unwrap();
    assert!(store.secrets().is_empty());

    let listed = store.refresh_secrets().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(store.secrets()[0].id, "stripe");
    assert!(!store.snapshot().loading);
}

#[tokio::test]
async fn failed_mutations_record_messages() {
    let store = SecretsStore::new(Arc::new(MemoryVault::default()));

    let err = store.add_secret(&api_key("stripe"), "nope").await.unwrap_err();
    assert!(matches!(err, vaultsync::errors::VaultSyncError::WrongPassword));
    assert_eq!(store.error().as_deref(), Some(SAVE_FAILED));
    assert!(!store.snapshot().loading);

    store.update_secret_by_id(&api_key("ghost"), PASSWORD).await.unwrap_err();
    assert_eq!(store.error().as_deref(), Some(UPDATE_FAILED));

    store.delete_secret("ghost").await.unwrap_err();
    assert_eq!(store.error().as_deref(), Some(DELETE_FAILED));

    // A successful operation clears the message.
    store.add_secret(&api_key("stripe"), PASSWORD).await.unwrap();
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn get_by_id_decrypts_typed_secrets() {
    let store = SecretsStore::new(Arc::new(MemoryVault::default()));
    store.add_secret(&api_key("stripe"), PASSWORD).await.unwrap();

    let secret = store.get_secret_by_id("stripe", PASSWORD).await.unwrap();
    assert_eq!(secret.secret_type, SecretType::ApiKey);
    assert_eq!(secret.data["key"], "sk_live");
}

#[tokio::test]
async fn get_by_id_migrates_legacy_items() {
    let store = SecretsStore::new(Arc::new(MemoryVault::default()));
    store
        .add_legacy_secret("old-db", &legacy_login(), PASSWORD)
        .await
        .unwrap();

    let secret = store.get_secret_by_id("old-db", PASSWORD).await.unwrap();
    assert_eq!(secret.id, "old-db");
    assert_eq!(secret.name, "orders");
    assert_eq!(secret.secret_type, SecretType::Database);
    assert_eq!(secret.data["username"], "admin");
    assert_eq!(secret.data["password"], "hunter2");
    assert_eq!(secret.data["host"], "db.internal");
    assert_eq!(secret.data["database"], "orders");
    assert!(secret.metadata.is_local);

    let raw = store.get_legacy_secret("old-db", PASSWORD).await.unwrap();
    assert_eq!(raw, legacy_login());
}

#[tokio::test]
async fn get_by_id_missing_everywhere_keeps_primary_error() {
    let store = SecretsStore::new(Arc::new(MemoryVault::default()));
    let err = store.get_secret_by_id("nothing", PASSWORD).await.unwrap_err();
    assert!(matches!(err, vaultsync::errors::VaultSyncError::SecretNotFound(_)));
    assert_eq!(store.error().as_deref(), Some(RETRIEVE_FAILED));
}

#[tokio::test]
async fn unrecognized_legacy_shape_is_a_format_error() {
    let vault = Arc::new(MemoryVault::default());
    vault
        .legacy
        .lock()
        .insert("odd".into(), (json!({"name": "x", "type": "generic"}), Utc::now()));
    let store = SecretsStore::new(vault);

    let err = store.get_secret_by_id("odd", PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LegacyFormat);
    assert_eq!(store.error().as_deref(), Some(RETRIEVE_FAILED));
}

#[tokio::test]
async fn delete_falls_back_to_legacy_items() {
    let vault = Arc::new(MemoryVault::default());
    let store = SecretsStore::new(vault.clone());
    store
        .add_legacy_secret("old-db", &legacy_login(), PASSWORD)
        .await
        .unwrap();

    store.delete_secret("old-db").await.unwrap();
    assert!(vault.legacy.lock().is_empty());
}

#[tokio::test]
async fn listing_falls_back_to_legacy_placeholders() {
    let vault = Arc::new(MemoryVault::default());
    vault.encrypt_item("old-db", &legacy_login(), PASSWORD).await.unwrap();
    vault.fail_listing.store(true, Ordering::SeqCst);
    let store = SecretsStore::new(vault);

    let items = store.load_secrets().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "old-db");
    assert_eq!(items[0].name, LEGACY_PLACEHOLDER_NAME);
    assert_eq!(items[0].secret_type, SecretType::Database);
    assert_eq!(store.secrets(), items);
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn legacy_items_migrate_from_the_file_vault() {
    let dir = TempDir::new().unwrap();
    let vault = Arc::new(FileVault::new(
        dir.path().join("vault.bin"),
        Argon2Params::minimal(),
    ));
    vault.initialize_vault(PASSWORD).await.unwrap();
    let store = SecretsStore::new(vault);

    store
        .add_legacy_secret("old-db", &legacy_login(), PASSWORD)
        .await
        .unwrap();
    let secret = store.get_secret_by_id("old-db", PASSWORD).await.unwrap();
    assert_eq!(secret.secret_type, SecretType::Database);
    assert_eq!(secret.data["username"], "admin");
}

// ============================================================================
// SyncStore
// ============================================================================

#[tokio::test]
async fn sync_store_mirrors_manager_state_and_token() {
    let remote = Arc::new(FakeRemote::with(vec![remote_secret(
        "a",
        "2024-01-01T00:00:00Z",
        "1",
    )]));
    let manager = SyncManager::new(
        remote.clone(),
        Arc::new(MemoryVault::default()),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(600),
    )
    .unwrap();
    let store = SyncStore::new(manager.clone(), remote.clone());

    let initial = store.snapshot();
    assert_eq!(initial.sync_state.status, SyncStatus::Idle);
    assert_eq!(initial.token.as_deref(), Some("s.fake"));
    assert!(initial.is_token_valid);

    store.start_sync(PASSWORD).await.unwrap();
    assert_eq!(store.sync_state().status, SyncStatus::Success);
    assert!(store.sync_state().last_sync_time.is_some());
    assert_eq!(manager.subscriber_count(), 1);

    remote.set_offline(true);
    assert!(!store.check_connection().await);
    store.force_sync(PASSWORD).await.unwrap_err();
    assert_eq!(store.sync_state().status, SyncStatus::Error);

    drop(store);
    assert_eq!(manager.subscriber_count(), 0);
}
