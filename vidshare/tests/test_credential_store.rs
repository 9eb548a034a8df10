mod common;

use common::mock_server::VidshareMock;
use std::fs;
use std::sync::Arc;
use vidshare::storage::{
    ClientStorage, CredentialStore, FileStorage, ThemePreference, THEME_KEY, TOKEN_KEY,
};
use vidshare::types::Theme;
use vidshare::Session;

#[test]
fn test_file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let storage = Arc::new(FileStorage::open(&path).unwrap());
    CredentialStore::new(storage).set(Some("t1"));

    let reopened = Arc::new(FileStorage::open(&path).unwrap());
    assert_eq!(CredentialStore::new(reopened).get().as_deref(), Some("t1"));
}

#[test]
fn test_clear_removes_key_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.json");

    let storage = Arc::new(FileStorage::open(&path).unwrap());
    let credentials = CredentialStore::new(storage.clone());
    credentials.set(Some("t1"));
    credentials.clear();

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(on_disk.get(TOKEN_KEY).is_none());
    assert_eq!(storage.get(TOKEN_KEY), None);
}

#[test]
fn test_theme_is_independent_of_credential() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path().join("storage.json")).unwrap());
    let credentials = CredentialStore::new(storage.clone());
    let theme = ThemePreference::new(storage.clone());

    theme.set(Theme::Dark);
    credentials.set(Some("t1"));
    credentials.clear();

    assert_eq!(theme.get(), Theme::Dark);
    assert_eq!(storage.get(THEME_KEY).as_deref(), Some("dark"));
}

#[test]
fn test_corrupt_storage_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    fs::write(&path, "not json").unwrap();

    assert!(FileStorage::open(&path).is_err());
}

#[tokio::test]
async fn test_login_token_persists_for_next_process() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("auth/login_valid.json").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let session = Session::new(mock.client_with(Arc::new(FileStorage::open(&path).unwrap())));
    session.login("alice", "pw").await.unwrap();
    session.set_theme(Theme::Dark);
    drop(session);

    let restarted = Session::new(mock.client_with(Arc::new(FileStorage::open(&path).unwrap())));
    assert_eq!(restarted.credentials().get().as_deref(), Some("t1"));
    assert_eq!(restarted.theme(), Theme::Dark);
}
