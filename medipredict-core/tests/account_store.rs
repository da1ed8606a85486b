//! Account store against an on-disk database.

use medipredict_core::{AccountError, AccountStore, NewAccount};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn asha() -> NewAccount {
    NewAccount {
        username: "asha".into(),
        email: "asha@example.com".into(),
        password: "correct horse".into(),
        first_name: "Asha".into(),
        last_name: "Rao".into(),
    }
}

#[test]
fn accounts_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("medipredict.db");

    let created = {
        let store = AccountStore::open(&path, 8).unwrap();
        store.register(asha()).unwrap()
    };

    let store = AccountStore::open(&path, 8).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let signed_in = store
        .authenticate("asha", "correct horse")
        .unwrap()
        .unwrap();
    assert_eq!(signed_in, created);
    assert!(store.authenticate("asha", "wrong").unwrap().is_none());
    assert_eq!(store.find_by_id(created.id).unwrap(), Some(created));
}

#[test]
fn duplicate_username_rejected_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("medipredict.db");
    AccountStore::open(&path, 8).unwrap().register(asha()).unwrap();

    let store = AccountStore::open(&path, 8).unwrap();
    let err = store.register(asha()).unwrap_err();
    assert!(matches!(err, AccountError::UsernameTaken { .. }));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn password_is_not_stored_in_plaintext() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("medipredict.db");
    AccountStore::open(&path, 8).unwrap().register(asha()).unwrap();

    let raw = std::fs::read(&path).unwrap();
    let needle = b"correct horse";
    assert!(!raw.windows(needle.len()).any(|w| w == needle));
}
