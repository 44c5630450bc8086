use serde_json::json;
use tempfile::tempdir;

use super::*;

fn items(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

fn keys(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

#[test]
fn migrate_and_round_trip_values() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");

    store
        .set_values(&items(&[("1", json!({"id": 1, "title": "A"}))]))
        .expect("set");
    let values = store.get_values(&keys(&["1", "2"])).expect("get");
    assert_eq!(values.len(), 1);
    assert_eq!(values["1"]["title"], "A");
}

#[test]
fn set_replaces_whole_value() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");

    store
        .set_values(&items(&[("3", json!({"url": "http://a", "tabText": "alpha"}))]))
        .expect("set a");
    store
        .set_values(&items(&[("3", json!({"url": "http://b"}))]))
        .expect("set b");

    let values = store.get_values(&keys(&["3"])).expect("get");
    assert_eq!(values["3"], json!({"url": "http://b"}));
}

#[test]
fn remove_reports_affected_rows_and_ignores_missing_keys() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");

    store
        .set_values(&items(&[("4", json!({})), ("5", json!({}))]))
        .expect("set");
    let removed = store.remove_values(&keys(&["4", "404"])).expect("remove");
    assert_eq!(removed, 1);
    assert_eq!(store.list_keys().expect("keys"), keys(&["5"]));
}

#[test]
fn values_survive_reopen() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("state.db");
    {
        let store = SqliteStateStore::open(&path).expect("open failed");
        store
            .set_values(&items(&[("7", json!({"id": 7}))]))
            .expect("set");
        store
            .set_system_value("last_install_sync_at", "2026-10-19T00:00:00Z")
            .expect("meta");
    }
    let reopened = SqliteStateStore::open(&path).expect("reopen failed");
    assert_eq!(reopened.get_values(&keys(&["7"])).expect("get").len(), 1);
    assert_eq!(
        reopened
            .get_system_value("last_install_sync_at")
            .expect("meta")
            .as_deref(),
        Some("2026-10-19T00:00:00Z")
    );
    assert_eq!(
        reopened.get_system_value("schema_version").expect("version").as_deref(),
        Some("1")
    );
}

#[test]
fn undecodable_rows_are_skipped() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");
    store
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO tab_index(key, value_json, updated_at) VALUES ('8', '{not json', 'x')",
                [],
            )?;
            Ok(())
        })
        .expect("raw insert");

    let values = store.get_values(&keys(&["8"])).expect("get");
    assert!(values.is_empty());
}

#[cfg(unix)]
#[test]
fn open_hardens_state_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("state.db");
    let _store = SqliteStateStore::open(&db_path).expect("open failed");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}

#[tokio::test]
async fn sqlite_and_memory_backends_share_the_storage_contract() {
    let temp = tempdir().expect("tempdir");
    let sqlite = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");
    let memory = MemoryStorage::new();
    let backends: [&dyn KeyValueStorage; 2] = [&sqlite, &memory];

    for backend in backends {
        backend
            .set(items(&[("1", json!({"id": 1})), ("2", json!({"id": 2}))]))
            .await
            .expect("set");
        backend.remove(&keys(&["2"])).await.expect("remove");

        let values = backend.get(&keys(&["1", "2", "3"])).await.expect("get");
        assert_eq!(values.keys().cloned().collect::<Vec<_>>(), keys(&["1"]));
        assert_eq!(backend.keys().await.expect("keys"), keys(&["1"]));

        backend.set_metadata("k", "v").await.expect("meta set");
        assert_eq!(
            backend.get_metadata("k").await.expect("meta get").as_deref(),
            Some("v")
        );
    }
    assert_eq!(sqlite.backend_name(), "sqlite");
    assert_eq!(memory.backend_name(), "memory");
}
