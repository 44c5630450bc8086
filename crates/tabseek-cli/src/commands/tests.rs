use std::fs;

use serde_json::json;
use tempfile::tempdir;

use super::*;

fn write_session(root: &Path) -> PathBuf {
    let path = root.join("session.json");
    fs::create_dir_all(root).expect("mkdir root");
    fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "focusedWindow": 1,
            "tabs": [
                {"id": 1, "url": "http://a", "title": "Rust Book", "bodyText": "rust ownership", "active": true},
                {"id": 2, "url": "http://b", "title": "Cats", "bodyText": "cute cats video"},
                {"id": 3, "url": "about:blank", "title": "Blank"}
            ]
        }))
        .expect("serialize session"),
    )
    .expect("write session");
    path
}

#[tokio::test]
async fn install_persists_index_across_runtimes() {
    let temp = tempdir().expect("tempdir");
    write_session(temp.path());

    let runtime = Runtime::open(temp.path(), None).expect("open runtime");
    let outcome = runtime.deliver(HostEvent::Installed).await.expect("install");
    assert!(matches!(outcome, EventOutcome::Installed(ref report) if report.indexed == 2));
    drop(runtime);

    let reopened = Runtime::open(temp.path(), None).expect("reopen runtime");
    let status = reopened.status().await.expect("status");
    assert_eq!(status.indexed_ids, vec![TabId::new(1), TabId::new(2)]);
    assert_eq!(status.window_tabs, 3);
    assert!(status.last_install_sync_at.is_some());
}

#[tokio::test]
async fn search_goes_through_the_background_loop() {
    let temp = tempdir().expect("tempdir");
    write_session(temp.path());
    let runtime = Runtime::open(temp.path(), None).expect("open runtime");
    runtime.deliver(HostEvent::Installed).await.expect("install");

    let results = runtime.search("cat").await.expect("search");
    assert_eq!(
        results.iter().map(|entry| entry.id).collect::<Vec<_>>(),
        vec![TabId::new(2)]
    );
}

#[tokio::test]
async fn close_updates_session_and_index() {
    let temp = tempdir().expect("tempdir");
    let session = write_session(temp.path());
    let runtime = Runtime::open(temp.path(), Some(&session)).expect("open runtime");
    runtime.deliver(HostEvent::Installed).await.expect("install");

    let event = runtime.browser.close_tab(TabId::new(2)).expect("close");
    runtime
        .deliver_transition(TabId::new(2), event)
        .await
        .expect("deliver");

    let saved = load_session(&session).expect("reload session");
    assert!(saved.tabs.iter().all(|tab| tab.id != TabId::new(2)));
    assert_eq!(
        runtime.service.index().list_ids().await.expect("ids"),
        vec![TabId::new(1)]
    );
}

#[tokio::test]
async fn navigate_reindexes_with_new_text() {
    let temp = tempdir().expect("tempdir");
    write_session(temp.path());
    let runtime = Runtime::open(temp.path(), None).expect("open runtime");

    let event = runtime
        .browser
        .navigate(TabId::new(3), "https://news.example", "News", "Breaking news")
        .expect("navigate");
    let outcome = runtime.deliver(event).await.expect("deliver");
    assert_eq!(
        outcome,
        EventOutcome::Transition(TransitionOutcome::Indexed { with_text: true })
    );
    let snapshot = runtime
        .service
        .index()
        .get(&[TabId::new(3)])
        .await
        .expect("get");
    assert_eq!(
        snapshot[&TabId::new(3)].tab_text.as_deref(),
        Some("breaking news")
    );
}

#[tokio::test]
async fn empty_search_query_is_rejected_before_opening_state() {
    let temp = tempdir().expect("tempdir");
    let err = run_from_root(
        temp.path(),
        None,
        Commands::Search(crate::cli::SearchArgs {
            query: String::new(),
        }),
    )
    .await
    .expect_err("empty query");
    assert!(err.to_string().contains("must not be empty"));
    assert!(!temp.path().join("tabseek_state.sqlite3").exists());
}

#[test]
fn missing_session_file_is_an_empty_browser() {
    let temp = tempdir().expect("tempdir");
    let fixture = load_session(&temp.path().join("absent.json")).expect("load");
    assert!(fixture.tabs.is_empty());
}
