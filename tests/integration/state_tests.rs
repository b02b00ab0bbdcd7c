//! Interceptor state backed by an on-disk database

use crate::common::{bundled_rules, compiler};
use linkscrub::config::Config;
use linkscrub::state::{AppState, InterceptRequest, InterceptResponse, TabNavigator};
use linkscrub::storage::{shared, SharedStorage, SqliteStorage};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<(i64, String)>>,
}

impl TabNavigator for RecordingNavigator {
    fn navigate(&self, tab_id: i64, url: &str) {
        self.visits.lock().unwrap().push((tab_id, url.to_string()));
    }
}

fn open(path: &Path) -> SharedStorage {
    shared(SqliteStorage::new(path).expect("Failed to open database"))
}

fn state(storage: SharedStorage, navigator: Arc<RecordingNavigator>) -> AppState {
    let state = AppState::new(Config::default(), compiler(), Some(storage), navigator);
    state.install_rules(&bundled_rules());
    state
}

fn request(url: &str, resource_type: &str, tab_id: i64) -> InterceptRequest {
    InterceptRequest {
        resource_type: resource_type.to_string(),
        tab_id,
        ..InterceptRequest::navigation(url)
    }
}

#[test]
fn test_requests_are_cleaned_blocked_and_redirected() {
    let dir = tempfile::tempdir().unwrap();
    let navigator = Arc::new(RecordingNavigator::default());
    let state = state(open(&dir.path().join("state.db")), Arc::clone(&navigator));

    let cleaned = state.handle_request(&request(
        "https://www.amazon.com/dp/B000/?tag=abc123&qid=555&keepme=1",
        "main_frame",
        1,
    ));
    assert_eq!(
        cleaned,
        InterceptResponse::redirect("https://www.amazon.com/dp/B000/?tag=abc123&keepme=1".to_string())
    );

    let blocked = state.handle_request(&request("https://ad.doubleclick.net/pixel?x=1", "image", 1));
    assert_eq!(blocked, InterceptResponse::cancel());

    let untouched = state.handle_request(&request("https://docs.rs/regex/latest/regex/", "main_frame", 2));
    assert!(untouched.is_pass());

    let forced = state.handle_request(&request(
        "https://click.linksynergy.com/deeplink?id=x&murl=https%3A%2F%2Fshop.example%2Fitem",
        "main_frame",
        3,
    ));
    assert_eq!(forced, InterceptResponse::cancel());
    assert_eq!(
        navigator.visits.lock().unwrap().as_slice(),
        &[(3, "https://shop.example/item".to_string())]
    );

    let counters = state.counters();
    assert_eq!(counters.processed, 4);
    assert_eq!(counters.cleaned, 1);
    assert_eq!(counters.blocked, 1);
    assert_eq!(counters.redirected, 1);
}

#[test]
fn test_whitelist_context_from_tab() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(open(&dir.path().join("state.db")), Arc::default());
    state.add_whitelist_entry("shop.example.org").unwrap();

    // The tab's top-level page is whitelisted, so its subresources pass.
    let page = state.handle_request(&request("https://shop.example.org/cart?utm_source=x", "main_frame", 9));
    assert!(page.is_pass());

    let asset = InterceptRequest {
        frame_id: 4,
        parent_frame_id: 0,
        ..request("https://cdn.example.net/app.js?utm_source=x", "script", 9)
    };
    assert!(state.handle_request(&asset).is_pass());

    // Once the tab is gone the same asset is cleaned again.
    state.tab_removed(9);
    let asset = request("https://cdn.example.net/app.js?utm_source=x", "script", 9);
    assert_eq!(
        state.handle_request(&asset),
        InterceptResponse::redirect("https://cdn.example.net/app.js".to_string())
    );
    assert_eq!(state.counters().whitelisted, 2);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let state = state(open(&path), Arc::default());
        state.add_whitelist_entry("example.*").unwrap();
        state.handle_request(&request("https://www.example.net/a?utm_medium=x", "main_frame", 1));
        state.handle_request(&request("https://tracker.test/a?utm_medium=x", "main_frame", 1));
        state.flush();
    }

    let state = state(open(&path), Arc::default());
    assert_eq!(state.whitelist_entries(), vec!["example.*".to_string()]);

    let counters = state.counters();
    assert_eq!(counters.processed, 2);
    assert_eq!(counters.whitelisted, 1);
    assert_eq!(counters.cleaned, 1);

    let log = state.log_snapshot();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].after, "https://tracker.test/a");
    assert_eq!(log[1].provider_name, "globalRules");
}
