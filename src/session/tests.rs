use serde_json::json;

use super::*;

fn row(n: usize) -> Row {
    json!({"projectname": format!("Project {n}"), "budget": 1_000_000.0 + n as f64})
        .as_object()
        .cloned()
        .expect("object")
}

fn rows(count: usize) -> Vec<Row> {
    (0..count).map(row).collect()
}

#[test]
fn test_create_and_get_roundtrip() {
    let store = SessionStore::default();
    let id = store.create("projects in Lilongwe");

    let session = store.get(&id).expect("session");
    assert_eq!(session.query, "projects in Lilongwe");
    assert_eq!(session.original_query, "projects in Lilongwe");
    assert_eq!(session.page_size, 10);
    assert_eq!(session.current_page, 1);
    assert!(session.results.is_empty());
    assert!(!session.is_paginated);
}

#[test]
fn test_get_is_idempotent() {
    let store = SessionStore::default();
    let id = store.create("q");
    store.store_results(&id, rows(3), 3, "SELECT 1;");

    let first = store.get(&id).expect("first");
    let second = store.get(&id).expect("second");
    assert_eq!(first.results, second.results);
    assert_eq!(first.total_results, second.total_results);
    assert!(second.last_accessed >= first.last_accessed);
}

#[test]
fn test_expired_session_is_absent_and_removed() {
    let store = SessionStore::new(60);
    let id = store.create("q");
    assert!(store.backdate(&id, 61));

    assert!(store.get(&id).is_none());
    // The lazy expiry already removed the entry, so a sweep finds nothing.
    assert_eq!(store.sweep_expired(), 0);
    assert!(store.is_empty());
}

#[test]
fn test_update_refreshes_expiry() {
    let store = SessionStore::new(60);
    let id = store.create("q");
    assert!(store.backdate(&id, 30));
    assert!(store.update(
        &id,
        SessionUpdate {
            query: Some("refined".into()),
            ..Default::default()
        }
    ));

    let session = store.get(&id).expect("still live");
    assert_eq!(session.query, "refined");
    assert_eq!(session.original_query, "q");
}

#[test]
fn test_update_fails_for_absent_or_expired() {
    let store = SessionStore::new(60);
    assert!(!store.update("missing", SessionUpdate::default()));

    let id = store.create("q");
    store.backdate(&id, 120);
    assert!(!store.update(&id, SessionUpdate::default()));
}

#[test]
fn test_delete_is_idempotent() {
    let store = SessionStore::default();
    let id = store.create("q");
    assert!(store.delete(&id));
    assert!(!store.delete(&id));
}

#[test]
fn test_store_results_recomputes_pagination_flag() {
    let store = SessionStore::default();
    let id = store.create("q");

    assert!(store.store_results(&id, rows(5), 5, "SELECT a;"));
    assert!(!store.get(&id).expect("session").is_paginated);

    assert!(store.store_results(&id, rows(25), 25, "SELECT b;"));
    let session = store.get(&id).expect("session");
    assert!(session.is_paginated);
    assert_eq!(session.sql_query, "SELECT b;");
}

#[test]
fn test_pages_partition_results_exactly() {
    let store = SessionStore::default();
    let id = store.create("q");
    let all = rows(25);
    store.store_results(&id, all.clone(), 25, "SELECT *;");

    let mut seen = Vec::new();
    for page in 1..=3 {
        let result = store.get_page(&id, page).expect("page");
        assert_eq!(result.metadata.total_pages, 3);
        assert_eq!(result.metadata.current_page, page);
        assert_eq!(result.pagination.has_previous, page > 1);
        assert_eq!(result.pagination.has_more, page < 3);
        seen.extend(result.results);
    }
    assert_eq!(seen, all);
}

#[test]
fn test_page_bounds_rejected() {
    let store = SessionStore::default();
    let id = store.create("q");
    store.store_results(&id, rows(25), 25, "SELECT *;");

    assert!(store.get_page(&id, 0).is_none());
    assert!(store.get_page(&id, 4).is_none());
    assert!(store.get_page("missing", 1).is_none());
}

#[test]
fn test_partial_cache_refuses_uncovered_page() {
    let store = SessionStore::default();
    let id = store.create("q");
    // 30 logical results but only the first 10 cached.
    store.store_results(&id, rows(10), 30, "SELECT *;");

    assert!(store.get_page(&id, 1).is_some());
    assert!(store.get_page(&id, 2).is_none());
}

#[test]
fn test_get_page_without_results() {
    let store = SessionStore::default();
    let id = store.create("q");
    assert!(store.get_page(&id, 1).is_none());
}

#[test]
fn test_short_final_page() {
    let store = SessionStore::default().with_page_size(4);
    let id = store.create("q");
    store.store_results(&id, rows(9), 9, "SELECT *;");

    let last = store.get_page(&id, 3).expect("page");
    assert_eq!(last.results.len(), 1);
    assert!(!last.pagination.has_more);
    assert!(last.pagination.has_previous);
}

#[test]
fn test_sweep_removes_only_expired() {
    let store = SessionStore::new(60);
    let stale = store.create("old");
    let fresh = store.create("new");
    store.backdate(&stale, 120);

    assert_eq!(store.sweep_expired(), 1);
    assert!(store.get(&stale).is_none());
    assert!(store.get(&fresh).is_some());
    assert_eq!(store.len(), 1);
}
