//! Behavioural properties of the pending store, checked against the
//! in-memory client so they run without a database.

use std::sync::Arc;

use serde_json::json;

use pending_common::error::StoreError;
use pending_common::types::{DeleteFilter, NewNotification, NotificationRecord, QueryFilter};
use pending_store::memory::MemoryClient;
use pending_store::{PendingStore, StoreOptions};

// ============================================================
// Shared helpers
// ============================================================

async fn setup() -> (PendingStore, Arc<MemoryClient>) {
    let client = Arc::new(MemoryClient::new());
    let store = PendingStore::new(client.clone(), StoreOptions::default())
        .await
        .unwrap();
    store.ensure_schema().await.unwrap();
    (store, client)
}

fn notification(team: &str, branch: &str, build_type: &str) -> NewNotification {
    NewNotification::new(
        team,
        branch,
        build_type,
        json!({
            "team": team,
            "issues": [{"test": "ydb/core/kqp/ut::Select", "state": "flaky"}],
            "stats": {"muted": 3, "unmuted": 1, "ratio": 0.75},
            "note": null,
        }),
    )
}

async fn seed(store: &PendingStore) -> Vec<NotificationRecord> {
    let mut stored = Vec::new();
    for (team, branch, build_type) in [
        ("qp", "main", "relwithdebinfo"),
        ("docs", "main", "relwithdebinfo"),
        ("qp", "stable-25-1", "release-asan"),
        ("qp", "main", "release-asan"),
        ("storage", "main", "relwithdebinfo"),
        ("qp", "main", "relwithdebinfo"),
    ] {
        stored.push(store.put(notification(team, branch, build_type)).await.unwrap());
    }
    stored
}

// ============================================================
// Round-trip
// ============================================================

#[tokio::test]
async fn test_put_then_query_round_trips_payload() {
    let (store, _) = setup().await;
    let payload = json!({
        "nested": {"deep": {"list": [1, "two", 3.5, false, null]}},
        "quote's": "branch \"with\" quotes",
        "unicode": "проверка ✓",
    });
    let stored = store
        .put(NewNotification::new("qp", "main", "release", payload.clone()))
        .await
        .unwrap();

    let rows = store
        .query(
            QueryFilter::new()
                .team_name("qp")
                .branch("main")
                .build_type("release")
                .since(stored.created_at),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload, payload);
    assert_eq!(rows[0], stored);
}

#[tokio::test]
async fn test_non_object_payloads_are_opaque() {
    let (store, _) = setup().await;
    for payload in [json!([1, 2, 3]), json!("plain text"), json!(42)] {
        let stored = store
            .put(NewNotification::new("qp", "main", "release", payload.clone()))
            .await
            .unwrap();
        assert_eq!(stored.payload, payload);
    }
    assert_eq!(store.query(QueryFilter::new()).await.unwrap().len(), 3);
}

// ============================================================
// Filters
// ============================================================

#[tokio::test]
async fn test_query_filters_by_exact_team_name() {
    let (store, _) = setup().await;
    seed(&store).await;

    let rows = store.query(QueryFilter::new().team_name("qp")).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.team_name == "qp"));

    let none = store.query(QueryFilter::new().team_name("q")).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_combined_filters_intersect() {
    let (store, _) = setup().await;
    let seeded = seed(&store).await;

    let rows = store
        .query(QueryFilter::new().team_name("qp").build_type("relwithdebinfo"))
        .await
        .unwrap();

    let expected: Vec<_> = seeded
        .iter()
        .filter(|r| r.team_name == "qp" && r.build_type == "relwithdebinfo")
        .cloned()
        .collect();
    assert_eq!(rows, expected);
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_quotes_in_filters_are_plain_values() {
    let (store, _) = setup().await;
    seed(&store).await;
    store
        .put(notification("o'brien", "feature/it's", "release"))
        .await
        .unwrap();

    let rows = store
        .query(QueryFilter::new().team_name("o'brien"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].branch, "feature/it's");

    let injected = store
        .query(QueryFilter::new().team_name("qp' OR '1'='1"))
        .await
        .unwrap();
    assert!(injected.is_empty());
}

// ============================================================
// Ordering
// ============================================================

#[tokio::test]
async fn test_query_orders_by_composite_key() {
    let (store, _) = setup().await;
    seed(&store).await;

    let rows = store.query(QueryFilter::new()).await.unwrap();
    let keys: Vec<_> = rows.iter().map(NotificationRecord::key).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(rows.first().unwrap().team_name, "docs");
    assert_eq!(rows.last().unwrap().team_name, "storage");
}

#[tokio::test]
async fn test_repeated_queries_return_identical_order() {
    let (store, _) = setup().await;
    seed(&store).await;

    for filter in [
        QueryFilter::new(),
        QueryFilter::new().team_name("qp"),
        QueryFilter::new().branch("main").build_type("relwithdebinfo"),
    ] {
        let first = store.query(filter.clone()).await.unwrap();
        let second = store.query(filter).await.unwrap();
        assert_eq!(first, second);
    }
}

// ============================================================
// since / before
// ============================================================

#[tokio::test]
async fn test_since_and_before_are_complements() {
    let (store, _) = setup().await;
    let t1 = store.put(notification("qp", "main", "release")).await.unwrap();
    let t2 = store.put(notification("qp", "main", "release")).await.unwrap();
    let t3 = store.put(notification("qp", "main", "release")).await.unwrap();
    assert!(t1.created_at < t2.created_at && t2.created_at < t3.created_at);

    let since = store
        .query(QueryFilter::new().since(t2.created_at))
        .await
        .unwrap();
    assert_eq!(since, vec![t2.clone(), t3.clone()]);

    let deleted = store
        .delete(DeleteFilter::new().before(t2.created_at))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining = store.query(QueryFilter::new()).await.unwrap();
    assert_eq!(remaining, vec![t2, t3]);
}

// ============================================================
// Delete guard
// ============================================================

#[tokio::test]
async fn test_empty_filter_delete_is_refused() {
    let (store, client) = setup().await;
    seed(&store).await;
    let before = client.row_count(store.table()).await;

    let err = store.delete(DeleteFilter::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::RefusedEmptyFilter));

    let err = store
        .delete(DeleteFilter::new().team_name("").branch(""))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RefusedEmptyFilter));

    assert_eq!(client.row_count(store.table()).await, before);
    assert_eq!(before, Some(6));
}

#[tokio::test]
async fn test_delete_by_team_and_branch() {
    let (store, _) = setup().await;
    seed(&store).await;

    let deleted = store
        .delete(DeleteFilter::new().team_name("qp").branch("main"))
        .await
        .unwrap();
    assert_eq!(deleted, 3);

    let qp = store.query(QueryFilter::new().team_name("qp")).await.unwrap();
    assert_eq!(qp.len(), 1);
    assert_eq!(qp[0].branch, "stable-25-1");
}

#[tokio::test]
async fn test_delete_without_matches_succeeds() {
    let (store, _) = setup().await;
    seed(&store).await;
    let deleted = store
        .delete(DeleteFilter::new().team_name("nobody"))
        .await
        .unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test]
async fn test_delete_failure_is_not_success() {
    let (store, client) = setup().await;
    seed(&store).await;
    client.set_offline(true);

    let err = store
        .delete(DeleteFilter::new().team_name("qp"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable(_)));

    client.set_offline(false);
    assert_eq!(store.query(QueryFilter::new()).await.unwrap().len(), 6);
}

// ============================================================
// Provisioning
// ============================================================

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let (store, _) = setup().await;
    seed(&store).await;

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();

    assert_eq!(store.query(QueryFilter::new()).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_concurrent_puts_keep_every_record() {
    let (store, _) = setup().await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .put(notification("qp", "main", &format!("build-{}", i % 4)))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.query(QueryFilter::new()).await.unwrap().len(), 32);
}
