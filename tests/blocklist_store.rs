use async_trait::async_trait;
use nope_list::engine::{
    validate, BlocklistError, BlocklistEvent, BlocklistStore, Domain, FormatError, StoreState,
};
use nope_list::storage::{KeyValueStore, MemoryStore, StorageError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "blockedDomains";

/// MemoryStore with switchable failures, optional delays and a log of writes.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicUsize,
    write_delay_ms: AtomicUsize,
    writes: AtomicUsize,
    written: std::sync::Mutex<Vec<Value>>,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("write refused".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.written.lock().unwrap().push(value.clone());
        self.inner.set(key, value).await
    }
}

fn names(domains: &[Domain]) -> Vec<&str> {
    domains.iter().map(Domain::as_str).collect()
}

fn new_store(storage: &Arc<FlakyStore>) -> BlocklistStore {
    BlocklistStore::new(storage.clone(), KEY)
}

#[tokio::test]
async fn test_add_remove_scenario() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    assert!(store.load().await.unwrap().is_empty());

    let domains = store.add("Example.com ").await.unwrap();
    assert_eq!(names(&domains), vec!["example.com"]);

    let err = store.add("example.com").await.unwrap_err();
    assert!(matches!(err, BlocklistError::Duplicate(ref d) if d.as_str() == "example.com"));
    assert_eq!(names(&store.list()), vec!["example.com"]);

    let target = validate("example.com").unwrap();
    assert!(store.remove(&target).await.unwrap().is_empty());
    assert!(store.remove(&target).await.unwrap().is_empty());
    assert!(store.list().is_empty());
    assert_eq!(storage.get(KEY).await.unwrap(), Some(json!([])));
}

#[tokio::test]
async fn test_format_error_has_no_side_effects() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);

    let err = store.add("https://example.com").await.unwrap_err();
    assert!(matches!(
        err,
        BlocklistError::Format(FormatError::InvalidFormat)
    ));
    assert!(matches!(
        store.add("a").await.unwrap_err(),
        BlocklistError::Format(FormatError::TooShort)
    ));
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    assert!(storage.get(KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_with_different_case_leaves_record_unchanged() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    store.add("ads.example.com").await.unwrap();
    let writes_before = storage.writes.load(Ordering::SeqCst);

    for raw in ["ADS.example.com", "  ads.Example.COM\t"] {
        let err = store.add(raw).await.unwrap_err();
        assert!(matches!(err, BlocklistError::Duplicate(_)));
    }

    assert_eq!(storage.writes.load(Ordering::SeqCst), writes_before);
    assert_eq!(
        storage.get(KEY).await.unwrap(),
        Some(json!(["ads.example.com"]))
    );
}

#[tokio::test]
async fn test_added_domains_survive_restart_in_order() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    store.load().await.unwrap();
    for raw in ["b.com", "a.com", "c.com"] {
        store.add(raw).await.unwrap();
    }

    let restarted = new_store(&storage);
    let domains = restarted.load().await.unwrap();
    assert_eq!(names(&domains), vec!["b.com", "a.com", "c.com"]);
    assert_eq!(names(&restarted.list()), vec!["b.com", "a.com", "c.com"]);
}

#[tokio::test]
async fn test_remove_absent_domain_skips_write() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    store.add("keep.me").await.unwrap();
    let writes_before = storage.writes.load(Ordering::SeqCst);

    let absent = validate("not-there.com").unwrap();
    let domains = store.remove(&absent).await.unwrap();

    assert_eq!(names(&domains), vec!["keep.me"]);
    assert_eq!(storage.writes.load(Ordering::SeqCst), writes_before);
    assert_eq!(storage.get(KEY).await.unwrap(), Some(json!(["keep.me"])));
}

#[tokio::test]
async fn test_failed_write_keeps_snapshot() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    store.add("first.com").await.unwrap();

    storage.fail_writes.store(true, Ordering::SeqCst);
    let err = store.add("second.com").await.unwrap_err();
    assert!(matches!(err, BlocklistError::Persistence(_)));
    assert_eq!(names(&store.list()), vec!["first.com"]);

    let first = validate("first.com").unwrap();
    let err = store.remove(&first).await.unwrap_err();
    assert!(matches!(err, BlocklistError::Persistence(_)));
    assert_eq!(names(&store.list()), vec!["first.com"]);

    // Retrying the same action works once storage recovers
    storage.fail_writes.store(false, Ordering::SeqCst);
    let domains = store.add("second.com").await.unwrap();
    assert_eq!(names(&domains), vec!["first.com", "second.com"]);
}

#[tokio::test]
async fn test_quota_failure_is_a_persistence_error() {
    let storage = Arc::new(MemoryStore::with_quota(40));
    let store = BlocklistStore::new(storage.clone(), KEY);

    store.add("short.io").await.unwrap();
    let err = store
        .add("a-rather-long-domain-name.example.com")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlocklistError::Persistence(StorageError::QuotaExceeded { .. })
    ));
    assert_eq!(names(&store.list()), vec!["short.io"]);
}

#[tokio::test]
async fn test_load_failure_degrades_to_empty() {
    let storage = Arc::new(FlakyStore::default());
    storage.inner.set(KEY, json!(["x.com"])).await.unwrap();
    storage.fail_reads.store(true, Ordering::SeqCst);

    let store = new_store(&storage);
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, BlocklistError::Load(_)));
    assert!(store.list().is_empty());
    assert_eq!(store.state(), StoreState::Ready);

    // Still usable after a failed load
    storage.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(names(&store.load().await.unwrap()), vec!["x.com"]);
}

#[tokio::test]
async fn test_malformed_record_is_a_load_error() {
    let storage = Arc::new(FlakyStore::default());
    storage.inner.set(KEY, json!("example.com")).await.unwrap();

    let store = new_store(&storage);
    let err = store.load().await.unwrap_err();
    assert!(matches!(
        err,
        BlocklistError::Load(StorageError::Serialization(_))
    ));
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn test_slow_write_times_out() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(200, Ordering::SeqCst);
    let store = new_store(&storage).with_timeout(Duration::from_millis(20));

    let err = store.add("slow.com").await.unwrap_err();
    assert!(matches!(
        err,
        BlocklistError::Persistence(StorageError::Timeout(20))
    ));
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn test_concurrent_adds_do_not_lose_updates() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(5, Ordering::SeqCst);
    let store = Arc::new(new_store(&storage));

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.add(&format!("site{}.com", i)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.list().len(), 10);
    let persisted: Vec<String> =
        serde_json::from_value(storage.get(KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(persisted, names(&store.list()));
}

#[tokio::test]
async fn test_concurrent_duplicate_adds_store_once() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(10, Ordering::SeqCst);
    let store = Arc::new(new_store(&storage));

    let a = tokio::spawn({
        let store = store.clone();
        async move { store.add("same.com").await }
    });
    let b = tokio::spawn({
        let store = store.clone();
        async move { store.add("SAME.com").await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(BlocklistError::Duplicate(_)))));
    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutations_apply_in_arrival_order() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(50, Ordering::SeqCst);
    let store = Arc::new(new_store(&storage));

    let add_a = tokio::spawn({
        let store = store.clone();
        async move { store.add("a.com").await }
    });
    // add_a now holds the queue and is inside the slow write
    tokio::time::sleep(Duration::from_millis(10)).await;

    let remove_a = tokio::spawn({
        let store = store.clone();
        async move { store.remove(&validate("a.com").unwrap()).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let add_b = tokio::spawn({
        let store = store.clone();
        async move { store.add("b.com").await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let reload = tokio::spawn({
        let store = store.clone();
        async move { store.load().await }
    });

    assert_eq!(names(&add_a.await.unwrap().unwrap()), vec!["a.com"]);
    assert!(remove_a.await.unwrap().unwrap().is_empty());
    assert_eq!(names(&add_b.await.unwrap().unwrap()), vec!["b.com"]);
    assert_eq!(names(&reload.await.unwrap().unwrap()), vec!["b.com"]);

    assert_eq!(
        *storage.written.lock().unwrap(),
        vec![json!(["a.com"]), json!([]), json!(["b.com"])]
    );
    assert_eq!(storage.get(KEY).await.unwrap(), Some(json!(["b.com"])));
    assert_eq!(names(&store.list()), vec!["b.com"]);
}

#[tokio::test]
async fn test_load_waits_for_in_flight_write() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(50, Ordering::SeqCst);
    let store = Arc::new(new_store(&storage));

    let add = tokio::spawn({
        let store = store.clone();
        async move { store.add("pending.com").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(store.list().is_empty());

    let domains = store.load().await.unwrap();
    assert_eq!(names(&domains), vec!["pending.com"]);
    add.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_slow_read_times_out() {
    let storage = Arc::new(FlakyStore::default());
    storage.inner.set(KEY, json!(["x.com"])).await.unwrap();
    storage.read_delay_ms.store(200, Ordering::SeqCst);
    let store = new_store(&storage).with_timeout(Duration::from_millis(20));

    let err = store.load().await.unwrap_err();
    assert!(matches!(err, BlocklistError::Load(StorageError::Timeout(20))));
    assert!(store.list().is_empty());
    assert_eq!(store.state(), StoreState::Ready);
}

#[tokio::test]
async fn test_abandoned_add_leaves_snapshot_untouched() {
    let storage = Arc::new(FlakyStore::default());
    storage.write_delay_ms.store(500, Ordering::SeqCst);
    let store = new_store(&storage);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), store.add("gone.com")).await;
    assert!(abandoned.is_err());
    assert!(store.list().is_empty());

    // The queue is free again
    storage.write_delay_ms.store(0, Ordering::SeqCst);
    assert_eq!(names(&store.add("next.com").await.unwrap()), vec!["next.com"]);
}

#[tokio::test]
async fn test_events_follow_mutations() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    let mut events = store.subscribe();

    store.load().await.unwrap();
    store.add("example.com").await.unwrap();
    let _ = store.add("example.com").await;
    store.remove(&validate("example.com").unwrap()).await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        BlocklistEvent::Loaded { count: 0 }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        BlocklistEvent::Added(validate("example.com").unwrap())
    );
    assert_eq!(
        events.recv().await.unwrap(),
        BlocklistEvent::Removed(validate("example.com").unwrap())
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_matcher_tracks_snapshot() {
    let storage = Arc::new(FlakyStore::default());
    let store = new_store(&storage);
    store.add("tracker.net").await.unwrap();

    let matcher = store.matcher();
    assert_eq!(matcher.check("cdn.tracker.net"), Some("tracker.net"));
    assert_eq!(matcher.check("example.org"), None);
}
