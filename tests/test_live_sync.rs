//! End-to-end test: initial aggregation, live event feed, force refresh,
//! snapshot export, and shutdown, all over the in-process store.

use {
    std::collections::HashMap,
    std::sync::Arc,
    std::time::Duration,
    tokio::sync::{mpsc, watch, RwLock},
    userflow::{
        build_users, read_snapshot, MemoryStore, ObjectStore, QueryHandle, SyncEngine, Users,
        REFRESH_CHANNEL_CAPACITY,
    },
};

const DATA_BUCKET: &str = "datalake";
const RESULT_BUCKET: &str = "processed-data";
const SNAPSHOT_OBJECT: &str = "out.csv";

fn test_config() -> userflow::Config {
    userflow::Config {
        store_endpoint: "in-process".to_string(),
        access_key: None,
        secret_key: None,
        data_bucket: DATA_BUCKET.to_string(),
        result_bucket: RESULT_BUCKET.to_string(),
        snapshot_object: SNAPSHOT_OBJECT.to_string(),
        // Long enough that only force_refresh drives flushes in this test.
        flush_interval: Duration::from_secs(3600),
    }
}

async fn seed_csv(store: &MemoryStore, key: &str, first: &str, last: &str, millis: i64) {
    let body = format!("first,last,births\n{},{},{}\n", first, last, millis);
    store
        .put_object(DATA_BUCKET, key, body.into_bytes(), "application/csv")
        .await
        .unwrap();
}

/// Poll until `check` passes or two seconds elapse.
async fn wait_for<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}

struct Harness {
    users: Arc<RwLock<Users>>,
    handle: QueryHandle,
    shutdown_tx: watch::Sender<bool>,
    sync_task: tokio::task::JoinHandle<()>,
}

async fn start(store: Arc<MemoryStore>) -> Harness {
    let aggregate = build_users(store.as_ref(), DATA_BUCKET).await.unwrap();
    let users = Arc::new(RwLock::new(aggregate));

    let events = store.subscribe(DATA_BUCKET).await.unwrap();
    let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SyncEngine::new(store.clone(), users.clone(), &test_config());
    let sync_task = tokio::spawn(engine.run(events, refresh_rx, shutdown_rx));

    Harness {
        handle: QueryHandle::new(users.clone(), refresh_tx),
        users,
        shutdown_tx,
        sync_task,
    }
}

async fn current(users: &Arc<RwLock<Users>>) -> Users {
    users.read().await.clone()
}

#[tokio::test]
async fn full_lifecycle_over_the_change_feed() {
    let store = Arc::new(MemoryStore::new());
    seed_csv(&store, "alice.csv", "Alice", "Smith", 951_868_800_000).await;
    store
        .put_object(DATA_BUCKET, "alice.png", vec![1, 2, 3], "image/png")
        .await
        .unwrap();

    let harness = start(store.clone()).await;

    // Initial aggregate came from the listing, not the feed.
    let users = current(&harness.users).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users["alice"].first_name, "Alice");
    assert_eq!(users["alice"].picture_path, "alice.png");

    // A new user appears in the bucket.
    seed_csv(&store, "bob.csv", "Bob", "Stone", 0).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.handle.force_refresh();

    let users_ref = harness.users.clone();
    wait_for(|| contains_user(&users_ref, "bob")).await;

    // Bob's picture object is removed again; only the path field clears.
    store
        .put_object(DATA_BUCKET, "bob.png", vec![1], "image/png")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.handle.force_refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.remove_object(DATA_BUCKET, "bob.png").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.handle.force_refresh();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let users = current(&harness.users).await;
    assert_eq!(users["bob"].first_name, "Bob");
    assert_eq!(users["bob"].picture_path, "");

    // Removing the demographic object deletes the whole entity.
    store.remove_object(DATA_BUCKET, "alice.csv").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.handle.force_refresh();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let users = current(&harness.users).await;
    assert!(users.get("alice").is_none());
    assert!(users.get("bob").is_some());

    // The snapshot in the result bucket mirrors the aggregate.
    let body = store
        .get_object(RESULT_BUCKET, SNAPSHOT_OBJECT)
        .await
        .unwrap();
    let mirrored = read_snapshot(&body).unwrap();
    assert!(mirrored.contains_key("bob"));
    assert!(!mirrored.contains_key("alice"));

    // Queries work concurrently with the running engine.
    let mut params = HashMap::new();
    params.insert("is_image_exists".to_string(), "false".to_string());
    let filtered = harness.handle.filtered(&params).await.unwrap();
    assert!(filtered.contains_key("bob"));

    let stats = harness.handle.stats(&HashMap::new()).await.unwrap();
    assert!(stats.age.is_some());

    // Clean shutdown: the engine drains and the task joins.
    harness.shutdown_tx.send(true).unwrap();
    harness.sync_task.await.unwrap();
}

fn contains_user(users: &Arc<RwLock<Users>>, key: &str) -> bool {
    users
        .try_read()
        .map(|guard| guard.contains_key(key))
        .unwrap_or(false)
}

#[tokio::test]
async fn periodic_ticker_flushes_without_explicit_trigger() {
    let store = Arc::new(MemoryStore::new());
    let users = Arc::new(RwLock::new(Users::new()));

    let mut config = test_config();
    config.flush_interval = Duration::from_millis(50);

    let events = store.subscribe(DATA_BUCKET).await.unwrap();
    let (_refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SyncEngine::new(store.clone(), users.clone(), &config);
    let sync_task = tokio::spawn(engine.run(events, refresh_rx, shutdown_rx));

    seed_csv(&store, "carol.csv", "Carol", "Reed", 0).await;

    wait_for(|| contains_user(&users, "carol")).await;

    shutdown_tx.send(true).unwrap();
    sync_task.await.unwrap();
}

#[tokio::test]
async fn closing_the_feed_stops_the_engine_with_a_final_flush() {
    let store = Arc::new(MemoryStore::new());
    seed_csv(&store, "dave.csv", "Dave", "Hill", 0).await;

    let users = Arc::new(RwLock::new(Users::new()));
    let (events_tx, events_rx) = mpsc::channel(8);
    let (_refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SyncEngine::new(store.clone(), users.clone(), &test_config());
    let sync_task = tokio::spawn(engine.run(events_rx, refresh_rx, shutdown_rx));

    events_tx
        .send(userflow::ObjectEvent::created("dave.csv"))
        .await
        .unwrap();
    drop(events_tx);

    // Engine exits on feed close and performs its final flush first.
    sync_task.await.unwrap();
    assert_eq!(users.read().await["dave"].first_name, "Dave");
}
