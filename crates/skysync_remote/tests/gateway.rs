//! Gateway behavior against the in-memory store.

use skysync_feed::DeliveryQueue;
use skysync_remote::{
    FieldMap, GatewayError, MemoryRemoteStore, Predicate, Record, RecordId, Recordable,
    RemoteGateway, SavePolicy, StoreError, StoreErrorKind, MAX_OPEN_CURSORS,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct Task {
    id: RecordId,
    title: String,
    priority: i64,
}

impl Task {
    fn new(title: &str, priority: i64) -> Self {
        Self {
            id: Self::generate_id(),
            title: title.to_string(),
            priority,
        }
    }

    fn with_id(id: &str, title: &str, priority: i64) -> Self {
        Self {
            id: RecordId::new(id),
            title: title.to_string(),
            priority,
        }
    }
}

impl Recordable for Task {
    const RECORD_TYPE: &'static str = "Task";

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            id: record.id().clone(),
            title: record.text("title")?.to_string(),
            priority: record.integer("priority")?,
        })
    }

    fn fields(&self) -> FieldMap {
        FieldMap::from([
            ("title".to_string(), self.title.clone().into()),
            ("priority".to_string(), self.priority.into()),
        ])
    }
}

fn setup(page_size: usize) -> (Arc<MemoryRemoteStore>, RemoteGateway) {
    let store = Arc::new(MemoryRemoteStore::with_page_size(page_size));
    let gateway = RemoteGateway::new(store.clone());
    (store, gateway)
}

fn seed(store: &MemoryRemoteStore, task: &Task) {
    store.seed(task.new_record());
}

// ============================================================================
// Single-record operations
// ============================================================================

#[tokio::test]
async fn create_round_trips_fields() {
    let (store, gateway) = setup(10);
    let task = Task::new("write tests", 2);

    let created = gateway.create(&task).await.unwrap();
    assert_eq!(created, task);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn create_with_uses_constructor() {
    let (store, gateway) = setup(10);
    let created = gateway.create_with(|| Task::new("lazy", 1)).await.unwrap();
    assert_eq!(created.title, "lazy");
    assert!(store.get(&created.id).is_some());
}

#[tokio::test]
async fn create_of_existing_record_fails() {
    let (store, gateway) = setup(10);
    let task = Task::new("dup", 1);
    seed(&store, &task);

    let err = gateway.create(&task).await.unwrap_err();
    assert!(matches!(err, GatewayError::CreateFailed(_)));
}

#[tokio::test]
async fn create_reports_unparseable_response() {
    #[derive(Clone)]
    struct Broken(RecordId);

    impl Recordable for Broken {
        const RECORD_TYPE: &'static str = "Broken";
        fn record_id(&self) -> &RecordId {
            &self.0
        }
        fn from_record(_record: &Record) -> Option<Self> {
            None
        }
        fn fields(&self) -> FieldMap {
            FieldMap::new()
        }
    }

    let (_store, gateway) = setup(10);
    let err = gateway
        .create(&Broken(RecordId::new("b1")))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        GatewayError::CreatedRecordInvalid {
            record_type: "Broken"
        }
    ));
}

#[tokio::test]
async fn save_merges_onto_server_copy() {
    let (store, gateway) = setup(10);
    let task = Task::with_id("t1", "draft", 1);
    let mut server = task.new_record();
    server.set("notes", "kept by the server");
    store.seed(server);

    let mut edited = task.clone();
    edited.title = "final".to_string();
    let saved = gateway.save(&edited).await.unwrap();

    assert_eq!(saved.title, "final");
    let record = store.get(&task.id).unwrap();
    assert_eq!(record.text("title"), Some("final"));
    assert_eq!(record.text("notes"), Some("kept by the server"));
}

#[tokio::test]
async fn save_of_missing_record_fails() {
    let (_store, gateway) = setup(10);
    let err = gateway.save(&Task::new("ghost", 1)).await.unwrap_err();
    match err {
        GatewayError::SaveFailed(e) => assert_eq!(e.kind, StoreErrorKind::NotFound),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn update_property_saves_one_field() {
    let (store, gateway) = setup(10);
    let task = Task::with_id("t1", "draft", 1);
    seed(&store, &task);

    let updated = gateway
        .update_property(task, |t: &mut Task, p| t.priority = p, 5)
        .await
        .unwrap();
    assert_eq!(updated.priority, 5);
    assert_eq!(store.get(&updated.id).unwrap().integer("priority"), Some(5));
}

#[tokio::test]
async fn update_property_wraps_save_error() {
    let (_store, gateway) = setup(10);
    let err = gateway
        .update_property(Task::new("ghost", 1), |t: &mut Task, p| t.priority = p, 5)
        .await
        .unwrap_err();
    match err {
        GatewayError::UpdateFailed(inner) => {
            assert!(matches!(*inner, GatewayError::SaveFailed(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn delete_removes_record() {
    let (store, gateway) = setup(10);
    let task = Task::with_id("t1", "draft", 1);
    seed(&store, &task);

    let deleted = gateway.delete(task).await.unwrap();
    assert_eq!(deleted.id, RecordId::new("t1"));
    assert!(store.is_empty());

    let err = gateway.delete(deleted).await.unwrap_err();
    assert!(matches!(err, GatewayError::DeleteFailed(_)));
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn batch_save_reports_partial_failure() {
    let (store, gateway) = setup(10);
    let tasks = vec![
        Task::with_id("a", "one", 1),
        Task::with_id("b", "two", 2),
        Task::with_id("c", "three", 3),
    ];
    for task in &tasks {
        seed(&store, task);
    }
    store.fail_saves_for(RecordId::new("b"));

    let edited: Vec<Task> = tasks
        .iter()
        .map(|t| Task {
            priority: t.priority * 10,
            ..t.clone()
        })
        .collect();
    let results = gateway
        .save_all(&edited, SavePolicy::IfServerRecordUnchanged)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert!(matches!(results[1], Err(GatewayError::BatchSaveFailed(_))));
    assert_eq!(results[0].as_ref().unwrap().priority, 10);
    assert_eq!(results[2].as_ref().unwrap().priority, 30);
    assert_eq!(store.get(&RecordId::new("b")).unwrap().integer("priority"), Some(2));
}

#[tokio::test]
async fn batch_save_reports_unfetchable_items() {
    let (store, gateway) = setup(10);
    let known = Task::with_id("a", "one", 1);
    seed(&store, &known);
    let unknown = Task::with_id("z", "missing", 1);

    let results = gateway
        .save_all(&[unknown, known], SavePolicy::Overwrite)
        .await
        .unwrap();
    assert!(matches!(results[0], Err(GatewayError::FetchFailed(_))));
    assert!(results[1].is_ok());
    assert_eq!(store.stats().batches, 1);
}

#[tokio::test]
async fn batch_save_of_nothing_skips_the_store() {
    let (store, gateway) = setup(10);
    let results = gateway
        .save_all::<Task>(&[], SavePolicy::default())
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(store.stats().fetches, 0);
}

#[tokio::test]
async fn batch_save_fails_wholesale_when_unreachable() {
    let (store, gateway) = setup(10);
    store.set_unreachable(true);
    let err = gateway
        .save_all(&[Task::new("x", 1)], SavePolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::BatchSaveFailed(_)));
}

#[tokio::test]
async fn batch_delete_reports_partial_failure() {
    let (store, gateway) = setup(10);
    let tasks = vec![Task::with_id("a", "one", 1), Task::with_id("b", "two", 2)];
    for task in &tasks {
        seed(&store, task);
    }
    store.fail_deletes_for(RecordId::new("a"));

    let results = gateway.delete_all(&tasks).await.unwrap();
    assert!(matches!(results[0], Err(GatewayError::DeleteFailed(_))));
    assert_eq!(results[1].as_ref().unwrap(), &RecordId::new("b"));
    assert_eq!(store.len(), 1);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn get_all_follows_three_pages() {
    let (store, gateway) = setup(2);
    for i in 0..6 {
        seed(&store, &Task::with_id(&format!("t{i}"), "x", i));
    }

    let tasks: Vec<Task> = gateway.get_all(&Predicate::All).await.unwrap();
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.name()).collect();
    assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4", "t5"]);

    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 6);
    assert_eq!(store.stats().pages, 3);
    assert_eq!(store.stats().queries, 1);
}

#[tokio::test]
async fn get_all_applies_predicate_and_record_type() {
    let (store, gateway) = setup(10);
    seed(&store, &Task::with_id("a", "low", 1));
    seed(&store, &Task::with_id("b", "high", 5));
    store.seed(Record::new("Other", RecordId::new("c")).with_field("priority", 9i64));

    let tasks: Vec<Task> = gateway
        .get_all(&Predicate::gt("priority", 2i64))
        .await
        .unwrap();
    assert_eq!(tasks, vec![Task::with_id("b", "high", 5)]);
}

#[tokio::test]
async fn get_all_aborts_on_unparseable_record() {
    let (store, gateway) = setup(10);
    seed(&store, &Task::with_id("a", "ok", 1));
    store.seed(Record::new("Task", RecordId::new("b")).with_field("title", "no priority"));

    let err = gateway.get_all::<Task>(&Predicate::All).await.unwrap_err();
    assert!(matches!(err, GatewayError::Other(_)));
}

#[tokio::test]
async fn get_all_aborts_on_record_error() {
    let (store, gateway) = setup(10);
    seed(&store, &Task::with_id("a", "ok", 1));
    store.make_unreadable(RecordId::new("a"));

    let err = gateway.get_all::<Task>(&Predicate::All).await.unwrap_err();
    assert!(matches!(err, GatewayError::Other(_)));
}

#[tokio::test]
async fn aborted_get_all_calls_leave_bounded_cursors() {
    let (store, gateway) = setup(1);
    seed(&store, &Task::with_id("a", "bad", 1));
    seed(&store, &Task::with_id("b", "ok", 2));
    store.make_unreadable(RecordId::new("a"));

    for _ in 0..MAX_OPEN_CURSORS * 2 {
        assert!(gateway.get_all::<Task>(&Predicate::All).await.is_err());
    }
    assert_eq!(store.open_cursors(), MAX_OPEN_CURSORS);

    store.clear_faults();
    let tasks: Vec<Task> = gateway.get_all(&Predicate::All).await.unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn get_all_reports_query_failure() {
    let (store, gateway) = setup(10);
    store.fail_next_query(StoreError::network("offline"));

    let err = gateway.get_all::<Task>(&Predicate::All).await.unwrap_err();
    assert!(matches!(err, GatewayError::FetchFailed(_)));
    assert!(gateway.get_all::<Task>(&Predicate::All).await.is_ok());
}

// ============================================================================
// Change notifications
// ============================================================================

#[tokio::test]
async fn mutations_notify_change_subscribers() {
    let (store, gateway) = setup(10);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let token = gateway.subscribe_to_changes_on(DeliveryQueue::immediate(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let task = gateway.create(&Task::new("a", 1)).await.unwrap();
    let task = gateway.save(&task).await.unwrap();
    gateway
        .save_all(std::slice::from_ref(&task), SavePolicy::default())
        .await
        .unwrap();
    gateway.delete(task).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Reads and failures are silent.
    let _: Vec<Task> = gateway.get_all(&Predicate::All).await.unwrap();
    store.set_unreachable(true);
    assert!(gateway.create(&Task::new("b", 1)).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    assert!(gateway.unsubscribe_from_changes(token));
    assert!(!gateway.unsubscribe_from_changes(token));
    assert_eq!(gateway.change_subscriber_count(), 0);
}

fn count_changes(gateway: &RemoteGateway) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    gateway.subscribe_to_changes_on(DeliveryQueue::immediate(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    calls
}

#[tokio::test]
async fn batches_that_change_nothing_stay_silent() {
    let (store, gateway) = setup(10);
    let task = Task::with_id("a", "one", 1);
    seed(&store, &task);
    store.fail_saves_for(RecordId::new("a"));
    let calls = count_changes(&gateway);

    let saved = gateway
        .save_all(std::slice::from_ref(&task), SavePolicy::Overwrite)
        .await
        .unwrap();
    assert!(saved[0].is_err());

    let deleted = gateway
        .delete_all(&[Task::with_id("z", "missing", 1)])
        .await
        .unwrap();
    assert!(deleted[0].is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    store.clear_faults();
    gateway
        .save_all(&[task.clone(), Task::with_id("z", "missing", 1)], SavePolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
