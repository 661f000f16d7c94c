use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::{sync::broadcast, time::sleep};

use timer_tracker::{
    services::{
        MemoryStorage, Storage, StorageError, CATEGORIES_KEY, TIMERS_KEY, TIMER_LOGS_KEY,
    },
    state::{StoreEvent, TimerStatus, TimerStore, DEFAULT_CATEGORIES},
};

fn memory_store() -> (Arc<MemoryStorage>, Arc<TimerStore>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = TimerStore::new(storage.clone());
    (storage, store)
}

fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn seconds(secs: f64) {
    sleep(Duration::from_secs_f64(secs)).await;
}

/// Gateway whose reads of one key always fail
struct FailingStorage {
    inner: MemoryStorage,
    failing_key: &'static str,
}

impl Storage for FailingStorage {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StorageError>> {
        if key == self.failing_key {
            return Box::pin(async { Err(StorageError::Unavailable("disk on fire".to_string())) });
        }
        self.inner.load(key)
    }

    fn save<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StorageError>> {
        self.inner.save(key, value)
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        self.inner.remove(key)
    }
}

#[tokio::test(start_paused = true)]
async fn tea_timer_counts_down_and_completes_once() {
    let (_, store) = memory_store();
    let tea = store.add_timer("Tea", 10, "Break", false);

    assert!(store.start_timer(&tea.id));
    seconds(5.5).await;

    let running = store.find_timer(&tea.id).unwrap();
    assert_eq!(running.status, TimerStatus::Running);
    assert_eq!(running.remaining_time, 5);

    seconds(5.0).await;
    let done = store.find_timer(&tea.id).unwrap();
    assert_eq!(done.status, TimerStatus::Completed);
    assert_eq!(done.remaining_time, 0);
    assert!(!done.completion_acknowledged);

    let logs = store.sorted_timer_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].timer_name, "Tea");
    assert_eq!(logs[0].duration, 10);

    // no further ticks or logs once completed
    seconds(5.0).await;
    assert_eq!(store.sorted_timer_logs().len(), 1);
    assert_eq!(store.find_timer(&tea.id).unwrap().remaining_time, 0);
}

#[tokio::test(start_paused = true)]
async fn starting_twice_does_not_double_decrement() {
    let (_, store) = memory_store();
    let timer = store.add_timer("Focus", 30, "Work", false);

    store.start_timer(&timer.id);
    seconds(0.5).await;
    store.start_timer(&timer.id);
    seconds(3.0).await;

    assert_eq!(store.find_timer(&timer.id).unwrap().remaining_time, 27);
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_and_resume_continues() {
    let (_, store) = memory_store();
    let timer = store.add_timer("Focus", 10, "Work", false);

    store.start_timer(&timer.id);
    seconds(3.5).await;
    assert!(store.pause_timer(&timer.id));
    assert_eq!(store.find_timer(&timer.id).unwrap().remaining_time, 7);

    seconds(5.0).await;
    let paused = store.find_timer(&timer.id).unwrap();
    assert_eq!(paused.status, TimerStatus::Paused);
    assert_eq!(paused.remaining_time, 7);

    store.start_timer(&timer.id);
    seconds(2.5).await;
    assert_eq!(store.find_timer(&timer.id).unwrap().remaining_time, 5);
}

#[tokio::test(start_paused = true)]
async fn halfway_and_completion_are_announced_once() {
    let (_, store) = memory_store();
    let mut events = store.subscribe();
    let timer = store.add_timer("Stretch", 10, "Workout", true);

    store.start_timer(&timer.id);
    seconds(12.5).await;

    let events = drain(&mut events);
    let halfway: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StoreEvent::HalfwayReached { .. }))
        .collect();
    let completed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StoreEvent::TimerCompleted { .. }))
        .collect();

    assert_eq!(halfway.len(), 1);
    assert_eq!(
        halfway[0],
        &StoreEvent::HalfwayReached { timer_id: timer.id.clone(), timer_name: "Stretch".to_string() }
    );
    assert_eq!(completed.len(), 1);
    assert!(store.find_timer(&timer.id).unwrap().halfway_alert_triggered);
}

#[tokio::test(start_paused = true)]
async fn halfway_is_not_announced_when_disabled() {
    let (_, store) = memory_store();
    let mut events = store.subscribe();
    let timer = store.add_timer("Stretch", 4, "Workout", false);

    store.start_timer(&timer.id);
    seconds(4.5).await;

    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, StoreEvent::HalfwayReached { .. })));
}

#[tokio::test(start_paused = true)]
async fn reset_and_restart_logs_a_second_completion() {
    let (_, store) = memory_store();
    let timer = store.add_timer("Sprint", 2, "Work", false);

    store.start_timer(&timer.id);
    seconds(2.5).await;
    assert!(store.acknowledge_completion(&timer.id));
    assert!(store.find_timer(&timer.id).unwrap().completion_acknowledged);

    // a completed timer ignores start until reset
    store.start_timer(&timer.id);
    assert_eq!(store.find_timer(&timer.id).unwrap().status, TimerStatus::Completed);

    store.reset_timer(&timer.id);
    let reset = store.find_timer(&timer.id).unwrap();
    assert_eq!(reset.status, TimerStatus::Idle);
    assert_eq!(reset.remaining_time, 2);
    assert!(!reset.completion_acknowledged);

    store.start_timer(&timer.id);
    seconds(2.5).await;
    assert_eq!(store.sorted_timer_logs().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn category_commands_only_touch_their_category() {
    let (_, store) = memory_store();
    let work_a = store.add_timer("Email", 60, "Work", false);
    let work_b = store.add_timer("Review", 60, "Work", false);
    let rest = store.add_timer("Coffee", 60, "Break", false);

    assert_eq!(store.start_category_timers("Work"), 2);
    store.start_timer(&rest.id);
    seconds(3.5).await;

    assert_eq!(store.pause_category_timers("Work"), 2);
    assert_eq!(store.find_timer(&work_a.id).unwrap().status, TimerStatus::Paused);
    assert_eq!(store.find_timer(&rest.id).unwrap().status, TimerStatus::Running);

    assert_eq!(store.reset_category_timers("Work"), 2);
    for id in [&work_a.id, &work_b.id] {
        let timer = store.find_timer(id).unwrap();
        assert_eq!(timer.status, TimerStatus::Idle);
        assert_eq!(timer.remaining_time, 60);
    }
    let coffee = store.find_timer(&rest.id).unwrap();
    assert_eq!(coffee.status, TimerStatus::Running);
    assert_eq!(coffee.remaining_time, 57);

    assert_eq!(store.start_category_timers("Nonexistent"), 0);
}

#[tokio::test(start_paused = true)]
async fn category_reset_covers_idle_running_and_completed_timers() {
    let (_, store) = memory_store();
    let sprint = store.add_timer("Sprint", 2, "Work", false);
    store.start_timer(&sprint.id);
    seconds(2.5).await;
    assert_eq!(store.find_timer(&sprint.id).unwrap().status, TimerStatus::Completed);

    let email = store.add_timer("Email", 60, "Work", false);
    let coffee = store.add_timer("Coffee", 60, "Break", false);
    store.start_timer(&email.id);
    store.start_timer(&coffee.id);
    seconds(3.2).await;

    // running and completed timers are skipped by a bulk start
    assert_eq!(store.start_category_timers("Work"), 0);
    assert_eq!(store.find_timer(&sprint.id).unwrap().status, TimerStatus::Completed);

    let plan = store.add_timer("Plan", 30, "Work", false);
    assert_eq!(store.find_timer(&email.id).unwrap().status, TimerStatus::Running);
    assert_eq!(store.find_timer(&email.id).unwrap().remaining_time, 57);

    assert_eq!(store.reset_category_timers("Work"), 3);
    for (id, duration) in [(&sprint.id, 2), (&email.id, 60), (&plan.id, 30)] {
        let timer = store.find_timer(id).unwrap();
        assert_eq!(timer.status, TimerStatus::Idle);
        assert_eq!(timer.remaining_time, duration);
    }

    let coffee = store.find_timer(&coffee.id).unwrap();
    assert_eq!(coffee.status, TimerStatus::Running);
    assert_eq!(coffee.remaining_time, 57);

    // the reset countdowns are gone
    seconds(2.0).await;
    assert_eq!(store.find_timer(&email.id).unwrap().remaining_time, 60);
}

#[tokio::test(start_paused = true)]
async fn huge_imported_durations_tick_without_a_false_halfway() {
    let (_, store) = memory_store();
    let mut events = store.subscribe();
    let added = store.add_imported_timers(&[json!({
        "id": "endless",
        "name": "Endless",
        "duration": 1e30,
        "isHalfwayAlertEnabled": true
    })]);
    assert_eq!(added, 1);

    store.start_timer("endless");
    seconds(1.5).await;

    let timer = store.find_timer("endless").unwrap();
    assert_eq!(timer.status, TimerStatus::Running);
    assert_eq!(timer.remaining_time, u64::MAX - 1);
    assert!(!timer.halfway_alert_triggered);
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, StoreEvent::HalfwayReached { .. })));
}

#[tokio::test(start_paused = true)]
async fn removed_timers_stop_ticking() {
    let (_, store) = memory_store();
    let mut events = store.subscribe();
    let timer = store.add_timer("Gone", 10, "Work", false);

    store.start_timer(&timer.id);
    seconds(2.5).await;
    assert!(store.remove_timer(&timer.id));
    drain(&mut events);

    seconds(5.0).await;
    assert!(store.find_timer(&timer.id).is_none());
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, StoreEvent::TimerTicked { .. })));
    assert!(store.sorted_timer_logs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shortening_a_running_timer_clamps_remaining_time() {
    let (_, store) = memory_store();
    let timer = store.add_timer("Long", 100, "Study", false);

    store.start_timer(&timer.id);
    seconds(10.5).await;
    store.set_timer_duration(&timer.id, 50);
    assert_eq!(store.find_timer(&timer.id).unwrap().remaining_time, 50);

    store.set_timer_duration(&timer.id, 5);
    assert_eq!(store.find_timer(&timer.id).unwrap().remaining_time, 5);

    seconds(5.0).await;
    assert_eq!(store.find_timer(&timer.id).unwrap().status, TimerStatus::Completed);
}

#[tokio::test]
async fn writes_reach_the_gateway_and_survive_a_restart() {
    let (storage, store) = memory_store();
    let tea = store.add_timer("Tea", 120, "Break", true);
    store.add_new_category("Chores");
    store.add_timer_log(&tea.id);
    store.flush().await;

    let stored = storage.get(TIMERS_KEY).unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 1);
    assert_eq!(stored[0]["name"], json!("Tea"));
    assert_eq!(storage.get(TIMER_LOGS_KEY).unwrap().as_array().unwrap().len(), 1);
    assert!(storage
        .get(CATEGORIES_KEY)
        .unwrap()
        .as_array()
        .unwrap()
        .contains(&json!("Chores")));

    let reopened = TimerStore::open(storage.clone()).await;
    let timers = reopened.timers();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].id, tea.id);
    assert!(timers[0].is_halfway_alert_enabled);
    assert_eq!(reopened.sorted_timer_logs().len(), 1);
    assert!(reopened.available_categories().contains(&"Chores".to_string()));
}

#[tokio::test]
async fn hydration_forces_idle_and_drops_bad_records() {
    let storage = Arc::new(
        MemoryStorage::new()
            .with_entry(
                TIMERS_KEY,
                json!([
                    {"id": "a", "name": "Run", "duration": 300, "remainingTime": 12,
                     "status": "running", "halfwayAlertTriggered": true, "category": "Workout"},
                    {"id": "b", "name": "Broken", "duration": -5},
                    {"id": "c", "name": "Zero", "duration": 0},
                    {"name": "No id", "duration": 30},
                    {"id": "a", "name": "Duplicate", "duration": 30},
                    {"id": "d", "name": "Defaults"},
                    "not an object"
                ]),
            )
            .with_entry(CATEGORIES_KEY, json!(["Chores", "Work", ""])),
    );

    let store = TimerStore::open(storage).await;
    let timers = store.timers();
    let ids: Vec<&str> = timers.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d"]);

    let run = &timers[0];
    assert_eq!(run.name, "Run");
    assert_eq!(run.status, TimerStatus::Idle);
    assert_eq!(run.remaining_time, 300);
    assert!(!run.halfway_alert_triggered);

    let defaults = &timers[1];
    assert_eq!(defaults.duration, 60);
    assert_eq!(defaults.category, "Uncategorized");

    let mut expected: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
    expected.push("Chores".to_string());
    assert_eq!(store.available_categories(), expected);
}

#[tokio::test]
async fn hydration_falls_back_entirely_when_a_read_fails() {
    let storage = Arc::new(FailingStorage {
        inner: MemoryStorage::new()
            .with_entry(TIMERS_KEY, json!([{"id": "a", "name": "Run", "duration": 300}]))
            .with_entry(CATEGORIES_KEY, json!(["Chores"])),
        failing_key: TIMER_LOGS_KEY,
    });

    let store = TimerStore::open(storage).await;
    assert!(store.timers().is_empty());
    assert!(store.sorted_timer_logs().is_empty());
    assert_eq!(store.available_categories(), DEFAULT_CATEGORIES.to_vec());
}

#[tokio::test]
async fn clear_all_data_wipes_the_gateway() {
    let (storage, store) = memory_store();
    store.add_timer("Tea", 120, "Break", false);
    store.flush().await;
    assert!(storage.get(TIMERS_KEY).is_some());

    store.clear_all_data();
    store.flush().await;

    assert!(storage.get(TIMERS_KEY).is_none());
    assert!(store.timers().is_empty());
    assert_eq!(store.available_categories(), DEFAULT_CATEGORIES.to_vec());
}
