//! The timer store: sole owner and writer of timers, history and categories

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{
    notification_bridge::NotificationBridge,
    snapshot::{
        new_id, validate_categories, validate_log, validate_timer, RecordSource, TimerLogSnapshot,
        TimerSnapshot,
    },
    timer::{CountdownHandle, Scheduler, TickOutcome, Timer, TimerStatus},
    timer_log::TimerLog,
};
use crate::{
    services::{Storage, StorageError, CATEGORIES_KEY, TIMERS_KEY, TIMER_LOGS_KEY},
    tasks::{countdown::spawn_countdown, persistence::PersistenceWriter},
};

/// Categories that are always offered, even on a fresh install
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Workout", "Study", "Break", "Work"];

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notifications published after every mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    TimersChanged,
    TimerLogsChanged,
    CategoriesChanged,
    /// A running timer lost one second
    TimerTicked { timer_id: String, remaining_time: u64 },
    /// A timer newly entered `completed`; fired once per run
    TimerCompleted { timer: TimerSnapshot },
    /// A running timer newly passed its halfway mark; fired once per run
    HalfwayReached { timer_id: String, timer_name: String },
}

/// Counts for status displays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub timers: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub logs: usize,
    pub categories: usize,
}

#[derive(Debug)]
struct Collections {
    timers: Vec<Timer>,
    logs: Vec<TimerLog>,
    categories: Vec<String>,
    bridge: NotificationBridge,
}

impl Collections {
    fn empty() -> Self {
        Self {
            timers: Vec::new(),
            logs: Vec::new(),
            categories: default_categories(),
            bridge: NotificationBridge::new(),
        }
    }

    fn timer_mut(&mut self, id: &str) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id() == id)
    }
}

/// Result of reading every key at startup
struct Loaded {
    timers: Vec<TimerSnapshot>,
    logs: Vec<TimerLogSnapshot>,
    categories: Vec<String>,
}

impl Loaded {
    fn fallback() -> Self {
        Self {
            timers: Vec::new(),
            logs: Vec::new(),
            categories: default_categories(),
        }
    }
}

/// Owns every timer, log and category
///
/// Commands update memory, queue a background write and return; they never
/// fail. Must be created inside a tokio runtime since running timers and the
/// persistence writer are tokio tasks.
#[derive(Debug)]
pub struct TimerStore {
    collections: Mutex<Collections>,
    storage: Arc<dyn Storage>,
    writer: PersistenceWriter,
    events_tx: broadcast::Sender<StoreEvent>,
    next_generation: AtomicU64,
    this: Weak<TimerStore>,
}

/// Spawns countdown tasks that tick back into the store
struct StoreScheduler<'a> {
    store: &'a TimerStore,
}

impl Scheduler for StoreScheduler<'_> {
    fn schedule(&self, timer_id: &str) -> CountdownHandle {
        let generation = self.store.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let task = spawn_countdown(self.store.this.clone(), timer_id.to_string(), generation);
        CountdownHandle::new(generation, task)
    }
}

impl TimerStore {
    /// Create an empty store with default categories; call [`hydrate`](Self::hydrate) next
    pub fn new(storage: Arc<dyn Storage>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let writer = PersistenceWriter::spawn(Arc::clone(&storage));

        Arc::new_cyclic(|this| Self {
            collections: Mutex::new(Collections::empty()),
            storage,
            writer,
            events_tx,
            next_generation: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Create a store and load persisted data into it
    pub async fn open(storage: Arc<dyn Storage>) -> Arc<Self> {
        let store = Self::new(storage);
        store.hydrate().await;
        store
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Wait until every persistence write queued so far has been attempted
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn scheduler(&self) -> StoreScheduler<'_> {
        StoreScheduler { store: self }
    }

    /// Run a mutation, detect completion/halfway edges, then publish events
    fn update<T>(&self, mutate: impl FnOnce(&mut Collections, &mut Vec<StoreEvent>) -> T) -> T {
        let mut events = Vec::new();
        let result = {
            let mut collections = self.lock();
            let result = mutate(&mut collections, &mut events);
            self.observe_transitions(&mut collections, &mut events);
            result
        };

        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
        result
    }

    fn observe_transitions(&self, c: &mut Collections, events: &mut Vec<StoreEvent>) {
        let transitions = c.bridge.observe(&c.timers);
        if transitions.is_empty() {
            return;
        }

        for id in &transitions.completed {
            if let Some(timer) = c.timers.iter().find(|t| t.id() == id.as_str()) {
                info!("Timer \"{}\" completed, adding to history", timer.name());
                c.logs.insert(0, TimerLog::for_completed(timer));
                events.push(StoreEvent::TimerCompleted { timer: timer.snapshot() });
            }
        }
        if !transitions.completed.is_empty() {
            self.persist_logs(c);
            events.push(StoreEvent::TimerLogsChanged);
        }

        for id in transitions.halfway {
            if let Some(timer) = c.timers.iter().find(|t| t.id() == id) {
                info!("Timer \"{}\" reached its halfway mark", timer.name());
                events.push(StoreEvent::HalfwayReached {
                    timer_id: id,
                    timer_name: timer.name().to_string(),
                });
            }
        }
    }

    // Persistence

    fn persist_timers(&self, c: &Collections) {
        let snapshots: Vec<TimerSnapshot> = c.timers.iter().map(Timer::snapshot).collect();
        self.queue_write(TIMERS_KEY, &snapshots, c.timers.len());
    }

    fn persist_logs(&self, c: &Collections) {
        let snapshots: Vec<TimerLogSnapshot> = c.logs.iter().map(TimerLog::snapshot).collect();
        self.queue_write(TIMER_LOGS_KEY, &snapshots, c.logs.len());
    }

    fn persist_categories(&self, c: &Collections) {
        self.queue_write(CATEGORIES_KEY, &c.categories, c.categories.len());
    }

    fn queue_write<T: Serialize>(&self, key: &'static str, value: &T, count: usize) {
        match serde_json::to_value(value) {
            Ok(value) => {
                debug!("Queued save of {} ({} entries)", key, count);
                self.writer.save(key, value);
            }
            Err(e) => error!("Failed to serialize {}: {}", key, e),
        }
    }

    // Hydration

    /// Replace every collection with what the gateway holds
    ///
    /// Timers always come back idle with their full duration. If any key
    /// cannot be read, all three collections fall back to their defaults.
    pub async fn hydrate(&self) {
        let loaded = match self.load_stored_data().await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to load stored data, starting from defaults: {}", e);
                Loaded::fallback()
            }
        };

        info!(
            "Loaded {} timers, {} log entries, {} categories",
            loaded.timers.len(),
            loaded.logs.len(),
            loaded.categories.len()
        );

        self.update(|c, events| {
            for timer in c.timers.iter_mut() {
                timer.destroy();
            }
            c.timers = loaded.timers.into_iter().map(Timer::from_snapshot).collect();
            c.logs = loaded.logs.into_iter().map(TimerLog::from_snapshot).collect();
            c.categories = loaded.categories;
            c.bridge.prime(&c.timers);

            events.push(StoreEvent::TimersChanged);
            events.push(StoreEvent::TimerLogsChanged);
            events.push(StoreEvent::CategoriesChanged);
        });
    }

    async fn load_stored_data(&self) -> Result<Loaded, StorageError> {
        let timers = match self.storage.load(TIMERS_KEY).await? {
            Some(Value::Array(records)) => {
                let mut seen = HashSet::new();
                records
                    .iter()
                    .filter_map(|raw| match validate_timer(raw, RecordSource::Hydration) {
                        Ok(snapshot) => Some(snapshot),
                        Err(reason) => {
                            warn!("Dropping stored timer: {}", reason);
                            None
                        }
                    })
                    .filter(|snapshot| {
                        let fresh = seen.insert(snapshot.id.clone());
                        if !fresh {
                            warn!("Dropping stored timer with duplicate id {}", snapshot.id);
                        }
                        fresh
                    })
                    .collect()
            }
            Some(_) => {
                warn!("Stored timers are not a list, ignoring them");
                Vec::new()
            }
            None => Vec::new(),
        };

        let logs = match self.storage.load(TIMER_LOGS_KEY).await? {
            Some(Value::Array(records)) => records
                .iter()
                .filter_map(|raw| match validate_log(raw) {
                    Ok(snapshot) => Some(snapshot),
                    Err(reason) => {
                        warn!("Dropping stored log entry: {}", reason);
                        None
                    }
                })
                .collect(),
            Some(_) => {
                warn!("Stored timer logs are not a list, ignoring them");
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut categories = default_categories();
        if let Some(stored) = self.storage.load(CATEGORIES_KEY).await? {
            for category in validate_categories(&stored) {
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
        }

        Ok(Loaded { timers, logs, categories })
    }

    // Collection commands

    /// Append a new idle timer; name and duration are validated by the caller
    pub fn add_timer(
        &self,
        name: &str,
        duration: u64,
        category: &str,
        halfway_alert: bool,
    ) -> TimerSnapshot {
        self.update(|c, events| {
            let timer = Timer::new(new_id(), name, duration, category, halfway_alert);
            let snapshot = timer.snapshot();
            info!("Added timer \"{}\" ({}s, {})", name, duration, category);

            c.timers.push(timer);
            self.persist_timers(c);
            events.push(StoreEvent::TimersChanged);
            snapshot
        })
    }

    /// Cancel the timer's countdown and drop it from the collection
    pub fn remove_timer(&self, id: &str) -> bool {
        self.update(|c, events| {
            let Some(index) = c.timers.iter().position(|t| t.id() == id) else {
                return false;
            };
            let mut timer = c.timers.remove(index);
            timer.destroy();
            info!("Removed timer \"{}\"", timer.name());

            self.persist_timers(c);
            events.push(StoreEvent::TimersChanged);
            true
        })
    }

    /// Prepend a history entry for `id`'s current name and duration
    ///
    /// Completions are logged automatically; this is for callers recording a
    /// completion by other means.
    pub fn add_timer_log(&self, id: &str) -> bool {
        self.update(|c, events| {
            let Some(timer) = c.timers.iter().find(|t| t.id() == id) else {
                return false;
            };
            c.logs.insert(0, TimerLog::for_completed(timer));
            self.persist_logs(c);
            events.push(StoreEvent::TimerLogsChanged);
            true
        })
    }

    /// Add a user category; blank and duplicate names are ignored
    pub fn add_new_category(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.update(|c, events| {
            if c.categories.iter().any(|existing| existing == name) {
                return false;
            }
            c.categories.push(name.to_string());
            info!("Added category \"{}\"", name);

            self.persist_categories(c);
            events.push(StoreEvent::CategoriesChanged);
            true
        })
    }

    /// Validate and append imported timer records, returning how many were added
    ///
    /// Records are forced idle; records whose id already exists are skipped,
    /// as are records that fail validation.
    pub fn add_imported_timers(&self, records: &[Value]) -> usize {
        self.update(|c, events| {
            let mut ids: HashSet<String> = c.timers.iter().map(|t| t.id().to_string()).collect();
            let mut added = 0;

            for raw in records {
                match validate_timer(raw, RecordSource::Import) {
                    Ok(snapshot) if ids.contains(&snapshot.id) => {
                        debug!("Skipping imported timer with existing id {}", snapshot.id);
                    }
                    Ok(snapshot) => {
                        ids.insert(snapshot.id.clone());
                        c.timers.push(Timer::from_snapshot(snapshot));
                        added += 1;
                    }
                    Err(reason) => warn!("Skipping imported timer record: {}", reason),
                }
            }

            if added > 0 {
                self.persist_timers(c);
                events.push(StoreEvent::TimersChanged);
            }
            info!("Imported {} new timers", added);
            added
        })
    }

    /// Destroy every timer, forget history and user categories, wipe storage
    pub fn clear_all_data(&self) {
        self.update(|c, events| {
            for timer in c.timers.iter_mut() {
                timer.destroy();
            }
            *c = Collections::empty();
            self.writer.clear();
            warn!("All timers, history and categories cleared");

            events.push(StoreEvent::TimersChanged);
            events.push(StoreEvent::TimerLogsChanged);
            events.push(StoreEvent::CategoriesChanged);
        });
    }

    // Single-timer commands; unknown ids return false

    fn with_timer(
        &self,
        id: &str,
        persist: bool,
        apply: impl FnOnce(&mut Timer, &StoreScheduler<'_>),
    ) -> bool {
        let scheduler = self.scheduler();
        self.update(|c, events| {
            let Some(timer) = c.timer_mut(id) else {
                debug!("No timer with id {}", id);
                return false;
            };
            apply(timer, &scheduler);

            if persist {
                self.persist_timers(c);
            }
            events.push(StoreEvent::TimersChanged);
            true
        })
    }

    pub fn start_timer(&self, id: &str) -> bool {
        self.with_timer(id, false, |timer, scheduler| timer.start(scheduler))
    }

    pub fn pause_timer(&self, id: &str) -> bool {
        self.with_timer(id, false, |timer, _| timer.pause())
    }

    pub fn reset_timer(&self, id: &str) -> bool {
        self.with_timer(id, true, |timer, _| timer.reset())
    }

    pub fn acknowledge_completion(&self, id: &str) -> bool {
        self.with_timer(id, true, |timer, _| timer.acknowledge_completion())
    }

    pub fn toggle_halfway_alert(&self, id: &str, enabled: bool) -> bool {
        self.with_timer(id, true, |timer, _| timer.toggle_halfway_alert(enabled))
    }

    pub fn rename_timer(&self, id: &str, name: &str) -> bool {
        let name = name.trim();
        self.with_timer(id, true, |timer, _| {
            if !name.is_empty() {
                timer.set_name(name);
            }
        })
    }

    pub fn set_timer_duration(&self, id: &str, seconds: u64) -> bool {
        self.with_timer(id, true, |timer, _| timer.set_duration(seconds))
    }

    pub fn set_timer_category(&self, id: &str, category: &str) -> bool {
        let category = category.trim();
        self.with_timer(id, true, |timer, _| {
            if !category.is_empty() {
                timer.set_category(category);
            }
        })
    }

    // Bulk category commands; each returns how many timers it changed

    pub fn start_category_timers(&self, category: &str) -> usize {
        info!("Starting timers for category: {}", category);
        let scheduler = self.scheduler();
        self.update(|c, events| {
            let mut started = 0;
            for timer in c.timers.iter_mut().filter(|t| t.category() == category) {
                if matches!(timer.status(), TimerStatus::Idle | TimerStatus::Paused) {
                    timer.start(&scheduler);
                    started += 1;
                }
            }
            if started > 0 {
                events.push(StoreEvent::TimersChanged);
            }
            started
        })
    }

    pub fn pause_category_timers(&self, category: &str) -> usize {
        info!("Pausing timers for category: {}", category);
        self.update(|c, events| {
            let mut paused = 0;
            for timer in c.timers.iter_mut().filter(|t| t.category() == category) {
                if timer.status() == TimerStatus::Running {
                    timer.pause();
                    paused += 1;
                }
            }
            if paused > 0 {
                events.push(StoreEvent::TimersChanged);
            }
            paused
        })
    }

    pub fn reset_category_timers(&self, category: &str) -> usize {
        info!("Resetting timers for category: {}", category);
        self.update(|c, events| {
            let mut reset = 0;
            for timer in c.timers.iter_mut().filter(|t| t.category() == category) {
                timer.reset();
                reset += 1;
            }
            self.persist_timers(c);
            events.push(StoreEvent::TimersChanged);
            reset
        })
    }

    /// Deliver one tick from the countdown task of `generation`
    ///
    /// Returns whether that task should keep ticking. Ticks from a replaced
    /// or cancelled countdown are ignored.
    pub(crate) fn tick_timer(&self, id: &str, generation: u64) -> bool {
        self.update(|c, events| {
            let Some(timer) = c.timer_mut(id) else {
                return false;
            };
            if timer.countdown_generation() != Some(generation) {
                return false;
            }

            match timer.tick() {
                TickOutcome::Decremented => {
                    events.push(StoreEvent::TimerTicked {
                        timer_id: id.to_string(),
                        remaining_time: timer.remaining_time(),
                    });
                    true
                }
                TickOutcome::Completed => {
                    events.push(StoreEvent::TimersChanged);
                    false
                }
                TickOutcome::Ignored => false,
            }
        })
    }

    // Views

    /// All timers in creation order
    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.lock().timers.iter().map(Timer::snapshot).collect()
    }

    pub fn find_timer(&self, id: &str) -> Option<TimerSnapshot> {
        self.lock().timers.iter().find(|t| t.id() == id).map(Timer::snapshot)
    }

    /// Timers grouped by category, each group in creation order
    pub fn timers_by_category(&self) -> BTreeMap<String, Vec<TimerSnapshot>> {
        let mut grouped: BTreeMap<String, Vec<TimerSnapshot>> = BTreeMap::new();
        for timer in self.lock().timers.iter() {
            grouped.entry(timer.category().to_string()).or_default().push(timer.snapshot());
        }
        grouped
    }

    /// Known categories plus those in use, sorted and deduplicated
    pub fn categories(&self) -> Vec<String> {
        let c = self.lock();
        let mut all: Vec<String> = c
            .categories
            .iter()
            .cloned()
            .chain(c.timers.iter().map(|t| t.category().to_string()))
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Categories the user has added plus the defaults, in insertion order
    pub fn available_categories(&self) -> Vec<String> {
        self.lock().categories.clone()
    }

    /// History, most recent completion first
    pub fn sorted_timer_logs(&self) -> Vec<TimerLogSnapshot> {
        let c = self.lock();
        let mut logs: Vec<&TimerLog> = c.logs.iter().collect();
        logs.sort_by_key(|log| std::cmp::Reverse(log.completed_at()));
        logs.into_iter().map(TimerLog::snapshot).collect()
    }

    pub fn summary(&self) -> StoreSummary {
        let c = self.lock();
        let count = |status| c.timers.iter().filter(|t| t.status() == status).count();
        StoreSummary {
            timers: c.timers.len(),
            running: count(TimerStatus::Running),
            paused: count(TimerStatus::Paused),
            completed: count(TimerStatus::Completed),
            logs: c.logs.len(),
            categories: c.categories.len(),
        }
    }
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}
