//! The task repository: the in-memory task collection, kept in step with the persisted store
//!
//! Every mutation is written to the store before the call returns, then the calendar markers are rebuilt and
//! published. When a write fails, the error is returned but the in-memory change is kept: the next successful
//! write (or the next load) reconciles both sides.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use csscolorparser::Color;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{AgendaError, AgendaResult};
use crate::markers::{CalendarView, MarkerMap};
use crate::notification::NotificationQueue;
use crate::store::{keys, KeyValueStore};
use crate::task::{validate_name, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};

/// An immutable copy of the task collection, as published to subscribers
pub type TaskSnapshot = Arc<Vec<Task>>;

/// The tasks of one day, laid out on hourly slots
#[derive(Debug)]
pub struct Timeline<'a> {
    /// Tasks that have no time slot
    pub all_day: Vec<&'a Task>,
    /// One entry per hour, `00:00` to `23:00`, with the tasks running at that hour
    pub slots: Vec<(NaiveTime, Vec<&'a Task>)>,
}

pub struct TaskRepository<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,

    tasks: Vec<Task>,
    last_issued_id: i64,

    view: CalendarView,
    snapshots: watch::Sender<TaskSnapshot>,
    notifications: Option<NotificationQueue>,
}

impl<S: KeyValueStore> TaskRepository<S> {
    /// Create an empty repository. Call [`Self::load`] to fill it from the store
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, accent: Color) -> Self {
        let view = CalendarView::new(clock.today(), accent);
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            store,
            clock,
            tasks: Vec::new(),
            last_issued_id: 0,
            view,
            snapshots,
            notifications: None,
        }
    }

    /// Send a reminder through this queue whenever a task is created
    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Every task, in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// The tasks of a day, in insertion order
    pub fn list(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks.iter()
            .filter(|task| task.date() == date)
            .collect()
    }

    pub fn timeline(&self, date: NaiveDate) -> Timeline<'_> {
        let day = self.list(date);
        let all_day = day.iter()
            .filter(|task| task.time().is_none())
            .copied()
            .collect();

        let slots = (0..24)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .map(|slot| {
                let running = day.iter()
                    .filter(|task| task.time().map(|t| t.covers(slot)).unwrap_or(false))
                    .copied()
                    .collect();
                (slot, running)
            })
            .collect();

        Timeline { all_day, slots }
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.view.selected()
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.view.select(date, &self.tasks);
    }

    pub fn set_accent(&mut self, accent: Color) {
        self.view.set_accent(accent, &self.tasks);
    }

    /// The current marker map
    pub fn markers(&self) -> MarkerMap {
        self.view.markers()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_markers(&self) -> watch::Receiver<MarkerMap> {
        self.view.subscribe()
    }


    /// Replace the in-memory collection with the content of the store.
    ///
    /// A missing slot means "no task yet". A slot that cannot be parsed leaves an empty collection behind and
    /// returns [`AgendaError::CorruptState`]. A failed read leaves the collection untouched.
    pub async fn load(&mut self) -> AgendaResult<()> {
        let raw = self.store.get(keys::TASKS).await?;

        let result = match raw {
            None => {
                log::debug!("No task in the store yet");
                self.tasks = Vec::new();
                Ok(())
            },
            Some(raw) => match serde_json::from_str::<Vec<Task>>(&raw) {
                Ok(tasks) => {
                    log::debug!("Loaded {} tasks", tasks.len());
                    self.tasks = tasks;
                    Ok(())
                },
                Err(err) => {
                    log::error!("Stored tasks are corrupt ({}). Starting from an empty collection", err);
                    self.tasks = Vec::new();
                    Err(AgendaError::CorruptState { key: keys::TASKS.to_string(), reason: err.to_string() })
                },
            },
        };

        self.publish();
        result
    }

    async fn persist(&self) -> AgendaResult<()> {
        let serialized = serde_json::to_string(&self.tasks)
            .map_err(|err| AgendaError::StorageWrite { key: keys::TASKS.to_string(), reason: err.to_string() })?;
        if let Err(err) = self.store.set(keys::TASKS, &serialized).await {
            log::warn!("Unable to save tasks: {}. The in-memory collection is kept", err);
            return Err(err);
        }
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.tasks.clone()));
        self.view.refresh(&self.tasks);
    }

    /// Pick a time-based id that no task uses yet
    fn next_id(&mut self) -> TaskId {
        let mut candidate = self.clock.now().timestamp_millis().max(self.last_issued_id + 1);
        while self.tasks.iter().any(|task| task.id().as_str() == candidate.to_string()) {
            candidate += 1;
        }
        self.last_issued_id = candidate;
        TaskId::from(candidate.to_string())
    }

    fn position(&self, id: &TaskId) -> AgendaResult<usize> {
        self.tasks.iter()
            .position(|task| task.id() == id)
            .ok_or_else(|| AgendaError::NotFound(id.clone()))
    }


    /// Create a task on the draft's day (or the selected day), with the `pending` status
    pub async fn create(&mut self, draft: TaskDraft) -> AgendaResult<Task> {
        validate_name(&draft.name)?;
        let date = draft.date.unwrap_or_else(|| self.view.selected());
        let id = self.next_id();
        let task = Task::new(id, date, draft);
        log::info!("Creating task {} ({}) on {}", task.id(), task.name(), task.date());
        self.tasks.push(task.clone());

        let saved = self.persist().await;
        self.publish();
        saved?;

        if let Some(queue) = &self.notifications {
            queue.enqueue(&task);
        }
        Ok(task)
    }

    /// Edit the name, description, urgency or time slot of a task
    pub async fn update(&mut self, id: &TaskId, patch: TaskPatch) -> AgendaResult<Task> {
        let index = self.position(id)?;
        self.tasks[index].apply(patch)?;
        log::debug!("Updated task {}", id);

        let saved = self.persist().await;
        self.publish();
        saved?;
        Ok(self.tasks[index].clone())
    }

    /// Move a task to the next status of the `pending → in_progress → completed` cycle
    pub async fn advance_status(&mut self, id: &TaskId) -> AgendaResult<TaskStatus> {
        let index = self.position(id)?;
        self.tasks[index].advance_status();
        let status = self.tasks[index].status();
        log::debug!("Task {} is now {:?}", id, status);

        let saved = self.persist().await;
        self.publish();
        saved?;
        Ok(status)
    }

    pub async fn delete(&mut self, id: &TaskId) -> AgendaResult<Task> {
        let index = self.position(id)?;
        let removed = self.tasks.remove(index);
        log::info!("Deleted task {} ({})", removed.id(), removed.name());

        let saved = self.persist().await;
        self.publish();
        saved?;
        Ok(removed)
    }


    async fn read_timestamp(&self, key: &str) -> AgendaResult<Option<DateTime<Utc>>> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|err| AgendaError::CorruptState { key: key.to_string(), reason: err.to_string() }),
        }
    }

    /// Reload from the store if a restore happened since the last check.
    ///
    /// Returns whether a reload happened.
    pub async fn check_for_restore(&mut self) -> AgendaResult<bool> {
        let restored_at = match self.read_timestamp(keys::LAST_RESTORE_TIME).await? {
            None => return Ok(false),
            Some(dt) => dt,
        };
        let checked_at = self.read_timestamp(keys::LAST_CHECKED_RESTORE_TIME).await?;
        if let Some(checked_at) = checked_at {
            if checked_at >= restored_at {
                return Ok(false);
            }
        }

        log::info!("A restore happened at {}, reloading tasks", restored_at);
        // A corrupt slot still counts as seen, so later polls leave it alone
        let loaded = match self.load().await {
            Err(err @ AgendaError::CorruptState { .. }) => Err(err),
            Err(err) => return Err(err),
            Ok(()) => Ok(()),
        };
        self.store.set(keys::LAST_CHECKED_RESTORE_TIME, &restored_at.to_rfc3339()).await?;
        loaded.map(|_| true)
    }

    /// To be called when the app comes back to the foreground
    pub async fn on_foreground(&mut self) -> AgendaResult<bool> {
        let today = self.clock.today();
        self.view.set_today(today, &self.tasks);
        self.check_for_restore().await
    }
}


/// [`spawn_restore_watcher`], polling every `settings.restore_poll_interval()`
pub fn watch_restores<S>(
    repository: Arc<Mutex<TaskRepository<S>>>,
    restores: watch::Receiver<Option<DateTime<Utc>>>,
    settings: &Settings,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
{
    spawn_restore_watcher(repository, restores, settings.restore_poll_interval())
}

/// Keep a shared repository in step with restores.
///
/// It reacts at once to restore events, and also polls the restore marker keys every `interval` (this catches
/// restores made by another process, or before this one started). Errors are only logged.
pub fn spawn_restore_watcher<S>(
    repository: Arc<Mutex<TaskRepository<S>>>,
    mut restores: watch::Receiver<Option<DateTime<Utc>>>,
    interval: Duration,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut bus_open = true;

        loop {
            tokio::select! {
                changed = restores.changed(), if bus_open => {
                    if changed.is_err() {
                        log::debug!("Restore events are gone, falling back to polling only");
                        bus_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => {},
            }

            let mut repository = repository.lock().await;
            match repository.check_for_restore().await {
                Ok(true) => log::info!("Tasks reloaded after a restore"),
                Ok(false) => {},
                Err(err) => log::warn!("Unable to check for a restore: {}", err),
            }
        }
    })
}
