//! Local reminders for freshly created tasks
//!
//! Scheduling runs on its own task, fed through a queue: whatever happens to a notification, the task that triggered
//! it has already been persisted and stays that way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::error::AgendaResult;
use crate::task::{Task, TaskId};

pub const NOTIFICATION_TITLE: &str = "Nueva tarea";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The user has not been asked yet
    Undetermined,
}

/// A one-shot local notification
#[derive(Clone, Debug, PartialEq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    /// The task this notification is about
    pub task_id: TaskId,
    pub play_default_sound: bool,
    /// Delay before the notification is delivered
    pub delay: Duration,
}

impl LocalNotification {
    pub fn for_task(task: &Task, delay: Duration) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: format!("Tarea: {}", task.name()),
            task_id: task.id().clone(),
            play_default_sound: true,
            delay,
        }
    }
}

/// The platform notification service
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn permission(&self) -> AgendaResult<Permission>;
    /// Ask the user. Returns the resulting permission
    async fn request_permission(&self) -> AgendaResult<Permission>;
    async fn schedule(&self, notification: LocalNotification) -> AgendaResult<()>;
}


/// The sending half of the notification queue. Cloning it is cheap
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<LocalNotification>,
    delay: Duration,
}

impl NotificationQueue {
    /// Start the worker that drains the queue. It stops once every `NotificationQueue` clone is dropped
    pub fn spawn(notifier: Arc<dyn Notifier>, delay: Duration) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(notifier, receiver));
        (Self { sender, delay }, handle)
    }

    /// Same as [`spawn`](Self::spawn), with the delay from the settings
    pub fn from_settings(notifier: Arc<dyn Notifier>, settings: &Settings) -> (Self, JoinHandle<()>) {
        Self::spawn(notifier, settings.notification_delay())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue a reminder for a new task. This never fails: a closed queue is only logged
    pub fn enqueue(&self, task: &Task) {
        let notification = LocalNotification::for_task(task, self.delay);
        if self.sender.send(notification).is_err() {
            log::warn!("Notification queue is closed, no reminder for task {}", task.id());
        }
    }
}

async fn run_worker(notifier: Arc<dyn Notifier>, mut receiver: mpsc::UnboundedReceiver<LocalNotification>) {
    while let Some(notification) = receiver.recv().await {
        let task_id = notification.task_id.clone();
        if let Err(err) = deliver(notifier.as_ref(), notification).await {
            log::warn!("Unable to schedule a notification for task {}: {}", task_id, err);
        }
    }
    log::debug!("Notification queue closed");
}

async fn deliver(notifier: &dyn Notifier, notification: LocalNotification) -> AgendaResult<()> {
    let mut permission = notifier.permission().await?;
    if permission != Permission::Granted {
        permission = notifier.request_permission().await?;
    }
    if permission != Permission::Granted {
        log::info!("Notifications are not allowed, skipping the reminder for task {}", notification.task_id);
        return Ok(());
    }

    log::debug!("Scheduling a notification for task {} in {:?}", notification.task_id, notification.delay);
    notifier.schedule(notification).await
}


/// Something the platform reports about a delivered notification
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationEvent {
    Received { task_id: TaskId },
    Responded { task_id: TaskId, action: String },
}

/// Listen to the "received" and "responded to" streams. Both are only logged
pub fn spawn_listeners(
    mut received: mpsc::UnboundedReceiver<NotificationEvent>,
    mut responded: mpsc::UnboundedReceiver<NotificationEvent>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let on_received = tokio::spawn(async move {
        while let Some(event) = received.recv().await {
            log::info!("Notification received: {:?}", event);
        }
    });
    let on_responded = tokio::spawn(async move {
        while let Some(event) = responded.recv().await {
            log::info!("Notification response: {:?}", event);
        }
    });
    (on_received, on_responded)
}
