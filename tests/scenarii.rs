//! End-to-end scenarios of the task repository against a persisted store


use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use school_agenda::notification::{NotificationQueue, Permission};
use school_agenda::store::{keys, FileStore, KeyValueStore, MemoryStore};
use school_agenda::{Settings, TaskDraft, TaskPatch, TaskRepository, TaskStatus, Theme, TimeSlot, Urgency};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

#[tokio::test]
async fn exam_lifecycle() {
    mocks::init_logs();

    let store = Arc::new(MemoryStore::new());
    let mut repo = TaskRepository::new(store, mocks::clock(), Theme::Light.accent());
    repo.load().await.unwrap();
    assert!(repo.tasks().is_empty());

    let exam = repo.create(TaskDraft::new("Exam").on(day(10))).await.unwrap();
    assert_eq!(exam.status(), TaskStatus::Pending);
    assert!(exam.id().as_str().is_empty() == false);
    assert_eq!(repo.list(day(10)).len(), 1);

    assert_eq!(repo.advance_status(exam.id()).await.unwrap(), TaskStatus::InProgress);
    assert_eq!(repo.get(exam.id()).unwrap().status(), TaskStatus::InProgress);

    repo.delete(exam.id()).await.unwrap();
    assert!(repo.list(day(10)).is_empty());
}

#[tokio::test]
async fn memory_always_matches_a_fresh_load() {
    mocks::init_logs();

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let mut repo = TaskRepository::new(store.clone(), mocks::clock(), Theme::Light.accent());
    repo.load().await.unwrap();

    let a = repo.create(TaskDraft::new("Read chapter 3").on(day(9))).await.unwrap();
    let b = repo.create(TaskDraft::new("Exam").on(day(10)).with_urgency(Urgency::High)).await.unwrap();
    let c = repo.create(TaskDraft::new("Lab").on(day(10)).with_time(TimeSlot::parse("10:00", "12:00").unwrap())).await.unwrap();
    repo.advance_status(a.id()).await.unwrap();
    repo.update(b.id(), TaskPatch {
        description: Some("Chapters 1 to 4".to_string()),
        urgency: Some(Urgency::Low),
        ..TaskPatch::default()
    }).await.unwrap();
    repo.delete(c.id()).await.unwrap();
    repo.advance_status(b.id()).await.unwrap();

    let mut fresh = TaskRepository::new(store, mocks::clock(), Theme::Light.accent());
    fresh.load().await.unwrap();
    assert_eq!(fresh.tasks(), repo.tasks());

    // Insertion order is preserved
    let names: Vec<&str> = fresh.tasks().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["Read chapter 3", "Exam"]);
    assert_eq!(fresh.tasks()[1].description(), "Chapters 1 to 4");
    assert_eq!(fresh.tasks()[1].date(), day(10));
}

#[tokio::test]
async fn three_advances_make_a_full_cycle() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = TaskRepository::new(store, mocks::clock(), Theme::Light.accent());

    let mut ids = Vec::new();
    for name in &["a", "b", "c"] {
        ids.push(repo.create(TaskDraft::new(name)).await.unwrap().id().clone());
    }
    // Put them in different stages first
    repo.advance_status(&ids[1]).await.unwrap();
    repo.advance_status(&ids[2]).await.unwrap();
    repo.advance_status(&ids[2]).await.unwrap();

    for id in &ids {
        let before = repo.get(id).unwrap().status();
        for _ in 0..3 {
            repo.advance_status(id).await.unwrap();
        }
        assert_eq!(repo.get(id).unwrap().status(), before);
    }
}

#[tokio::test]
async fn selected_today_markers() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = TaskRepository::new(store, mocks::clock(), Theme::Light.accent());
    repo.select_date(day(10));
    repo.create(TaskDraft::new("Exam").on(day(10))).await.unwrap();

    let markers = repo.markers();
    let marker = &markers[&day(10)];
    assert!(marker.current_day);
    assert!(marker.selected);
    assert!(marker.marked);
    assert!(marker.custom_styles.is_some());
    assert!(marker.selected_color.is_some());
}

#[tokio::test]
async fn only_creations_are_notified() {
    mocks::init_logs();

    let notifier = Arc::new(mocks::RecordingNotifier::new(Permission::Granted));
    let settings = Settings { notification_delay_secs: 5, ..Settings::default() };
    let (queue, worker) = NotificationQueue::from_settings(notifier.clone(), &settings);
    assert_eq!(queue.delay(), Duration::from_secs(5));

    let store = Arc::new(MemoryStore::new());
    let mut repo = TaskRepository::new(store.clone(), mocks::clock(), Theme::Light.accent())
        .with_notifications(queue);

    let task = repo.create(TaskDraft::new("Parents meeting")).await.unwrap();
    repo.advance_status(task.id()).await.unwrap();
    repo.update(task.id(), TaskPatch { urgency: Some(Urgency::High), ..TaskPatch::default() }).await.unwrap();

    drop(repo);
    worker.await.unwrap();

    let scheduled = notifier.scheduled.lock().unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(&scheduled[0].task_id, task.id());
    assert!(scheduled[0].body.contains("Parents meeting"));
    assert_eq!(scheduled[0].delay, Duration::from_secs(5));
}

#[tokio::test]
async fn denied_notifications_do_not_affect_tasks() {
    let notifier = Arc::new(mocks::RecordingNotifier::new(Permission::Denied));
    let (queue, worker) = NotificationQueue::spawn(notifier.clone(), Duration::from_secs(2));

    let store = Arc::new(MemoryStore::new());
    let mut repo = TaskRepository::new(store.clone(), mocks::clock(), Theme::Light.accent())
        .with_notifications(queue);
    repo.create(TaskDraft::new("Quiet task")).await.unwrap();
    drop(repo);
    worker.await.unwrap();

    assert!(notifier.scheduled.lock().unwrap().is_empty());
    let raw = store.get(keys::TASKS).await.unwrap().unwrap();
    assert!(raw.contains("Quiet task"));
}
