use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::AgendaResult;
use crate::store::KeyValueStore;
use super::{backup_file_name, export_bundle, write_new_file};

/// Unattended, periodic exports of the task collection into a dedicated folder.
///
/// Nothing is ever reported to the user: every outcome ends up in the logs.
pub struct BackgroundBackup<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    dir: PathBuf,
    prefix: String,
    interval: Duration,
}

impl<S: KeyValueStore + 'static> BackgroundBackup<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            store,
            clock,
            dir: settings.background_backup_dir(),
            prefix: settings.backup_prefix.clone(),
            interval: settings.background_backup_interval(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Perform a single export. Returns the file that has been written
    pub async fn run_once(&self) -> AgendaResult<PathBuf> {
        let (bundle, task_count) = export_bundle(self.store.as_ref()).await?;
        let file_name = backup_file_name(&self.prefix, self.clock.now());
        let path = write_new_file(&self.dir, &file_name, &bundle).await?;
        log::info!("Background backup of {} tasks written to {:?}", task_count, path);
        Ok(path)
    }

    /// Run an export every interval, the first one after one interval, until the handle is aborted
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once().await {
                    log::error!("Background backup failed: {}", err);
                }
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::clock::FixedClock;
    use crate::mock_behaviour::MockBehaviour;
    use crate::store::{keys, MemoryStore};

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            documents_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn exports_into_the_backup_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.set(keys::TASKS, r#"[{"id":"1","name":"Exam","date":"2024-05-10","status":"pending","urgency":"high"}]"#).await.unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap()));

        let backup = BackgroundBackup::new(store, clock.clone(), &settings_in(dir.path()));
        assert_eq!(backup.interval(), Duration::from_secs(3600));

        let path = backup.run_once().await.unwrap();
        assert_eq!(path, dir.path().join("backups").join("respaldo-actividades-2024-05-10T14-00-00-000Z.json"));
        let tasks = crate::backup::validate_bundle(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(tasks[0].name(), "Exam");

        // Same instant, same name: the first file is left alone
        assert!(backup.run_once().await.is_err());
        clock.advance(chrono::Duration::hours(1));
        assert!(backup.run_once().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_outlives_a_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let store = Arc::new(MemoryStore::with_behaviour(MockBehaviour::fail_now(1)));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap()));
        let handle = BackgroundBackup::new(store, clock, &settings).spawn();
        tokio::task::yield_now().await;

        let count_files = || match std::fs::read_dir(settings.background_backup_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        };

        // Nothing happens before the first interval has elapsed
        tokio::time::advance(Duration::from_secs(3599)).await;
        tokio::task::yield_now().await;
        assert_eq!(count_files(), 0);

        // First run fails on the store, the second one writes its file.
        // Later runs (at the same fixed clock time) are refused, and never overwrite it
        tokio::time::advance(Duration::from_secs(3600 + 1)).await;
        for _ in 0..1000 {
            if count_files() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count_files(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn failures_are_returned_to_the_caller_of_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::with_behaviour(MockBehaviour::fail_now(1)));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap()));
        let backup = BackgroundBackup::new(store, clock, &settings_in(dir.path()));
        assert!(backup.run_once().await.is_err());
        assert!(backup.run_once().await.is_ok());
    }
}
