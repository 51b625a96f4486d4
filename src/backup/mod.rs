//! Backups of the task collection, to a local file or to cloud storage, and the way back
//!
//! A backup bundle is a JSON array of tasks. Restoring one replaces the whole `tasks` slot (there is no merge),
//! stamps the `lastRestoreTime` key, and announces the restore to whoever subscribed, so that task repositories
//! reload without waiting for their next poll.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{AgendaError, AgendaResult};
use crate::store::{keys, KeyValueStore};
use crate::task::Task;

mod platform;
pub use platform::{FilePicker, ShareSheet};
pub mod remote;
pub use remote::{HttpObjectStore, RemoteObject, RemoteStorage};
mod background;
pub use background::BackgroundBackup;

/// Fields every task of a bundle must carry, as non-empty strings
const REQUIRED_FIELDS: [&str; 4] = ["id", "name", "date", "status"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Local,
    Remote,
}

/// Where a backup has been written
#[derive(Clone, Debug, PartialEq)]
pub enum BackupLocation {
    File(PathBuf),
    /// A path inside the remote bucket
    Remote(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackupReport {
    pub file_name: String,
    pub location: BackupLocation,
    pub task_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RestoreOutcome {
    Restored { task_count: usize, restored_at: DateTime<Utc> },
    /// The user closed the file picker
    Cancelled,
    /// There is no remote backup at all
    NothingToRestore,
}


/// The name of a backup file made at `now`, e.g. `respaldo-actividades-2024-05-10T14-03-22-123Z.json`
pub fn backup_file_name(prefix: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    sanitize_filename::sanitize(format!("{}-{}.json", prefix, timestamp))
}

/// Serialize the task slot of a store into a backup bundle.
///
/// Returns the bundle and the number of tasks it holds. Stored tasks that cannot be parsed are not exported.
pub async fn export_bundle<S: KeyValueStore + ?Sized>(store: &S) -> AgendaResult<(String, usize)> {
    let tasks: Vec<Task> = match store.get(keys::TASKS).await? {
        None => Vec::new(),
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|err| AgendaError::CorruptState { key: keys::TASKS.to_string(), reason: err.to_string() })?,
    };
    let bundle = serde_json::to_string_pretty(&tasks)
        .map_err(|err| AgendaError::StorageRead { key: keys::TASKS.to_string(), reason: err.to_string() })?;
    Ok((bundle, tasks.len()))
}

/// Check that a bundle is a JSON array of well-formed tasks, and parse it
pub fn validate_bundle(text: &str) -> AgendaResult<Vec<Task>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| AgendaError::InvalidBackupFormat(format!("not a JSON document: {}", err)))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(map) if map.keys().any(|key| keys::ALL.contains(&key.as_str())) => {
            return Err(AgendaError::InvalidBackupFormat("this is a whole-store backup, only task backups can be restored".to_string()));
        },
        _ => return Err(AgendaError::InvalidBackupFormat("a backup must be a JSON array of tasks".to_string())),
    };

    let mut seen_ids = HashSet::new();
    let mut tasks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        for field in REQUIRED_FIELDS.iter() {
            match entry.get(field) {
                Some(Value::String(s)) if s.trim().is_empty() == false => {},
                _ => return Err(AgendaError::InvalidBackupFormat(format!("task #{} has no valid {:?}", index, field))),
            }
        }

        let task: Task = serde_json::from_value(entry)
            .map_err(|err| AgendaError::InvalidBackupFormat(format!("task #{} is malformed: {}", index, err)))?;
        if let Some(slot) = task.time() {
            if slot.start() >= slot.end() {
                return Err(AgendaError::InvalidBackupFormat(format!("task #{} ends before it starts", index)));
            }
        }
        if seen_ids.insert(task.id().clone()) == false {
            return Err(AgendaError::InvalidBackupFormat(format!("task id {} is used twice", task.id())));
        }
        tasks.push(task);
    }
    Ok(tasks)
}

/// Write a bundle to a new file. An existing file is never overwritten
pub(crate) async fn write_new_file(dir: &Path, file_name: &str, contents: &str) -> AgendaResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);

    let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(AgendaError::StorageWrite { key: file_name.to_string(), reason: "a backup with this name already exists".to_string() });
        },
        Err(err) => return Err(err.into()),
    };
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    Ok(path)
}


/// Creates and restores backups on behalf of the user
pub struct BackupCoordinator<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: Settings,

    share_sheet: Arc<dyn ShareSheet>,
    file_picker: Arc<dyn FilePicker>,
    remote: Option<Arc<dyn RemoteStorage>>,

    restores: watch::Sender<Option<DateTime<Utc>>>,
}

impl<S: KeyValueStore> BackupCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        settings: Settings,
        share_sheet: Arc<dyn ShareSheet>,
        file_picker: Arc<dyn FilePicker>,
    ) -> Self {
        let (restores, _) = watch::channel(None);
        Self { store, clock, settings, share_sheet, file_picker, remote: None, restores }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStorage>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Restore events: the time of the latest restore made through this coordinator
    pub fn subscribe_restores(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.restores.subscribe()
    }

    fn remote(&self) -> AgendaResult<&Arc<dyn RemoteStorage>> {
        self.remote.as_ref()
            .ok_or_else(|| AgendaError::Network("no remote storage is configured".to_string()))
    }

    fn remote_prefix(&self) -> String {
        self.settings.remote.as_ref()
            .map(|remote| remote.prefix.clone())
            .unwrap_or_else(|| "backups".to_string())
    }

    pub async fn create_backup(&self, destination: Destination) -> AgendaResult<BackupReport> {
        let (bundle, task_count) = export_bundle(self.store.as_ref()).await?;
        let file_name = backup_file_name(&self.settings.backup_prefix, self.clock.now());

        let location = match destination {
            Destination::Local => {
                let path = write_new_file(&self.settings.local_backup_dir(), &file_name, &bundle).await?;
                self.share_sheet.share(&path).await?;
                BackupLocation::File(path)
            },
            Destination::Remote => {
                let path = format!("{}/{}", self.remote_prefix(), file_name);
                self.remote()?.upload(&path, &bundle).await?;
                BackupLocation::Remote(path)
            },
        };

        log::info!("Backed up {} tasks to {:?}", task_count, location);
        Ok(BackupReport { file_name, location, task_count })
    }

    pub async fn restore_backup(&self, source: Source) -> AgendaResult<RestoreOutcome> {
        let bundle = match source {
            Source::Local => {
                let path = match self.file_picker.pick().await? {
                    None => return Ok(RestoreOutcome::Cancelled),
                    Some(path) => path,
                };
                log::info!("Restoring tasks from {:?}", path);
                let bytes = tokio::fs::read(&path).await?;
                String::from_utf8(bytes)
                    .map_err(|err| AgendaError::InvalidBackupFormat(format!("not a text file: {}", err)))?
            },
            Source::Remote => {
                let remote = self.remote()?;
                let prefix = self.remote_prefix();
                let latest = remote.list(&prefix).await?
                    .into_iter()
                    .max_by_key(|object| object.created_at);
                let latest = match latest {
                    None => return Ok(RestoreOutcome::NothingToRestore),
                    Some(object) => object,
                };
                log::info!("Restoring tasks from remote backup {} ({})", latest.name, latest.created_at);
                remote.download(&format!("{}/{}", prefix, latest.name)).await?
            },
        };

        self.apply(&bundle).await
    }

    /// Validate a bundle, then replace the task slot with it.
    ///
    /// The task slot and the restore marker go together: if the marker cannot be written, the previous tasks are
    /// put back. Should that fail too, the restore is announced anyway, so that repositories pick up what the
    /// store now holds instead of overwriting it.
    async fn apply(&self, bundle: &str) -> AgendaResult<RestoreOutcome> {
        let tasks = validate_bundle(bundle)?;
        let serialized = serde_json::to_string(&tasks)
            .map_err(|err| AgendaError::StorageWrite { key: keys::TASKS.to_string(), reason: err.to_string() })?;
        let previous = self.store.get(keys::TASKS).await?;
        self.store.set(keys::TASKS, &serialized).await?;

        let restored_at = self.next_restore_time().await;
        if let Err(err) = self.store.set(keys::LAST_RESTORE_TIME, &restored_at.to_rfc3339()).await {
            log::warn!("Unable to mark the restore, putting the previous tasks back: {}", err);
            let rollback = match &previous {
                Some(old) => self.store.set(keys::TASKS, old).await,
                None => self.store.remove(keys::TASKS).await,
            };
            if let Err(rollback_err) = rollback {
                log::error!("Unable to put the previous tasks back: {}. The restored tasks stay", rollback_err);
                self.restores.send_replace(Some(restored_at));
            }
            return Err(err);
        }
        self.restores.send_replace(Some(restored_at));

        log::info!("Restored {} tasks", tasks.len());
        Ok(RestoreOutcome::Restored { task_count: tasks.len(), restored_at })
    }

    /// Restore times strictly increase, so that every restore is noticed
    async fn next_restore_time(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let previous = match self.store.get(keys::LAST_RESTORE_TIME).await {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        };
        match previous {
            Some(previous) if previous >= now => previous + Duration::milliseconds(1),
            _ => now,
        }
    }
}
