//! Support for library configuration options
//!
//! There is no global configuration: build a [`Settings`] once at startup and hand it to the constructors that need it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AgendaError, AgendaResult};

/// The background export may not run more often than this
pub const MIN_BACKGROUND_BACKUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The application's document directory. Local backups are written there
    pub documents_dir: PathBuf,
    /// Manual local backups go to this subfolder of `documents_dir`, if set
    pub local_backup_subdir: Option<String>,
    /// Unattended backups go to this subfolder of `documents_dir`
    pub background_backup_subdir: String,
    /// Backup file names start with this
    pub backup_prefix: String,

    pub background_backup_interval_secs: u64,
    pub restore_poll_interval_secs: u64,
    /// How long after a task creation its reminder is shown
    pub notification_delay_secs: u64,

    pub remote: Option<RemoteSettings>,
}

/// Where cloud backups live
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the object storage API
    pub endpoint: Url,
    pub api_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_bucket() -> String { "backups".to_string() }
fn default_prefix() -> String { "backups".to_string() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("agenda-documents"),
            local_backup_subdir: None,
            background_backup_subdir: "backups".to_string(),
            backup_prefix: "respaldo-actividades".to_string(),
            background_backup_interval_secs: MIN_BACKGROUND_BACKUP_INTERVAL.as_secs(),
            restore_poll_interval_secs: 5,
            notification_delay_secs: 2,
            remote: None,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing fields take their default value
    pub fn from_file(path: &Path) -> AgendaResult<Self> {
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(file)
            .map_err(|err| AgendaError::Validation(format!("invalid settings file {:?}: {}", path, err)))
    }

    /// Where the persisted store keeps its files
    pub fn store_dir(&self) -> PathBuf {
        self.documents_dir.join("store")
    }

    pub fn local_backup_dir(&self) -> PathBuf {
        match &self.local_backup_subdir {
            Some(subdir) => self.documents_dir.join(subdir),
            None => self.documents_dir.clone(),
        }
    }

    pub fn background_backup_dir(&self) -> PathBuf {
        self.documents_dir.join(&self.background_backup_subdir)
    }

    /// The background backup interval, never shorter than [`MIN_BACKGROUND_BACKUP_INTERVAL`]
    pub fn background_backup_interval(&self) -> Duration {
        let wanted = Duration::from_secs(self.background_backup_interval_secs);
        if wanted < MIN_BACKGROUND_BACKUP_INTERVAL {
            log::warn!("Background backups cannot run every {:?}, using {:?} instead", wanted, MIN_BACKGROUND_BACKUP_INTERVAL);
            return MIN_BACKGROUND_BACKUP_INTERVAL;
        }
        wanted
    }

    pub fn restore_poll_interval(&self) -> Duration {
        Duration::from_secs(self.restore_poll_interval_secs.max(1))
    }

    pub fn notification_delay(&self) -> Duration {
        Duration::from_secs(self.notification_delay_secs)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{
            "documents_dir": "/data/agenda",
            "local_backup_subdir": "backups",
            "background_backup_interval_secs": 60,
            "remote": { "endpoint": "https://storage.example.com/storage/v1/", "api_key": "secret" }
        }"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.local_backup_dir(), PathBuf::from("/data/agenda/backups"));
        assert_eq!(settings.background_backup_dir(), PathBuf::from("/data/agenda/backups"));
        assert_eq!(settings.backup_prefix, "respaldo-actividades");
        assert_eq!(settings.background_backup_interval(), MIN_BACKGROUND_BACKUP_INTERVAL);

        let remote = settings.remote.unwrap();
        assert_eq!(remote.bucket, "backups");
        assert_eq!(remote.prefix, "backups");
    }

    #[test]
    fn durations() {
        let settings = Settings::default();
        assert_eq!(settings.restore_poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.notification_delay(), Duration::from_secs(2));

        let hurried = Settings { restore_poll_interval_secs: 0, notification_delay_secs: 0, ..Settings::default() };
        assert_eq!(hurried.restore_poll_interval(), Duration::from_secs(1));
        assert_eq!(hurried.notification_delay(), Duration::ZERO);
    }

    #[test]
    fn broken_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::from_file(&path), Err(AgendaError::Validation(_))));
        assert!(matches!(Settings::from_file(&dir.path().join("missing.json")), Err(AgendaError::Io(_))));
    }
}
