//! The persisted key-value store every other part of this crate reads and writes
//!
//! Values are opaque strings (in practice, JSON documents). Each key is written atomically, and that is the only
//! consistency guarantee callers can rely on: nothing locks a group of keys together.

use async_trait::async_trait;

use crate::error::AgendaResult;

mod file_store;
pub use file_store::FileStore;
mod memory_store;
pub use memory_store::MemoryStore;

/// Names of the slots used by the app
pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const TEACHERS: &str = "docentes";
    pub const SUBJECTS: &str = "materias";
    pub const GROUPS: &str = "grupos";
    pub const ADMINISTRATORS: &str = "directivos";
    pub const SCHEDULES: &str = "horarios";
    pub const ACTIVITIES: &str = "actividades";
    pub const THEME: &str = "theme";
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    /// Written by a restore, with the time it happened
    pub const LAST_RESTORE_TIME: &str = "lastRestoreTime";
    /// Written by the task repository, with the last restore time it has reloaded from
    pub const LAST_CHECKED_RESTORE_TIME: &str = "lastCheckedRestoreTime";

    /// Every key the app knows about
    pub const ALL: [&str; 11] = [
        TASKS, TEACHERS, SUBJECTS, GROUPS, ADMINISTRATORS, SCHEDULES, ACTIVITIES,
        THEME, IS_LOGGED_IN, LAST_RESTORE_TIME, LAST_CHECKED_RESTORE_TIME,
    ];
}

/// An asynchronous string-keyed storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if there is none
    async fn get(&self, key: &str) -> AgendaResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> AgendaResult<()>;

    /// Removes `key`. Removing a missing key is not an error
    async fn remove(&self, key: &str) -> AgendaResult<()>;

    /// Returns every key that currently holds a value
    async fn all_keys(&self) -> AgendaResult<Vec<String>>;

    /// Fetches several keys at once
    async fn multi_get(&self, keys: &[String]) -> AgendaResult<Vec<(String, Option<String>)>> {
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(key).await?;
            result.push((key.clone(), value));
        }
        Ok(result)
    }

    /// Stores several key-value pairs. Pairs are written in order, and this stops at the first failure
    async fn multi_set(&self, pairs: &[(String, String)]) -> AgendaResult<()> {
        for (key, value) in pairs {
            self.set(key, value).await?;
        }
        Ok(())
    }
}
