use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AgendaError, AgendaResult};
use crate::mock_behaviour::MockBehaviour;
use super::KeyValueStore;

/// A store that only lives in memory.
///
/// It can be given a [`MockBehaviour`] to simulate failing reads or writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
    mock_behaviour: Mutex<MockBehaviour>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(mock_behaviour: MockBehaviour) -> Self {
        Self {
            values: Mutex::new(BTreeMap::new()),
            mock_behaviour: Mutex::new(mock_behaviour),
        }
    }

    /// Replace the current behaviour (e.g. to make the next writes fail)
    pub fn set_behaviour(&self, mock_behaviour: MockBehaviour) {
        *self.mock_behaviour.lock().unwrap() = mock_behaviour;
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        self.mock_behaviour.lock().unwrap().can_get()
            .map_err(|reason| AgendaError::StorageRead { key: key.to_string(), reason })?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AgendaResult<()> {
        self.mock_behaviour.lock().unwrap().can_set()
            .map_err(|reason| AgendaError::StorageWrite { key: key.to_string(), reason })?;
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AgendaResult<()> {
        self.mock_behaviour.lock().unwrap().can_remove()
            .map_err(|reason| AgendaError::StorageWrite { key: key.to_string(), reason })?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn all_keys(&self) -> AgendaResult<Vec<String>> {
        self.mock_behaviour.lock().unwrap().can_get()
            .map_err(|reason| AgendaError::StorageRead { key: "*".to_string(), reason })?;
        Ok(self.values.lock().unwrap().keys().cloned().collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_can_be_injected() {
        let store = MemoryStore::with_behaviour(MockBehaviour::fail_writes(1));
        assert!(matches!(store.set("tasks", "[]").await, Err(AgendaError::StorageWrite { .. })));
        assert_eq!(store.get("tasks").await.unwrap(), None);

        store.set("tasks", "[]").await.unwrap();
        assert_eq!(store.get("tasks").await.unwrap().as_deref(), Some("[]"));

        store.set_behaviour(MockBehaviour::fail_now(1));
        assert!(matches!(store.get("tasks").await, Err(AgendaError::StorageRead { .. })));
        assert_eq!(store.all_keys().await.unwrap(), vec!["tasks".to_string()]);
    }
}
