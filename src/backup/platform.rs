//! Platform file services the backup coordinator relies on

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AgendaResult;

/// Hands a file over to the user (a native share sheet on mobile platforms)
#[async_trait]
pub trait ShareSheet: Send + Sync {
    async fn share(&self, file: &Path) -> AgendaResult<()>;
}

/// Lets the user choose a backup file to restore
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Returns `None` when the user cancelled
    async fn pick(&self) -> AgendaResult<Option<PathBuf>>;
}
