//! Performs one unattended backup of the tasks, for OS-scheduled background jobs.
//!
//! Usage: `agenda-backup [settings.json]`

use std::path::Path;
use std::sync::Arc;

use school_agenda::backup::BackgroundBackup;
use school_agenda::clock::SystemClock;
use school_agenda::store::FileStore;
use school_agenda::Settings;

#[tokio::main]
async fn main() {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        None => Settings::default(),
        Some(path) => match Settings::from_file(Path::new(&path)) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Invalid settings file: {}. Using the default settings", err);
                Settings::default()
            }
        },
    };

    let store = match FileStore::open(&settings.store_dir()).await {
        Ok(store) => store,
        Err(err) => {
            log::error!("Unable to open the store in {:?}: {}", settings.store_dir(), err);
            return;
        }
    };

    let backup = BackgroundBackup::new(Arc::new(store), Arc::new(SystemClock), &settings);
    if let Err(err) = backup.run_once().await {
        log::error!("Background backup failed: {}", err);
    }
}
