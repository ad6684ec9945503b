//! Configuration file watching.
//!
//! Editors tend to save in several steps (truncate, write, rename), so raw
//! filesystem events are collected until the file has been quiet for the
//! settle period. A notification is only sent when the file content differs
//! from what was last reported, which filters out `touch` and saves that did
//! not change anything.
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use eyre::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{
    config::{loader::load_config, models::AppConfig},
    ports::config_provider::ConfigProvider,
};

/// Quiet period used by [`FileConfigProvider::new`].
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Loads the application configuration from a file and reports edits to it.
pub struct FileConfigProvider {
    path: PathBuf,
    settle: Duration,
    _watcher: notify::RecommendedWatcher,
    events: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_settle(path, DEFAULT_SETTLE)
    }

    /// Like [`new`](Self::new) with a custom quiet period.
    pub fn with_settle(path: impl Into<PathBuf>, settle: Duration) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("Invalid config path: {}", path.display()))?
            .to_owned();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches_file(&event, &file_name) => {
                tracing::trace!(kind = ?event.kind, "config file event");
                let _ = events_tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Config file watch error: {e}"),
        })
        .wrap_err("Failed to create config file watcher")?;

        watcher
            .watch(watch_dir(&path), RecursiveMode::NonRecursive)
            .wrap_err_with(|| format!("Failed to watch directory of {}", path.display()))?;

        Ok(Self {
            path,
            settle,
            _watcher: watcher,
            events: Mutex::new(Some(events_rx)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The directory holding `path`; the file itself may be replaced by rename.
fn watch_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Whether `event` changes, creates or removes the watched file.
fn touches_file(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Turn bursts of raw events into one notification per content change.
async fn settle_events(
    path: PathBuf,
    settle: Duration,
    mut reported: Option<Vec<u8>>,
    mut events: mpsc::UnboundedReceiver<()>,
    changes: mpsc::Sender<()>,
) {
    while events.recv().await.is_some() {
        // Wait until no event arrived for a whole quiet period.
        loop {
            match tokio::time::timeout(settle, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let current = tokio::fs::read(&path).await.ok();
        if current == reported {
            tracing::debug!(file = %path.display(), "config file event without content change");
            continue;
        }
        reported = current;

        if changes.send(()).await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load_config(&self) -> Result<AppConfig> {
        let path_str = self
            .path
            .to_str()
            .ok_or_else(|| eyre::eyre!("Config path is not valid UTF-8: {}", self.path.display()))?;
        load_config(path_str).await
    }

    /// Must be called from within a tokio runtime. The content seen here is
    /// the baseline for the first notification.
    fn watch(&self) -> Result<mpsc::Receiver<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .wrap_err("Config watching needs a tokio runtime")?;
        let events = self
            .events
            .lock()
            .map_err(|_| eyre::eyre!("Config watch receiver lock poisoned"))?
            .take()
            .ok_or_else(|| eyre::eyre!("Config watch can only be taken once"))?;

        let reported = std::fs::read(&self.path).ok();
        let (changes_tx, changes_rx) = mpsc::channel(1);
        runtime.spawn(settle_events(
            self.path.clone(),
            self.settle,
            reported,
            events,
            changes_tx,
        ));
        Ok(changes_rx)
    }
}
