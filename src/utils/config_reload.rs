//! Development reload of the application configuration.
//!
//! A changed configuration file replaces the shared [`AppConfig`] snapshot,
//! which is enough for settings read per request such as `debug_mode`. The
//! routing table is built once, so a changed service set only takes effect
//! after a restart.
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{config::AppConfig, ports::ConfigProvider};

/// What a single reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied { services_changed: bool },
    Rejected,
}

/// Load the provider's configuration and swap it into `holder`.
///
/// A configuration that fails to load leaves the current one in place.
pub async fn reload_once(
    provider: &dyn ConfigProvider,
    holder: &ArcSwap<AppConfig>,
) -> ReloadOutcome {
    match provider.load_config().await {
        Ok(new_config) => {
            let current = holder.load();
            let services_changed = current.services != new_config.services;
            if services_changed {
                tracing::warn!(
                    "Service definitions changed; restart maprelay to apply the new routing table"
                );
            }
            if current.debug_mode != new_config.debug_mode {
                tracing::info!(debug_mode = new_config.debug_mode, "Debug mode changed");
            }
            holder.store(Arc::new(new_config));
            tracing::info!("Configuration reloaded.");
            ReloadOutcome::Applied { services_changed }
        }
        Err(e) => {
            tracing::error!(
                "Failed to reload configuration: {:?}. Keeping old configuration.",
                e
            );
            ReloadOutcome::Rejected
        }
    }
}

/// Spawn the task that reloads on every change notification. The provider is
/// expected to coalesce bursts of edits into one notification.
pub fn spawn_config_reloader(
    provider: Arc<dyn ConfigProvider>,
    holder: Arc<ArcSwap<AppConfig>>,
    mut changes: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Config watcher task started.");
        while changes.recv().await.is_some() {
            reload_once(provider.as_ref(), &holder).await;
        }
        tracing::info!("Config watcher task is shutting down.");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::ServiceConfig;

    struct Scripted {
        next: Mutex<Option<eyre::Result<AppConfig>>>,
        rx: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl Scripted {
        fn new(next: eyre::Result<AppConfig>) -> Self {
            Self {
                next: Mutex::new(Some(next)),
                rx: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ConfigProvider for Scripted {
        async fn load_config(&self) -> eyre::Result<AppConfig> {
            self.next
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(eyre::eyre!("no more configs")))
        }

        fn watch(&self) -> eyre::Result<mpsc::Receiver<()>> {
            self.rx
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| eyre::eyre!("taken"))
        }
    }

    #[tokio::test]
    async fn test_reload_flips_debug_mode() {
        let holder = ArcSwap::from_pointee(AppConfig::default());
        let provider = Scripted::new(Ok(AppConfig {
            debug_mode: true,
            ..AppConfig::default()
        }));

        let outcome = reload_once(&provider, &holder).await;
        assert_eq!(
            outcome,
            ReloadOutcome::Applied {
                services_changed: false
            }
        );
        assert!(holder.load().debug_mode);
    }

    #[tokio::test]
    async fn test_reload_reports_service_changes() {
        let holder = ArcSwap::from_pointee(AppConfig::default());
        let mut new_config = AppConfig::default();
        new_config.services.insert(
            "status".to_string(),
            ServiceConfig::Status {
                names: vec!["status".to_string()],
            },
        );

        let outcome = reload_once(&Scripted::new(Ok(new_config)), &holder).await;
        assert_eq!(
            outcome,
            ReloadOutcome::Applied {
                services_changed: true
            }
        );
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_config() {
        let holder = ArcSwap::from_pointee(AppConfig {
            debug_mode: true,
            ..AppConfig::default()
        });

        let outcome =
            reload_once(&Scripted::new(Err(eyre::eyre!("parse error"))), &holder).await;
        assert_eq!(outcome, ReloadOutcome::Rejected);
        assert!(holder.load().debug_mode);
    }

    #[tokio::test]
    async fn test_reloader_task_applies_notifications() {
        let holder = Arc::new(ArcSwap::from_pointee(AppConfig::default()));
        let provider = Arc::new(Scripted::new(Ok(AppConfig {
            debug_mode: true,
            ..AppConfig::default()
        })));
        let (tx, rx) = mpsc::channel(1);

        let handle = spawn_config_reloader(provider, holder.clone(), rx);
        tx.send(()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(holder.load().debug_mode);
    }
}
