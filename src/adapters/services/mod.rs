//! Built-in service variants.
//!
//! Real map services plug in through the [`Service`] port; these two make the
//! binary useful on its own and exercise the dispatcher end to end.
use std::{collections::BTreeMap, sync::Arc};

use arc_swap::ArcSwap;
use eyre::WrapErr;

use crate::{
    config::{AppConfig, AppConfigValidator, ServiceConfig, abspath},
    core::{Dispatcher, ServiceRegistry},
    ports::Service,
};

pub mod static_files;
pub mod status;

pub use static_files::StaticFileService;
pub use status::{RouteOwner, StatusService};

/// Which configured service ends up answering each route name. Services are
/// registered in key order, so a later key takes over a shared name.
pub fn route_owners(config: &AppConfig) -> BTreeMap<String, RouteOwner> {
    let mut owners = BTreeMap::new();
    for (key, service) in &config.services {
        for name in service.names() {
            owners.insert(
                name.clone(),
                RouteOwner {
                    service: key.clone(),
                    kind: service.kind().to_string(),
                },
            );
        }
    }
    owners
}

/// Instantiate every configured service, in configuration order.
pub fn build_services(config_holder: &Arc<ArcSwap<AppConfig>>) -> Vec<Arc<dyn Service>> {
    let config = config_holder.load_full();
    let owners = route_owners(&config);
    config
        .services
        .iter()
        .map(|(key, service)| -> Arc<dyn Service> {
            tracing::info!(service = %key, kind = service.kind(), names = ?service.names(), "registering service");
            match service {
                ServiceConfig::Status { names } => Arc::new(StatusService::new(
                    names.clone(),
                    owners.clone(),
                    config_holder.clone(),
                )),
                ServiceConfig::Static {
                    names,
                    root,
                    index_file,
                } => Arc::new(StaticFileService::new(
                    names.clone(),
                    abspath(root, config.conf_base_dir.as_deref()),
                    index_file.clone(),
                )),
            }
        })
        .collect()
}

/// Validate the current configuration and assemble the dispatcher for it.
///
/// Validation errors abort startup; warnings are logged.
pub fn build_dispatcher(config_holder: &Arc<ArcSwap<AppConfig>>) -> eyre::Result<Dispatcher> {
    let warnings = AppConfigValidator::validate(&config_holder.load())
        .wrap_err("Configuration rejected")?;
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    let registry = ServiceRegistry::build(build_services(config_holder));
    tracing::info!(routes = ?registry.names(), "Routing table built");
    Ok(Dispatcher::new(Arc::new(registry), config_holder.clone()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_build_services_in_key_order() {
        let mut config = AppConfig {
            conf_base_dir: Some(PathBuf::from("/srv/maps")),
            ..AppConfig::default()
        };
        config.services.insert(
            "b_status".to_string(),
            ServiceConfig::Status {
                names: vec!["status".to_string()],
            },
        );
        config.services.insert(
            "a_files".to_string(),
            ServiceConfig::Static {
                names: vec!["files".to_string(), "static".to_string()],
                root: PathBuf::from("www"),
                index_file: "index.html".to_string(),
            },
        );

        let services = build_services(&Arc::new(ArcSwap::from_pointee(config)));
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].names(), ["files", "static"]);
        assert_eq!(services[1].names(), ["status"]);
    }

    fn status(names: &[&str]) -> ServiceConfig {
        ServiceConfig::Status {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_route_owners_follow_registry_winner() {
        let mut config = AppConfig::default();
        config.services.insert("a_status".to_string(), status(&["status", "health"]));
        config.services.insert(
            "b_files".to_string(),
            ServiceConfig::Static {
                names: vec!["files".to_string(), "health".to_string()],
                root: PathBuf::from("/srv/www"),
                index_file: "index.html".to_string(),
            },
        );

        let owners = route_owners(&config);
        assert_eq!(owners["health"].service, "b_files");
        assert_eq!(owners["health"].kind, "static");
        assert_eq!(owners["status"].service, "a_status");

        let holder = Arc::new(ArcSwap::from_pointee(config));
        let registry = ServiceRegistry::build(build_services(&holder));
        let owned: Vec<&str> = owners.keys().map(String::as_str).collect();
        assert_eq!(registry.names(), owned);
    }

    #[test]
    fn test_build_dispatcher_rejects_unroutable_names() {
        let mut config = AppConfig::default();
        config.services.insert("bad".to_string(), status(&["with-dash"]));

        let err = build_dispatcher(&Arc::new(ArcSwap::from_pointee(config))).unwrap_err();
        assert_eq!(err.to_string(), "Configuration rejected");
        assert!(err.chain().any(|cause| cause.to_string().contains("with-dash")));
    }

    #[test]
    fn test_build_dispatcher_accepts_duplicates() {
        let mut config = AppConfig::default();
        config.services.insert("one".to_string(), status(&["status"]));
        config.services.insert("two".to_string(), status(&["status"]));

        let dispatcher = build_dispatcher(&Arc::new(ArcSwap::from_pointee(config))).unwrap();
        assert_eq!(dispatcher.registry().names(), ["status"]);
    }
}
