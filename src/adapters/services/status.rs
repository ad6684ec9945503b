use std::{collections::BTreeMap, sync::Arc};

use arc_swap::ArcSwap;
use eyre::WrapErr;

use crate::{
    config::AppConfig,
    core::{ServiceRequest, ServiceResponse},
    ports::Service,
};

/// Owner of one route in the routing table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteOwner {
    pub service: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Reports what the dispatcher is serving as JSON.
///
/// `routes` is fixed when the routing table is built; only `debug_mode` is
/// read from the live configuration.
pub struct StatusService {
    names: Vec<String>,
    routes: BTreeMap<String, RouteOwner>,
    config: Arc<ArcSwap<AppConfig>>,
}

impl StatusService {
    pub fn new(
        names: Vec<String>,
        routes: BTreeMap<String, RouteOwner>,
        config: Arc<ArcSwap<AppConfig>>,
    ) -> Self {
        Self {
            names,
            routes,
            config,
        }
    }

    pub fn routes(&self) -> &BTreeMap<String, RouteOwner> {
        &self.routes
    }
}

impl Service for StatusService {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn handle(&self, _req: &ServiceRequest) -> eyre::Result<ServiceResponse> {
        let status_data = serde_json::json!({
            "service": "maprelay",
            "version": env!("CARGO_PKG_VERSION"),
            "debug_mode": self.config.load().debug_mode,
            "routes": self.routes,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let body = serde_json::to_vec(&status_data).wrap_err("Failed to encode status document")?;
        Ok(ServiceResponse::new(body).with_mimetype("application/json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(service: &str, kind: &str) -> RouteOwner {
        RouteOwner {
            service: service.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn test_status_document() {
        let config = Arc::new(ArcSwap::from_pointee(AppConfig {
            debug_mode: true,
            ..AppConfig::default()
        }));
        let routes = BTreeMap::from([
            ("files".to_string(), owner("assets", "static")),
            ("status".to_string(), owner("status", "status")),
        ]);
        let service = StatusService::new(vec!["status".to_string()], routes, config.clone());

        let resp = service
            .handle(&ServiceRequest::get("/status").unwrap())
            .unwrap();
        assert_eq!(resp.mimetype(), Some("application/json"));

        let doc: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(doc["service"], "maprelay");
        assert_eq!(doc["debug_mode"], true);
        assert_eq!(doc["routes"]["files"]["service"], "assets");
        assert_eq!(doc["routes"]["files"]["type"], "static");
        assert_eq!(doc["routes"]["status"]["type"], "status");
    }

    #[test]
    fn test_reloaded_services_do_not_show_up() {
        let config = Arc::new(ArcSwap::from_pointee(AppConfig::default()));
        let routes = BTreeMap::from([("status".to_string(), owner("status", "status"))]);
        let service = StatusService::new(vec!["status".to_string()], routes, config.clone());

        let mut reloaded = AppConfig {
            debug_mode: true,
            ..AppConfig::default()
        };
        reloaded.services.insert(
            "wms".to_string(),
            crate::config::ServiceConfig::Status {
                names: vec!["wms".to_string()],
            },
        );
        config.store(Arc::new(reloaded));

        let resp = service
            .handle(&ServiceRequest::get("/status").unwrap())
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(doc["debug_mode"], true);
        assert!(doc["routes"].get("wms").is_none());
        assert_eq!(doc["routes"].as_object().unwrap().len(), 1);
    }
}
