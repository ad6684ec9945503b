//! Per-request routing.
//!
//! The dispatcher picks a service by the first path segment, runs it, and
//! turns the outcome into a response:
//! * no route: `404 not found`
//! * handler success: the handler's response, unchanged
//! * handler failure in production: `500 internal error`, full report logged
//! * handler failure in debug mode: the failure is handed back to the caller
//!
//! It keeps no per-request state and performs no I/O of its own, so a single
//! instance is shared by every worker.
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    config::AppConfig,
    core::{ServiceRegistry, ServiceRequest, ServiceResponse},
    ports::Service,
};

static HANDLER_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([[:word:]]+)").expect("valid regex"));

/// Extract the routing key: the word characters directly after the leading
/// slash. Anything after them belongs to the service.
pub fn route_key(path: &str) -> Option<&str> {
    HANDLER_PATH_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Routes requests to the registered services.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    config: Arc<ArcSwap<AppConfig>>,
}

impl Dispatcher {
    /// `config` is only consulted when a handler fails, so a reload that
    /// flips `debug_mode` takes effect on the next failing request.
    pub fn new(registry: Arc<ServiceRegistry>, config: Arc<ArcSwap<AppConfig>>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Handle one request.
    ///
    /// Returns `Err` only in debug mode, carrying the handler's own error.
    /// A handler panic in debug mode is resumed with its original payload.
    pub fn dispatch(&self, req: &ServiceRequest) -> eyre::Result<ServiceResponse> {
        let Some((name, service)) = route_key(req.path())
            .and_then(|name| self.registry.get(name).map(|service| (name, service)))
        else {
            tracing::debug!(path = %req.path(), "no service registered for path");
            return Ok(ServiceResponse::not_found());
        };

        tracing::Span::current().record("route", name);
        tracing::debug!(route = %name, path = %req.path(), "dispatching to service");
        match Self::invoke(service.as_ref(), req) {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(report)) => {
                if self.debug_mode() {
                    return Err(report);
                }
                tracing::error!(
                    route = %name,
                    path = %req.path(),
                    error = ?report,
                    "service failed, answering with 500"
                );
                Ok(ServiceResponse::internal_error())
            }
            Err(payload) => {
                if self.debug_mode() {
                    panic::resume_unwind(payload);
                }
                tracing::error!(
                    route = %name,
                    path = %req.path(),
                    panic = %panic_message(payload.as_ref()),
                    "service panicked, answering with 500"
                );
                Ok(ServiceResponse::internal_error())
            }
        }
    }

    fn invoke(
        service: &dyn Service,
        req: &ServiceRequest,
    ) -> std::thread::Result<eyre::Result<ServiceResponse>> {
        panic::catch_unwind(AssertUnwindSafe(|| service.handle(req)))
    }

    fn debug_mode(&self) -> bool {
        self.config.load().debug_mode
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
