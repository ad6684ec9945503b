//! maprelay - a front dispatcher for named map services.
//!
//! Every request is routed by its first path segment: `/wms/...` goes to the
//! service registered as `wms`, `/tiles/...` to the one registered as `tiles`,
//! and anything unmatched is answered with `404 not found`. Services are
//! registered once at startup under one or more names each and are opaque to
//! the dispatcher beyond the [`Service`](ports::Service) port.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use arc_swap::ArcSwap;
//! use maprelay::{ServiceRequest, adapters::build_dispatcher};
//!
//! # fn main() -> eyre::Result<()> {
//! let config = maprelay::config::loader::load_config_sync("maprelay.toml")?;
//! let dispatcher = build_dispatcher(&Arc::new(ArcSwap::from_pointee(config)))?;
//!
//! let response = dispatcher.dispatch(&ServiceRequest::get("/status")?)?;
//! assert_eq!(response.status(), 200);
//! # Ok(()) }
//! ```
//!
//! # Failure handling
//! A service failure (an `Err` or a panic from `handle`) becomes a generic
//! `500 internal error` with the full report logged server-side. With
//! `debug_mode` enabled the failure is handed back to the caller of
//! [`Dispatcher::dispatch`] instead; the HTTP adapter renders it as a
//! diagnostic page.
//!
//! # Architecture
//! Ports (traits) live in `ports`, the routing logic in `core`, and the axum
//! transport plus built-in services in `adapters`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{FileConfigProvider, HttpHandler},
    core::{Dispatcher, ServiceRegistry, ServiceRequest, ServiceResponse},
    ports::Service,
};
