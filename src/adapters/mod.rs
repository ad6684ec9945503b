pub mod config_providers;
pub mod http_handler;
pub mod middleware;
pub mod services;

/// Re-export commonly used types from adapters
pub use config_providers::FileConfigProvider;
pub use http_handler::{HttpHandler, router};
pub use middleware::*;
pub use services::{build_dispatcher, build_services};
