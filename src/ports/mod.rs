pub mod config_provider;
pub mod service;

pub use config_provider::ConfigProvider;
pub use service::Service;
