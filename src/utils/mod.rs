pub mod config_reload;
pub mod shutdown;

pub use config_reload::{ReloadOutcome, reload_once, spawn_config_reloader};
pub use shutdown::shutdown_signal;
