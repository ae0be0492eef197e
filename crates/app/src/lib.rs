//! Strata: a path-addressed file store with per-resource access rights,
//! served as a set of named HTTP services.

pub mod config;
pub mod http_server;
pub mod process;
pub mod service_state;

pub use config::Config;
pub use process::spawn_service;
pub use service_state::State as ServiceState;
