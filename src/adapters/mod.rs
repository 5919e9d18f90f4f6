//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_sink;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
