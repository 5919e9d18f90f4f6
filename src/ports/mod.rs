//! Port traits: the boundaries between the core and its adapters.

pub mod config_port;
pub mod data_port;
pub mod sink_port;
