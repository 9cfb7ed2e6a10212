//! Port traits for external data and configuration.

pub mod config_port;
pub mod price_port;
