//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod export;
pub mod file_config_adapter;
