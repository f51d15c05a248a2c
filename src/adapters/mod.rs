//! Concrete adapter implementations for ports.

pub mod confluence_oracle;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report;
