//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod json_assignment_store;
pub mod json_constants_adapter;
pub mod pipe_table_adapter;
