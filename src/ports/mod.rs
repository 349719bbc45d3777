//! Port traits (interfaces) for I/O boundaries.

pub mod assignment_store;
pub mod config_port;
pub mod constants_port;
pub mod table_port;
