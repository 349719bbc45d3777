//! Core domain types and logic.

pub mod assignment;
pub mod constants;
pub mod error;
pub mod invariant;
pub mod settings;
pub mod ssot;
pub mod table;
pub mod units;
pub mod validation;
