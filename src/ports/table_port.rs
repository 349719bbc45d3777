//! Invariant table source port.

use crate::domain::error::KsauError;
use crate::domain::table::{InvariantTable, TableKind};

/// Counts gathered while loading a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub skipped: usize,
    pub duplicates: Vec<String>,
}

pub trait TablePort {
    fn load_table(&self, kind: TableKind) -> Result<(InvariantTable, LoadReport), KsauError>;
}
