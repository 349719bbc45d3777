//! Versioned persistence for topology assignments.

use crate::domain::assignment::AssignmentSet;
use crate::domain::error::KsauError;

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub updated_at: Option<String>,
    pub note: Option<String>,
    pub value: T,
}

pub trait AssignmentStore {
    /// A store with nothing written yet loads as an empty set at version 0.
    fn load(&self) -> Result<Versioned<AssignmentSet>, KsauError>;

    /// Fails with `VersionConflict` unless the stored version still equals
    /// `expected_version`. Returns the new version.
    fn save(
        &self,
        expected_version: u64,
        assignments: &AssignmentSet,
        note: Option<&str>,
    ) -> Result<u64, KsauError>;

    /// Retained earlier versions, ascending.
    fn history(&self) -> Result<Vec<u64>, KsauError>;

    fn load_version(&self, version: u64) -> Result<Versioned<AssignmentSet>, KsauError>;
}
