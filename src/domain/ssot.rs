//! The single source of truth: both invariant tables, the constants and the
//! current topology assignments, loaded together.

use crate::domain::assignment::{AssignmentSet, TopologyAssignment};
use crate::domain::constants::Constants;
use crate::domain::error::KsauError;
use crate::domain::invariant::InvariantRecord;
use crate::domain::table::{InvariantTable, TableKind, TopologyCatalog};
use crate::domain::validation::{ValidationReport, validate_assignments, validate_constants};
use crate::ports::assignment_store::AssignmentStore;
use crate::ports::constants_port::ConstantsPort;
use crate::ports::table_port::{LoadReport, TablePort};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Ssot {
    pub catalog: TopologyCatalog,
    pub knot_report: LoadReport,
    pub link_report: Option<LoadReport>,
    pub constants: Constants,
    pub assignments: AssignmentSet,
    pub assignments_version: u64,
}

/// An assignment joined with its table row.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub particle: &'a str,
    pub assignment: &'a TopologyAssignment,
    pub record: &'a InvariantRecord,
    pub kind: TableKind,
}

impl Ssot {
    /// The link table is optional; `with_links = false` skips it.
    pub fn load(
        tables: &dyn TablePort,
        with_links: bool,
        constants: &dyn ConstantsPort,
        store: &dyn AssignmentStore,
    ) -> Result<Self, KsauError> {
        let (knots, knot_report) = tables.load_table(TableKind::Knot)?;
        let (links, link_report) = if with_links {
            let (t, r) = tables.load_table(TableKind::Link)?;
            (Some(t), Some(r))
        } else {
            (None, None)
        };
        let constants = constants.load_constants()?;
        let versioned = store.load()?;

        info!(
            knots = knots.len(),
            links = links.as_ref().map_or(0, InvariantTable::len),
            constants = constants.len(),
            particles = versioned.value.len(),
            version = versioned.version,
            "SSoT loaded"
        );

        Ok(Self {
            catalog: TopologyCatalog::new(Some(knots), links),
            knot_report,
            link_report,
            constants,
            assignments: versioned.value,
            assignments_version: versioned.version,
        })
    }

    pub fn knots(&self) -> Option<&InvariantTable> {
        self.catalog.knots.as_ref()
    }

    pub fn links(&self) -> Option<&InvariantTable> {
        self.catalog.links.as_ref()
    }

    pub fn topology(&self, name: &str) -> Result<&InvariantRecord, KsauError> {
        self.catalog
            .get(name)
            .ok_or_else(|| KsauError::UnknownTopology(name.to_string()))
    }

    pub fn resolve<'a>(&'a self, particle: &'a str) -> Result<Resolved<'a>, KsauError> {
        let assignment = self
            .assignments
            .get(particle)
            .ok_or_else(|| KsauError::UnknownParticle(particle.to_string()))?;
        let record = self.topology(&assignment.topology)?;
        let kind = self
            .catalog
            .kind_of(&assignment.topology)
            .unwrap_or(TableKind::Knot);
        Ok(Resolved {
            particle,
            assignment,
            record,
            kind,
        })
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = validate_assignments(&self.assignments, &self.catalog);
        report.extend(validate_constants(&self.constants));
        report
    }

    /// Write the in-memory assignments back through `store`, bumping the
    /// tracked version.
    pub fn commit(&mut self, store: &dyn AssignmentStore, note: Option<&str>) -> Result<u64, KsauError> {
        let version = store.save(self.assignments_version, &self.assignments, note)?;
        self.assignments_version = version;
        Ok(version)
    }
}
