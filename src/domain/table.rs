//! In-memory invariant table with a name index.

use crate::domain::invariant::InvariantRecord;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Knot,
    Link,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Knot => write!(f, "knot"),
            TableKind::Link => write!(f, "link"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvariantTable {
    pub kind: TableKind,
    columns: Vec<String>,
    records: Vec<InvariantRecord>,
    index: HashMap<String, usize>,
}

impl InvariantTable {
    /// Builds the name index. When a name repeats, the first row wins and
    /// the later names are returned alongside the table.
    pub fn new(
        kind: TableKind,
        columns: Vec<String>,
        records: Vec<InvariantRecord>,
    ) -> (Self, Vec<String>) {
        let mut index = HashMap::with_capacity(records.len());
        let mut kept = Vec::with_capacity(records.len());
        let mut duplicates = Vec::new();

        for record in records {
            if index.contains_key(&record.name) {
                duplicates.push(record.name);
                continue;
            }
            index.insert(record.name.clone(), kept.len());
            kept.push(record);
        }

        (
            Self {
                kind,
                columns,
                records: kept,
                index,
            },
            duplicates,
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn get(&self, name: &str) -> Option<&InvariantRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InvariantRecord> {
        self.records.iter()
    }

    /// Error-coerced numeric view of a column, in row order.
    pub fn numeric_column(&self, column: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.number(column)).collect()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<&InvariantRecord>
    where
        F: Fn(&InvariantRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(*r)).collect()
    }

    pub fn with_crossing_number(&self, n: i64) -> Vec<&InvariantRecord> {
        self.filter(|r| r.crossing_number() == Some(n))
    }

    pub fn search(&self, query: &TableQuery) -> Vec<&InvariantRecord> {
        let mut hits = self.filter(|r| query.matches(r));
        hits.sort_by(|a, b| {
            a.crossing_number()
                .unwrap_or(i64::MAX)
                .cmp(&b.crossing_number().unwrap_or(i64::MAX))
                .then_with(|| a.name.cmp(&b.name))
        });
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        hits
    }

    /// Statistics over the finite numeric cells of `column`. Infinite
    /// cells are counted in `non_finite` and kept out of min, max and mean.
    pub fn column_summary(&self, column: &str) -> ColumnSummary {
        let values = self.numeric_column(column);
        let numeric: Vec<f64> = values.iter().flatten().copied().collect();
        let missing = values.len() - numeric.len();
        let present: Vec<f64> = numeric.iter().copied().filter(|v| v.is_finite()).collect();
        let non_finite = numeric.len() - present.len();

        if present.is_empty() {
            return ColumnSummary {
                present: 0,
                missing,
                non_finite,
                min: None,
                max: None,
                mean: None,
            };
        }

        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = present.iter().sum::<f64>() / present.len() as f64;

        ColumnSummary {
            present: present.len(),
            missing,
            non_finite,
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
        }
    }
}

/// Conjunction of optional constraints; an empty query matches every row.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    pub crossing_number: Option<i64>,
    pub components: Option<i64>,
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
    pub determinant: Option<i64>,
    pub limit: Option<usize>,
}

impl TableQuery {
    pub fn matches(&self, record: &InvariantRecord) -> bool {
        if let Some(n) = self.crossing_number {
            if record.crossing_number() != Some(n) {
                return false;
            }
        }
        if let Some(c) = self.components {
            if record.components() != Some(c) {
                return false;
            }
        }
        if let Some(d) = self.determinant {
            if record.determinant() != Some(d) {
                return false;
            }
        }
        if self.min_volume.is_some() || self.max_volume.is_some() {
            let Some(v) = record.volume() else {
                return false;
            };
            if self.min_volume.is_some_and(|lo| v < lo) {
                return false;
            }
            if self.max_volume.is_some_and(|hi| v > hi) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub present: usize,
    pub missing: usize,
    pub non_finite: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Knot and link tables searched together; knots shadow links on a name clash.
#[derive(Debug, Clone, Default)]
pub struct TopologyCatalog {
    pub knots: Option<InvariantTable>,
    pub links: Option<InvariantTable>,
}

impl TopologyCatalog {
    pub fn new(knots: Option<InvariantTable>, links: Option<InvariantTable>) -> Self {
        Self { knots, links }
    }

    pub fn get(&self, name: &str) -> Option<&InvariantRecord> {
        self.knots
            .as_ref()
            .and_then(|t| t.get(name))
            .or_else(|| self.links.as_ref().and_then(|t| t.get(name)))
    }

    pub fn kind_of(&self, name: &str) -> Option<TableKind> {
        if self.knots.as_ref().is_some_and(|t| t.contains(name)) {
            Some(TableKind::Knot)
        } else if self.links.as_ref().is_some_and(|t| t.contains(name)) {
            Some(TableKind::Link)
        } else {
            None
        }
    }

    pub fn table(&self, kind: TableKind) -> Option<&InvariantTable> {
        match kind {
            TableKind::Knot => self.knots.as_ref(),
            TableKind::Link => self.links.as_ref(),
        }
    }
}
