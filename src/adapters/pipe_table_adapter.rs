//! Pipe-delimited invariant table adapter.
//!
//! The knot and link databases share one layout: a header row of column
//! names, a description row, then one row per topology. This is the single
//! loader for both.

use crate::domain::error::KsauError;
use crate::domain::invariant::{COL_NAME, FieldValue, InvariantRecord};
use crate::domain::table::{InvariantTable, TableKind};
use crate::ports::table_port::{LoadReport, TablePort};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    /// Any malformed row fails the whole load.
    Strict,
    /// Malformed rows are logged, counted and dropped.
    Skip,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub skip_description_row: bool,
    pub name_column: String,
    pub row_policy: RowPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            skip_description_row: true,
            name_column: COL_NAME.to_string(),
            row_policy: RowPolicy::Skip,
        }
    }
}

pub struct PipeTableAdapter {
    knots_path: Option<PathBuf>,
    links_path: Option<PathBuf>,
    options: LoadOptions,
}

impl PipeTableAdapter {
    pub fn new(knots_path: Option<PathBuf>, links_path: Option<PathBuf>, options: LoadOptions) -> Self {
        Self {
            knots_path,
            links_path,
            options,
        }
    }

    fn path_for(&self, kind: TableKind) -> Option<&Path> {
        match kind {
            TableKind::Knot => self.knots_path.as_deref(),
            TableKind::Link => self.links_path.as_deref(),
        }
    }
}

impl TablePort for PipeTableAdapter {
    fn load_table(&self, kind: TableKind) -> Result<(InvariantTable, LoadReport), KsauError> {
        let path = self.path_for(kind).ok_or_else(|| KsauError::ConfigMissing {
            section: "data".into(),
            key: match kind {
                TableKind::Knot => "knots".into(),
                TableKind::Link => "links".into(),
            },
        })?;
        load_table_file(path, kind, &self.options)
    }
}

pub fn load_table_file(
    path: &Path,
    kind: TableKind,
    options: &LoadOptions,
) -> Result<(InvariantTable, LoadReport), KsauError> {
    let file = File::open(path).map_err(|e| KsauError::FileRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let (table, report) = read_table(file, &path.display().to_string(), kind, options)?;
    info!(
        path = %path.display(),
        kind = %kind,
        rows = report.rows,
        skipped = report.skipped,
        duplicates = report.duplicates.len(),
        "loaded invariant table"
    );
    Ok((table, report))
}

/// Parse a table from any reader. `origin` labels errors and log lines.
pub fn read_table<R: Read>(
    reader: R,
    origin: &str,
    kind: TableKind,
    options: &LoadOptions,
) -> Result<(InvariantTable, LoadReport), KsauError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| KsauError::TableFormat {
            path: origin.to_string(),
            reason: format!("unreadable header: {e}"),
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let name_idx = columns
        .iter()
        .position(|c| *c == options.name_column)
        .ok_or_else(|| KsauError::TableFormat {
            path: origin.to_string(),
            reason: format!("no '{}' column in header", options.name_column),
        })?;

    // Read as bytes so an undecodable description row is still dropped.
    if options.skip_description_row {
        let mut description = csv::ByteRecord::new();
        if rdr
            .read_byte_record(&mut description)
            .map_err(|e| KsauError::TableFormat {
                path: origin.to_string(),
                reason: format!("unreadable description row: {e}"),
            })?
        {
            debug!(origin, "skipped description row");
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                reject(origin, line, e.to_string(), options.row_policy)?;
                skipped += 1;
                continue;
            }
        };

        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() != columns.len() {
            reject(
                origin,
                line,
                format!("expected {} fields, found {}", columns.len(), row.len()),
                options.row_policy,
            )?;
            skipped += 1;
            continue;
        }

        let name = row.get(name_idx).unwrap_or_default();
        if name.is_empty() {
            reject(origin, line, "empty name".to_string(), options.row_policy)?;
            skipped += 1;
            continue;
        }

        let fields: BTreeMap<String, FieldValue> = columns
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| *i != name_idx)
            .map(|(_, (col, cell))| (col.clone(), FieldValue::parse(cell)))
            .collect();

        records.push(InvariantRecord::new(name, fields));
    }

    let (table, duplicates) = InvariantTable::new(kind, columns, records);
    for dup in &duplicates {
        warn!(origin, name = %dup, "duplicate topology name, keeping first row");
    }

    let report = LoadReport {
        rows: table.len(),
        skipped,
        duplicates,
    };
    Ok((table, report))
}

fn reject(origin: &str, line: u64, reason: String, policy: RowPolicy) -> Result<(), KsauError> {
    match policy {
        RowPolicy::Strict => Err(KsauError::MalformedRow {
            path: origin.to_string(),
            line,
            reason,
        }),
        RowPolicy::Skip => {
            warn!(origin, line, %reason, "skipping malformed row");
            Ok(())
        }
    }
}
