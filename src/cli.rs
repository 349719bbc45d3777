//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_assignment_store::JsonAssignmentStore;
use crate::adapters::json_constants_adapter::JsonConstantsAdapter;
use crate::adapters::pipe_table_adapter::{LoadOptions, PipeTableAdapter, RowPolicy};
use crate::domain::assignment::TopologyAssignment;
use crate::domain::constants::{Constants, KAPPA_KEY};
use crate::domain::error::KsauError;
use crate::domain::invariant::InvariantRecord;
use crate::domain::settings::{SsotPaths, log_level};
use crate::domain::ssot::Ssot;
use crate::domain::table::{ColumnSummary, InvariantTable, TableKind, TableQuery};
use crate::domain::units::MassUnit;
use crate::ports::assignment_store::AssignmentStore;
use crate::ports::constants_port::ConstantsPort;
use crate::ports::table_port::LoadReport;

pub const DEFAULT_CONFIG: &str = "ksau.ini";

#[derive(Parser, Debug)]
#[command(name = "ksau", about = "Knot/link invariant single-source-of-truth tool")]
pub struct Cli {
    /// Settings file (defaults to ./ksau.ini when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarise every loaded source
    Info,
    /// Print all fields of a knot or link
    Lookup { name: String },
    /// Query a table by invariants
    Search(SearchArgs),
    /// Numeric summary of one column
    Summary {
        column: String,
        #[arg(long)]
        links: bool,
    },
    /// Print one constant, or list all of them
    Constant { key: Option<String> },
    /// List topology assignments
    Assignments,
    /// Assign a particle to a topology
    Assign {
        particle: String,
        topology: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Recache assignment invariants from the tables
    Refresh {
        #[arg(long)]
        dry_run: bool,
    },
    /// Check assignments and constants for consistency
    Validate,
    /// List retained assignment versions
    History,
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub crossing: Option<i64>,
    #[arg(long)]
    pub components: Option<i64>,
    #[arg(long)]
    pub min_volume: Option<f64>,
    #[arg(long)]
    pub max_volume: Option<f64>,
    #[arg(long)]
    pub determinant: Option<i64>,
    /// Search the link table instead of the knot table
    #[arg(long)]
    pub links: bool,
    #[arg(long)]
    pub limit: Option<usize>,
}

impl SearchArgs {
    pub fn query(&self) -> TableQuery {
        TableQuery {
            crossing_number: self.crossing,
            components: self.components,
            min_volume: self.min_volume,
            max_volume: self.max_volume,
            determinant: self.determinant,
            limit: self.limit,
        }
    }

    fn kind(&self) -> TableKind {
        if self.links { TableKind::Link } else { TableKind::Knot }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let (settings, base) = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        log_level(&settings)
    };
    init_logging(&level);

    let paths = match SsotPaths::from_config(&settings, &base) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    debug!(?paths, "resolved data paths");

    match dispatch(cli.command, &paths) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// `RUST_LOG` wins over the settings file.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call (tests run the CLI repeatedly) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// An explicit path must exist; the default is optional.
pub fn load_settings(path: Option<&Path>) -> Result<(FileConfigAdapter, PathBuf), KsauError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let base = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !required && !path.exists() {
        return Ok((FileConfigAdapter::empty(), base));
    }
    let settings = FileConfigAdapter::from_file(&path)?;
    Ok((settings, base))
}

pub fn table_adapter(paths: &SsotPaths) -> PipeTableAdapter {
    let options = LoadOptions {
        row_policy: if paths.strict {
            RowPolicy::Strict
        } else {
            RowPolicy::Skip
        },
        ..Default::default()
    };
    PipeTableAdapter::new(Some(paths.knots.clone()), paths.links.clone(), options)
}

pub fn assignment_store(paths: &SsotPaths) -> JsonAssignmentStore {
    JsonAssignmentStore::new(paths.assignments.clone(), paths.keep)
}

pub fn open_ssot(paths: &SsotPaths) -> Result<Ssot, KsauError> {
    let tables = table_adapter(paths);
    let constants = JsonConstantsAdapter::new(paths.constants.clone());
    let store = assignment_store(paths);
    Ssot::load(&tables, paths.links.is_some(), &constants, &store)
}

fn dispatch(command: Command, paths: &SsotPaths) -> Result<ExitCode, KsauError> {
    match command {
        Command::Info => run_info(paths),
        Command::Lookup { name } => run_lookup(paths, &name),
        Command::Search(args) => run_search(paths, &args),
        Command::Summary { column, links } => run_summary(paths, &column, links),
        Command::Constant { key } => run_constant(paths, key.as_deref()),
        Command::Assignments => run_assignments(paths),
        Command::Assign {
            particle,
            topology,
            note,
        } => run_assign(paths, &particle, &topology, note.as_deref()),
        Command::Refresh { dry_run } => run_refresh(paths, dry_run),
        Command::Validate => run_validate(paths),
        Command::History => run_history(paths),
    }
}

fn table_of(ssot: &Ssot, kind: TableKind) -> Result<&InvariantTable, KsauError> {
    ssot.catalog
        .table(kind)
        .ok_or_else(|| KsauError::ConfigMissing {
            section: "data".into(),
            key: "links".into(),
        })
}

fn run_info(paths: &SsotPaths) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;

    if let Some(knots) = ssot.knots() {
        println!("{}", format_table_info(knots, &ssot.knot_report));
    }
    match (ssot.links(), ssot.link_report.as_ref()) {
        (Some(links), Some(report)) => println!("{}", format_table_info(links, report)),
        _ => println!("link table: not configured"),
    }
    println!("constants: {} keys (kappa = {})", ssot.constants.len(), ssot.constants.kappa());
    println!(
        "assignments: {} particles at version {}",
        ssot.assignments.len(),
        ssot.assignments_version
    );
    Ok(ExitCode::SUCCESS)
}

pub fn format_table_info(table: &InvariantTable, report: &LoadReport) -> String {
    format!(
        "{} table: {} rows, {} skipped, {} duplicates\n  columns: {}",
        table.kind,
        report.rows,
        report.skipped,
        report.duplicates.len(),
        table.columns().join(", ")
    )
}

fn run_lookup(paths: &SsotPaths, name: &str) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;
    let record = ssot.topology(name)?;
    let kind = ssot.catalog.kind_of(name).unwrap_or(TableKind::Knot);
    println!("{}", format_record(record, kind));
    Ok(ExitCode::SUCCESS)
}

pub fn format_record(record: &InvariantRecord, kind: TableKind) -> String {
    let width = record.fields.keys().map(String::len).max().unwrap_or(0);
    let mut out = format!("{} ({kind})", record.name);
    for (column, value) in &record.fields {
        out.push_str(&format!("\n  {column:<width$}  {value}"));
    }
    out
}

fn run_search(paths: &SsotPaths, args: &SearchArgs) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;
    let table = table_of(&ssot, args.kind())?;
    let hits = table.search(&args.query());

    for record in &hits {
        println!("{}", format_search_row(record));
    }
    info!(matches = hits.len(), "search complete");
    Ok(ExitCode::SUCCESS)
}

pub fn format_search_row(record: &InvariantRecord) -> String {
    let show_int = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
    format!(
        "{:<16} c={:<3} vol={:<12} det={:<6} sig={}",
        record.name,
        show_int(record.crossing_number()),
        record
            .volume()
            .map_or_else(|| "-".to_string(), |v| format!("{v:.6}")),
        show_int(record.determinant()),
        show_int(record.signature()),
    )
}

fn run_summary(paths: &SsotPaths, column: &str, links: bool) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;
    let kind = if links { TableKind::Link } else { TableKind::Knot };
    let table = table_of(&ssot, kind)?;
    if !table.has_column(column) {
        return Err(KsauError::TableFormat {
            path: kind.to_string(),
            reason: format!("no column '{column}'"),
        });
    }
    println!("{}", format_summary(column, &table.column_summary(column)));
    Ok(ExitCode::SUCCESS)
}

pub fn format_summary(column: &str, summary: &ColumnSummary) -> String {
    let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.6}"));
    let mut line = format!(
        "{column}: {} numeric, {} missing, min {}, max {}, mean {}",
        summary.present,
        summary.missing,
        show(summary.min),
        show(summary.max),
        show(summary.mean)
    );
    if summary.non_finite > 0 {
        line.push_str(&format!(", {} non-finite", summary.non_finite));
    }
    line
}

fn run_constant(paths: &SsotPaths, key: Option<&str>) -> Result<ExitCode, KsauError> {
    let constants = JsonConstantsAdapter::new(paths.constants.clone()).load_constants()?;
    match key {
        Some(key) => println!("{}", lookup_constant(&constants, key)?),
        None => {
            for (path, value) in constants.leaves() {
                println!("{path} = {value}");
            }
            if constants.get(KAPPA_KEY).is_none() {
                println!("{KAPPA_KEY} = {} (default)", constants.kappa());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `kappa` always resolves, falling back to pi/24.
pub fn lookup_constant(constants: &Constants, key: &str) -> Result<String, KsauError> {
    if key == KAPPA_KEY {
        return Ok(constants.kappa().to_string());
    }
    constants
        .get(key)
        .map(|v| v.to_string())
        .ok_or_else(|| KsauError::MissingConstant(key.to_string()))
}

fn run_assignments(paths: &SsotPaths) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;
    println!("version {}", ssot.assignments_version);
    for (particle, assignment) in ssot.assignments.iter() {
        println!("{}", format_assignment(particle, assignment));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn format_assignment(particle: &str, a: &TopologyAssignment) -> String {
    let show_int = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
    let mass = a.mass.map_or_else(
        || "-".to_string(),
        |m| format!("{} MeV", m.in_unit(MassUnit::MEV)),
    );
    format!(
        "{:<12} {:<16} c={:<3} vol={:<12} det={:<6} sig={:<4} comp={:<2} mass={}",
        particle,
        a.topology,
        show_int(a.crossing_number),
        a.volume
            .map_or_else(|| "-".to_string(), |v| format!("{v:.6}")),
        show_int(a.determinant),
        show_int(a.signature),
        show_int(a.components),
        mass
    )
}

fn run_assign(
    paths: &SsotPaths,
    particle: &str,
    topology: &str,
    note: Option<&str>,
) -> Result<ExitCode, KsauError> {
    let mut ssot = open_ssot(paths)?;
    let store = assignment_store(paths);

    let previous = ssot.assignments.get(particle).map(|a| a.topology.clone());
    let assigned = ssot.assignments.assign(particle, topology, &ssot.catalog)?;
    println!("{}", format_assignment(particle, assigned));

    let note = note.map(str::to_string).unwrap_or_else(|| match previous {
        Some(prev) => format!("{particle}: {prev} -> {topology}"),
        None => format!("{particle}: {topology}"),
    });
    let version = ssot.commit(&store, Some(&note))?;
    eprintln!("Saved assignments version {version}");
    Ok(ExitCode::SUCCESS)
}

fn run_refresh(paths: &SsotPaths, dry_run: bool) -> Result<ExitCode, KsauError> {
    let mut ssot = open_ssot(paths)?;

    let stale = ssot.assignments.stale(&ssot.catalog);
    for entry in &stale {
        println!(
            "{} ({}): {}",
            entry.particle,
            entry.topology,
            entry.fields.join(", ")
        );
    }
    if stale.is_empty() {
        eprintln!("All cached invariants are current");
        return Ok(ExitCode::SUCCESS);
    }
    if dry_run {
        eprintln!("Dry run: {} assignment(s) would be refreshed", stale.len());
        return Ok(ExitCode::SUCCESS);
    }

    let changed = ssot.assignments.refresh(&ssot.catalog);
    let store = assignment_store(paths);
    let note = format!("refresh {}", changed.join(", "));
    let version = ssot.commit(&store, Some(&note))?;
    eprintln!("Refreshed {} assignment(s), saved version {version}", changed.len());
    Ok(ExitCode::SUCCESS)
}

fn run_validate(paths: &SsotPaths) -> Result<ExitCode, KsauError> {
    let ssot = open_ssot(paths)?;
    let report = ssot.validate();

    for finding in &report.findings {
        println!("{finding}");
    }
    if report.has_errors() {
        return Err(KsauError::ValidationFailed {
            errors: report.error_count(),
        });
    }
    if report.warning_count() > 0 {
        warn!(warnings = report.warning_count(), "validation passed with warnings");
    }
    eprintln!("SSoT is consistent");
    Ok(ExitCode::SUCCESS)
}

fn run_history(paths: &SsotPaths) -> Result<ExitCode, KsauError> {
    let store = assignment_store(paths);
    let current = store.load()?;
    for version in store.history()? {
        let v = store.load_version(version)?;
        println!("{}", format_version_line(version, v.updated_at.as_deref(), v.note.as_deref(), false));
    }
    println!(
        "{}",
        format_version_line(
            current.version,
            current.updated_at.as_deref(),
            current.note.as_deref(),
            true
        )
    );
    Ok(ExitCode::SUCCESS)
}

pub fn format_version_line(
    version: u64,
    updated_at: Option<&str>,
    note: Option<&str>,
    current: bool,
) -> String {
    format!(
        "v{version:<4} {:<32} {}{}",
        updated_at.unwrap_or("-"),
        note.unwrap_or(""),
        if current { " (current)" } else { "" }
    )
}
