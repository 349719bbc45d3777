//! Versioned JSON store for topology assignments.
//!
//! The file holds an envelope `{version, updated_at, note, assignments}`.
//! Saves are optimistic: the caller passes the version it loaded and the
//! write is refused if someone else has written since. Writers serialize on
//! an exclusive lock of a sibling `.lock` file. The replaced file is kept
//! under `history/` next to it, and the new file is renamed into place so
//! readers never see a partial write.

use crate::domain::assignment::{AssignmentSet, TopologyAssignment};
use crate::domain::error::KsauError;
use crate::ports::assignment_store::{AssignmentStore, Versioned};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_KEEP: usize = 10;
const HISTORY_DIR: &str = "history";
const ENVELOPE_KEY: &str = "assignments";

#[derive(Serialize)]
struct Envelope<'a> {
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    assignments: &'a AssignmentSet,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u64,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

/// Decode a store file. An object with `version` and an `assignments`
/// object is an envelope; any other object is a pre-versioning particle map
/// and loads as version 0. Errors name the offending particle.
fn decode(content: &str) -> Result<Versioned<AssignmentSet>, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Value::Object(mut top) = value else {
        return Err("top level must be a JSON object".to_string());
    };

    let is_envelope =
        top.contains_key("version") && top.get(ENVELOPE_KEY).is_some_and(Value::is_object);
    if !is_envelope {
        return Ok(Versioned {
            version: 0,
            updated_at: None,
            note: None,
            value: decode_set(top)?,
        });
    }

    let assignments = match top.remove(ENVELOPE_KEY) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let header: EnvelopeHeader =
        serde_json::from_value(Value::Object(top)).map_err(|e| format!("envelope: {e}"))?;
    Ok(Versioned {
        version: header.version,
        updated_at: header.updated_at,
        note: header.note,
        value: decode_set(assignments)?,
    })
}

fn decode_set(map: Map<String, Value>) -> Result<AssignmentSet, String> {
    let mut set = AssignmentSet::new();
    for (particle, entry) in map {
        let assignment: TopologyAssignment =
            serde_json::from_value(entry).map_err(|e| format!("particle '{particle}': {e}"))?;
        set.insert(particle, assignment);
    }
    Ok(set)
}

pub struct JsonAssignmentStore {
    path: PathBuf,
    keep: usize,
}

impl JsonAssignmentStore {
    pub fn new(path: PathBuf, keep: usize) -> Self {
        Self { path, keep }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "assignments".to_string())
    }

    fn history_dir(&self) -> PathBuf {
        self.dir().join(HISTORY_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir().join(format!("{}.lock", self.stem()))
    }

    /// Blocks until no other writer holds the store. Released when the
    /// returned handle drops.
    fn lock(&self) -> Result<File, KsauError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.lock()?;
        Ok(file)
    }

    fn history_path(&self, version: u64) -> PathBuf {
        self.history_dir()
            .join(format!("{}.v{}.json", self.stem(), version))
    }

    fn read(path: &Path) -> Result<Option<Versioned<AssignmentSet>>, KsauError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KsauError::FileRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        decode(&content)
            .map(Some)
            .map_err(|reason| KsauError::JsonParse {
                path: path.display().to_string(),
                reason,
            })
    }

    fn prune(&self) -> Result<(), KsauError> {
        let versions = self.history()?;
        if versions.len() <= self.keep {
            return Ok(());
        }
        let excess = versions.len() - self.keep;
        for version in versions.into_iter().take(excess) {
            let path = self.history_path(version);
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "pruned assignment history");
        }
        Ok(())
    }
}

impl AssignmentStore for JsonAssignmentStore {
    fn load(&self) -> Result<Versioned<AssignmentSet>, KsauError> {
        let loaded = Self::read(&self.path)?.unwrap_or_else(|| Versioned {
            version: 0,
            updated_at: None,
            note: None,
            value: AssignmentSet::new(),
        });
        info!(
            path = %self.path.display(),
            version = loaded.version,
            particles = loaded.value.len(),
            "loaded topology assignments"
        );
        Ok(loaded)
    }

    fn save(
        &self,
        expected_version: u64,
        assignments: &AssignmentSet,
        note: Option<&str>,
    ) -> Result<u64, KsauError> {
        let _guard = self.lock()?;
        let current = Self::read(&self.path)?;
        let found = current.as_ref().map_or(0, |c| c.version);
        if found != expected_version {
            return Err(KsauError::VersionConflict {
                path: self.path.display().to_string(),
                expected: expected_version,
                found,
            });
        }

        if current.is_some() {
            fs::create_dir_all(self.history_dir())?;
            fs::copy(&self.path, self.history_path(found))?;
        }

        let envelope = Envelope {
            version: found + 1,
            updated_at: Some(Utc::now().to_rfc3339()),
            note: note.map(str::to_string),
            assignments,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(self.dir())?;
        serde_json::to_writer_pretty(&mut tmp, &envelope).map_err(|e| KsauError::JsonParse {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| KsauError::Io(e.error))?;

        self.prune()?;

        info!(
            path = %self.path.display(),
            version = envelope.version,
            particles = assignments.len(),
            "saved topology assignments"
        );
        Ok(envelope.version)
    }

    fn history(&self) -> Result<Vec<u64>, KsauError> {
        let entries = match fs::read_dir(self.history_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}.v", self.stem());
        let mut versions = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(v) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|v| v.parse::<u64>().ok())
            {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn load_version(&self, version: u64) -> Result<Versioned<AssignmentSet>, KsauError> {
        if let Some(current) = Self::read(&self.path)? {
            if current.version == version {
                return Ok(current);
            }
        }
        let path = self.history_path(version);
        Self::read(&path)?.ok_or_else(|| KsauError::FileRead {
            path: path.display().to_string(),
            reason: format!("version {version} is not retained"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assignment::TopologyAssignment;
    use tempfile::TempDir;

    fn set_with(particle: &str, topology: &str) -> AssignmentSet {
        let mut set = AssignmentSet::new();
        set.insert(particle, TopologyAssignment::new(topology));
        set
    }

    fn store(dir: &TempDir, keep: usize) -> JsonAssignmentStore {
        JsonAssignmentStore::new(dir.path().join("topology_assignments.json"), keep)
    }

    #[test]
    fn missing_file_loads_empty_at_version_zero() {
        let dir = TempDir::new().unwrap();
        let loaded = store(&dir, 3).load().unwrap();
        assert_eq!(loaded.version, 0);
        assert!(loaded.value.is_empty());
    }

    #[test]
    fn legacy_bare_map_loads_as_version_zero() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(
            s.path(),
            r#"{"Electron": {"topology": "3_1", "crossing_number": 3}}"#,
        )
        .unwrap();

        let loaded = s.load().unwrap();
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.value.get("Electron").unwrap().topology, "3_1");
    }

    #[test]
    fn save_increments_version_and_records_note() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);

        let v1 = s.save(0, &set_with("Electron", "3_1"), Some("initial")).unwrap();
        assert_eq!(v1, 1);

        let loaded = s.load().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.note.as_deref(), Some("initial"));
        assert!(loaded.updated_at.is_some());
        assert_eq!(loaded.value, set_with("Electron", "3_1"));
        assert!(s.history().unwrap().is_empty());
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        s.save(0, &set_with("Electron", "3_1"), None).unwrap();

        let err = s.save(0, &set_with("Electron", "4_1"), None).unwrap_err();
        assert!(matches!(
            err,
            KsauError::VersionConflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
        assert_eq!(s.load().unwrap().value, set_with("Electron", "3_1"));
    }

    #[test]
    fn replaced_versions_go_to_history() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 5);
        s.save(0, &set_with("Electron", "3_1"), None).unwrap();
        s.save(1, &set_with("Electron", "4_1"), None).unwrap();
        s.save(2, &set_with("Electron", "5_2"), None).unwrap();

        assert_eq!(s.history().unwrap(), vec![1, 2]);
        let old = s.load_version(1).unwrap();
        assert_eq!(old.version, 1);
        assert_eq!(old.value.get("Electron").unwrap().topology, "3_1");
        assert_eq!(s.load_version(3).unwrap().value.get("Electron").unwrap().topology, "5_2");
        assert!(s.load_version(7).is_err());
    }

    #[test]
    fn history_is_pruned_to_keep() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 2);
        for v in 0..5 {
            s.save(v, &set_with("Muon", &format!("{}_1", v + 3)), None).unwrap();
        }
        assert_eq!(s.history().unwrap(), vec![3, 4]);
        assert_eq!(s.load().unwrap().version, 5);
    }

    #[test]
    fn legacy_file_is_archived_as_version_zero() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(s.path(), r#"{"Tau": {"topology": "6_1"}}"#).unwrap();

        let v = s.save(0, &set_with("Tau", "6_2"), None).unwrap();
        assert_eq!(v, 1);
        assert_eq!(s.history().unwrap(), vec![0]);
        assert_eq!(s.load_version(0).unwrap().value.get("Tau").unwrap().topology, "6_1");
    }

    #[test]
    fn legacy_float_caches_load() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(
            s.path(),
            r#"{"Electron": {"topology": "3_1", "crossing_number": 3.0, "determinant": 3.0, "signature": -2.0}}"#,
        )
        .unwrap();

        let loaded = s.load().unwrap();
        let e = loaded.value.get("Electron").unwrap();
        assert_eq!(e.crossing_number, Some(3));
        assert_eq!(e.determinant, Some(3));
        assert_eq!(e.signature, Some(-2));
    }

    #[test]
    fn bad_entry_error_names_particle_and_field() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(
            s.path(),
            r#"{"version": 4, "assignments": {
                "Electron": {"topology": "3_1"},
                "Muon": {"topology": "6_1", "mass": {"value": 105.7, "unit": "keV"}}
            }}"#,
        )
        .unwrap();

        match s.load().unwrap_err() {
            KsauError::JsonParse { reason, .. } => {
                assert!(reason.contains("particle 'Muon'"), "{reason}");
                assert!(reason.contains("unknown mass unit"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::write(s.path(), r#"{"Tau": {"topology": "6_2", "determinant": 11.5}}"#).unwrap();
        match s.load().unwrap_err() {
            KsauError::JsonParse { reason, .. } => {
                assert!(reason.contains("particle 'Tau'"), "{reason}");
                assert!(reason.contains("expected an integer"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn envelope_header_is_read() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(
            s.path(),
            r#"{"version": 7, "note": "hand edit", "assignments": {"Tau": {"topology": "6_2"}}}"#,
        )
        .unwrap();
        let loaded = s.load().unwrap();
        assert_eq!(loaded.version, 7);
        assert_eq!(loaded.note.as_deref(), Some("hand edit"));
        assert!(loaded.updated_at.is_none());
        assert_eq!(loaded.value.get("Tau").unwrap().topology, "6_2");
    }

    #[test]
    fn writer_waits_for_lock_and_sees_the_other_write() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);

        let held = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(s.lock_path())
            .unwrap();
        held.lock().unwrap();

        let path = s.path().to_path_buf();
        let waiter = std::thread::spawn(move || {
            JsonAssignmentStore::new(path, 3).save(0, &set_with("Tau", "6_3"), None)
        });

        // Another writer commits version 1 while the lock is held.
        std::thread::sleep(std::time::Duration::from_millis(50));
        fs::write(
            s.path(),
            r#"{"version": 1, "assignments": {"Tau": {"topology": "5_2"}}}"#,
        )
        .unwrap();
        drop(held);

        let err = waiter.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            KsauError::VersionConflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
        assert_eq!(s.load().unwrap().value.get("Tau").unwrap().topology, "5_2");
        assert!(s.history().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir, 3);
        fs::write(s.path(), "{not json").unwrap();
        assert!(matches!(s.load(), Err(KsauError::JsonParse { .. })));
        assert!(matches!(
            s.save(0, &AssignmentSet::new(), None),
            Err(KsauError::JsonParse { .. })
        ));
    }
}
