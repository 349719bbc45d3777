//! Particle to topology assignments with cached invariants.

use crate::domain::error::KsauError;
use crate::domain::invariant::{FieldValue, InvariantRecord, InvariantSnapshot};
use crate::domain::table::TopologyCatalog;
use crate::domain::units::Mass;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyAssignment {
    pub topology: String,
    #[serde(
        default,
        deserialize_with = "integral_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub crossing_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(
        default,
        deserialize_with = "integral_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub determinant: Option<i64>,
    #[serde(
        default,
        deserialize_with = "integral_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature: Option<i64>,
    #[serde(
        default,
        deserialize_with = "integral_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub components: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<Mass>,
    /// Keys this crate does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TopologyAssignment {
    pub fn new(topology: impl Into<String>) -> Self {
        Self {
            topology: topology.into(),
            crossing_number: None,
            volume: None,
            determinant: None,
            signature: None,
            components: None,
            mass: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_record(record: &InvariantRecord) -> Self {
        let mut a = Self::new(record.name.clone());
        a.set_snapshot(record.snapshot());
        a
    }

    pub fn snapshot(&self) -> InvariantSnapshot {
        InvariantSnapshot {
            crossing_number: self.crossing_number,
            volume: self.volume,
            determinant: self.determinant,
            signature: self.signature,
            components: self.components,
        }
    }

    pub fn set_snapshot(&mut self, snap: InvariantSnapshot) {
        self.crossing_number = snap.crossing_number;
        self.volume = snap.volume;
        self.determinant = snap.determinant;
        self.signature = snap.signature;
        self.components = snap.components;
    }
}

/// Cached integers written by older tooling may be floats (`3.0`) or null
/// markers (`"NaN"`). Fractional values are rejected.
fn integral_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(Some(f as i64))
                }
                _ => Err(D::Error::custom(format!("expected an integer, found {n}"))),
            }
        }
        Some(Value::String(s)) if FieldValue::parse(&s).is_missing() => Ok(None),
        Some(other) => Err(D::Error::custom(format!("expected an integer, found {other}"))),
    }
}

/// Cache drift for one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleEntry {
    pub particle: String,
    pub topology: String,
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentSet {
    entries: BTreeMap<String, TopologyAssignment>,
}

impl AssignmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, particle: &str) -> Option<&TopologyAssignment> {
        self.entries.get(particle)
    }

    pub fn particles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopologyAssignment)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, particle: impl Into<String>, assignment: TopologyAssignment) {
        self.entries.insert(particle.into(), assignment);
    }

    pub fn remove(&mut self, particle: &str) -> Option<TopologyAssignment> {
        self.entries.remove(particle)
    }

    /// Point `particle` at `topology` and recache its invariants. Mass and
    /// unrecognised keys of an existing entry are preserved.
    pub fn assign(
        &mut self,
        particle: &str,
        topology: &str,
        catalog: &TopologyCatalog,
    ) -> Result<&TopologyAssignment, KsauError> {
        let record = catalog
            .get(topology)
            .ok_or_else(|| KsauError::UnknownTopology(topology.to_string()))?;

        let entry = self
            .entries
            .entry(particle.to_string())
            .or_insert_with(|| TopologyAssignment::new(topology));
        entry.topology = record.name.clone();
        entry.set_snapshot(record.snapshot());
        Ok(entry)
    }

    /// Cached invariants that no longer match the tables. Assignments whose
    /// topology is unknown are not reported here.
    pub fn stale(&self, catalog: &TopologyCatalog) -> Vec<StaleEntry> {
        self.entries
            .iter()
            .filter_map(|(particle, a)| {
                let record = catalog.get(&a.topology)?;
                let fields = a.snapshot().differences(&record.snapshot());
                if fields.is_empty() {
                    None
                } else {
                    Some(StaleEntry {
                        particle: particle.clone(),
                        topology: a.topology.clone(),
                        fields,
                    })
                }
            })
            .collect()
    }

    /// Re-derive every cache from the tables; returns the particles changed.
    pub fn refresh(&mut self, catalog: &TopologyCatalog) -> Vec<String> {
        let mut changed = Vec::new();
        for (particle, a) in self.entries.iter_mut() {
            let Some(record) = catalog.get(&a.topology) else {
                continue;
            };
            let fresh = record.snapshot();
            if !a.snapshot().differences(&fresh).is_empty() {
                a.set_snapshot(fresh);
                changed.push(particle.clone());
            }
        }
        changed
    }
}
