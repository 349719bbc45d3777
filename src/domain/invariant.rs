//! Knot and link invariant records.
//!
//! A record is one row of an invariant database, keyed by topology name
//! (`"6_1"`, `"L11a431{0}"`). Cells are coerced once at load time: numbers
//! become [`FieldValue::Number`], null markers become [`FieldValue::Missing`],
//! everything else (polynomials, braid words, vectors) stays textual.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const COL_NAME: &str = "name";
pub const COL_CROSSING_NUMBER: &str = "crossing_number";
pub const COL_VOLUME: &str = "volume";
pub const COL_DETERMINANT: &str = "determinant";
pub const COL_SIGNATURE: &str = "signature";
pub const COL_COMPONENTS: &str = "components";

/// Cell contents that mean "no value" in the upstream databases.
const NULL_MARKERS: &[&str] = &["NaN", "nan", "None", "null", "Not known", "-"];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Coerce a raw cell. Unparseable numbers are kept as text rather than
    /// failing, so `as_number` gives the error-coerced numeric view.
    pub fn parse(raw: &str) -> Self {
        let cell = raw.trim();
        if cell.is_empty() || NULL_MARKERS.contains(&cell) {
            return FieldValue::Missing;
        }
        match cell.parse::<f64>() {
            Ok(v) if !v.is_nan() => FieldValue::Number(v),
            _ => FieldValue::Text(cell.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Missing => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvariantRecord {
    pub name: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl InvariantRecord {
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_number)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_text)
    }

    pub fn crossing_number(&self) -> Option<i64> {
        self.integer(COL_CROSSING_NUMBER)
    }

    pub fn volume(&self) -> Option<f64> {
        self.number(COL_VOLUME)
    }

    pub fn determinant(&self) -> Option<i64> {
        self.integer(COL_DETERMINANT)
    }

    pub fn signature(&self) -> Option<i64> {
        self.integer(COL_SIGNATURE)
    }

    /// Knot tables carry no components column; a knot has one component.
    pub fn components(&self) -> Option<i64> {
        match self.get(COL_COMPONENTS) {
            None => Some(1),
            Some(v) => v.as_number().and_then(as_integer),
        }
    }

    fn integer(&self, column: &str) -> Option<i64> {
        self.number(column).and_then(as_integer)
    }

    pub fn snapshot(&self) -> InvariantSnapshot {
        InvariantSnapshot {
            crossing_number: self.crossing_number(),
            volume: self.volume(),
            determinant: self.determinant(),
            signature: self.signature(),
            components: self.components(),
        }
    }
}

fn as_integer(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

/// The invariants cached alongside a topology assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvariantSnapshot {
    pub crossing_number: Option<i64>,
    pub volume: Option<f64>,
    pub determinant: Option<i64>,
    pub signature: Option<i64>,
    pub components: Option<i64>,
}

impl InvariantSnapshot {
    /// Names of fields that differ from `other`. Volumes compare with a
    /// relative tolerance since tables print them at varying precision.
    pub fn differences(&self, other: &InvariantSnapshot) -> Vec<&'static str> {
        let mut diffs = Vec::new();
        if self.crossing_number != other.crossing_number {
            diffs.push(COL_CROSSING_NUMBER);
        }
        let volume_matches = match (self.volume, other.volume) {
            (Some(a), Some(b)) => (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0),
            (None, None) => true,
            _ => false,
        };
        if !volume_matches {
            diffs.push(COL_VOLUME);
        }
        if self.determinant != other.determinant {
            diffs.push(COL_DETERMINANT);
        }
        if self.signature != other.signature {
            diffs.push(COL_SIGNATURE);
        }
        if self.components != other.components {
            diffs.push(COL_COMPONENTS);
        }
        diffs
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.crossing_number.is_none() {
            missing.push(COL_CROSSING_NUMBER);
        }
        if self.volume.is_none() {
            missing.push(COL_VOLUME);
        }
        if self.determinant.is_none() {
            missing.push(COL_DETERMINANT);
        }
        if self.signature.is_none() {
            missing.push(COL_SIGNATURE);
        }
        if self.components.is_none() {
            missing.push(COL_COMPONENTS);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(cells: &[(&str, &str)]) -> InvariantRecord {
        let fields = cells
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::parse(v)))
            .collect();
        InvariantRecord::new("6_1", fields)
    }

    #[test]
    fn parse_numbers() {
        assert_eq!(FieldValue::parse("3"), FieldValue::Number(3.0));
        assert_eq!(FieldValue::parse(" 2.8281 "), FieldValue::Number(2.8281));
        assert_eq!(FieldValue::parse("-4"), FieldValue::Number(-4.0));
    }

    #[test]
    fn parse_null_markers_as_missing() {
        for raw in ["", "  ", "NaN", "None", "Not known", "-"] {
            assert!(FieldValue::parse(raw).is_missing(), "{raw:?}");
        }
    }

    #[test]
    fn parse_polynomial_as_text() {
        let v = FieldValue::parse("[-1,3,-1]");
        assert_eq!(v.as_text(), Some("[-1,3,-1]"));
        assert_eq!(v.as_number(), None);
    }

    #[test]
    fn typed_accessors() {
        let r = record(&[
            ("crossing_number", "6"),
            ("volume", "3.16396"),
            ("determinant", "9"),
            ("signature", "0"),
        ]);
        assert_eq!(r.crossing_number(), Some(6));
        assert_eq!(r.determinant(), Some(9));
        assert_eq!(r.signature(), Some(0));
        assert!((r.volume().unwrap() - 3.16396).abs() < 1e-12);
    }

    #[test]
    fn components_default_to_one_without_column() {
        let r = record(&[("crossing_number", "3")]);
        assert_eq!(r.components(), Some(1));
    }

    #[test]
    fn components_missing_cell_is_none() {
        let r = record(&[("components", "")]);
        assert_eq!(r.components(), None);
    }

    #[test]
    fn fractional_crossing_number_is_not_an_integer() {
        let r = record(&[("crossing_number", "6.5")]);
        assert_eq!(r.crossing_number(), None);
    }

    #[test]
    fn snapshot_differences_tolerate_volume_rounding() {
        let a = InvariantSnapshot {
            crossing_number: Some(6),
            volume: Some(3.163963228),
            determinant: Some(9),
            signature: Some(0),
            components: Some(1),
        };
        let mut b = a;
        b.volume = Some(3.1639632280000001);
        assert!(a.differences(&b).is_empty());

        b.determinant = Some(11);
        b.volume = Some(3.2);
        assert_eq!(a.differences(&b), vec!["volume", "determinant"]);
    }

    #[test]
    fn snapshot_missing_fields() {
        let s = InvariantSnapshot {
            crossing_number: Some(3),
            ..Default::default()
        };
        assert_eq!(
            s.missing_fields(),
            vec!["volume", "determinant", "signature", "components"]
        );
    }

    proptest! {
        #[test]
        fn finite_floats_parse_back(v in -1.0e12f64..1.0e12f64) {
            let parsed = FieldValue::parse(&v.to_string());
            prop_assert_eq!(parsed, FieldValue::Number(v));
        }
    }
}
