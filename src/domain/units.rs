//! Mass values with explicit units. MeV is canonical.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassUnit {
    #[serde(rename = "eV")]
    EV,
    #[serde(rename = "MeV")]
    MEV,
    #[serde(rename = "GeV")]
    GEV,
}

impl MassUnit {
    fn mev_per_unit(self) -> f64 {
        match self {
            MassUnit::EV => 1.0e-6,
            MassUnit::MEV => 1.0,
            MassUnit::GEV => 1.0e3,
        }
    }
}

impl FromStr for MassUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ev" => Ok(MassUnit::EV),
            "mev" => Ok(MassUnit::MEV),
            "gev" => Ok(MassUnit::GEV),
            other => Err(format!("unknown mass unit '{other}'")),
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MassUnit::EV => "eV",
            MassUnit::MEV => "MeV",
            MassUnit::GEV => "GeV",
        };
        write!(f, "{s}")
    }
}

/// On disk a mass is either a bare number (MeV) or `{"value": x, "unit": "GeV"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "MassRepr")]
pub struct Mass {
    pub value: f64,
    pub unit: MassUnit,
}

impl Mass {
    pub fn new(value: f64, unit: MassUnit) -> Self {
        Self { value, unit }
    }

    pub fn mev(value: f64) -> Self {
        Self::new(value, MassUnit::MEV)
    }

    pub fn to_mev(&self) -> f64 {
        self.value * self.unit.mev_per_unit()
    }

    pub fn in_unit(&self, unit: MassUnit) -> f64 {
        self.to_mev() / unit.mev_per_unit()
    }

    /// Parse a JSON mass in either accepted shape.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Mass::mev)
                .ok_or_else(|| "mass is not representable as f64".to_string()),
            serde_json::Value::Object(obj) => {
                let v = obj
                    .get("value")
                    .and_then(serde_json::Value::as_f64)
                    .ok_or_else(|| "mass object needs a numeric 'value'".to_string())?;
                let unit = match obj.get("unit") {
                    None => MassUnit::MEV,
                    Some(serde_json::Value::String(u)) => u.parse()?,
                    Some(_) => return Err("mass 'unit' must be a string".to_string()),
                };
                Ok(Mass::new(v, unit))
            }
            _ => Err("mass must be a number or {value, unit} object".to_string()),
        }
    }
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl TryFrom<serde_json::Value> for Mass {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Mass::from_json(&value)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum MassRepr {
    Bare(f64),
    Tagged { value: f64, unit: MassUnit },
}

impl From<Mass> for MassRepr {
    fn from(mass: Mass) -> Self {
        match mass.unit {
            MassUnit::MEV => MassRepr::Bare(mass.value),
            unit => MassRepr::Tagged {
                value: mass.value,
                unit,
            },
        }
    }
}
