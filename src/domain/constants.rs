//! Physical and mathematical constants loaded from JSON.
//!
//! The constants file is a free-form object. Keys may nest; lookups take
//! dotted paths (`"quarks.top.mass"`).

use crate::domain::error::KsauError;
use crate::domain::units::Mass;
use serde_json::{Map, Value};
use std::f64::consts::PI;

/// κ = π/24
pub const KAPPA: f64 = PI / 24.0;

pub const KAPPA_KEY: &str = "kappa";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constants {
    values: Map<String, Value>,
}

impl Constants {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    pub fn require_number(&self, path: &str) -> Result<f64, KsauError> {
        let value = self
            .get(path)
            .ok_or_else(|| KsauError::MissingConstant(path.to_string()))?;
        value.as_f64().ok_or_else(|| KsauError::InvalidConstant {
            key: path.to_string(),
            reason: format!("expected a number, found {value}"),
        })
    }

    pub fn kappa(&self) -> f64 {
        self.number(KAPPA_KEY).unwrap_or(KAPPA)
    }

    pub fn mass(&self, path: &str) -> Result<Mass, KsauError> {
        let value = self
            .get(path)
            .ok_or_else(|| KsauError::MissingConstant(path.to_string()))?;
        Mass::from_json(value).map_err(|reason| KsauError::InvalidConstant {
            key: path.to_string(),
            reason,
        })
    }

    /// Every leaf as `(dotted path, value)`, depth first, in key order.
    pub fn leaves(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        for (k, v) in &self.values {
            collect_leaves(k.clone(), v, &mut out);
        }
        out
    }
}

fn collect_leaves<'a>(prefix: String, value: &'a Value, out: &mut Vec<(String, &'a Value)>) {
    match value {
        // A {value, unit} object is a mass, not a namespace.
        Value::Object(obj) if !obj.contains_key("value") => {
            for (k, v) in obj {
                collect_leaves(format!("{prefix}.{k}"), v, out);
            }
        }
        _ => out.push((prefix, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn sample() -> Constants {
        let value = json!({
            "alpha_em": 0.0072973525693,
            "electron_mass": 0.51099895,
            "quarks": {
                "top": { "mass": { "value": 172.69, "unit": "GeV" } },
                "up": { "mass": 2.16 }
            },
            "label": "pdg-2024"
        });
        Constants::new(value.as_object().unwrap().clone())
    }

    #[test]
    fn kappa_defaults_to_pi_over_24() {
        assert_relative_eq!(sample().kappa(), PI / 24.0);
        assert_relative_eq!(KAPPA, 0.1308996938995747, max_relative = 1e-15);
    }

    #[test]
    fn kappa_prefers_json_value() {
        let c = Constants::new(json!({"kappa": 0.13}).as_object().unwrap().clone());
        assert_relative_eq!(c.kappa(), 0.13);
    }

    #[test]
    fn dotted_lookup() {
        let c = sample();
        assert_eq!(c.number("quarks.up.mass"), Some(2.16));
        assert!(c.get("quarks.charm.mass").is_none());
        assert!(c.get("alpha_em.nested").is_none());
    }

    #[test]
    fn require_number_errors() {
        let c = sample();
        assert!(matches!(
            c.require_number("missing"),
            Err(KsauError::MissingConstant(k)) if k == "missing"
        ));
        assert!(matches!(
            c.require_number("label"),
            Err(KsauError::InvalidConstant { .. })
        ));
        assert_relative_eq!(c.require_number("alpha_em").unwrap(), 0.0072973525693);
    }

    #[test]
    fn mass_normalises_units() {
        let c = sample();
        assert_relative_eq!(c.mass("quarks.top.mass").unwrap().to_mev(), 172_690.0, max_relative = 1e-12);
        assert_relative_eq!(c.mass("electron_mass").unwrap().to_mev(), 0.51099895);
        assert!(c.mass("label").is_err());
    }

    #[test]
    fn leaves_flatten_namespaces_but_not_masses() {
        let c = sample();
        let paths: Vec<String> = c.leaves().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "alpha_em",
                "electron_mass",
                "label",
                "quarks.top.mass",
                "quarks.up.mass"
            ]
        );
    }
}
