//! JSON constants file adapter.

use crate::domain::constants::Constants;
use crate::domain::error::KsauError;
use crate::ports::constants_port::ConstantsPort;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct JsonConstantsAdapter {
    path: PathBuf,
}

impl JsonConstantsAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn parse(content: &str, origin: &str) -> Result<Constants, KsauError> {
        let value: Value = serde_json::from_str(content).map_err(|e| KsauError::JsonParse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(map) => Ok(Constants::new(map)),
            other => Err(KsauError::JsonParse {
                path: origin.to_string(),
                reason: format!("expected a JSON object at top level, found {}", kind_name(&other)),
            }),
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl ConstantsPort for JsonConstantsAdapter {
    fn load_constants(&self) -> Result<Constants, KsauError> {
        let origin = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|e| KsauError::FileRead {
            path: origin.clone(),
            reason: e.to_string(),
        })?;
        let constants = Self::parse(&content, &origin)?;
        info!(path = %origin, keys = constants.len(), "loaded constants");
        Ok(constants)
    }
}
