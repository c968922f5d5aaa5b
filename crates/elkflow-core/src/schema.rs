//! Structural validation of layout JSON against the bundled draft-07 ELK schema.
//!
//! Every violation is collected with its JSON-pointer path (`/children/0/edges/1`) so callers can
//! report all problems at once rather than the first serde error.

use crate::{Error, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::sync::OnceLock;

const ELK_SCHEMA: &str = include_str!("elkschema.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn compiled() -> &'static JSONSchema {
    static SCHEMA: OnceLock<JSONSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema: Value = serde_json::from_str(ELK_SCHEMA).expect("valid schema json");
        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("valid schema")
    })
}

/// Collects every violation in `value`, treating it as a root node.
pub fn check(value: &Value) -> Vec<SchemaError> {
    let Err(errors) = compiled().validate(value) else {
        return Vec::new();
    };
    errors
        .map(|error| {
            let path = error.instance_path.to_string();
            SchemaError {
                path: if path.is_empty() { "/".to_string() } else { path },
                message: error.to_string(),
            }
        })
        .collect()
}

/// Like [`check`], failing with [`Error::SchemaInvalid`] when anything is wrong.
pub fn validate(value: &Value) -> Result<()> {
    let errors = check(value);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaInvalid { errors })
    }
}
