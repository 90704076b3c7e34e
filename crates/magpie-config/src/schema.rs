use anyhow::{anyhow, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::ConfigError;

pub const RECORD_SCHEMA: &str = "configuration_record_v1.jsonschema";
pub const PROFILE_SET_SCHEMA: &str = "profile_set_v1.jsonschema";

const EMBEDDED: &[(&str, &str)] = &[
    (
        RECORD_SCHEMA,
        include_str!("../schemas/configuration_record_v1.jsonschema"),
    ),
    (
        PROFILE_SET_SCHEMA,
        include_str!("../schemas/profile_set_v1.jsonschema"),
    ),
];

pub fn compile_schema(name: &str) -> Result<JSONSchema> {
    let raw = EMBEDDED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, raw)| *raw)
        .ok_or_else(|| anyhow!("unknown schema: {}", name))?;
    let schema: Value = serde_json::from_str(raw)?;
    JSONSchema::compile(&schema).map_err(|e| anyhow!("schema {} failed to compile: {}", name, e))
}

/// Validates `document` against the named embedded schema.
pub fn check_document(name: &str, document: &Value, origin: &str) -> Result<()> {
    let compiled = compile_schema(name)?;
    if let Err(errors) = compiled.validate(document) {
        let errors = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        return Err(ConfigError::Schema {
            origin: origin.to_string(),
            errors,
        }
        .into());
    }
    Ok(())
}
