use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::{AppError, AppResult};

pub const SCHEMA_INVALID_CODE: &str = "SCHEMA/INVALID";
const MAX_REPORTED_VIOLATIONS: usize = 20;

const MANIFEST_SCHEMA_SOURCE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/project-manifest-1.4.0.schema.json"
));

static MANIFEST_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA_SOURCE)
        .expect("manifest schema should remain valid JSON");
    JSONSchema::compile(&schema).expect("manifest schema should compile")
});

/// Every way `manifest` departs from the current manifest schema, as
/// `pointer: message` lines. Empty when the manifest is valid.
pub fn violations(manifest: &Value) -> Vec<String> {
    // Bind the result so the error iterator is dropped before `manifest`.
    let result = MANIFEST_SCHEMA.validate(manifest);
    match result {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|err| {
                let pointer = err.instance_path.to_string();
                let pointer = if pointer.is_empty() { "/".to_string() } else { pointer };
                format!("{pointer}: {err}")
            })
            .collect(),
    }
}

pub fn validate_manifest(manifest: &Value) -> AppResult<()> {
    let found = violations(manifest);
    if found.is_empty() {
        return Ok(());
    }
    let mut error = AppError::new(
        SCHEMA_INVALID_CODE,
        "Project manifest does not match the current schema",
    )
    .with_context("violations", found.len().to_string());
    for (index, violation) in found.iter().take(MAX_REPORTED_VIOLATIONS).enumerate() {
        error = error.with_context(format!("violation_{index}"), violation.clone());
    }
    Err(error)
}
