//! Helpers shared by the version steps.

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MigrationError;
use crate::project::{MigrationProject, ProjectFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerType {
    Vector,
    Predefined,
    Wms,
    Wmts,
    Xyz,
}

impl LayerType {
    /// Reads the layer tag, falling back to `metadata.type` for layers that
    /// only carry it there.
    pub fn of(layer: &Value) -> Option<Self> {
        let tag = layer
            .get("type")
            .or_else(|| layer.pointer("/metadata/type"))
            .and_then(Value::as_str)?;
        match tag {
            "Vector" => Some(Self::Vector),
            "Predefined" => Some(Self::Predefined),
            "Wms" => Some(Self::Wms),
            "Wmts" => Some(Self::Wmts),
            "Xyz" => Some(Self::Xyz),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub fn layers(manifest: &Value) -> impl Iterator<Item = &Value> {
    manifest
        .get("layers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

pub fn layers_mut(manifest: &mut Value) -> impl Iterator<Item = &mut Value> {
    manifest
        .get_mut("layers")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
}

/// `metadata` object of a layer, created when missing.
pub fn layer_metadata_mut<'a>(
    layer: &'a mut Value,
    step: &Version,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    let object = layer.as_object_mut().ok_or_else(|| MigrationError::Shape {
        step: step.clone(),
        path: "layers[]".into(),
        reason: "layer is not an object".into(),
    })?;
    let metadata = object
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    metadata.as_object_mut().ok_or_else(|| MigrationError::Shape {
        step: step.clone(),
        path: "layers[].metadata".into(),
        reason: "layer metadata is not an object".into(),
    })
}

pub fn root_mut<'a>(
    manifest: &'a mut Value,
    step: &Version,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    manifest.as_object_mut().ok_or_else(|| MigrationError::Shape {
        step: step.clone(),
        path: "$".into(),
        reason: "manifest is not an object".into(),
    })
}

pub fn metadata_mut<'a>(
    manifest: &'a mut Value,
    step: &Version,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    root_mut(manifest, step)?
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| MigrationError::Shape {
            step: step.clone(),
            path: "metadata".into(),
            reason: "metadata is not an object".into(),
        })
}

/// `list` array of a `{ list: [...] }` container such as `layouts` or
/// `sharedViews`. Missing containers yield nothing.
pub fn container_list_mut<'a>(
    manifest: &'a mut Value,
    container: &str,
    step: &Version,
) -> Result<Option<&'a mut Vec<Value>>, MigrationError> {
    let Some(holder) = manifest.get_mut(container) else {
        return Ok(None);
    };
    match holder.get_mut("list") {
        None => Ok(None),
        Some(list) => list
            .as_array_mut()
            .map(Some)
            .ok_or_else(|| MigrationError::Shape {
                step: step.clone(),
                path: format!("{container}.list"),
                reason: "expected an array".into(),
            }),
    }
}

pub fn deserialize<T: for<'de> Deserialize<'de>>(
    value: Value,
    path: &str,
    step: &Version,
) -> Result<T, MigrationError> {
    serde_json::from_value(value).map_err(|err| MigrationError::Shape {
        step: step.clone(),
        path: path.into(),
        reason: err.to_string(),
    })
}

pub fn serialize<T: Serialize>(value: &T, path: &str, step: &Version) -> Result<Value, MigrationError> {
    serde_json::to_value(value).map_err(|err| MigrationError::Shape {
        step: step.clone(),
        path: path.into(),
        reason: err.to_string(),
    })
}

/// Stamps `target` into `metadata.version` and wraps the result with the
/// untouched file bundle.
pub fn next_project(
    mut manifest: Value,
    files: &[ProjectFile],
    target: &Version,
) -> Result<MigrationProject, MigrationError> {
    metadata_mut(&mut manifest, target)?.insert("version".into(), Value::String(target.to_string()));
    MigrationProject::new(manifest, files.to_vec())
}
