use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::support::{deserialize, next_project, root_mut, serialize};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

const DEFAULT_FORMAT: &str = "A4 portrait";

/// Paper sizes in millimetres, portrait orientation.
const PAPER_SIZES: &[(&str, f64, f64)] = &[
    ("A3", 297.0, 420.0),
    ("A4", 210.0, 297.0),
    ("A5", 148.0, 210.0),
    ("Letter", 216.0, 279.0),
];

#[derive(Debug, Deserialize)]
struct LayoutV030 {
    #[serde(default)]
    format: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LayoutFormatV040 {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub orientation: &'static str,
}

#[derive(Debug, Serialize)]
struct LayoutV040 {
    format: Value,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

pub(crate) fn format_by_name(name: &str) -> Option<LayoutFormatV040> {
    let mut parts = name.split_whitespace();
    let paper = parts.next()?;
    let orientation = match parts.next() {
        Some(o) if o.eq_ignore_ascii_case("portrait") => "portrait",
        Some(o) if o.eq_ignore_ascii_case("landscape") => "landscape",
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    let (_, short, long) = PAPER_SIZES
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(paper))?;
    let (width, height) = if orientation == "portrait" {
        (*short, *long)
    } else {
        (*long, *short)
    };
    Some(LayoutFormatV040 {
        id: name.to_string(),
        width,
        height,
        orientation,
    })
}

/// Wraps layouts in a `{ list }` container and expands format names into
/// explicit dimensions.
pub struct FromV030ToV040 {
    target: Version,
}

impl FromV030ToV040 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 4, 0),
        }
    }

    fn expand_format(&self, format: Option<Value>) -> Result<Value, MigrationError> {
        match format {
            Some(Value::Object(object)) => Ok(Value::Object(object)),
            Some(Value::String(name)) => match format_by_name(&name) {
                Some(format) => serialize(&format, "layouts[].format", &self.target),
                None => {
                    warn!(
                        target: "abc_migrate",
                        event = "layout_format_unknown",
                        format = %name,
                        fallback = DEFAULT_FORMAT
                    );
                    self.default_format()
                }
            },
            _ => self.default_format(),
        }
    }

    fn default_format(&self) -> Result<Value, MigrationError> {
        let format = format_by_name(DEFAULT_FORMAT).ok_or_else(|| MigrationError::Shape {
            step: self.target.clone(),
            path: "layouts[].format".into(),
            reason: "default format is not in the formats table".into(),
        })?;
        serialize(&format, "layouts[].format", &self.target)
    }
}

impl Default for FromV030ToV040 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV030ToV040 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        let root = root_mut(&mut manifest, &self.target)?;

        let old_layouts = match root.remove("layouts") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(list)) => list,
            Some(Value::Object(mut container)) => match container.remove("list") {
                Some(Value::Array(list)) => list,
                None | Some(Value::Null) if container.is_empty() => Vec::new(),
                _ => {
                    return Err(MigrationError::Shape {
                        step: self.target.clone(),
                        path: "layouts.list".into(),
                        reason: "expected an array of layouts".into(),
                    })
                }
            },
            Some(_) => {
                return Err(MigrationError::Shape {
                    step: self.target.clone(),
                    path: "layouts".into(),
                    reason: "expected an array of layouts".into(),
                })
            }
        };

        let mut list = Vec::with_capacity(old_layouts.len());
        for layout in old_layouts {
            let old: LayoutV030 = deserialize(layout, "layouts[]", &self.target)?;
            let next = LayoutV040 {
                format: self.expand_format(old.format)?,
                rest: old.rest,
            };
            list.push(serialize(&next, "layouts[]", &self.target)?);
        }

        let mut container = Map::new();
        container.insert("list".into(), Value::Array(list));
        root.insert("layouts".into(), Value::Object(container));

        next_project(manifest, project.files(), &self.target)
    }
}
