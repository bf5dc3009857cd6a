use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::support::{
    container_list_mut, deserialize, next_project, root_mut, serialize, Dimensions, Position,
};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

const FRAME_MARGIN: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum LegendDisplay {
    Hidden,
    UpperLeftCorner,
    UpperRightCorner,
    BottomLeftCorner,
    BottomRightCorner,
}

#[derive(Debug, Deserialize)]
struct LegendV060 {
    display: LegendDisplay,
    width: f64,
    height: f64,
    #[serde(default)]
    items: Vec<LegendItemV060>,
}

#[derive(Debug, Deserialize)]
struct LegendItemV060 {
    text: String,
    #[serde(default)]
    symbol: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextFrameV070 {
    id: String,
    size: Dimensions,
    position: Position,
    content: Vec<LegendBlockV070>,
}

#[derive(Debug, Serialize)]
struct LegendBlockV070 {
    #[serde(rename = "type")]
    kind: &'static str,
    display: LegendDisplay,
    items: Vec<LegendItemV070>,
}

#[derive(Debug, Serialize)]
struct LegendItemV070 {
    id: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl LegendV060 {
    fn size(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// A copy of the legend as a text frame placed inside `container`. Every
    /// copy gets its own identifiers.
    fn to_frame(&self, container: Option<Dimensions>) -> TextFrameV070 {
        TextFrameV070 {
            id: Uuid::new_v4().to_string(),
            size: self.size(),
            position: frame_position(self.display, container, self.size()),
            content: vec![LegendBlockV070 {
                kind: "legend",
                display: self.display,
                items: self
                    .items
                    .iter()
                    .map(|item| {
                        let mut rest = item.rest.clone();
                        // Every copy gets a fresh id.
                        rest.remove("id");
                        LegendItemV070 {
                            id: Uuid::new_v4().to_string(),
                            text: item.text.clone(),
                            symbol: item.symbol.clone(),
                            rest,
                        }
                    })
                    .collect(),
            }],
        }
    }
}

fn frame_position(display: LegendDisplay, container: Option<Dimensions>, frame: Dimensions) -> Position {
    let Some(container) = container else {
        return Position {
            x: FRAME_MARGIN,
            y: FRAME_MARGIN,
        };
    };
    let right = (container.width - frame.width - FRAME_MARGIN).max(0.0);
    let bottom = (container.height - frame.height - FRAME_MARGIN).max(0.0);
    let (x, y) = match display {
        LegendDisplay::Hidden | LegendDisplay::UpperLeftCorner => (FRAME_MARGIN, FRAME_MARGIN),
        LegendDisplay::UpperRightCorner => (right, FRAME_MARGIN),
        LegendDisplay::BottomLeftCorner => (FRAME_MARGIN, bottom),
        LegendDisplay::BottomRightCorner => (right, bottom),
    };
    Position { x, y }
}

fn dimensions_at(value: &Value, pointer: &str) -> Option<Dimensions> {
    let found = value.pointer(pointer)?;
    Some(Dimensions {
        width: found.get("width")?.as_f64()?,
        height: found.get("height")?.as_f64()?,
    })
}

/// Replaces the project wide legend with a legend text frame on every
/// layout and every shared view.
pub struct FromV060ToV070 {
    target: Version,
}

impl FromV060ToV070 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 7, 0),
        }
    }

    fn append_frame(
        &self,
        holder: &mut Value,
        frame: Option<TextFrameV070>,
        path: &str,
    ) -> Result<(), MigrationError> {
        let object = holder.as_object_mut().ok_or_else(|| MigrationError::Shape {
            step: self.target.clone(),
            path: path.into(),
            reason: "expected an object".into(),
        })?;
        let frames = object
            .entry("textFrames")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| MigrationError::Shape {
                step: self.target.clone(),
                path: format!("{path}.textFrames"),
                reason: "expected an array".into(),
            })?;
        if let Some(frame) = frame {
            frames.push(serialize(&frame, path, &self.target)?);
        }
        Ok(())
    }
}

impl Default for FromV060ToV070 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV060ToV070 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        let legend: Option<LegendV060> = match root_mut(&mut manifest, &self.target)?.remove("legend") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(deserialize(raw, "legend", &self.target)?),
        };
        let view_dimensions = dimensions_at(&manifest, "/sharedViews/mapDimensions");

        if let Some(layouts) = container_list_mut(&mut manifest, "layouts", &self.target)? {
            for layout in layouts.iter_mut() {
                let container = dimensions_at(layout, "/format");
                let frame = legend.as_ref().map(|legend| legend.to_frame(container));
                self.append_frame(layout, frame, "layouts.list[]")?;
            }
        }
        if let Some(views) = container_list_mut(&mut manifest, "sharedViews", &self.target)? {
            for view in views.iter_mut() {
                let frame = legend.as_ref().map(|legend| legend.to_frame(view_dimensions));
                self.append_frame(view, frame, "sharedViews.list[]")?;
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project_with_legend(display: &str) -> MigrationProject {
        MigrationProject::new(
            json!({
                "metadata": { "version": "0.6.0" },
                "legend": {
                    "display": display,
                    "width": 200,
                    "height": 100,
                    "items": [
                        { "id": "i1", "text": "Roads", "symbol": { "geomType": "LineString" }, "style": { "bold": true } },
                        { "id": "i2", "text": "Rivers" }
                    ]
                },
                "layouts": { "list": [
                    { "id": "l1", "format": { "id": "A4 portrait", "width": 210.0, "height": 297.0, "orientation": "portrait" } }
                ] },
                "sharedViews": {
                    "fullscreen": false,
                    "mapDimensions": { "width": 800, "height": 600 },
                    "list": [{ "id": "s1", "title": "Overview", "layers": [] }]
                }
            }),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn positions_follow_display_corner() {
        let container = Some(Dimensions { width: 800.0, height: 600.0 });
        let frame = Dimensions { width: 200.0, height: 100.0 };
        assert_eq!(
            frame_position(LegendDisplay::BottomRightCorner, container, frame),
            Position { x: 590.0, y: 490.0 }
        );
        assert_eq!(
            frame_position(LegendDisplay::UpperRightCorner, container, frame),
            Position { x: 590.0, y: 10.0 }
        );
        assert_eq!(
            frame_position(LegendDisplay::Hidden, None, frame),
            Position { x: 10.0, y: 10.0 }
        );
    }

    #[tokio::test]
    async fn copies_legend_to_layouts_and_shared_views() {
        let project = project_with_legend("BottomRightCorner");
        let migrated = FromV060ToV070::new()
            .migrate(&project, &MigrationSettings::default())
            .await
            .unwrap();
        let manifest = migrated.manifest();
        assert!(manifest.get("legend").is_none());

        let layout_frame = &manifest["layouts"]["list"][0]["textFrames"][0];
        let view_frame = &manifest["sharedViews"]["list"][0]["textFrames"][0];
        assert_eq!(layout_frame["size"], json!({ "width": 200.0, "height": 100.0 }));
        assert_eq!(view_frame["position"], json!({ "x": 590.0, "y": 490.0 }));
        assert_eq!(layout_frame["position"], json!({ "x": 0.0, "y": 187.0 }));

        let legend = &layout_frame["content"][0];
        assert_eq!(legend["type"], "legend");
        assert_eq!(legend["display"], "BottomRightCorner");
        assert_eq!(legend["items"][0]["text"], "Roads");
        assert_eq!(legend["items"][0]["symbol"], json!({ "geomType": "LineString" }));
        assert!(legend["items"][1].get("symbol").is_none());
        assert_eq!(legend["items"][0]["style"], json!({ "bold": true }));

        assert_ne!(layout_frame["id"], view_frame["id"]);
        assert_ne!(
            layout_frame["content"][0]["items"][0]["id"],
            view_frame["content"][0]["items"][0]["id"]
        );
        assert_ne!(legend["items"][0]["id"], "i1");
    }

    #[tokio::test]
    async fn unknown_display_is_a_shape_error() {
        let err = FromV060ToV070::new()
            .migrate(&project_with_legend("Sideways"), &MigrationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Shape { .. }));
    }

    #[tokio::test]
    async fn without_legend_frames_are_empty() {
        let project = MigrationProject::new(
            json!({
                "metadata": { "version": "0.6.0" },
                "layouts": { "list": [{ "id": "l1" }] },
                "sharedViews": { "list": [] }
            }),
            vec![],
        )
        .unwrap();
        let migrated = FromV060ToV070::new()
            .migrate(&project, &MigrationSettings::default())
            .await
            .unwrap();
        assert_eq!(migrated.manifest()["layouts"]["list"][0]["textFrames"], json!([]));
    }
}
