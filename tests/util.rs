#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use abc_migrate_lib::i18n::Catalog;
use abc_migrate_lib::legacy_crypto::{KdfParams, LegacyCipher, PassphraseCipher};
use abc_migrate_lib::modal::StaticModal;
use abc_migrate_lib::{MigrationProject, MigrationServices, ProjectFile};
use serde_json::{json, Value};

pub const PASSWORD: &str = "azerty1234";

pub fn test_cipher() -> PassphraseCipher {
    PassphraseCipher::new(KdfParams::for_test())
}

pub fn encrypt(value: &str) -> String {
    test_cipher().encrypt(value, PASSWORD).expect("encrypt fixture value")
}

pub fn services(modal: Arc<StaticModal>) -> MigrationServices {
    MigrationServices {
        modal,
        cipher: Arc::new(test_cipher()),
        translator: Arc::new(Catalog::default()),
    }
}

pub fn project(manifest: Value) -> MigrationProject {
    MigrationProject::new(manifest, bundle()).expect("fixture manifest has a version")
}

pub fn bundle() -> Vec<ProjectFile> {
    vec![
        ProjectFile::new("layers/roads.geojson", br#"{"type":"FeatureCollection"}"#.to_vec()),
        ProjectFile::new("icons/pin.png", vec![0x89, 0x50, 0x4e, 0x47]),
    ]
}

/// A 0.1.0 project without protected values: it migrates in silent mode.
pub fn plain_v010() -> Value {
    json!({
        "metadata": {
            "id": "5f1e2a2c-0d1b-4f39-9b5e-3c9d2b1a0001",
            "name": "Roads of Lyon",
            "version": "0.1.0",
            "projection": { "name": "EPSG:4326" }
        },
        "layers": [
            { "type": "Predefined", "metadata": { "id": "base", "model": "OSM", "opacity": 100 } },
            { "type": "Vector", "metadata": { "id": "roads", "opacity": 60 } }
        ],
        "layouts": [
            { "id": "page-1", "name": "Page 1", "format": "A4 landscape" }
        ],
        "legend": {
            "display": "BottomRightCorner",
            "width": 200,
            "height": 300,
            "items": [{ "text": "Roads" }]
        }
    })
}

/// The 0.5.0 project whose WMS values were saved encrypted with
/// [`PASSWORD`].
pub fn encrypted_wms_v050() -> Value {
    json!({
        "metadata": { "id": "p-wms", "name": "WMS", "version": "0.5.0", "public": false },
        "view": { "center": [0, 0], "resolution": 1000, "projection": { "name": "EPSG:3857" } },
        "layers": [
            { "type": "Predefined", "metadata": { "id": "base", "model": "OSM", "opacity": 100 } },
            { "type": "Wms", "metadata": {
                "id": "wms",
                "opacity": 100,
                "remoteUrl": encrypt("http://remote-url"),
                "remoteLayerName": "topp:states",
                "auth": {
                    "username": encrypt("test-username"),
                    "password": encrypt("test-password")
                }
            } }
        ],
        "layouts": { "list": [] },
        "sharedViews": { "fullscreen": false, "mapDimensions": { "width": 800, "height": 600 }, "list": [] },
        "legend": { "display": "Hidden", "width": 200, "height": 300, "items": [] }
    })
}

/// The 0.6.0 project whose legend must be copied to every layout and
/// shared view.
pub fn legend_v060() -> Value {
    json!({
        "metadata": { "id": "p-legend", "name": "Legend", "version": "0.6.0", "public": false, "containsCredentials": false },
        "view": { "center": [0, 0], "resolution": 1000, "projection": { "name": "EPSG:3857" } },
        "layers": [
            { "type": "Vector", "metadata": { "id": "v1", "opacity": 100 } }
        ],
        "layouts": { "list": [
            { "id": "l1", "format": { "id": "A4 portrait", "width": 210, "height": 297, "orientation": "portrait" } },
            { "id": "l2", "format": { "id": "A3 landscape", "width": 420, "height": 297, "orientation": "landscape" } }
        ] },
        "sharedViews": {
            "fullscreen": false,
            "mapDimensions": { "width": 800, "height": 600 },
            "list": [
                { "id": "s1", "layers": ["v1"] },
                { "id": "s2", "layers": ["v1"] },
                { "id": "s3", "layers": [] }
            ]
        },
        "legend": {
            "display": "UpperRightCorner",
            "width": 150,
            "height": 100,
            "items": [{ "text": "Roads" }, { "text": "Rivers" }]
        }
    })
}

/// The 1.3.0 project still using discontinued Stamen base maps.
pub fn stamen_v130() -> Value {
    json!({
        "metadata": { "id": "p-stamen", "name": "Stamen", "version": "1.3.0", "public": false },
        "view": { "center": [0, 0], "resolution": 1000, "projection": { "name": "EPSG:3857" } },
        "layers": [
            { "type": "Predefined", "metadata": { "id": "a", "model": "StamenToner", "opacity": 1.0 } },
            { "type": "Predefined", "metadata": { "id": "b", "model": "StamenWatercolor", "opacity": 1.0 } },
            { "type": "Predefined", "metadata": { "id": "c", "model": "OpenStreetMap", "opacity": 1.0 } }
        ],
        "layouts": { "list": [] },
        "sharedViews": { "fullscreen": false, "mapDimensions": { "width": 800, "height": 600 }, "list": [] }
    })
}
