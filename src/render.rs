use crate::config::OutputConfig;
use crate::pipeline::RenderInstruction;
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;

const STANDALONE_TEMPLATE: &str = include_str!("html/standalone.html");
pub const INDEX_HTML: &str = include_str!("html/index.html");

/// One `Point` feature per marker. Center, zoom and mode ride along as
/// foreign members of the collection.
pub fn to_feature_collection(instr: &RenderInstruction) -> FeatureCollection {
    let features = instr
        .markers
        .iter()
        .map(|m| {
            let mut properties = JsonObject::new();
            properties.insert("name".into(), json!(m.name));
            properties.insert("phone".into(), json!(m.phone));
            properties.insert("address".into(), json!(m.address));
            properties.insert("region".into(), json!(m.region));
            properties.insert("label".into(), json!(m.label));
            if let Some(d) = m.distance_km {
                properties.insert("distance_km".into(), json!(d));
            }
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![m.longitude, m.latitude]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let mut foreign = JsonObject::new();
    foreign.insert(
        "center".into(),
        json!([instr.center.latitude, instr.center.longitude]),
    );
    foreign.insert("zoom".into(), json!(instr.zoom));
    foreign.insert("mode".into(), json!(instr.mode));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign),
    }
}

/// A self-contained Leaflet page showing `instr`.
pub fn to_html(instr: &RenderInstruction) -> Result<String> {
    let payload = json!({
        "map": instr,
        "summary": instr.summary_lines(),
    });
    let data = serde_json::to_string(&payload).context("Failed to serialise map data")?;
    Ok(STANDALONE_TEMPLATE.replace("/*MAP_DATA*/null", &script_safe(&data)))
}

// JSON is valid JS, but `<` could close the surrounding <script> element
fn script_safe(json: &str) -> String {
    json.replace('<', "\\u003c")
}

pub fn write_outputs(output: &OutputConfig, instr: &RenderInstruction) -> Result<()> {
    let html = to_html(instr)?;
    write_file(&output.html, html.as_bytes())?;
    info!(path = %output.html.display(), markers = instr.markers.len(), "map written");

    if let Some(path) = &output.geojson {
        let body = serde_json::to_vec_pretty(&to_feature_collection(instr))
            .context("Failed to serialise GeoJSON")?;
        write_file(path, &body)?;
        info!(path = %path.display(), "GeoJSON written");
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::filter::{FilterState, RegionFilter, Selection};
    use crate::pipeline;
    use crate::store::RecordStore;
    use crate::types::record;
    use std::path::PathBuf;

    fn instruction(company: Option<&str>) -> RenderInstruction {
        let mut evil = record("<script>alert(1)</script>", None, Some("75"), 48.86, 2.35);
        evil.phone = None;
        let store = RecordStore::new(vec![
            record("A", Some("Alice"), Some("75"), 48.8566, 2.3522),
            evil,
        ]);
        let state = FilterState::new(Selection::All, RegionFilter::default(), company);
        pipeline::run(&store, &state, &ViewConfig::default())
    }

    #[test]
    fn one_point_feature_per_marker() {
        let fc = to_feature_collection(&instruction(None));
        assert_eq!(fc.features.len(), 2);

        let first = &fc.features[0];
        match &first.geometry.as_ref().unwrap().value {
            Value::Point(coords) => assert_eq!(coords, &vec![2.3522, 48.8566]),
            other => panic!("expected a point, got {other:?}"),
        }
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props["name"], "A");
        assert_eq!(props["region"], "75");
        assert!(props.get("distance_km").is_none());
        assert_eq!(fc.foreign_members.as_ref().unwrap()["zoom"], 6);
    }

    #[test]
    fn focused_features_carry_distances() {
        let fc = to_feature_collection(&instruction(Some("A")));
        let props = fc.features[0].properties.as_ref().unwrap();
        assert!(props["distance_km"].as_f64().is_some_and(|d| d < 1e-9));
        assert_eq!(fc.foreign_members.as_ref().unwrap()["mode"], "company_focused");
    }

    #[test]
    fn html_embeds_data_without_closing_the_script() {
        let html = to_html(&instruction(None)).unwrap();
        assert!(!html.contains("/*MAP_DATA*/null"));
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("\\u003cscript>alert(1)"));
        assert!(html.contains("leaflet"));
    }

    #[test]
    fn write_outputs_creates_html_and_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            html: dir.path().join("out/map.html"),
            geojson: Some(dir.path().join("out/map.geojson")),
        };
        write_outputs(&output, &instruction(None)).unwrap();

        let geojson = fs::read_to_string(dir.path().join("out/map.geojson")).unwrap();
        let parsed: geojson::GeoJson = geojson.parse().unwrap();
        assert!(matches!(parsed, geojson::GeoJson::FeatureCollection(_)));
        assert!(PathBuf::from(&output.html).exists());
    }
}
