// src/output.rs - GeoJSON feature collection persistence
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::models::core::Location;

#[derive(Debug, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[longitude, latitude]`, the GeoJSON convention, never swapped.
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Geometry,
    pub properties: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

pub fn to_feature(location: &Location) -> Result<Feature> {
    let (lng, lat) = location.coordinates;
    Ok(Feature {
        kind: "Feature",
        geometry: Geometry {
            kind: "Point",
            coordinates: [lng, lat],
        },
        properties: serde_json::to_value(location)
            .with_context(|| format!("serializing location '{}'", location.name))?,
    })
}

pub fn feature_collection(locations: &[Location]) -> Result<FeatureCollection> {
    let features = locations.iter().map(to_feature).collect::<Result<Vec<_>>>()?;
    Ok(FeatureCollection {
        kind: "FeatureCollection",
        features,
    })
}

/// Whole-file overwrite; the serving layer only ever reads complete files.
pub fn persist(path: &Path, collection: &FeatureCollection) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }
    let body = serde_json::to_string_pretty(collection).context("encoding feature collection")?;
    fs::write(path, body).with_context(|| format!("writing {:?}", path))?;
    info!("wrote {} features to {:?}", collection.features.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::models::core::{MapRecord, MatchType};

    fn sample_location() -> Location {
        let map = MapRecord {
            raw_name: "Jewel Changi Airport".to_string(),
            description: "Address: 78 Airport Blvd".to_string(),
            coordinates: (103.9890, 1.3601),
            folder_region: None,
        };
        merge(None, Some(&map), MatchType::None, 0.0).unwrap()
    }

    #[test]
    fn test_geometry_is_longitude_first() {
        let feature = to_feature(&sample_location()).unwrap();
        assert_eq!(feature.geometry.coordinates, [103.9890, 1.3601]);
    }

    #[test]
    fn test_properties_carry_location_fields() {
        let feature = to_feature(&sample_location()).unwrap();
        let props = &feature.properties;
        assert_eq!(props["name"], "Jewel Changi Airport");
        assert_eq!(props["address"], "78 Airport Blvd");
        assert_eq!(props["matchType"], "none");
        assert_eq!(props["hasBidet"], true);
        assert!(props["id"].as_str().unwrap().starts_with("maps-"));
        // Coordinates live in geometry, not properties.
        assert!(props.get("coordinates").is_none());
        // Unenriched locations carry no synthetic fields.
        assert!(props.get("floor").is_none());
    }

    #[test]
    fn test_enriched_properties_are_flattened() {
        let mut location = sample_location();
        location.facility_type = crate::models::core::FacilityType::Mall;
        location.enrichment = Some(crate::enrich::synthetic::synthesize(&location));
        let feature = to_feature(&location).unwrap();
        assert!(feature.properties.get("floor").is_some());
        assert!(feature.properties.get("visitCount").is_some());
        assert!(feature.properties["accessibility"].get("hasRamp").is_some());
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/combined.geojson");
        let collection = feature_collection(&[sample_location()]).unwrap();
        persist(&path, &collection).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        assert_eq!(parsed["features"].as_array().unwrap().len(), 1);
        assert_eq!(
            parsed["features"][0]["geometry"]["coordinates"][0],
            103.9890
        );
    }
}
