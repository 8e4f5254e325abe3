// src/parsing/kml.rs - KML placemark extraction
use anyhow::{Context, Result};
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::models::core::{within_singapore, MapRecord};

#[derive(Debug, Default)]
pub struct ParsedKml {
    pub records: Vec<MapRecord>,
    pub placemarks_dropped: usize,
}

#[derive(Debug, Default)]
struct PlacemarkDraft {
    name: String,
    description: String,
    coordinates: String,
}

/// Name tags vary across exports: standard `<name>` plus the nonstandard
/// `<n>` spelling both occur in the wild.
fn is_name_tag(tag: &[u8]) -> bool {
    tag.eq_ignore_ascii_case(b"name") || tag.eq_ignore_ascii_case(b"n")
}

/// Event-scan a KML document into map records.
///
/// Placemarks with missing, unparsable, or out-of-Singapore coordinates are
/// a data-quality defect: dropped, counted, and logged, never kept. Folder
/// names become region hints for the placemarks they enclose.
pub fn parse_kml(raw: &str) -> Result<ParsedKml> {
    let mut reader = Reader::from_reader(raw.as_bytes());
    reader.trim_text(true);

    let mut parsed = ParsedKml::default();
    // Stack of enclosing <Folder> names; placemarks inherit the innermost.
    let mut folders: Vec<Option<String>> = Vec::new();
    let mut draft: Option<PlacemarkDraft> = None;
    // Innermost open element, which tells text events where they belong.
    let mut open_tags: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .context("malformed KML document")?
        {
            Event::Eof => break,
            Event::Start(e) => {
                let tag = e.local_name().as_ref().to_vec();
                if tag.eq_ignore_ascii_case(b"Folder") {
                    folders.push(None);
                } else if tag.eq_ignore_ascii_case(b"Placemark") {
                    draft = Some(PlacemarkDraft::default());
                }
                open_tags.push(tag);
            }
            Event::Text(t) => {
                let text = t.unescape().map(|s| s.into_owned()).unwrap_or_default();
                route_text(&text, &open_tags, &mut draft, &mut folders);
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                route_text(&text, &open_tags, &mut draft, &mut folders);
            }
            Event::End(e) => {
                let tag = e.local_name().as_ref().to_vec();
                open_tags.pop();
                if tag.eq_ignore_ascii_case(b"Placemark") {
                    if let Some(done) = draft.take() {
                        finish_placemark(done, &folders, &mut parsed);
                    }
                } else if tag.eq_ignore_ascii_case(b"Folder") {
                    folders.pop();
                }
            }
            _ => {}
        }
        buf.clear();
    }

    debug!(
        "KML: {} placemarks parsed, {} dropped",
        parsed.records.len(),
        parsed.placemarks_dropped
    );
    Ok(parsed)
}

fn route_text(
    text: &str,
    open_tags: &[Vec<u8>],
    draft: &mut Option<PlacemarkDraft>,
    folders: &mut [Option<String>],
) {
    let Some(current) = open_tags.last() else { return };

    if let Some(placemark) = draft.as_mut() {
        if is_name_tag(current) {
            placemark.name.push_str(text);
        } else if current.eq_ignore_ascii_case(b"description") {
            placemark.description.push_str(text);
        } else if current.eq_ignore_ascii_case(b"coordinates") {
            placemark.coordinates.push_str(text);
        }
    } else if is_name_tag(current) {
        // A name outside any placemark labels the innermost open folder.
        if let Some(folder) = folders.last_mut() {
            if folder.is_none() {
                *folder = Some(text.trim().to_string());
            }
        }
    }
}

fn finish_placemark(draft: PlacemarkDraft, folders: &[Option<String>], parsed: &mut ParsedKml) {
    let name = draft.name.trim().to_string();
    match parse_coordinate_triplet(&draft.coordinates) {
        Some((lng, lat)) if within_singapore(lng, lat) => {
            let folder_region = folders
                .iter()
                .rev()
                .find_map(|folder| folder.clone())
                .filter(|region| !region.is_empty());
            parsed.records.push(MapRecord {
                raw_name: name,
                description: draft.description.trim().to_string(),
                coordinates: (lng, lat),
                folder_region,
            });
        }
        Some((lng, lat)) => {
            warn!(
                "placemark '{}' outside Singapore bounds ({}, {}), dropped",
                name, lng, lat
            );
            parsed.placemarks_dropped += 1;
        }
        None => {
            warn!("placemark '{}' has unparsable coordinates, dropped", name);
            parsed.placemarks_dropped += 1;
        }
    }
}

/// `lng,lat[,alt]`, comma-separated; longitude first per the KML and
/// GeoJSON conventions. Line strings carry several triplets; the first one
/// is the point we keep.
fn parse_coordinate_triplet(raw: &str) -> Option<(f64, f64)> {
    let first = raw.split_whitespace().next()?;
    let mut parts = first.split(',');
    let lng = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    if lng.is_finite() && lat.is_finite() {
        Some((lng, lat))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_placemarks_with_standard_tags() {
        let kml = r#"<?xml version="1.0"?>
<kml><Document>
  <Placemark>
    <name>Jewel Changi Airport</name>
    <description>Basement 2, near the Rain Vortex</description>
    <Point><coordinates>103.9890,1.3601,0</coordinates></Point>
  </Placemark>
</Document></kml>"#;
        let parsed = parse_kml(kml).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.raw_name, "Jewel Changi Airport");
        assert_eq!(record.coordinates, (103.9890, 1.3601));
        assert_eq!(record.folder_region, None);
    }

    #[test]
    fn test_tolerates_nonstandard_name_tag_and_cdata() {
        let kml = r#"<kml><Document>
  <Placemark>
    <n>Funan</n>
    <description><![CDATA[Address: 107 North Bridge Rd<br>Male: Yes]]></description>
    <Point><coordinates>103.8497,1.2915</coordinates></Point>
  </Placemark>
</Document></kml>"#;
        let parsed = parse_kml(kml).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.raw_name, "Funan");
        assert!(record.description.contains("Address: 107 North Bridge Rd"));
        assert!(record.description.contains("Male: Yes"));
    }

    #[test]
    fn test_folder_name_becomes_region_hint() {
        let kml = r#"<kml><Document>
  <Folder>
    <name>North-East</name>
    <Placemark>
      <name>Nex</name>
      <Point><coordinates>103.8720,1.3509</coordinates></Point>
    </Placemark>
  </Folder>
  <Placemark>
    <name>VivoCity</name>
    <Point><coordinates>103.8219,1.2640</coordinates></Point>
  </Placemark>
</Document></kml>"#;
        let parsed = parse_kml(kml).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].folder_region.as_deref(), Some("North-East"));
        assert_eq!(parsed.records[1].folder_region, None);
    }

    #[test]
    fn test_out_of_bounds_and_broken_coordinates_are_dropped() {
        let kml = r#"<kml><Document>
  <Placemark><name>Somewhere in Johor</name>
    <Point><coordinates>103.7414,1.4927</coordinates></Point></Placemark>
  <Placemark><name>Wrong Hemisphere</name>
    <Point><coordinates>-73.9857,40.7484</coordinates></Point></Placemark>
  <Placemark><name>Garbage</name>
    <Point><coordinates>not,numbers</coordinates></Point></Placemark>
  <Placemark><name>Missing</name></Placemark>
</Document></kml>"#;
        let parsed = parse_kml(kml).unwrap();
        assert_eq!(parsed.records.len(), 1); // Johor point is inside the box
        assert_eq!(parsed.placemarks_dropped, 3);
    }

    #[test]
    fn test_takes_first_triplet_of_a_line_string() {
        let kml = r#"<kml><Placemark><name>Trail</name>
<coordinates>
  103.8000,1.3000,0
  103.8100,1.3100,0
</coordinates></Placemark></kml>"#;
        let parsed = parse_kml(kml).unwrap();
        assert_eq!(parsed.records[0].coordinates, (103.80, 1.30));
    }
}
