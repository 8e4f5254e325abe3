// src/merge.rs - field-precedence merge of matched record pairs
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::classify::region::normalize_alias;
use crate::matching::name::normalized_key;
use crate::models::core::{
    coord_key_5dp, derive_id, identity_string, Amenities, FacilityType, Gender, Location,
    MapRecord, MatchType, Provenance, Region, SheetRecord,
};

static LABELED_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)address:\s*([^<\n]+)").expect("labeled address regex"));

/// Street-suffix scan over free text: a house number followed by a named
/// way. Includes the Malay street words common in Singapore addresses.
static STREET_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d+[\w\s]+(?:road|rd|street|st|avenue|ave|boulevard|blvd|lane|ln|drive|dr|terrace|ter|place|pl|court|ct|walk|link|crescent|cres|close|rise|view|way|jalan|lorong)[,\s]+\w+",
    )
    .expect("street address regex")
});

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5,}").expect("digit run regex"));

static MALE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(male|men|gents?)\b").expect("male marker regex"));
static FEMALE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(female|women|ladies|lady)\b").expect("female marker regex"));
static HANDICAP_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(handicap(ped)?|disabled|wheelchair)\b").expect("handicap marker regex")
});
static BABY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(baby|diaper|nursing)\b").expect("baby marker regex"));
static BIDET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(bidet|washlet)\b").expect("bidet marker regex"));

/// Structured claims scraped from a placemark description.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptionFlags {
    pub male: bool,
    pub female: bool,
    pub handicap: bool,
    pub baby_changing: bool,
    pub bidet: bool,
}

pub fn description_flags(description: &str) -> DescriptionFlags {
    DescriptionFlags {
        male: MALE_MARKER.is_match(description),
        female: FEMALE_MARKER.is_match(description),
        handicap: HANDICAP_MARKER.is_match(description),
        baby_changing: BABY_MARKER.is_match(description),
        bidet: BIDET_MARKER.is_match(description),
    }
}

/// An address is "fake" when it is just the name repeated back: a real
/// Singapore address reliably contains "singapore", a postal-code digit
/// run, or is long enough to carry a street line.
pub fn is_fake_address(name: &str, address: &str) -> bool {
    let address_lower = address.trim().to_lowercase();
    address_lower == name.trim().to_lowercase()
        && address_lower.len() < 25
        && !address_lower.contains("singapore")
        && !DIGIT_RUN.is_match(&address_lower)
}

/// Pull an address out of a placemark description: an `Address:`-labeled
/// line wins, then a street-suffix scan over the whole text.
pub fn extract_address_from_description(description: &str) -> Option<String> {
    if let Some(captures) = LABELED_ADDRESS.captures(description) {
        let address = captures[1].trim().to_string();
        if !address.is_empty() {
            return Some(address);
        }
    }
    STREET_ADDRESS
        .find(description)
        .map(|m| m.as_str().trim().to_string())
}

/// Deterministic coordinates inside the Singapore box for records with no
/// resolved position. Hash-derived, never random: re-runs must place the
/// same record on the same spot.
pub fn placeholder_coordinates(identity: &str) -> (f64, f64) {
    let digest = Sha256::digest(identity.as_bytes());
    let frac = |bytes: &[u8]| {
        let mut value = [0u8; 8];
        value.copy_from_slice(bytes);
        (u64::from_be_bytes(value) >> 11) as f64 / (1u64 << 53) as f64
    };
    let lng = 103.70 + frac(&digest[0..8]) * 0.25;
    let lat = 1.28 + frac(&digest[8..16]) * 0.14;
    (lng, lat)
}

fn merge_gender(sheet: Option<Gender>, flags: Option<&DescriptionFlags>) -> Gender {
    let map_claim = flags.and_then(|f| match (f.male, f.female) {
        (true, false) => Some(Gender::Male),
        (false, true) => Some(Gender::Female),
        (true, true) => Some(Gender::Any),
        (false, false) => None,
    });
    match (sheet, map_claim) {
        (Some(a), Some(b)) if a == b => a,
        (Some(_), Some(_)) => Gender::Any,
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Gender::Any,
    }
}

/// Combine a matched pair (or an unmatched singleton) into one canonical
/// location. At least one side must be present.
///
/// Precedence: sheets win curated fields (name, address, region hint), maps
/// win coordinates; booleans are OR-ed; provenance accumulates per source.
pub fn merge(
    sheet: Option<&SheetRecord>,
    map: Option<&MapRecord>,
    match_type: MatchType,
    match_confidence: f64,
) -> Result<Location> {
    if sheet.is_none() && map.is_none() {
        return Err(anyhow!("merge requires at least one source record"));
    }

    let flags = map.map(|m| description_flags(&m.description));

    let name = sheet
        .map(|s| s.raw_name.trim())
        .filter(|n| !n.is_empty())
        .or_else(|| map.map(|m| m.raw_name.trim()).filter(|n| !n.is_empty()))
        .unwrap_or("Unnamed Location")
        .to_string();

    let sheet_address = sheet
        .map(|s| s.raw_address.trim())
        .filter(|a| !a.is_empty() && !is_fake_address(&name, a));
    let address = match sheet_address {
        Some(address) => address.to_string(),
        // Never synthesize an address; empty means unknown.
        None => map
            .and_then(|m| extract_address_from_description(&m.description))
            .unwrap_or_default(),
    };

    let coordinates = map
        .map(|m| m.coordinates)
        .or_else(|| sheet.and_then(|s| s.coordinates))
        .unwrap_or_else(|| {
            placeholder_coordinates(&identity_string(&name, &address, (0.0, 0.0)))
        });

    // Explicit region strings resolve through the alias table here; the
    // classifier ladder fills whatever is still Unknown downstream.
    let sheet_region = sheet
        .and_then(|s| s.region_hint.as_deref())
        .and_then(normalize_alias);
    let map_region = map
        .and_then(|m| m.folder_region.as_deref())
        .and_then(normalize_alias);
    let region = sheet_region.or(map_region).unwrap_or(Region::Unknown);

    let sheet_amenities = Amenities {
        free_entry: true,
        ..Default::default()
    };
    let map_amenities = flags
        .map(|f| Amenities {
            wheelchair_access: f.handicap,
            baby_changing: f.baby_changing,
            free_entry: true,
            ..Default::default()
        })
        .unwrap_or_default();
    let amenities = if sheet.is_some() {
        sheet_amenities.or(&map_amenities)
    } else {
        map_amenities
    };

    let has_bidet = match (sheet, flags) {
        (Some(s), Some(f)) => s.has_bidet || f.bidet,
        (Some(s), None) => s.has_bidet,
        // The map source is itself a bidet inventory.
        (None, _) => true,
    };

    let mut provenance = Provenance::default();
    if let Some(s) = sheet {
        provenance.push_sheet(&s.remarks);
    }
    if let Some(m) = map {
        provenance.push_map(&m.description);
    }

    let prefix = match (sheet.is_some(), map.is_some()) {
        (true, true) => "merged",
        (true, false) => "sheets",
        (false, _) => "maps",
    };
    let id = derive_id(prefix, &identity_string(&name, &address, coordinates));

    // The hotel tab is an explicit facility claim; everything else starts
    // as Other and lets the classifier ladder decide.
    let facility_type = match sheet {
        Some(s) if s.source_tab.to_lowercase().contains("hotel") => FacilityType::Hotel,
        _ => FacilityType::Other,
    };

    Ok(Location {
        id,
        name,
        address,
        coordinates,
        region,
        facility_type,
        has_bidet,
        gender: merge_gender(sheet.map(|s| s.gender), flags.as_ref()),
        amenities,
        provenance,
        match_type,
        match_confidence,
        enrichment: None,
    })
}

/// Collapse locations sharing a `(normalized name, coordinates @ 5 dp)` key.
/// The first occurrence wins; duplicates donate their provenance and any
/// positive claims. Returns the survivors and the number removed.
pub fn dedup_locations(locations: Vec<Location>) -> (Vec<Location>, usize) {
    let mut kept: Vec<Location> = Vec::with_capacity(locations.len());
    let mut seen: HashMap<(String, (i64, i64)), usize> = HashMap::new();
    let mut removed = 0;

    for location in locations {
        let key = (
            normalized_key(&location.name),
            coord_key_5dp(location.coordinates.0, location.coordinates.1),
        );
        match seen.get(&key) {
            Some(&idx) => {
                let survivor = &mut kept[idx];
                let donor_provenance = location.provenance.clone();
                survivor.provenance.absorb(&donor_provenance);
                survivor.has_bidet |= location.has_bidet;
                survivor.amenities = survivor.amenities.or(&location.amenities);
                removed += 1;
            }
            None => {
                seen.insert(key, kept.len());
                kept.push(location);
            }
        }
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::within_singapore;

    fn sheet(name: &str, address: &str) -> SheetRecord {
        SheetRecord {
            raw_name: name.to_string(),
            raw_address: address.to_string(),
            remarks: "near the lifts".to_string(),
            gender: Gender::Female,
            source_tab: "FEMALE TOILETS".to_string(),
            region_hint: None,
            coordinates: None,
            has_bidet: true,
        }
    }

    fn placemark(name: &str, description: &str, lng: f64, lat: f64) -> MapRecord {
        MapRecord {
            raw_name: name.to_string(),
            description: description.to_string(),
            coordinates: (lng, lat),
            folder_region: None,
        }
    }

    #[test]
    fn test_merged_pair_prefers_sheet_fields_and_map_coordinates() {
        let s = sheet("VivoCity", "1 HarbourFront Walk, Singapore 098585");
        let m = placemark("Vivo City", "Female: Yes", 103.8219, 1.2640);
        let merged = merge(Some(&s), Some(&m), MatchType::NormalizedName, 0.9).unwrap();

        assert_eq!(merged.name, "VivoCity");
        assert_eq!(merged.address, "1 HarbourFront Walk, Singapore 098585");
        assert_eq!(merged.coordinates, (103.8219, 1.2640));
        assert_eq!(merged.match_type, MatchType::NormalizedName);
        assert_eq!(merged.match_confidence, 0.9);
        assert_eq!(merged.gender, Gender::Female);
        assert_eq!(merged.provenance.sheets, vec!["near the lifts"]);
        assert_eq!(merged.provenance.maps, vec!["Female: Yes"]);
    }

    #[test]
    fn test_fake_address_is_cleared() {
        // Address equals the 10-char name exactly.
        let s = sheet("Boat Place", "Boat Place");
        let merged = merge(Some(&s), None, MatchType::None, 0.0).unwrap();
        assert_eq!(merged.address, "");
    }

    #[test]
    fn test_real_addresses_survive_the_fake_filter() {
        assert!(is_fake_address("Boat Place", "Boat Place"));
        assert!(!is_fake_address("Changi Airport", "Changi Airport, Singapore"));
        assert!(!is_fake_address("98585 Mall", "98585 Mall")); // digit run
        assert!(!is_fake_address(
            "A Very Long Building Name Repeated",
            "A Very Long Building Name Repeated"
        ));
        assert!(!is_fake_address("VivoCity", "1 HarbourFront Walk"));
    }

    #[test]
    fn test_map_address_extraction_fallback() {
        let s = sheet("Short", "Short");
        let m = placemark(
            "Short",
            "Great toilet. Address: 68 Orchard Rd, Singapore 238839",
            103.845,
            1.300,
        );
        let merged = merge(Some(&s), Some(&m), MatchType::ExactName, 1.0).unwrap();
        assert_eq!(merged.address, "68 Orchard Rd, Singapore 238839");

        let street_only = placemark("Short", "toilet at 107 North Bridge Rd, Singapore", 103.8, 1.29);
        assert_eq!(
            extract_address_from_description(&street_only.description).as_deref(),
            Some("107 North Bridge Rd, Singapore")
        );
    }

    #[test]
    fn test_sheet_only_singleton_gets_deterministic_placeholder() {
        let s = sheet("Mystery Corner", "12 Unknown Lane");
        let a = merge(Some(&s), None, MatchType::None, 0.0).unwrap();
        let b = merge(Some(&s), None, MatchType::None, 0.0).unwrap();
        assert_eq!(a.coordinates, b.coordinates);
        assert!(within_singapore(a.coordinates.0, a.coordinates.1));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_map_only_singleton() {
        let m = placemark("Jewel Changi Airport", "Male: Yes, Handicap: Yes", 103.9890, 1.3601);
        let merged = merge(None, Some(&m), MatchType::None, 0.0).unwrap();
        assert_eq!(merged.name, "Jewel Changi Airport");
        assert_eq!(merged.address, "");
        assert!(merged.has_bidet);
        assert!(merged.amenities.wheelchair_access);
        assert_eq!(merged.gender, Gender::Male);
        assert!(merged.id.starts_with("maps-"));
    }

    #[test]
    fn test_gender_conflict_resolves_to_any() {
        let s = sheet("Conflicted", "1 Real Road, Singapore");
        let m = placemark("Conflicted", "Male: Yes", 103.8, 1.3);
        let merged = merge(Some(&s), Some(&m), MatchType::ExactName, 1.0).unwrap();
        assert_eq!(merged.gender, Gender::Any);
    }

    #[test]
    fn test_merge_requires_a_source() {
        assert!(merge(None, None, MatchType::None, 0.0).is_err());
    }

    #[test]
    fn test_dedup_collapses_capitalization_variants() {
        // Duplicate placemarks at identical coordinates with
        // different capitalizations of the same name.
        let a = merge(
            None,
            Some(&placemark("Jewel Changi Airport", "Level B2", 103.9890, 1.3601)),
            MatchType::None,
            0.0,
        )
        .unwrap();
        let b = merge(
            None,
            Some(&placemark("JEWEL CHANGI AIRPORT", "near vortex", 103.9890, 1.3601)),
            MatchType::None,
            0.0,
        )
        .unwrap();
        let (kept, removed) = dedup_locations(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 1);
        // The duplicate's comment trail is retained, not discarded.
        assert_eq!(kept[0].provenance.maps.len(), 2);
    }

    #[test]
    fn test_dedup_keeps_distinct_locations() {
        let a = merge(
            None,
            Some(&placemark("Nex", "", 103.8720, 1.3509)),
            MatchType::None,
            0.0,
        )
        .unwrap();
        let b = merge(
            None,
            Some(&placemark("Nex", "", 103.8721, 1.3509)), // different 5-dp cell
            MatchType::None,
            0.0,
        )
        .unwrap();
        let (kept, removed) = dedup_locations(vec![a, b]);
        assert_eq!(kept.len(), 2);
        assert_eq!(removed, 0);
    }
}
