// src/classify/region.rs - geographic region assignment
use crate::models::core::{within_singapore, Region};

/// Alias table mapping region spellings and well-known neighbourhood names
/// to planning regions. `Institutions` is the non-geographic bucket the map
/// source uses for schools and campuses.
const REGION_ALIASES: [(&str, Region); 48] = [
    ("north", Region::North),
    ("north region", Region::North),
    ("n", Region::North),
    ("northern", Region::North),
    ("north singapore", Region::North),
    ("woodlands", Region::North),
    ("sembawang", Region::North),
    ("yishun", Region::North),
    ("mandai", Region::North),
    ("south", Region::South),
    ("south region", Region::South),
    ("s", Region::South),
    ("southern", Region::South),
    ("sentosa", Region::South),
    ("harbourfront", Region::South),
    ("bukit merah", Region::South),
    ("telok blangah", Region::South),
    ("marina", Region::South),
    ("east", Region::East),
    ("east region", Region::East),
    ("e", Region::East),
    ("eastern", Region::East),
    ("changi", Region::East),
    ("tampines", Region::East),
    ("bedok", Region::East),
    ("pasir ris", Region::East),
    ("east coast", Region::East),
    ("west", Region::West),
    ("west region", Region::West),
    ("w", Region::West),
    ("western", Region::West),
    ("jurong", Region::West),
    ("boon lay", Region::West),
    ("clementi", Region::West),
    ("bukit batok", Region::West),
    ("tuas", Region::West),
    ("central", Region::Central),
    ("central region", Region::Central),
    ("c", Region::Central),
    ("orchard", Region::Central),
    ("cbd", Region::Central),
    ("novena", Region::Central),
    ("toa payoh", Region::Central),
    ("serangoon", Region::NorthEast),
    ("hougang", Region::NorthEast),
    ("sengkang", Region::NorthEast),
    ("punggol", Region::NorthEast),
    ("campus", Region::Institutions),
];

/// Spellings of the region names themselves, checked before the
/// neighbourhood aliases so "north east side" never resolves to plain North.
const COMPOUND_ALIASES: [(&str, Region); 7] = [
    ("north-east", Region::NorthEast),
    ("northeast", Region::NorthEast),
    ("north east", Region::NorthEast),
    ("ne", Region::NorthEast),
    ("institutions", Region::Institutions),
    ("institution", Region::Institutions),
    ("university", Region::Institutions),
];

/// Resolve an explicit region string against the alias table: exact match
/// first, then substring containment.
pub fn normalize_alias(raw: &str) -> Option<Region> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() || value == "unknown" {
        return None;
    }

    for (alias, region) in COMPOUND_ALIASES.iter().chain(REGION_ALIASES.iter()) {
        if value == *alias {
            return Some(*region);
        }
    }
    for (alias, region) in COMPOUND_ALIASES.iter().chain(REGION_ALIASES.iter()) {
        // Single letters are only trusted as exact values.
        if alias.len() > 2 && value.contains(alias) {
            return Some(*region);
        }
    }
    None
}

/// Region from known neighbourhood tokens appearing in an address.
fn region_from_address(address: &str) -> Option<Region> {
    let address = address.trim().to_lowercase();
    if address.is_empty() {
        return None;
    }
    for (alias, region) in COMPOUND_ALIASES.iter().chain(REGION_ALIASES.iter()) {
        if alias.len() > 2 && address.contains(alias) {
            return Some(*region);
        }
    }
    None
}

/// Region from a fixed set of coordinate bounding boxes. The North-East box
/// is tested before the broader East and North boxes since it is more
/// specific; anything else inside the valid box defaults to Central.
pub fn region_from_coordinates(lng: f64, lat: f64) -> Region {
    if !within_singapore(lng, lat) {
        return Region::Unknown;
    }
    if lat > 1.38 && lng > 103.85 {
        return Region::NorthEast;
    }
    if lng > 103.94 {
        return Region::East;
    }
    if lat > 1.35 {
        return Region::North;
    }
    if lat < 1.28 {
        return Region::South;
    }
    Region::Central
}

/// Strict fallback ladder: explicit alias, then address tokens, then
/// coordinate boxes, then Unknown. Pure and total.
pub fn classify_region(explicit: Option<&str>, address: &str, coordinates: (f64, f64)) -> Region {
    if let Some(region) = explicit.and_then(normalize_alias) {
        return region;
    }
    if let Some(region) = region_from_address(address) {
        return region;
    }
    region_from_coordinates(coordinates.0, coordinates.1)
}
