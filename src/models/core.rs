// src/models/core.rs - canonical domain types for the fusion pipeline
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Singapore bounding box used to validate source coordinates. Anything
/// outside is a data-quality defect, not a usable point.
pub const SG_LAT_MIN: f64 = 1.2;
pub const SG_LAT_MAX: f64 = 1.5;
pub const SG_LNG_MIN: f64 = 103.5;
pub const SG_LNG_MAX: f64 = 104.1;

pub fn within_singapore(lng: f64, lat: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (SG_LAT_MIN..=SG_LAT_MAX).contains(&lat)
        && (SG_LNG_MIN..=SG_LNG_MAX).contains(&lng)
}

/// Round a coordinate component to `places` decimal places on a fixed grid,
/// returning the scaled integer so rounded values are hashable/comparable
/// without float-equality pitfalls.
pub fn coord_grid(value: f64, places: u32) -> i64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).round() as i64
}

/// Coordinate key at 4 decimal places (~11 m), the resolution used by the
/// coordinate match strategy and the geocode cache.
pub fn coord_key_4dp(lng: f64, lat: f64) -> (i64, i64) {
    (coord_grid(lng, 4), coord_grid(lat, 4))
}

/// Coordinate key at 5 decimal places, the resolution of the output dedup.
pub fn coord_key_5dp(lng: f64, lat: f64) -> (i64, i64) {
    (coord_grid(lng, 5), coord_grid(lat, 5))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    North,
    South,
    East,
    West,
    Central,
    #[serde(rename = "North-East")]
    NorthEast,
    Institutions,
    Unknown,
}

impl Region {
    pub fn label(&self) -> &'static str {
        match self {
            Region::North => "North",
            Region::South => "South",
            Region::East => "East",
            Region::West => "West",
            Region::Central => "Central",
            Region::NorthEast => "North-East",
            Region::Institutions => "Institutions",
            Region::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityType {
    Mall,
    Hotel,
    Public,
    Restaurant,
    Office,
    Other,
}

impl FacilityType {
    pub fn label(&self) -> &'static str {
        match self {
            FacilityType::Mall => "Mall",
            FacilityType::Hotel => "Hotel",
            FacilityType::Public => "Public",
            FacilityType::Restaurant => "Restaurant",
            FacilityType::Office => "Office",
            FacilityType::Other => "Other",
        }
    }
}

/// Which linker strategy produced a merged location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Coordinates,
    ExactName,
    NormalizedName,
    FuzzyMatch,
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenities {
    pub wheelchair_access: bool,
    pub baby_changing: bool,
    pub free_entry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_dryer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soap_dispenser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_towels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toilet_paper: Option<bool>,
}

impl Amenities {
    /// Union of two amenity reports. Under-reporting is assumed more likely
    /// than over-reporting in this dataset, so positives win.
    pub fn or(&self, other: &Amenities) -> Amenities {
        let or_opt = |a: Option<bool>, b: Option<bool>| match (a, b) {
            (None, None) => None,
            (x, y) => Some(x.unwrap_or(false) || y.unwrap_or(false)),
        };
        Amenities {
            wheelchair_access: self.wheelchair_access || other.wheelchair_access,
            baby_changing: self.baby_changing || other.baby_changing,
            free_entry: self.free_entry || other.free_entry,
            hand_dryer: or_opt(self.hand_dryer, other.hand_dryer),
            soap_dispenser: or_opt(self.soap_dispenser, other.soap_dispenser),
            paper_towels: or_opt(self.paper_towels, other.paper_towels),
            toilet_paper: or_opt(self.toilet_paper, other.toilet_paper),
        }
    }
}

/// Free-text comment trails retained per source. Never merged into one
/// lossy field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub sheets: Vec<String>,
    pub maps: Vec<String>,
}

impl Provenance {
    pub fn push_sheet(&mut self, remark: &str) {
        let remark = remark.trim();
        if !remark.is_empty() && !self.sheets.iter().any(|r| r == remark) {
            self.sheets.push(remark.to_string());
        }
    }

    pub fn push_map(&mut self, comment: &str) {
        let comment = comment.trim();
        if !comment.is_empty() && !self.maps.iter().any(|c| c == comment) {
            self.maps.push(comment.to_string());
        }
    }

    pub fn absorb(&mut self, other: &Provenance) {
        for r in &other.sheets {
            self.push_sheet(r);
        }
        for c in &other.maps {
            self.push_map(c);
        }
    }
}

/// One row from one tab of the spreadsheet export.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRecord {
    pub raw_name: String,
    pub raw_address: String,
    pub remarks: String,
    pub gender: Gender,
    pub source_tab: String,
    /// The sheet's own Region column, where the tab has one.
    pub region_hint: Option<String>,
    /// Resolved coordinates, for tabs that carry lat/lng columns.
    pub coordinates: Option<(f64, f64)>,
    /// Every tab is a bidet inventory, so this defaults to true; an explicit
    /// boolean column can override it.
    pub has_bidet: bool,
}

/// One placemark from the KML export. Coordinates are `(lng, lat)`,
/// longitude first, matching both KML and GeoJSON conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRecord {
    pub raw_name: String,
    pub description: String,
    pub coordinates: (f64, f64),
    pub folder_region: Option<String>,
}

/// Water temperature of a bidet, synthesized during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterTemperature {
    Cold,
    Warm,
    Adjustable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    pub has_ramp: bool,
    pub door_width_cm: u32,
    pub grab_bars: bool,
    pub emergency_button: bool,
}

/// Presentation-only fields attached by the enrichment pass. All values are
/// pure functions of the location id so re-runs are byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    pub floor: String,
    pub visit_count: u32,
    pub cleanliness: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_temperature: Option<WaterTemperature>,
    pub accessibility: Accessibility,
}

/// The canonical merged location, the unit persisted and served.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Empty string means "unknown", never the name echoed back.
    pub address: String,
    #[serde(skip_serializing)]
    pub coordinates: (f64, f64),
    pub region: Region,
    pub facility_type: FacilityType,
    pub has_bidet: bool,
    pub gender: Gender,
    pub amenities: Amenities,
    pub provenance: Provenance,
    pub match_type: MatchType,
    pub match_confidence: f64,
    #[serde(flatten)]
    pub enrichment: Option<Enrichment>,
}

/// Derive a stable location id from its identity string. The same place must
/// get the same id on every run, so this is a hash, never a random value.
pub fn derive_id(prefix: &str, identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("{}-{}", prefix, &hex::encode(digest)[..8])
}

/// Identity string for a location: name+address when an address exists,
/// otherwise name plus the 4-dp coordinate grid cell.
pub fn identity_string(name: &str, address: &str, coordinates: (f64, f64)) -> String {
    let name = name.trim().to_lowercase();
    let address = address.trim().to_lowercase();
    if address.is_empty() {
        let (gx, gy) = coord_key_4dp(coordinates.0, coordinates.1);
        format!("{}|{},{}", name, gx, gy)
    } else {
        format!("{}|{}", name, address)
    }
}
