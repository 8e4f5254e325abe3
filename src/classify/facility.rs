// src/classify/facility.rs - facility type assignment
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::core::FacilityType;

/// Already-canonical values map straight through.
const TYPE_MAPPINGS: [(&str, FacilityType); 11] = [
    ("mall", FacilityType::Mall),
    ("shopping", FacilityType::Mall),
    ("shopping centre", FacilityType::Mall),
    ("shopping center", FacilityType::Mall),
    ("hotel", FacilityType::Hotel),
    ("resort", FacilityType::Hotel),
    ("restaurant", FacilityType::Restaurant),
    ("cafe", FacilityType::Restaurant),
    ("public", FacilityType::Public),
    ("office", FacilityType::Office),
    ("other", FacilityType::Other),
];

/// Known mall names and mall words. "centre" deliberately lives here AND in
/// the public list; the Mall dictionary is scanned first, so the overlap
/// resolves to Mall.
const MALL_KEYWORDS: [&str; 38] = [
    "vivocity", "ion orchard", "paragon", "takashimaya", "raffles city", "suntec", "marina square",
    "bugis junction", "bugis+", "funan", "capitol", "wisma", "citylink", "tampines mall",
    "westgate", "jcube", "jem", "imm", "causeway point", "northpoint", "waterway point",
    "jewel", "airport", "eastpoint", "shoppes", "nex", "compass one", "junction 8",
    "great world", "anchorpoint", "white sands", "beauty world", "lucky plaza",
    "mall", "plaza", "shopping", "centre", "center",
];

const HOTEL_KEYWORDS: [&str; 34] = [
    "hotel", "regent", "hyatt", "shangri-la", "shangrila", "hilton", "marina bay sands",
    "fullerton", "mandarin oriental", "four seasons", "ritz", "carlton", "marriott",
    "intercontinental", "swissotel", "fairmont", "raffles hotel", "conrad", "westin",
    "sheraton", "holiday inn", "crowne", "novotel", "oasia", "concorde", "mercure",
    "sofitel", "parkroyal", "pan pacific", "amara", "ascott", "dorsett", "capri", "lodge",
];

const PUBLIC_KEYWORDS: [&str; 32] = [
    "mrt", "station", "interchange", "terminal", "bus", "library", "community", "cc",
    "stadium", "swimming", "complex", "polyclinic", "hospital", "clinic", "polytechnic",
    "university", "institute", "ite", "college", "school", "hdb", "void deck", "hawker",
    "kopitiam", "botanic", "reservoir", "nature", "beach", "mosque", "church", "temple",
    "carpark",
];

const FOOD_KEYWORDS: [&str; 24] = [
    "restaurant", "café", "cafe", "bistro", "eatery", "dining", "diner", "food court",
    "kitchen", "grill", "bbq", "steamboat", "hotpot", "buffet", "bakery", "dessert",
    "canteen", "cafeteria", "mcdonald", "kfc", "burger king", "starbucks", "toast box",
    "ya kun",
];

const OFFICE_KEYWORDS: [&str; 22] = [
    "office", "tower", "corporate", "business park", "industrial", "headquarters", "hq",
    "financial", "bank", "insurance", "exchange", "consultancy", "pte", "capitaland",
    "mapletree", "keppel", "singtel", "ocbc", "uob", "dbs", "shenton", "robinson",
];

static POSTAL_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)singapore\s+(\d{6})").expect("postal code regex"));

static MALL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(shopping|mall|megamall|outlet|plaza|square|mart|market|store)\b")
        .expect("mall pattern")
});
static HOTEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(hotel|resort|inn|hostel|suites?|lodge|motel)\b").expect("hotel pattern")
});
static PUBLIC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(mrt|station|terminal|library|community|park|garden|toilet|restroom)\b")
        .expect("public pattern")
});
static FOOD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(restaurant|caf[eé]|bistro|eatery|dining|diner|kitchen)\b")
        .expect("food pattern")
});
static OFFICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(office|tower|building|corporate|business|headquarters|hq)\b")
        .expect("office pattern")
});

/// Singapore postal-code districts dense enough in one venue class to tip
/// the classification.
fn facility_from_postal_code(code: u32) -> Option<FacilityType> {
    match code {
        238800..=238899 => Some(FacilityType::Mall),   // Orchard
        178900..=179100 => Some(FacilityType::Mall),   // Bugis / Marina
        18900..=19000 => Some(FacilityType::Mall),     // Marina Bay
        637700..=638200 => Some(FacilityType::Mall),   // Jurong
        529500..=529999 => Some(FacilityType::Mall),   // Tampines / Changi
        247900..=248100 => Some(FacilityType::Hotel),  // Orchard hotel belt
        179800..=179900 => Some(FacilityType::Hotel),  // Beach Road
        39940..=39957 => Some(FacilityType::Hotel),    // Sentosa
        48600..=49200 => Some(FacilityType::Office),   // Raffles / Shenton
        19100..=19200 => Some(FacilityType::Office),   // Marina Bay financial
        _ => None,
    }
}

/// Strict fallback ladder: canonical mapping, keyword dictionaries in fixed
/// Mall -> Hotel -> Public -> Restaurant -> Office priority, postal-code
/// ranges, regex word classes, then Other. Pure and total; no randomness.
pub fn classify_facility(explicit: Option<&str>, name: &str, address: &str) -> FacilityType {
    if let Some(raw) = explicit {
        let value = raw.trim().to_lowercase();
        if let Some((_, facility)) = TYPE_MAPPINGS.iter().find(|(key, _)| *key == value) {
            return *facility;
        }
    }

    let search_text = format!("{} {}", name.to_lowercase(), address.to_lowercase());

    let dictionaries: [(&[&str], FacilityType); 5] = [
        (&MALL_KEYWORDS, FacilityType::Mall),
        (&HOTEL_KEYWORDS, FacilityType::Hotel),
        (&PUBLIC_KEYWORDS, FacilityType::Public),
        (&FOOD_KEYWORDS, FacilityType::Restaurant),
        (&OFFICE_KEYWORDS, FacilityType::Office),
    ];
    for (keywords, facility) in dictionaries {
        if keywords.iter().any(|keyword| search_text.contains(keyword)) {
            return facility;
        }
    }

    if let Some(captures) = POSTAL_CODE.captures(address) {
        if let Ok(code) = captures[1].parse::<u32>() {
            if let Some(facility) = facility_from_postal_code(code) {
                return facility;
            }
        }
    }

    let patterns: [(&Lazy<Regex>, FacilityType); 5] = [
        (&MALL_PATTERN, FacilityType::Mall),
        (&HOTEL_PATTERN, FacilityType::Hotel),
        (&PUBLIC_PATTERN, FacilityType::Public),
        (&FOOD_PATTERN, FacilityType::Restaurant),
        (&OFFICE_PATTERN, FacilityType::Office),
    ];
    for (pattern, facility) in patterns {
        if pattern.is_match(&search_text) {
            return facility;
        }
    }

    FacilityType::Other
}
