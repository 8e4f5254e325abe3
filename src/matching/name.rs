// src/matching/name.rs - venue name normalization and similarity scoring
use once_cell::sync::Lazy;
use regex::Regex;
use strsim::jaro_winkler;

/// Leading articles/prepositions that carry no discriminating value.
const LEADING_STOPWORDS: [&str; 4] = ["the", "at", "in", "by"];

/// Trailing venue-type words. "VivoCity Mall" and "VivoCity" are the same
/// place; the venue word only adds noise to comparisons.
const TRAILING_VENUE_WORDS: [&str; 9] = [
    "centre", "center", "mall", "plaza", "station", "park", "hub", "mrt", "cc",
];

/// Generic category nouns that appear in many unrelated venue names.
const GENERIC_CATEGORY_WORDS: [&str; 7] = [
    "food", "hawker", "market", "shopping", "community", "club", "sports",
];

/// Abbreviation expansions, including the Singapore street and estate forms
/// that show up throughout the sheet data.
const ABBREVIATIONS: [(&str, &str); 10] = [
    ("st", "street"),
    ("ave", "avenue"),
    ("blvd", "boulevard"),
    ("rd", "road"),
    ("dr", "drive"),
    ("jln", "jalan"),
    ("blk", "block"),
    ("amk", "ang mo kio"),
    ("tpy", "toa payoh"),
    ("cck", "choa chu kang"),
];

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("parenthetical regex"));

/// Canonicalize a free-text venue name into a comparable key. Total: never
/// fails, returns `""` for empty input, and is idempotent
/// (`normalize(normalize(x)) == normalize(x)`).
///
/// The step order matters; each step operates on the previous step's output.
pub fn normalize(name: &str) -> String {
    if name.trim().is_empty() {
        return String::new();
    }

    let lowered = name.to_lowercase();
    let stripped = PARENTHETICAL.replace_all(&lowered, " ");

    let mut tokens: Vec<String> = stripped.split_whitespace().map(str::to_string).collect();

    while tokens.len() > 1 && LEADING_STOPWORDS.contains(&tokens[0].as_str()) {
        tokens.remove(0);
    }
    while tokens.len() > 1 && TRAILING_VENUE_WORDS.contains(&tokens[tokens.len() - 1].as_str()) {
        tokens.pop();
    }

    // Punctuation becomes spaces, which can split tokens further.
    let flattened = tokens
        .join(" ")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>();

    let expanded: Vec<&str> = flattened
        .split_whitespace()
        .map(|token| {
            ABBREVIATIONS
                .iter()
                .find(|(abbrev, _)| *abbrev == token)
                .map(|(_, full)| *full)
                .unwrap_or(token)
        })
        .collect();

    let significant: Vec<&str> = expanded
        .iter()
        .copied()
        .filter(|token| !GENERIC_CATEGORY_WORDS.contains(token))
        .collect();

    // A name made entirely of category nouns must not collapse to nothing.
    let kept = if significant.is_empty() { &expanded } else { &significant };
    kept.join(" ").trim().to_string()
}

/// Coarse key: lowercase, `[a-z0-9]` only. Used for last-resort fuzzy
/// matching and deterministic-hash id generation.
pub fn alpha_numeric_only(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Whitespace-insensitive form of `normalize`, the key used by the
/// normalized-name match strategy ("Vivo City" and "VivoCity" must collide).
pub fn normalized_key(name: &str) -> String {
    normalize(name).split_whitespace().collect()
}

/// Bounded [0,1] similarity between two already-normalized names. Identical
/// alphanumeric keys score 1.0, containment between meaningful keys scores
/// 0.9, everything else falls through to Jaro-Winkler.
pub fn similarity(normalized_a: &str, normalized_b: &str) -> f64 {
    let a = alpha_numeric_only(normalized_a);
    let b = alpha_numeric_only(normalized_b);

    if a.len() < 3 || b.len() < 3 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.len() >= 4 && b.len() >= 4 && (a.contains(&b) || b.contains(&a)) {
        return 0.9;
    }
    jaro_winkler(normalized_a, normalized_b)
}
