// src/matching/linker.rs - map-to-sheet record linkage cascade
use log::debug;
use std::collections::HashMap;

use crate::matching::name::{normalize, normalized_key, similarity};
use crate::models::core::{coord_key_4dp, MapRecord, MatchType, SheetRecord};

pub const COORDINATE_CONFIDENCE: f64 = 1.0;
pub const EXACT_NAME_CONFIDENCE: f64 = 1.0;
pub const NORMALIZED_NAME_CONFIDENCE: f64 = 0.9;
/// Acceptance floor for the fuzzy strategy.
pub const FUZZY_ACCEPT_THRESHOLD: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetMatch {
    pub index: usize,
    pub match_type: MatchType,
    pub confidence: f64,
}

/// Searchable index over the sheet records of one run. Lookup tables are
/// earliest-wins so repeated keys resolve deterministically, and a record
/// can be consumed by at most one map record per run.
pub struct SheetIndex {
    records: Vec<SheetRecord>,
    normalized: Vec<String>,
    used: Vec<bool>,
    by_coord: HashMap<(i64, i64), usize>,
    by_raw_name: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
    fuzzy_threshold: f64,
}

impl SheetIndex {
    pub fn new(records: Vec<SheetRecord>, fuzzy_threshold: f64) -> Self {
        let normalized: Vec<String> = records.iter().map(|r| normalize(&r.raw_name)).collect();

        let mut by_coord = HashMap::new();
        let mut by_raw_name = HashMap::new();
        let mut by_normalized = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            if let Some((lng, lat)) = record.coordinates {
                by_coord.entry(coord_key_4dp(lng, lat)).or_insert(idx);
            }
            let raw = record.raw_name.trim().to_lowercase();
            if !raw.is_empty() {
                by_raw_name.entry(raw).or_insert(idx);
            }
            let key = normalized_key(&record.raw_name);
            if !key.is_empty() {
                by_normalized.entry(key).or_insert(idx);
            }
        }

        let used = vec![false; records.len()];
        SheetIndex {
            records,
            normalized,
            used,
            by_coord,
            by_raw_name,
            by_normalized,
            fuzzy_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> &SheetRecord {
        &self.records[index]
    }

    /// Find the best sheet record for a map record. Pure: repeated calls with
    /// the same index state return the same answer. The cascade is evaluated
    /// in decreasing confidence order and the first success wins, so a
    /// lower-confidence strategy can never shadow a higher-confidence one.
    pub fn find_match(&self, map_record: &MapRecord) -> Option<SheetMatch> {
        // 1. Coordinate equality at 4 dp (~11 m).
        let (lng, lat) = map_record.coordinates;
        if let Some(&idx) = self.by_coord.get(&coord_key_4dp(lng, lat)) {
            if !self.used[idx] {
                return Some(SheetMatch {
                    index: idx,
                    match_type: MatchType::Coordinates,
                    confidence: COORDINATE_CONFIDENCE,
                });
            }
        }

        // 2. Case-insensitive exact raw-name equality.
        let raw = map_record.raw_name.trim().to_lowercase();
        if !raw.is_empty() {
            if let Some(&idx) = self.by_raw_name.get(&raw) {
                if !self.used[idx] {
                    return Some(SheetMatch {
                        index: idx,
                        match_type: MatchType::ExactName,
                        confidence: EXACT_NAME_CONFIDENCE,
                    });
                }
            }
        }

        // 3. Equality after normalization.
        let key = normalized_key(&map_record.raw_name);
        if !key.is_empty() {
            if let Some(&idx) = self.by_normalized.get(&key) {
                if !self.used[idx] {
                    return Some(SheetMatch {
                        index: idx,
                        match_type: MatchType::NormalizedName,
                        confidence: NORMALIZED_NAME_CONFIDENCE,
                    });
                }
            }
        }

        // 4. Fuzzy scan over the whole index; best score above the threshold
        // wins, ties broken by earliest sheet index (strictly-greater
        // comparison keeps the scan stable).
        let map_normalized = normalize(&map_record.raw_name);
        if map_normalized.is_empty() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, sheet_normalized) in self.normalized.iter().enumerate() {
            if self.used[idx] || sheet_normalized.is_empty() {
                continue;
            }
            let score = similarity(&map_normalized, sheet_normalized);
            if score >= self.fuzzy_threshold && best.map_or(true, |(_, b)| score > b) {
                best = Some((idx, score));
            }
        }
        best.map(|(index, score)| {
            debug!(
                "fuzzy match '{}' -> '{}' ({:.2})",
                map_record.raw_name, self.records[index].raw_name, score
            );
            SheetMatch {
                index,
                match_type: MatchType::FuzzyMatch,
                confidence: score,
            }
        })
    }

    /// Consume a sheet record so later map records cannot fan out onto it.
    pub fn claim(&mut self, index: usize) {
        self.used[index] = true;
    }

    /// Records never claimed by any map record, in input order.
    pub fn unclaimed(&self) -> impl Iterator<Item = (usize, &SheetRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(move |(idx, _)| !self.used[*idx])
    }
}
