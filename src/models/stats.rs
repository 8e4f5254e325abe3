// src/models/stats.rs - process-level statistics for a pipeline run
use log::info;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::core::MatchType;

/// Per-strategy match statistics, reported in the run summary.
#[derive(Debug, Clone)]
pub struct MatchMethodStats {
    pub method: MatchType,
    pub pairs_matched: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub run_id: String,

    // Fetch stage
    pub sheet_tabs_fetched: usize,
    pub sheet_fetch_failures: usize,
    pub maps_fetch_failed: bool,

    // Parse stage
    pub sheet_records: usize,
    pub sheet_rows_dropped: usize,
    pub map_records: usize,
    pub placemarks_dropped: usize,

    // Link/merge stage
    pub match_confidences: HashMap<MatchType, Vec<f64>>,
    pub unmatched_map_records: usize,
    pub unmatched_sheet_records: usize,
    pub duplicates_removed: usize,

    // Enrichment stage
    pub geocode_lookups: usize,
    pub geocode_cache_hits: usize,
    pub geocode_failures: usize,

    pub locations_total: usize,
    pub phase_times: HashMap<String, Duration>,
}

impl PipelineStats {
    pub fn record_match(&mut self, method: MatchType, confidence: f64) {
        self.match_confidences.entry(method).or_default().push(confidence);
    }

    pub fn method_stats(&self) -> Vec<MatchMethodStats> {
        let order = [
            MatchType::Coordinates,
            MatchType::ExactName,
            MatchType::NormalizedName,
            MatchType::FuzzyMatch,
        ];
        order
            .iter()
            .filter_map(|method| {
                let scores = self.match_confidences.get(method)?;
                if scores.is_empty() {
                    return None;
                }
                Some(MatchMethodStats {
                    method: *method,
                    pairs_matched: scores.len(),
                    avg_confidence: scores.iter().sum::<f64>() / scores.len() as f64,
                })
            })
            .collect()
    }

    pub fn total_matched(&self) -> usize {
        self.match_confidences.values().map(|v| v.len()).sum()
    }

    pub fn log_summary(&self) {
        info!("=== Pipeline Summary ===");
        info!("Run ID: {}", self.run_id);
        info!(
            "Sheets: {} tabs fetched ({} failures), {} records parsed, {} rows dropped",
            self.sheet_tabs_fetched,
            self.sheet_fetch_failures,
            self.sheet_records,
            self.sheet_rows_dropped
        );
        info!(
            "Maps: {} placemarks parsed, {} dropped{}",
            self.map_records,
            self.placemarks_dropped,
            if self.maps_fetch_failed { " (fetch failed)" } else { "" }
        );
        info!(
            "Linkage: {} matched pairs, {} map-only, {} sheet-only, {} duplicates removed",
            self.total_matched(),
            self.unmatched_map_records,
            self.unmatched_sheet_records,
            self.duplicates_removed
        );
        for method_stat in self.method_stats() {
            info!(
                "  {:?}: {} pairs, avg confidence: {:.3}",
                method_stat.method, method_stat.pairs_matched, method_stat.avg_confidence
            );
        }
        if self.geocode_lookups + self.geocode_cache_hits > 0 {
            info!(
                "Geocoding: {} lookups, {} cache hits, {} failures",
                self.geocode_lookups, self.geocode_cache_hits, self.geocode_failures
            );
        }
        info!("Total locations: {}", self.locations_total);
        info!("=== Timing Breakdown ===");
        let mut phases: Vec<_> = self.phase_times.iter().collect();
        phases.sort_by_key(|(name, _)| name.as_str());
        for (phase, duration) in phases {
            info!("{}: {:.2?}", phase, duration);
        }
    }
}
