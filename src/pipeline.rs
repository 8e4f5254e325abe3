// src/pipeline.rs - stage sequencing for one full run
use anyhow::{bail, Result};
use futures::future::join_all;
use log::{info, warn};
use std::time::Instant;

use crate::classify::facility::classify_facility;
use crate::classify::region::classify_region;
use crate::config::{PipelineConfig, SheetTabConfig};
use crate::enrich::enrich_locations;
use crate::fetch::SourceFetcher;
use crate::matching::linker::SheetIndex;
use crate::merge::{dedup_locations, merge};
use crate::models::core::{FacilityType, Location, MatchType, Region};
use crate::models::stats::PipelineStats;
use crate::output::{feature_collection, persist};
use crate::parsing::kml::parse_kml;
use crate::parsing::sheets::parse_sheet_tab;

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    /// Run the full pipeline: fetch both sources concurrently, link and
    /// merge, classify, optionally enrich, and persist. Stage failures are
    /// contained; the only fatal case is an empty merged collection after
    /// an outright fetch failure, since downstream consumers cannot work
    /// with nothing.
    pub async fn run(&self, run_id: &str) -> Result<PipelineStats> {
        let mut stats = PipelineStats {
            run_id: run_id.to_string(),
            ..Default::default()
        };
        let config = &self.config;
        let fetcher = SourceFetcher::new(config)?;

        info!("Phase 1: fetching sources");
        let phase_start = Instant::now();
        let tab_fetches = join_all(
            config
                .sheet_tabs
                .iter()
                .map(|tab| fetcher.fetch_sheet_tab(config, tab)),
        );
        let (tab_outcomes, kml_outcome) = tokio::join!(tab_fetches, fetcher.fetch_kml(config));

        let mut tab_texts: Vec<(SheetTabConfig, Option<String>)> = Vec::new();
        for (tab, outcome) in config.sheet_tabs.iter().zip(tab_outcomes) {
            if outcome.failed() {
                stats.sheet_fetch_failures += 1;
            } else {
                stats.sheet_tabs_fetched += 1;
            }
            tab_texts.push((tab.clone(), outcome.text().map(str::to_string)));
        }
        stats.maps_fetch_failed = kml_outcome.failed();
        let kml_text = kml_outcome.text().map(str::to_string);
        stats
            .phase_times
            .insert("1-fetch".to_string(), phase_start.elapsed());

        info!("Phase 2: parsing, linking, and merging");
        let phase_start = Instant::now();
        let mut locations = assemble(&tab_texts, kml_text.as_deref(), config, &mut stats);
        stats
            .phase_times
            .insert("2-merge".to_string(), phase_start.elapsed());

        if locations.is_empty() && (stats.sheet_fetch_failures > 0 || stats.maps_fetch_failed) {
            bail!(
                "merged collection is empty after {} sheet fetch failures (maps failed: {})",
                stats.sheet_fetch_failures,
                stats.maps_fetch_failed
            );
        }

        info!("Phase 3: classifying regions and facility types");
        let phase_start = Instant::now();
        classify_locations(&mut locations);
        stats
            .phase_times
            .insert("3-classify".to_string(), phase_start.elapsed());

        persist(&config.combined_path(), &feature_collection(&locations)?)?;

        if config.enrich {
            info!("Phase 4: enriching {} locations", locations.len());
            let phase_start = Instant::now();
            enrich_locations(&mut locations, config, fetcher.cache(), &mut stats).await;
            stats
                .phase_times
                .insert("4-enrich".to_string(), phase_start.elapsed());
            persist(&config.enriched_path(), &feature_collection(&locations)?)?;
        }

        stats.locations_total = locations.len();
        Ok(stats)
    }
}

/// The pure core of a run: parse both sources, link map records to sheet
/// records, merge, dedup. No I/O, so tests drive it with fixture text.
pub fn assemble(
    tab_texts: &[(SheetTabConfig, Option<String>)],
    kml_text: Option<&str>,
    config: &PipelineConfig,
    stats: &mut PipelineStats,
) -> Vec<Location> {
    let mut sheet_records = Vec::new();
    for (tab, text) in tab_texts {
        let Some(text) = text else { continue };
        match parse_sheet_tab(text, tab) {
            Ok(parsed) => {
                stats.sheet_records += parsed.records.len();
                stats.sheet_rows_dropped += parsed.rows_dropped;
                sheet_records.extend(parsed.records);
            }
            Err(e) => {
                warn!("tab '{}' unparsable, skipped: {:#}", tab.name, e);
            }
        }
    }

    let map_records = match kml_text.map(parse_kml) {
        Some(Ok(parsed)) => {
            stats.map_records += parsed.records.len();
            stats.placemarks_dropped += parsed.placemarks_dropped;
            parsed.records
        }
        Some(Err(e)) => {
            warn!("KML unparsable, skipped: {:#}", e);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut index = SheetIndex::new(sheet_records, config.fuzzy_threshold);
    let mut locations = Vec::with_capacity(index.len() + map_records.len());

    for map_record in &map_records {
        let merged = match index.find_match(map_record) {
            Some(hit) => {
                index.claim(hit.index);
                stats.record_match(hit.match_type, hit.confidence);
                merge(
                    Some(index.record(hit.index)),
                    Some(map_record),
                    hit.match_type,
                    hit.confidence,
                )
            }
            None => {
                stats.unmatched_map_records += 1;
                merge(None, Some(map_record), MatchType::None, 0.0)
            }
        };
        match merged {
            Ok(location) => locations.push(location),
            Err(e) => warn!("merge failed for '{}': {:#}", map_record.raw_name, e),
        }
    }

    for (_, sheet_record) in index.unclaimed() {
        stats.unmatched_sheet_records += 1;
        match merge(Some(sheet_record), None, MatchType::None, 0.0) {
            Ok(location) => locations.push(location),
            Err(e) => warn!("merge failed for '{}': {:#}", sheet_record.raw_name, e),
        }
    }

    let (deduped, removed) = dedup_locations(locations);
    stats.duplicates_removed = removed;
    deduped
}

/// Fill whatever the merge step left Unknown/Other through the classifier
/// ladders. Explicit values resolved during merge are left alone.
pub fn classify_locations(locations: &mut [Location]) {
    for location in locations.iter_mut() {
        if location.region == Region::Unknown {
            location.region = classify_region(None, &location.address, location.coordinates);
        }
        if location.facility_type == FacilityType::Other {
            location.facility_type =
                classify_facility(None, &location.name, &location.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::name::normalized_key;
    use crate::models::core::{coord_key_5dp, within_singapore, Gender};
    use std::collections::HashSet;

    const SHEET_FIXTURE: &str = "\
Toilets With Bidets (SG),,,\n\
Location,Address,Region,Remarks\n\
VivoCity,\"1 HarbourFront Walk, Singapore 098585\",,Level 2 bidet stall\n\
Mystery Corner,Mystery Corner,,address equals name\n\
Woodlands Library,1 Woodlands Sq,North,\n";

    const KML_FIXTURE: &str = r#"<kml><Document>
  <Placemark>
    <name>Vivo City</name>
    <description><![CDATA[Female: Yes<br>Handicap: Yes]]></description>
    <Point><coordinates>103.8219,1.2640,0</coordinates></Point>
  </Placemark>
  <Placemark>
    <name>Jewel Changi Airport</name>
    <description>Bidet at B2</description>
    <Point><coordinates>103.9890,1.3601,0</coordinates></Point>
  </Placemark>
  <Placemark>
    <name>JEWEL CHANGI AIRPORT</name>
    <description>duplicate pin</description>
    <Point><coordinates>103.9890,1.3601,0</coordinates></Point>
  </Placemark>
  <Placemark>
    <name>Lost Pin</name>
    <Point><coordinates>12.0,50.0,0</coordinates></Point>
  </Placemark>
</Document></kml>"#;

    fn run_fixture() -> (Vec<Location>, PipelineStats) {
        let config = PipelineConfig::default();
        let mut stats = PipelineStats::default();
        let tab_texts = vec![(config.sheet_tabs[0].clone(), Some(SHEET_FIXTURE.to_string()))];
        let mut locations = assemble(&tab_texts, Some(KML_FIXTURE), &config, &mut stats);
        classify_locations(&mut locations);
        (locations, stats)
    }

    #[test]
    fn test_end_to_end_merge_counts() {
        let (locations, stats) = run_fixture();
        assert_eq!(stats.sheet_records, 3);
        assert_eq!(stats.map_records, 3);
        assert_eq!(stats.placemarks_dropped, 1); // the out-of-bounds pin
        assert_eq!(stats.total_matched(), 1); // VivoCity
        assert_eq!(stats.unmatched_map_records, 2); // Jewel twice, pre-dedup
        assert_eq!(stats.unmatched_sheet_records, 2);
        assert_eq!(stats.duplicates_removed, 1); // Jewel pins collapse
        assert_eq!(locations.len(), 4);
    }

    #[test]
    fn test_vivocity_merges_with_sheet_address_and_map_coordinates() {
        let (locations, _) = run_fixture();
        let vivo = locations.iter().find(|l| l.name == "VivoCity").unwrap();
        assert_eq!(vivo.match_type, MatchType::NormalizedName);
        assert_eq!(vivo.match_confidence, 0.9);
        assert_eq!(vivo.address, "1 HarbourFront Walk, Singapore 098585");
        assert_eq!(vivo.coordinates, (103.8219, 1.2640));
        // Male tab vs "Female: Yes" in the description: conflict resolves to any.
        assert_eq!(vivo.gender, Gender::Any);
        assert!(vivo.amenities.wheelchair_access);
        assert_eq!(vivo.region, Region::South); // "harbourfront" address token
        assert_eq!(vivo.facility_type, FacilityType::Mall);
    }

    #[test]
    fn test_jewel_singleton_classification() {
        let (locations, _) = run_fixture();
        let jewel = locations
            .iter()
            .find(|l| normalized_key(&l.name) == "jewelchangiairport")
            .unwrap();
        assert_eq!(jewel.match_type, MatchType::None);
        assert_eq!(jewel.facility_type, FacilityType::Mall);
        assert_eq!(jewel.region, Region::East);
        // The duplicate pin's description survives in provenance.
        assert_eq!(jewel.provenance.maps.len(), 2);
    }

    #[test]
    fn test_output_invariants() {
        let (locations, _) = run_fixture();
        let mut dedup_keys = HashSet::new();
        for location in &locations {
            // Bounding invariant: every persisted coordinate is inside the box.
            assert!(
                within_singapore(location.coordinates.0, location.coordinates.1),
                "{} out of bounds",
                location.name
            );
            // No fake addresses.
            if !location.address.is_empty() {
                assert!(
                    location.address.to_lowercase() != location.name.to_lowercase()
                        || location.address.len() >= 25
                        || location.address.to_lowercase().contains("singapore")
                        || location.address.chars().filter(|c| c.is_ascii_digit()).count() >= 5,
                    "fake address survived for {}",
                    location.name
                );
            }
            // Dedup invariant.
            let key = (
                normalized_key(&location.name),
                coord_key_5dp(location.coordinates.0, location.coordinates.1),
            );
            assert!(dedup_keys.insert(key), "duplicate location {}", location.name);
            // A location always has a non-empty name.
            assert!(!location.name.is_empty());
        }
    }

    #[test]
    fn test_fake_address_cleared_and_placeholder_assigned() {
        let (locations, _) = run_fixture();
        let mystery = locations.iter().find(|l| l.name == "Mystery Corner").unwrap();
        assert_eq!(mystery.address, "");
        assert!(within_singapore(mystery.coordinates.0, mystery.coordinates.1));
    }

    #[test]
    fn test_sheet_region_hint_wins() {
        let (locations, _) = run_fixture();
        let library = locations.iter().find(|l| l.name == "Woodlands Library").unwrap();
        assert_eq!(library.region, Region::North);
        assert_eq!(library.facility_type, FacilityType::Public);
    }

    #[test]
    fn test_assemble_with_no_sources_is_empty() {
        let config = PipelineConfig::default();
        let mut stats = PipelineStats::default();
        let locations = assemble(&[], None, &config, &mut stats);
        assert!(locations.is_empty());
        assert_eq!(stats.locations_total, 0);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let (first, _) = run_fixture();
        let (second, _) = run_fixture();
        let first_ids: Vec<_> = first.iter().map(|l| l.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|l| l.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
