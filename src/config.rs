// src/config.rs - injected pipeline configuration
use anyhow::{Context, Result};
use log::info;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::models::core::Gender;

/// Column descriptor for one spreadsheet tab. Tabs differ: one tab's "name"
/// column is literally called `Location`, another's is `Hotel`.
#[derive(Debug, Clone)]
pub struct SheetTabConfig {
    pub name: String,
    pub gid: String,
    pub name_header: String,
    pub address_header: String,
    pub remarks_header: String,
    pub region_header: Option<String>,
    pub lat_header: Option<String>,
    pub lng_header: Option<String>,
    /// Gender is a property of the tab, not of any data column.
    pub gender: Gender,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sheets_id: String,
    pub maps_id: String,
    pub sheet_tabs: Vec<SheetTabConfig>,

    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,

    pub sheets_cache_ttl: Duration,
    pub maps_cache_ttl: Duration,
    pub geocode_cache_ttl: Duration,
    /// Minimum spacing between outbound reverse-geocode requests.
    pub geocode_min_interval: Duration,
    pub geocode_endpoint: String,

    pub fuzzy_threshold: f64,
    pub enrich: bool,
    pub force_refresh: bool,
    /// Skip all network access; run from cache only.
    pub offline: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let tab = |name: &str,
                   gid: &str,
                   name_header: &str,
                   address_header: &str,
                   remarks_header: &str,
                   region_header: Option<&str>,
                   gender: Gender| SheetTabConfig {
            name: name.to_string(),
            gid: gid.to_string(),
            name_header: name_header.to_string(),
            address_header: address_header.to_string(),
            remarks_header: remarks_header.to_string(),
            region_header: region_header.map(str::to_string),
            lat_header: Some("Lat".to_string()),
            lng_header: Some("Lng".to_string()),
            gender,
        };
        PipelineConfig {
            sheets_id: "1jAMaD3afMfA19U2u1aRLkL0M-ufFvz1fKDpT_BraOfY".to_string(),
            maps_id: "1QEJocnDLq-vO8XRTOfRa50sFfJ3tLns0".to_string(),
            sheet_tabs: vec![
                tab(
                    "MALE TOILETS",
                    "0",
                    "Location",
                    "Address",
                    "Remarks",
                    Some("Region"),
                    Gender::Male,
                ),
                tab(
                    "FEMALE TOILETS",
                    "1908890944",
                    "Location",
                    "Address",
                    "Remarks",
                    Some("Region"),
                    Gender::Female,
                ),
                tab(
                    "HOTEL ROOMS W BIDET",
                    "1650628758",
                    "Hotel",
                    "Location",
                    "Room Name w bidet (if applicable)",
                    None,
                    Gender::Any,
                ),
            ],
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("data/cache"),
            sheets_cache_ttl: Duration::from_secs(60 * 60),
            maps_cache_ttl: Duration::from_secs(24 * 60 * 60),
            geocode_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            geocode_min_interval: Duration::from_secs(1),
            geocode_endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            fuzzy_threshold: 0.65,
            enrich: true,
            force_refresh: false,
            offline: false,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with environment variables. `dotenv` is loaded by
    /// the binary before this runs.
    pub fn from_env() -> Self {
        let mut config = PipelineConfig::default();
        if let Ok(id) = env::var("FUSION_SHEETS_ID") {
            config.sheets_id = id;
        }
        if let Ok(id) = env::var("FUSION_MAPS_ID") {
            config.maps_id = id;
        }
        if let Ok(dir) = env::var("FUSION_DATA_DIR") {
            config.data_dir = PathBuf::from(&dir);
            config.cache_dir = config.data_dir.join("cache");
        }
        if let Ok(endpoint) = env::var("FUSION_GEOCODE_ENDPOINT") {
            config.geocode_endpoint = endpoint;
        }
        if let Ok(threshold) = env::var("FUSION_FUZZY_THRESHOLD") {
            if let Ok(value) = threshold.parse::<f64>() {
                config.fuzzy_threshold = value.clamp(0.0, 1.0);
            }
        }
        config
    }

    pub fn log_config(&self) {
        info!(
            "Config: {} sheet tabs, data dir {:?}, enrich={}, fuzzy threshold {:.2}",
            self.sheet_tabs.len(),
            self.data_dir,
            self.enrich,
            self.fuzzy_threshold
        );
    }

    /// CSV export URL for one tab of the spreadsheet document.
    pub fn sheet_csv_url(&self, tab: &SheetTabConfig) -> Result<Url> {
        let mut url = Url::parse("https://docs.google.com/spreadsheets/d/")
            .and_then(|u| u.join(&format!("{}/export", self.sheets_id)))
            .context("building sheet export URL")?;
        url.query_pairs_mut()
            .append_pair("format", "csv")
            .append_pair("gid", &tab.gid);
        Ok(url)
    }

    /// KML export URL for the maps document.
    pub fn maps_kml_url(&self) -> Result<Url> {
        let mut url = Url::parse("https://www.google.com/maps/d/kml").context("building KML URL")?;
        url.query_pairs_mut()
            .append_pair("forcekml", "1")
            .append_pair("mid", &self.maps_id);
        Ok(url)
    }

    pub fn combined_path(&self) -> PathBuf {
        self.data_dir.join("combined.geojson")
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.data_dir.join("enriched.geojson")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tabs_cover_all_sources() {
        let config = PipelineConfig::default();
        assert_eq!(config.sheet_tabs.len(), 3);
        let hotel = &config.sheet_tabs[2];
        assert_eq!(hotel.name_header, "Hotel");
        assert_eq!(hotel.address_header, "Location");
        assert_eq!(hotel.gender, Gender::Any);
    }

    #[test]
    fn test_urls_carry_document_ids() {
        let config = PipelineConfig::default();
        let sheet_url = config.sheet_csv_url(&config.sheet_tabs[1]).unwrap();
        assert!(sheet_url.as_str().contains(&config.sheets_id));
        assert!(sheet_url.as_str().contains("gid=1908890944"));
        let kml_url = config.maps_kml_url().unwrap();
        assert!(kml_url.as_str().contains("forcekml=1"));
        assert!(kml_url.as_str().contains(&config.maps_id));
    }
}
