// src/fetch.rs - raw source downloads with cache short-circuit
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use reqwest::Client;
use std::time::Duration;

use crate::cache::FileCache;
use crate::config::{PipelineConfig, SheetTabConfig};

const USER_AGENT: &str = "location-fusion/0.1 (data pipeline)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw text for one source, plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fresh(String),
    Cached(String),
    /// Fetch failed and no cached copy exists; the source contributes
    /// nothing this run.
    Unavailable,
}

impl FetchOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            FetchOutcome::Fresh(text) | FetchOutcome::Cached(text) => Some(text),
            FetchOutcome::Unavailable => None,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self, FetchOutcome::Unavailable)
    }
}

pub struct SourceFetcher {
    client: Client,
    cache: FileCache,
    force_refresh: bool,
    offline: bool,
}

impl SourceFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(SourceFetcher {
            client,
            cache: FileCache::new(&config.cache_dir)?,
            force_refresh: config.force_refresh,
            offline: config.offline,
        })
    }

    /// Raw CSV text for one spreadsheet tab.
    pub async fn fetch_sheet_tab(
        &self,
        config: &PipelineConfig,
        tab: &SheetTabConfig,
    ) -> FetchOutcome {
        let key = format!("sheets-{}", tab.gid);
        let url = match config.sheet_csv_url(tab) {
            Ok(url) => url,
            Err(e) => {
                warn!("tab '{}': {:#}", tab.name, e);
                return FetchOutcome::Unavailable;
            }
        };
        self.fetch_text(&key, url.as_str(), config.sheets_cache_ttl, &tab.name)
            .await
    }

    /// Raw KML text for the maps document.
    pub async fn fetch_kml(&self, config: &PipelineConfig) -> FetchOutcome {
        let url = match config.maps_kml_url() {
            Ok(url) => url,
            Err(e) => {
                warn!("maps: {:#}", e);
                return FetchOutcome::Unavailable;
            }
        };
        self.fetch_text("maps-kml", url.as_str(), config.maps_cache_ttl, "maps")
            .await
    }

    /// Cache-first text fetch: fresh cache short-circuits the network; a
    /// failed download falls back to the last cached copy of any age.
    async fn fetch_text(
        &self,
        key: &str,
        url: &str,
        ttl: Duration,
        label: &str,
    ) -> FetchOutcome {
        if !self.force_refresh {
            if let Some(text) = self.cache.get::<String>(key, ttl) {
                info!("{}: using cached data", label);
                return FetchOutcome::Cached(text);
            }
        }

        if self.offline {
            return match self.cache.get_stale::<String>(key) {
                Some(text) => {
                    info!("{}: offline, using stale cache", label);
                    FetchOutcome::Cached(text)
                }
                None => {
                    warn!("{}: offline and no cached copy", label);
                    FetchOutcome::Unavailable
                }
            };
        }

        match self.download(url).await {
            Ok(text) => {
                if let Err(e) = self.cache.put(key, &text) {
                    warn!("{}: failed to cache response: {:#}", label, e);
                }
                info!("{}: fetched {} bytes", label, text.len());
                FetchOutcome::Fresh(text)
            }
            Err(e) => {
                warn!("{}: fetch failed: {:#}", label, e);
                match self.cache.get_stale::<String>(key) {
                    Some(text) => {
                        info!("{}: falling back to stale cache", label);
                        FetchOutcome::Cached(text)
                    }
                    None => FetchOutcome::Unavailable,
                }
            }
        }
    }

    async fn download(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }
        let text = response.text().await.context("reading response body")?;
        if text.trim().is_empty() {
            return Err(anyhow!("empty response body"));
        }
        Ok(text)
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }
}
