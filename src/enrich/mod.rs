// src/enrich/mod.rs - the optional enrichment pass
pub mod geocode;
pub mod synthetic;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use tokio::time::{sleep_until, Instant};

use crate::cache::FileCache;
use crate::classify::region::{classify_region, region_from_coordinates};
use crate::config::PipelineConfig;
use crate::models::core::{coord_key_4dp, Location, Region};
use crate::models::stats::PipelineStats;
use geocode::{GeocodeResult, ReverseGeocoder};

/// Fill missing addresses/regions via reverse geocoding and attach the
/// synthetic presentation fields.
///
/// Geocode calls are the one stage with an ordering constraint: they are
/// serialized and spaced at the configured minimum interval. Failures are
/// logged and fall back to the coordinate heuristics; a single bad lookup
/// never blocks the pipeline.
pub async fn enrich_locations(
    locations: &mut [Location],
    config: &PipelineConfig,
    cache: &FileCache,
    stats: &mut PipelineStats,
) {
    let geocoder = if config.offline {
        None
    } else {
        match ReverseGeocoder::new(&config.geocode_endpoint) {
            Ok(geocoder) => Some(geocoder),
            Err(e) => {
                warn!("geocoder unavailable: {:#}", e);
                None
            }
        }
    };

    let progress = ProgressBar::new(locations.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.set_message("enriching locations");

    let mut next_call_at = Instant::now();
    for location in locations.iter_mut() {
        if location.address.is_empty() || location.region == Region::Unknown {
            resolve_via_geocoder(
                location,
                geocoder.as_ref(),
                config,
                cache,
                stats,
                &mut next_call_at,
            )
            .await;
        }

        location.amenities =
            synthetic::upgrade_amenities(&location.amenities, location.facility_type, &location.id);
        location.enrichment = Some(synthetic::synthesize(location));
        progress.inc(1);
    }
    progress.finish_and_clear();
}

async fn resolve_via_geocoder(
    location: &mut Location,
    geocoder: Option<&ReverseGeocoder>,
    config: &PipelineConfig,
    cache: &FileCache,
    stats: &mut PipelineStats,
    next_call_at: &mut Instant,
) {
    let (lng, lat) = location.coordinates;
    let (gx, gy) = coord_key_4dp(lng, lat);
    let key = format!("revgeo-{}-{}", gx, gy);

    let cached: Option<GeocodeResult> = cache.get(&key, config.geocode_cache_ttl);
    let result = match cached {
        Some(result) => {
            stats.geocode_cache_hits += 1;
            Some(result)
        }
        None => match geocoder {
            Some(geocoder) => {
                // Throttle to the service's documented rate limit.
                sleep_until(*next_call_at).await;
                *next_call_at = Instant::now() + config.geocode_min_interval;

                stats.geocode_lookups += 1;
                match geocoder.reverse(lat, lng).await {
                    Ok(result) => {
                        if let Err(e) = cache.put(&key, &result) {
                            warn!("failed to cache geocode result: {:#}", e);
                        }
                        Some(result)
                    }
                    Err(e) => {
                        debug!("reverse geocode failed for '{}': {:#}", location.name, e);
                        stats.geocode_failures += 1;
                        None
                    }
                }
            }
            None => None,
        },
    };

    match result {
        Some(result) => {
            if location.address.is_empty() {
                location.address = result.display_name.trim().to_string();
            }
            if location.region == Region::Unknown {
                location.region = classify_region(
                    result.address.suburb.as_deref(),
                    &location.address,
                    location.coordinates,
                );
            }
        }
        // No enrichment available: address stays empty, region falls back
        // to the bounding-box heuristic.
        None => {
            if location.region == Region::Unknown {
                location.region = region_from_coordinates(lng, lat);
            }
        }
    }
}
