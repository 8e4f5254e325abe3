// src/enrich/geocode.rs - reverse geocoding client
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = "location-fusion/0.1 (data pipeline)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Structured address components of a reverse-geocode response. The service
/// is treated as a black box; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub display_name: String,
    #[serde(default)]
    pub address: AddressComponents,
}

pub struct ReverseGeocoder {
    client: Client,
    endpoint: String,
}

impl ReverseGeocoder {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building geocoder HTTP client")?;
        Ok(ReverseGeocoder {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// One reverse lookup. Network errors, non-success statuses, and
    /// malformed payloads all surface as `Err`; the caller decides the
    /// fallback, never this client.
    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<GeocodeResult> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
            ])
            .send()
            .await
            .context("reverse geocode request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("reverse geocode HTTP {}", response.status()));
        }
        let result: GeocodeResult = response
            .json()
            .await
            .context("malformed reverse geocode payload")?;
        if result.display_name.trim().is_empty() {
            return Err(anyhow!("reverse geocode returned empty display name"));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape_tolerates_missing_components() {
        let payload = r#"{"display_name":"1 HarbourFront Walk, Singapore 098585"}"#;
        let parsed: GeocodeResult = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.display_name, "1 HarbourFront Walk, Singapore 098585");
        assert!(parsed.address.road.is_none());

        let full = r#"{
            "display_name": "VivoCity, 1 HarbourFront Walk, Bukit Merah, Singapore 098585",
            "address": {"road": "HarbourFront Walk", "suburb": "Bukit Merah", "postcode": "098585", "licence": "ignored"}
        }"#;
        let parsed: GeocodeResult = serde_json::from_str(full).unwrap();
        assert_eq!(parsed.address.suburb.as_deref(), Some("Bukit Merah"));
        assert_eq!(parsed.address.postcode.as_deref(), Some("098585"));
    }
}
