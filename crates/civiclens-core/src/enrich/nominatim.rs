//! Nominatim (OpenStreetMap) reverse geocoder.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{GeocodedPlace, Geocoder};
use crate::error::GeocodeError;
use crate::models::config::GeocodingConfig;

/// Reverse geocoder backed by a Nominatim `/reverse` endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Create a geocoder for `base_url`, identifying as `user_agent`.
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a geocoder from configuration.
    pub fn from_config(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        Self::new(config.base_url.clone(), &config.user_agent)
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.base_url)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<GeocodedPlace>, GeocodeError> {
        debug!(lat, lon, "reverse geocoding via Nominatim");

        let response = self
            .client
            .get(self.reverse_url())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        parse_reverse_response(&body)
    }
}

/// Parse a `/reverse?format=jsonv2` body.
///
/// Nominatim reports "nothing here" as a 200 with an `error` member.
pub fn parse_reverse_response(body: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| GeocodeError::Malformed(e.to_string()))?;

    if value.get("error").is_some() {
        return Ok(None);
    }

    let display_name = value
        .get("display_name")
        .and_then(Value::as_str)
        .ok_or_else(|| GeocodeError::Malformed("missing display_name".to_string()))?
        .to_string();

    let address = value
        .get("address")
        .and_then(Value::as_object)
        .map(|components| {
            components
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(GeocodedPlace {
        display_name,
        address,
    }))
}
