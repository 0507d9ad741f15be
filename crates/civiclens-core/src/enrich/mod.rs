//! Reverse-geocoding enrichment of report coordinates.
//!
//! Enrichment is optional: the enricher never fails. A lookup without a
//! result leaves the location empty, a failed or timed-out lookup yields
//! sentinel strings.

pub mod nominatim;

pub use nominatim::NominatimGeocoder;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GeocodeError;

/// Address placeholder stored when the lookup failed.
pub const UNKNOWN_ADDRESS: &str = "Unknown Location";

/// City/state placeholder stored when the lookup failed.
pub const UNKNOWN: &str = "Unknown";

/// Address components checked for the city, most specific first.
const CITY_KEYS: [&str; 4] = ["city", "town", "village", "county"];

/// A reverse-geocoding hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    /// Full formatted address.
    pub display_name: String,
    /// Structured address components (`city`, `town`, `state`, ...).
    #[serde(default)]
    pub address: HashMap<String, String>,
}

/// External reverse-geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up the place at the given coordinates; `Ok(None)` when nothing is there.
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

/// Geocoder that never finds anything, for offline use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn reverse(&self, _lat: f64, _lon: f64) -> Result<Option<GeocodedPlace>, GeocodeError> {
        Ok(None)
    }
}

/// Human-readable location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Location {
    /// Extract address, city and state from a geocoder hit.
    pub fn from_place(place: &GeocodedPlace) -> Self {
        let non_empty = |key: &str| {
            place
                .address
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let city = CITY_KEYS.iter().find_map(|key| non_empty(*key));
        let address = Some(place.display_name.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Self {
            address,
            city,
            state: non_empty("state"),
        }
    }

    /// The sentinel location stored after a failed lookup.
    pub fn unknown() -> Self {
        Self {
            address: Some(UNKNOWN_ADDRESS.to_string()),
            city: Some(UNKNOWN.to_string()),
            state: Some(UNKNOWN.to_string()),
        }
    }
}

/// Result of enriching one coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// The geocoder found a place.
    Resolved(Location),
    /// The geocoder answered but had nothing for these coordinates.
    NotFound,
    /// The lookup failed or timed out.
    Failed { reason: String },
}

impl Enrichment {
    /// Location to store on the report.
    pub fn location(&self) -> Location {
        match self {
            Enrichment::Resolved(location) => location.clone(),
            Enrichment::NotFound => Location::default(),
            Enrichment::Failed { .. } => Location::unknown(),
        }
    }

    /// `(address, city, state)` to store on the report.
    pub fn into_fields(self) -> (Option<String>, Option<String>, Option<String>) {
        let location = match self {
            Enrichment::Resolved(location) => location,
            other => other.location(),
        };
        (location.address, location.city, location.state)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Enrichment::Failed { .. })
    }
}

/// Wraps a [`Geocoder`] with a timeout and the fallback contract.
pub struct LocationEnricher<G> {
    geocoder: G,
    timeout: Duration,
}

impl<G: Geocoder> LocationEnricher<G> {
    /// Create an enricher with a 10 second lookup timeout.
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the lookup timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Reverse-geocode the coordinates. Never fails.
    pub async fn enrich(&self, lat: f64, lon: f64) -> Enrichment {
        let lookup = tokio::time::timeout(self.timeout, self.geocoder.reverse(lat, lon)).await;

        match lookup {
            Ok(Ok(Some(place))) => {
                let location = Location::from_place(&place);
                debug!(city = ?location.city, state = ?location.state, "location resolved");
                Enrichment::Resolved(location)
            }
            Ok(Ok(None)) => {
                debug!(lat, lon, "geocoder returned no result");
                Enrichment::NotFound
            }
            Ok(Err(e)) => {
                warn!(lat, lon, error = %e, "reverse geocoding failed, using fallback location");
                Enrichment::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    lat,
                    lon,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "reverse geocoding timed out, using fallback location"
                );
                Enrichment::Failed {
                    reason: format!("timed out after {:?}", self.timeout),
                }
            }
        }
    }
}
