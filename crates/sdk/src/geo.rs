//! Geolocation lookup
//!
//! One GET against the locate endpoint resolves the visitor's country
//! and coarse location. A failed lookup leaves the default (empty)
//! location in place; jurisdiction logic then treats the visitor as
//! unresolved.

use serde::Deserialize;
use tracing::warn;

use beacon_core::context::LocationProperties;
use beacon_transport::{Request, SharedTransport};

use crate::page::PageEnvironment;

/// One state entry of the locate response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeoState {
    pub state: String,
    pub cities: Vec<String>,
    pub counties: Vec<String>,
    pub zipcodes: Vec<String>,
}

/// The locate endpoint response. Field names follow the service's wire
/// format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Geolocation {
    pub continent: String,
    pub country: String,
    pub country_alpha2: String,
    pub ip_address: String,
    pub lat: String,
    pub lon: String,
    pub states: Vec<GeoState>,
}

impl Geolocation {
    /// Fetch the visitor's location. Any failure resolves to the empty
    /// default.
    pub async fn fetch(transport: &SharedTransport, url: &str) -> Self {
        match transport.send(url, Request::get()).await {
            Ok(response) => response
                .as_json()
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_else(|| {
                    warn!("locate response is malformed, treating location as unresolved");
                    Self::default()
                }),
            Err(e) => {
                warn!(error = %e, "geolocation lookup failed");
                Self::default()
            }
        }
    }

    /// Location payload properties, combining resolved geo data with
    /// page locale facts.
    pub fn location_properties(&self, page: &PageEnvironment) -> LocationProperties {
        let first_state = self.states.first();
        LocationProperties {
            city: first_state
                .and_then(|s| s.cities.first().cloned())
                .unwrap_or_default(),
            state: first_state.map(|s| s.state.clone()).unwrap_or_default(),
            country: self.country.clone(),
            zip: first_state
                .and_then(|s| s.zipcodes.first().cloned())
                .unwrap_or_default(),
            timezone: page.timezone.clone().unwrap_or_default(),
            locale: Some(page.language.clone()),
            language: page.language_code(),
        }
    }
}
