use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            bail!("Latitude {} is outside [-90, 90]", latitude);
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            bail!("Longitude {} is outside [-180, 180]", longitude);
        }
        Ok(Coordinates { latitude, longitude })
    }
}

/// Turns a point into a human-readable address.
pub trait ReverseGeocoder {
    /// `Ok(None)` when the service answered but knows no address for the point.
    fn reverse(&self, at: Coordinates) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Extracts `display_name` from a Nominatim `format=json` reply.
pub fn parse_reverse_response(body: &str) -> Result<Option<String>> {
    let response: ReverseResponse =
        serde_json::from_str(body).context("Malformed reverse-geocoding response")?;
    if let Some(err) = response.error {
        tracing::debug!(%err, "geocoder returned no match");
        return Ok(None);
    }
    Ok(response.display_name.filter(|n| !n.trim().is_empty()))
}

pub struct NominatimGeocoder {
    agent: ureq::Agent,
    url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.geocoder_timeout_secs))
            .build();
        NominatimGeocoder {
            agent,
            url: config.geocoder_url.clone(),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, at: Coordinates) -> Result<Option<String>> {
        let body = self
            .agent
            .get(&self.url)
            .set("User-Agent", &self.user_agent)
            .query("format", "json")
            .query("lat", &at.latitude.to_string())
            .query("lon", &at.longitude.to_string())
            .call()
            .context("Reverse-geocoding request failed")?
            .into_string()
            .context("Failed to read reverse-geocoding response")?;
        parse_reverse_response(&body)
    }
}
