use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LookupError;

/// Shown in place of coordinates whenever the lookup does not succeed.
pub const FALLBACK_LOCATION: &str = "Unknown location";

pub const DEFAULT_GEOLOCATION_URL: &str = "http://ip-api.com/json/";
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of a human-readable location string.
pub trait Locator: Send + Sync {
    fn locate(&self) -> Result<String, LookupError>;
}

/// IP-based lookup against an ip-api.com compatible endpoint.
#[derive(Clone, Debug)]
pub struct IpApiLocator {
    url: String,
    timeout: Duration,
}

impl IpApiLocator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Default for IpApiLocator {
    fn default() -> Self {
        Self::new(DEFAULT_GEOLOCATION_URL, DEFAULT_GEOLOCATION_TIMEOUT)
    }
}

impl Locator for IpApiLocator {
    fn locate(&self) -> Result<String, LookupError> {
        let client = Client::builder()
            .user_agent(concat!("mdipaint/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()?;
        debug!(url = %self.url, "requesting geolocation");
        let body = client.get(&self.url).send()?.error_for_status()?.text()?;
        parse_ip_api(&body)
    }
}

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Extract `"lat, lon"` (six decimals) from an ip-api.com JSON body.
pub fn parse_ip_api(body: &str) -> Result<String, LookupError> {
    let response: IpApiResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        return Err(LookupError::Status(response.status));
    }
    match (response.lat, response.lon) {
        (Some(lat), Some(lon)) => Ok(format!("{lat:.6}, {lon:.6}")),
        _ => Err(LookupError::MissingCoordinates),
    }
}

/// Resolve a location, falling back to [`FALLBACK_LOCATION`] on any failure.
pub fn describe_location(locator: &dyn Locator) -> String {
    match locator.locate() {
        Ok(location) => location,
        Err(e) => {
            warn!(error = %e, "geolocation unavailable");
            FALLBACK_LOCATION.to_string()
        }
    }
}
