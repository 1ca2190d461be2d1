//! Detection of the caller's public address and coordinates

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::UserLocation,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Source of the user's location
#[async_trait]
pub trait LocationService: Send + Sync {
    /// Fails with `LocationUnavailable` when the location cannot be determined
    async fn detect(&self) -> Result<UserLocation>;
}

/// ipinfo.io style document: `{"ip": "...", "loc": "lat,lon", "org": "..."}`
#[derive(Debug, Deserialize)]
struct LocationDocument {
    #[serde(default)]
    ip: String,
    loc: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    org: String,
}

impl LocationDocument {
    fn coordinates(&self) -> Option<(f64, f64)> {
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            return Some((lat, lon));
        }

        let loc = self.loc.as_deref()?;
        let (lat, lon) = loc.split_once(',')?;
        Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
    }
}

/// Parse a location document into a [`UserLocation`]
pub fn parse_location(body: &str) -> Result<UserLocation> {
    let document: LocationDocument = serde_json::from_str(body)
        .map_err(|e| AppError::location_unavailable(format!("malformed location response: {}", e)))?;

    let (lat, lon) = document
        .coordinates()
        .ok_or_else(|| AppError::location_unavailable("location response has no usable coordinates"))?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::location_unavailable(format!("coordinates out of range ({}, {})", lat, lon)));
    }

    Ok(UserLocation {
        ip: document.ip,
        lat,
        lon,
        isp: document.org,
    })
}

/// Resolves the location through a JSON geo-IP endpoint
pub struct HttpLocationService {
    client: Client,
    url: String,
    logger: Logger,
}

impl HttpLocationService {
    pub fn new(client: Client, url: String, logger: Logger) -> Self {
        Self { client, url, logger }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LocationService for HttpLocationService {
    async fn detect(&self) -> Result<UserLocation> {
        let response = self.client.get(&self.url).send().await
            .map_err(|e| AppError::location_unavailable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::location_unavailable(format!("{} returned {}", self.url, status)));
        }

        let body = response.text().await
            .map_err(|e| AppError::location_unavailable(format!("reading {}: {}", self.url, e)))?;

        let location = parse_location(&body)?;
        self.logger.debug("Detected location")
            .field("ip", &location.ip)
            .field("lat", location.lat)
            .field("lon", location.lon)
            .field("isp", &location.isp)
            .log()
            .await;

        Ok(location)
    }
}

/// Fixed location, for offline runs and tests
pub struct StaticLocationService {
    location: UserLocation,
}

impl StaticLocationService {
    pub fn new(location: UserLocation) -> Self {
        Self { location }
    }
}

#[async_trait]
impl LocationService for StaticLocationService {
    async fn detect(&self) -> Result<UserLocation> {
        Ok(self.location.clone())
    }
}
