//! Candidate server and observer location models

use serde::{Deserialize, Serialize};

/// A speed test server offered by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateServer {
    /// Directory identifier, used by the `--server` override
    pub id: String,

    /// Base URL; endpoint paths such as `/speedtest/latency.txt` are appended to it
    pub base_url: String,

    pub lat: f64,
    pub lon: f64,

    /// Display name, usually the city
    pub name: String,
    pub country: String,
    pub sponsor: String,

    /// Great-circle distance from the observer, filled in before ranking
    #[serde(default)]
    pub distance_km: f64,
}

impl CandidateServer {
    /// Create a server with no distance computed yet
    pub fn new<S: Into<String>>(id: S, base_url: S, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            lat,
            lon,
            name: String::new(),
            country: String::new(),
            sponsor: String::new(),
            distance_km: 0.0,
        }
    }

    /// Attach descriptive metadata
    pub fn with_metadata<S: Into<String>>(mut self, name: S, country: S, sponsor: S) -> Self {
        self.name = name.into();
        self.country = country.into();
        self.sponsor = sponsor.into();
        self
    }

    /// Full URL of an endpoint path on this server
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Host portion of the base URL, without scheme or path
    pub fn host(&self) -> &str {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }

    /// "Name, Country" for display, skipping empty parts
    pub fn location_label(&self) -> String {
        match (self.name.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.name, self.country),
            (false, true) => self.name.clone(),
            (true, false) => self.country.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Find a server by its directory id
pub fn find_server_by_id<'a>(servers: &'a [CandidateServer], id: &str) -> Option<&'a CandidateServer> {
    servers.iter().find(|s| s.id == id)
}

/// The observer's public address and position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub ip: String,
    pub lat: f64,
    pub lon: f64,
    pub isp: String,
}
