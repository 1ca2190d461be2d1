//! Great-circle distance and distance ordering

use crate::models::{CandidateServer, UserLocation};
use std::cmp::Ordering;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two lat/lon points in degrees
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Fill in `distance_km` for every server relative to `origin`, then sort
/// nearest first. The sort is stable: equal distances keep directory order.
pub fn sort_by_distance(servers: &mut [CandidateServer], origin: &UserLocation) {
    for server in servers.iter_mut() {
        server.distance_km = distance_km(origin.lat, origin.lon, server.lat, server.lon);
    }
    servers.sort_by(|a, b| a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal));
}
