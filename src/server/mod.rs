//! Candidate servers: discovery, distance ordering and latency ranking

pub mod directory;
pub mod distance;
pub mod ranker;

pub use directory::{HttpServerDirectory, ServerDirectory, StaticServerDirectory};
pub use distance::{distance_km, sort_by_distance, EARTH_RADIUS_KM};
pub use ranker::{Selection, SelectionMethod, ServerRanker};
