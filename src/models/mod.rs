//! Data models and structures for the network speed tester

pub mod config;
pub mod metrics;
pub mod server;

// Re-export main model types
pub use config::Config;
pub use metrics::{AggregateResult, LatencyStat, TransferProgress, TransferRunResult};
pub use server::{find_server_by_id, CandidateServer, UserLocation};
