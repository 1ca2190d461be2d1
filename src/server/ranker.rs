//! Latency-based server selection

use crate::{
    error::{AppError, Result},
    latency::{LatencyProbe, ProbeConfig},
    logging::Logger,
    models::{find_server_by_id, CandidateServer, LatencyStat},
};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How a server was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Requested explicitly by id
    Explicit,
    /// Lowest average latency among the probed servers
    LowestLatency,
    /// No probe succeeded; nearest server used instead
    NearestFallback,
}

/// Result of server selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub server: CandidateServer,
    /// Latency measured while ranking, if the server was probed successfully
    pub latency: Option<LatencyStat>,
    pub method: SelectionMethod,
    /// Servers that answered at least one probe
    pub reachable: usize,
    /// Servers probed
    pub probed: usize,
}

/// Picks the lowest-latency server among the nearest candidates
pub struct ServerRanker {
    probe: LatencyProbe,
    probe_config: ProbeConfig,
    parallel_servers: usize,
    logger: Logger,
}

impl ServerRanker {
    pub fn new(probe: LatencyProbe, probe_config: ProbeConfig, parallel_servers: usize, logger: Logger) -> Self {
        Self {
            probe,
            probe_config,
            parallel_servers: parallel_servers.max(1),
            logger,
        }
    }

    /// Select by explicit id; ranking is never invoked on this path
    pub fn select_by_id(candidates: &[CandidateServer], id: &str) -> Result<Selection> {
        let server = find_server_by_id(candidates, id)
            .cloned()
            .ok_or_else(|| AppError::server_not_found(id))?;

        Ok(Selection {
            server,
            latency: None,
            method: SelectionMethod::Explicit,
            reachable: 0,
            probed: 0,
        })
    }

    /// Probe the first `top_n` candidates (all when `top_n` is 0 or larger
    /// than the list) and pick the lowest average latency.
    ///
    /// `candidates` must already be sorted nearest first: ties go to the
    /// earlier entry, and when no probe succeeds the first candidate is
    /// returned. Only an empty candidate list is an error.
    pub async fn select_best(
        &self,
        candidates: &[CandidateServer],
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<Selection> {
        let first = candidates
            .first()
            .ok_or_else(|| AppError::directory_unavailable("no candidate servers to rank"))?;

        let probe_count = if top_n == 0 || top_n > candidates.len() {
            candidates.len()
        } else {
            top_n
        };
        let probed = &candidates[..probe_count];

        let gate = Arc::new(Semaphore::new(self.parallel_servers));
        let probes = probed.iter().map(|server| {
            let gate = gate.clone();
            async move {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| AppError::internal(format!("probe gate closed: {}", e)))?;
                self.probe.measure(&server.base_url, &self.probe_config, cancel).await
            }
        });
        let outcomes = join_all(probes).await;

        let mut stats = Vec::with_capacity(probe_count);
        for (server, outcome) in probed.iter().zip(outcomes) {
            match outcome {
                Ok(stat) => {
                    self.logger.debug(&format!("Ranked {}", server.host()))
                        .field("server_id", &server.id)
                        .field("distance_km", server.distance_km)
                        .latency(&stat)
                        .log()
                        .await;
                    stats.push(Some(stat));
                }
                Err(e) => {
                    self.logger.debug(&format!("Server {} unreachable", server.host()))
                        .field("server_id", &server.id)
                        .error_info(&e)
                        .log()
                        .await;
                    stats.push(None);
                }
            }
        }
        let reachable = stats.iter().flatten().count();

        let selection = match pick_best(&stats) {
            Some(index) => Selection {
                server: probed[index].clone(),
                latency: stats[index],
                method: SelectionMethod::LowestLatency,
                reachable,
                probed: probe_count,
            },
            None => {
                self.logger.warn("No server answered latency probes; using the nearest server")
                    .field("server_id", &first.id)
                    .field("probed", probe_count)
                    .log()
                    .await;
                Selection {
                    server: first.clone(),
                    latency: None,
                    method: SelectionMethod::NearestFallback,
                    reachable: 0,
                    probed: probe_count,
                }
            }
        };

        Ok(selection)
    }
}

/// Index of the lowest average latency among the measured entries.
///
/// Only a strictly lower average replaces the current best, so on a tie the
/// earlier (nearer) candidate wins. `None` when nothing was measured.
fn pick_best(stats: &[Option<LatencyStat>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, stat) in stats.iter().enumerate() {
        let Some(stat) = stat else { continue };
        if best.map_or(true, |(_, average)| stat.average_ms < average) {
            best = Some((index, stat.average_ms));
        }
    }
    best.map(|(index, _)| index)
}
