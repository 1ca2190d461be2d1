//! Test orchestration: runs the measurement phases in order under one deadline

use crate::{
    client::ClientFactory,
    error::{AppError, Result},
    latency::LatencyProbe,
    location::{HttpLocationService, LocationService},
    logging::Logger,
    models::{AggregateResult, CandidateServer, Config, LatencyStat, UserLocation},
    server::{distance_km, sort_by_distance, HttpServerDirectory, Selection, ServerDirectory, ServerRanker},
    transfer::{DownloadTester, ProgressSender, TransferTester, UploadTester},
    types::Phase,
};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// High-level test runner interface
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run every phase and assemble the final result.
    ///
    /// `cancel` aborts the run from outside; `progress` receives transfer
    /// snapshots during the download and upload phases only.
    async fn run(&self, cancel: &CancellationToken, progress: Option<ProgressSender>) -> Result<AggregateResult>;
}

/// Sequences location, server discovery, selection, latency, download and
/// upload into one [`AggregateResult`].
pub struct TestOrchestrator {
    location: Arc<dyn LocationService>,
    directory: Arc<dyn ServerDirectory>,
    clients: ClientFactory,
    config: Config,
    logger: Logger,
}

impl TestOrchestrator {
    pub fn new(
        location: Arc<dyn LocationService>,
        directory: Arc<dyn ServerDirectory>,
        clients: ClientFactory,
        config: Config,
        logger: Logger,
    ) -> Self {
        Self {
            location,
            directory,
            clients,
            config,
            logger,
        }
    }

    /// Orchestrator backed by the HTTP location and directory services
    /// named in `config`
    pub fn from_config(config: Config, logger: Logger) -> Result<Self> {
        let clients = ClientFactory::default();
        let api = clients.api_client()?;

        let location = HttpLocationService::new(api.clone(), config.location_url.clone(), logger.named("LOCATION"));
        let directory = HttpServerDirectory::new(api, config.directory_url.clone(), logger.named("DIRECTORY"));

        Ok(Self::new(Arc::new(location), Arc::new(directory), clients, config, logger))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full test under the configured overall deadline
    pub async fn run_full_test(
        &self,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Result<AggregateResult> {
        self.config.validate()?;

        // One root token per run; the deadline and the caller both cancel it
        let root = cancel.child_token();
        let _guard = root.clone().drop_guard();
        {
            let root = root.clone();
            let timeout = self.config.timeout();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => root.cancel(),
                    _ = root.cancelled() => {}
                }
            });
        }

        let location = self
            .phase(Phase::LocatingUser, cancel, &root, self.raced(cancel, &root, self.location.detect()))
            .await?;

        let candidates = self
            .phase(Phase::FetchingServers, cancel, &root, async {
                let servers = self.raced(cancel, &root, self.directory.list()).await?;
                if servers.is_empty() {
                    return Err(AppError::directory_unavailable("server directory returned no servers"));
                }
                Ok(servers)
            })
            .await?;

        let ranker = self.ranker()?;
        let selection = self
            .phase(Phase::SelectingServer, cancel, &root, self.select(&ranker, candidates, &location, &root))
            .await?;
        let server = selection.server.clone();

        let latency = self
            .phase(Phase::MeasuringLatency, cancel, &root, self.measure_latency(&server, &selection, &root))
            .await?;

        let download = self
            .phase(Phase::MeasuringDownload, cancel, &root, async {
                let tester = DownloadTester::new(
                    self.clients.download_client()?,
                    self.config.download_config(),
                    self.logger.named("DOWNLOAD"),
                );
                tester.run(&server.base_url, &root, progress.clone()).await
            })
            .await?;

        let upload = self
            .phase(Phase::MeasuringUpload, cancel, &root, async {
                let tester = UploadTester::new(
                    self.clients.upload_client()?,
                    self.config.upload_config(),
                    self.logger.named("UPLOAD"),
                );
                tester.run(&server.base_url, &root, progress.clone()).await
            })
            .await?;

        self.logger.info("Test complete")
            .field("server_id", &server.id)
            .latency(&latency)
            .field("download_bps", download.bandwidth_bytes_per_sec)
            .field("upload_bps", upload.bandwidth_bytes_per_sec)
            .log()
            .await;

        Ok(AggregateResult {
            timestamp: Utc::now(),
            latency,
            download,
            upload,
            server,
            location,
        })
    }

    /// Enter `phase` unless the run is already over, and tag any failure
    /// with the phase it happened in.
    ///
    /// A phase still running when the root token fires fails as a whole,
    /// even if its work returned a (truncated) measurement.
    async fn phase<T, F>(&self, phase: Phase, cancel: &CancellationToken, root: &CancellationToken, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if root.is_cancelled() {
            return Err(self.interruption(cancel).in_phase(phase));
        }

        let correlation_id = self.logger.start_operation(phase.label()).await;
        let outcome = match work.await {
            _ if root.is_cancelled() => Err(self.interruption(cancel)),
            outcome => outcome,
        };
        self.logger.end_operation(&correlation_id, phase.label(), outcome.is_ok()).await;

        outcome.map_err(|e| e.in_phase(phase))
    }

    /// Race a collaborator call against the root token
    async fn raced<T, F>(&self, cancel: &CancellationToken, root: &CancellationToken, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            outcome = work => outcome,
            _ = root.cancelled() => Err(self.interruption(cancel)),
        }
    }

    /// Why the root token fired: the caller cancelled, or the deadline passed
    fn interruption(&self, cancel: &CancellationToken) -> AppError {
        if cancel.is_cancelled() {
            AppError::cancelled("test run was cancelled")
        } else {
            AppError::timeout(format!("overall deadline of {}s exceeded", self.config.timeout_seconds))
        }
    }

    fn ranker(&self) -> Result<ServerRanker> {
        let probe_config = self.config.ranking_probe_config();
        let probe = LatencyProbe::new(self.clients.probe_client(probe_config.per_sample_timeout)?, self.logger.named("PROBE"));
        Ok(ServerRanker::new(
            probe,
            probe_config,
            self.config.ranking_parallel_servers,
            self.logger.named("RANKER"),
        ))
    }

    async fn select(
        &self,
        ranker: &ServerRanker,
        mut candidates: Vec<CandidateServer>,
        location: &UserLocation,
        root: &CancellationToken,
    ) -> Result<Selection> {
        // An explicit id skips both the distance sort and the ranking
        if let Some(id) = &self.config.server_id {
            let mut selection = ServerRanker::select_by_id(&candidates, id)?;
            let server = &mut selection.server;
            server.distance_km = distance_km(location.lat, location.lon, server.lat, server.lon);
            return Ok(selection);
        }

        sort_by_distance(&mut candidates, location);
        let selection = ranker.select_best(&candidates, self.config.servers_to_probe, root).await?;

        self.logger.info(&format!("Selected {}", selection.server.host()))
            .field("server_id", &selection.server.id)
            .field("method", selection.method)
            .field("distance_km", selection.server.distance_km)
            .field("reachable", selection.reachable)
            .field("probed", selection.probed)
            .log()
            .await;

        Ok(selection)
    }

    /// Final latency measurement of the selected server. When it yields no
    /// samples the stat recorded while ranking stands in, if there is one.
    async fn measure_latency(
        &self,
        server: &CandidateServer,
        selection: &Selection,
        root: &CancellationToken,
    ) -> Result<LatencyStat> {
        let probe_config = self.config.latency_probe_config();
        let probe = LatencyProbe::new(self.clients.probe_client(probe_config.per_sample_timeout)?, self.logger.named("PROBE"));

        match probe.measure(&server.base_url, &probe_config, root).await {
            Ok(stat) => Ok(stat),
            Err(e @ AppError::NoSuccessfulSamples(_)) => match selection.latency {
                Some(ranked) => {
                    self.logger.warn("Latency probes failed; reusing the ranking measurement")
                        .field("server_id", &server.id)
                        .latency(&ranked)
                        .log()
                        .await;
                    Ok(ranked)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TestRunner for TestOrchestrator {
    async fn run(&self, cancel: &CancellationToken, progress: Option<ProgressSender>) -> Result<AggregateResult> {
        self.run_full_test(cancel, progress).await
    }
}
