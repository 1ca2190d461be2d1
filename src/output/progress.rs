//! Live transfer progress on stderr

use super::formatter::{format_bytes, LABEL_WIDTH};
use crate::{
    models::TransferProgress,
    transfer::ProgressSender,
    types::{Phase, SpeedUnit},
};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Renders transfer snapshots as a single refreshed line per phase
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    unit: SpeedUnit,
}

impl ProgressReporter {
    pub fn new(unit: SpeedUnit) -> Self {
        Self { unit }
    }

    /// One progress line, without the leading carriage return
    pub fn render(&self, progress: &TransferProgress) -> String {
        let label = match progress.phase {
            Phase::MeasuringDownload => "Download",
            Phase::MeasuringUpload => "Upload",
            other => other.label(),
        };
        format!(
            "{:>width$} {} ({}, {:.1}s)",
            label,
            self.unit.format(progress.rate_bytes_per_sec),
            format_bytes(progress.bytes_total),
            progress.elapsed.as_secs_f64(),
            width = LABEL_WIDTH
        )
    }

    /// Channel for the transfer testers plus the task drawing it.
    ///
    /// The task ends once every sender is dropped.
    pub fn start(self) -> (ProgressSender, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.consume(receiver));
        (sender, handle)
    }

    async fn consume(self, mut receiver: mpsc::UnboundedReceiver<TransferProgress>) {
        let mut stderr = std::io::stderr();
        let mut current: Option<Phase> = None;
        let mut width = 0usize;

        while let Some(progress) = receiver.recv().await {
            if current.is_some() && current != Some(progress.phase) {
                let _ = writeln!(stderr);
                width = 0;
            }
            current = Some(progress.phase);

            let line = self.render(&progress);
            // Pad over leftovers of a longer previous line
            let padding = width.saturating_sub(line.len());
            width = line.len();
            let _ = write!(stderr, "\r{}{}", line, " ".repeat(padding));
            let _ = stderr.flush();
        }

        if current.is_some() {
            let _ = writeln!(stderr);
        }
    }
}
