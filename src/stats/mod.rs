//! Statistical reduction of latency samples

use crate::{
    error::{AppError, Result},
    models::metrics::LatencyStat,
};
use std::time::Duration;

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N).
///
/// A single value has no observable spread, so it yields exactly 0.0.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    // Identical samples must give exactly zero, free of rounding in the mean
    if values.iter().all(|v| *v == values[0]) {
        return 0.0;
    }

    let variance = values.iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Reduce successful probe round trips to a [`LatencyStat`].
///
/// `endpoint` is only used to label the error when no sample succeeded.
pub fn latency_stat(endpoint: &str, samples: &[Duration]) -> Result<LatencyStat> {
    if samples.is_empty() {
        return Err(AppError::no_successful_samples(endpoint));
    }

    let millis: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
    let average_ms = mean(&millis);
    let jitter_ms = population_std_dev(&millis, average_ms);

    Ok(LatencyStat {
        average_ms,
        jitter_ms,
        sample_count: millis.len(),
    })
}
