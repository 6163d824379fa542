//! PSD-to-velocity conversion
//!
//! This module turns a stored acceleration PSD matrix (dB, period axis) into a
//! velocity amplitude spectrum (physical units, frequency axis):
//! - Temporal resampling to a fixed cadence by arithmetic mean
//! - Period axis inverted to frequency and re-sorted ascending
//! - Columns with no data at any time dropped
//! - Per-cell conversion `sqrt(10^(dB/10) / (2*pi*f)^2)`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::HvsrError;
use crate::types::{validate_period_axis, PsdMatrix, VelocitySpectrum};

/// Default resampling cadence in minutes
pub const DEFAULT_CADENCE_MINUTES: i64 = 30;

/// Configuration for the PSD-to-velocity converter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Width of each temporal resampling bin, in minutes
    pub cadence_minutes: i64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            cadence_minutes: DEFAULT_CADENCE_MINUTES,
        }
    }
}

impl ConverterConfig {
    pub fn new(cadence_minutes: i64) -> Self {
        Self { cadence_minutes }
    }

    /// Fail fast before any computation runs
    pub fn validate(&self) -> Result<(), HvsrError> {
        if self.cadence_minutes <= 0 {
            return Err(HvsrError::InvalidConfig(format!(
                "cadence must be positive, got {} minutes",
                self.cadence_minutes
            )));
        }
        Ok(())
    }
}

/// Convert an acceleration PSD matrix into a velocity amplitude spectrum.
///
/// The period axis is re-validated here even though [`PsdMatrix::new`] checks
/// it, so a hand-built matrix with a zero or negative period fails loudly
/// instead of producing an infinite frequency downstream.
pub fn psd_to_velocity(
    psd: &PsdMatrix,
    config: &ConverterConfig,
) -> Result<VelocitySpectrum, HvsrError> {
    config.validate()?;
    validate_period_axis(&psd.periods)?;

    let (times, rows) = resample_mean(&psd.times, &psd.values, config.cadence_minutes)?;

    // Invert the period axis and order columns by ascending frequency.
    let mut order: Vec<usize> = (0..psd.periods.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = 1.0 / psd.periods[a];
        let fb = 1.0 / psd.periods[b];
        fa.total_cmp(&fb)
    });

    // Keep only columns that carry data at some time step.
    let kept: Vec<usize> = order
        .into_iter()
        .filter(|&col| rows.iter().any(|row| row[col].is_some()))
        .collect();

    let frequencies: Vec<f64> = kept.iter().map(|&col| 1.0 / psd.periods[col]).collect();

    let amplitudes: Vec<Vec<Option<f64>>> = rows
        .iter()
        .map(|row| {
            kept.iter()
                .zip(&frequencies)
                .map(|(&col, &freq)| row[col].and_then(|db| db_power_to_velocity(db, freq)))
                .collect()
        })
        .collect();

    Ok(VelocitySpectrum {
        channel: psd.channel.clone(),
        times,
        frequencies,
        amplitudes,
    })
}

/// Decibel acceleration power to velocity amplitude at frequency `freq`.
///
/// `10^(dB/10)` recovers linear acceleration power, the square root gives
/// acceleration amplitude, and dividing by the angular frequency `2*pi*f`
/// integrates to velocity amplitude. Non-finite results map to `None`.
fn db_power_to_velocity(db: f64, freq: f64) -> Option<f64> {
    let power = 10f64.powf(db / 10.0);
    let amplitude = (power / (2.0 * PI * freq).powi(2)).sqrt();
    amplitude.is_finite().then_some(amplitude)
}

/// Aggregate rows into fixed-cadence bins by arithmetic mean per column.
///
/// Bins are aligned to epoch multiples of the cadence and span the first to
/// the last populated bin inclusive; interior bins with no samples come out
/// as all-missing rows.
fn resample_mean(
    times: &[DateTime<Utc>],
    values: &[Vec<Option<f64>>],
    cadence_minutes: i64,
) -> Result<(Vec<DateTime<Utc>>, Vec<Vec<Option<f64>>>), HvsrError> {
    if times.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let width = values.first().map(Vec::len).unwrap_or(0);
    let cadence_secs = cadence_minutes * 60;
    let bin_of = |t: &DateTime<Utc>| t.timestamp().div_euclid(cadence_secs);

    let first_bin = bin_of(&times[0]);
    let last_bin = bin_of(&times[times.len() - 1]);
    let n_bins = usize::try_from(last_bin - first_bin + 1).map_err(|_| {
        HvsrError::InvalidTimeAxis("time span does not fit the cadence grid".to_string())
    })?;

    let mut sums = vec![vec![0.0f64; width]; n_bins];
    let mut counts = vec![vec![0usize; width]; n_bins];

    for (time, row) in times.iter().zip(values) {
        let bin = (bin_of(time) - first_bin) as usize;
        for (col, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                sums[bin][col] += v;
                counts[bin][col] += 1;
            }
        }
    }

    let mut out_times = Vec::with_capacity(n_bins);
    for i in 0..n_bins {
        let secs = (first_bin + i as i64) * cadence_secs;
        let t = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            HvsrError::InvalidTimeAxis(format!("bin timestamp {} out of range", secs))
        })?;
        out_times.push(t);
    }

    let rows = sums
        .into_iter()
        .zip(counts)
        .map(|(sum_row, count_row)| {
            sum_row
                .into_iter()
                .zip(count_row)
                .map(|(sum, n)| if n > 0 { Some(sum / n as f64) } else { None })
                .collect()
        })
        .collect();

    Ok((out_times, rows))
}
