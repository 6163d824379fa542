//! Core types for the hvsrkit pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: stored PSD matrices, velocity amplitude spectra, ratio tables,
//! and summary spectrum curves. Missing measurements are `None` everywhere;
//! a gap is never represented as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HvsrError;

/// Seismometer component code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentCode {
    /// Vertical
    Z,
    /// North-south horizontal
    N,
    /// East-west horizontal
    E,
}

impl ComponentCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCode::Z => "Z",
            ComponentCode::N => "N",
            ComponentCode::E => "E",
        }
    }
}

impl fmt::Display for ComponentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentCode {
    type Err = HvsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Z" | "z" => Ok(ComponentCode::Z),
            "N" | "n" => Ok(ComponentCode::N),
            "E" | "e" => Ok(ComponentCode::E),
            other => Err(HvsrError::ParseError(format!(
                "expected Z, N or E, got {:?}",
                other
            ))),
        }
    }
}

/// Station identifier: network, station and location codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationId {
    pub network: String,
    pub station: String,
    pub location: String,
}

impl StationId {
    pub fn new(network: &str, station: &str, location: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.network, self.station, self.location)
    }
}

/// A single channel: one component of one station
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub station: StationId,
    pub component: ComponentCode,
}

impl ChannelId {
    pub fn new(station: StationId, component: ComponentCode) -> Self {
        Self { station, component }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.station, self.component)
    }
}

/// Stored power-spectral-density matrix for one channel.
///
/// Rows are timestamps (strictly increasing), columns are periods in seconds
/// (strictly monotonic, all positive). Cell values are decibels of
/// acceleration power, `10 * log10(power)`; gaps are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsdMatrix {
    pub channel: ChannelId,
    pub times: Vec<DateTime<Utc>>,
    pub periods: Vec<f64>,
    /// `values[t][p]` in dB; one row per timestamp
    pub values: Vec<Vec<Option<f64>>>,
}

impl PsdMatrix {
    /// Build a PSD matrix, validating axes and shape.
    ///
    /// Fails fast on a non-monotonic or non-positive period axis, an unsorted
    /// time axis, or row lengths that do not match the period axis.
    pub fn new(
        channel: ChannelId,
        times: Vec<DateTime<Utc>>,
        periods: Vec<f64>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, HvsrError> {
        validate_period_axis(&periods)?;

        if times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HvsrError::InvalidTimeAxis(
                "timestamps must be strictly increasing".to_string(),
            ));
        }

        if values.len() != times.len() {
            return Err(HvsrError::ShapeMismatch(format!(
                "{} rows for {} timestamps",
                values.len(),
                times.len()
            )));
        }

        if let Some(row) = values.iter().find(|row| row.len() != periods.len()) {
            return Err(HvsrError::ShapeMismatch(format!(
                "row of length {} for {} period bins",
                row.len(),
                periods.len()
            )));
        }

        Ok(Self {
            channel,
            times,
            periods,
            values,
        })
    }

    /// Merge a per-day fragment into this matrix in place.
    ///
    /// The fragment must describe the same channel with the same period axis.
    /// Rows are inserted in time order; a timestamp already present keeps its
    /// existing row, so re-merging the same fragment is a no-op.
    pub fn merge(&mut self, fragment: PsdMatrix) -> Result<(), HvsrError> {
        if fragment.channel != self.channel {
            return Err(HvsrError::StationMismatch(format!(
                "cannot merge {} into {}",
                fragment.channel, self.channel
            )));
        }

        if !same_axis(&fragment.periods, &self.periods) {
            return Err(HvsrError::InvalidPeriodAxis(format!(
                "fragment period axis differs for {}",
                self.channel
            )));
        }

        for (time, row) in fragment.times.into_iter().zip(fragment.values) {
            match self.times.binary_search(&time) {
                Ok(_) => {} // already loaded
                Err(pos) => {
                    self.times.insert(pos, time);
                    self.values.insert(pos, row);
                }
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Velocity amplitude spectrum for one channel.
///
/// Produced from a [`PsdMatrix`] by the converter: the time index is the
/// resampled cadence, the column axis is frequency in Hz (strictly increasing,
/// all positive) and cells hold velocity amplitude in physical units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocitySpectrum {
    pub channel: ChannelId,
    pub times: Vec<DateTime<Utc>>,
    pub frequencies: Vec<f64>,
    /// `amplitudes[t][f]`; gaps are `None`
    pub amplitudes: Vec<Vec<Option<f64>>>,
}

impl VelocitySpectrum {
    /// Per-frequency arithmetic mean over time, ignoring missing cells.
    /// A column with no data at any time yields `None`.
    pub fn mean_over_time(&self) -> SpectrumCurve {
        SpectrumCurve {
            frequencies: self.frequencies.clone(),
            values: column_means(&self.amplitudes, self.frequencies.len()),
        }
    }
}

/// Time-frequency table of dimensionless spectral ratios.
///
/// Output shape of both the HVSR combiner and the cross-station
/// amplification variant. Undefined cells (missing input, zero denominator,
/// negative radicand) are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioTable {
    pub station: StationId,
    pub times: Vec<DateTime<Utc>>,
    pub frequencies: Vec<f64>,
    /// `values[t][f]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl RatioTable {
    /// True when the time/frequency intersection that produced this table
    /// was empty. Consumers treat this as "no result", not an error.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty() || self.frequencies.is_empty()
    }

    /// Per-frequency arithmetic mean over time, ignoring missing cells.
    pub fn mean_over_time(&self) -> SpectrumCurve {
        SpectrumCurve {
            frequencies: self.frequencies.clone(),
            values: column_means(&self.values, self.frequencies.len()),
        }
    }
}

/// One static spectrum: a value per frequency bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumCurve {
    pub frequencies: Vec<f64>,
    pub values: Vec<Option<f64>>,
}

impl SpectrumCurve {
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// Provenance stamped on every pipeline result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub producer: String,
    pub version: String,
    pub instance_id: String,
    pub computed_at_utc: String,
}

impl Provenance {
    pub fn new() -> Self {
        Self {
            producer: crate::PRODUCER_NAME.to_string(),
            version: crate::HVSRKIT_VERSION.to_string(),
            instance_id: uuid::Uuid::new_v4().to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
        }
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a stored period axis: strictly monotonic (either direction)
/// and strictly positive. A zero period would be an infinite frequency.
pub(crate) fn validate_period_axis(periods: &[f64]) -> Result<(), HvsrError> {
    if let Some(p) = periods.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(HvsrError::InvalidPeriodAxis(format!(
            "period {} is not a positive finite value",
            p
        )));
    }

    let ascending = periods.windows(2).all(|w| w[0] < w[1]);
    let descending = periods.windows(2).all(|w| w[0] > w[1]);
    if !(ascending || descending) {
        return Err(HvsrError::InvalidPeriodAxis(
            "period axis must be strictly monotonic".to_string(),
        ));
    }

    Ok(())
}

/// Relative-tolerance equality for frequency/period axis values
pub(crate) fn axis_value_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn same_axis(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| axis_value_eq(*x, *y))
}

/// Column-wise means over `Option<f64>` rows, ignoring `None` cells
fn column_means(rows: &[Vec<Option<f64>>], width: usize) -> Vec<Option<f64>> {
    let mut sums = vec![0.0f64; width];
    let mut counts = vec![0usize; width];

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                sums[i] += v;
                counts[i] += 1;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, n)| if n > 0 { Some(sum / n as f64) } else { None })
        .collect()
}
