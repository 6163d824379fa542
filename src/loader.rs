//! Artifact loading and merging
//!
//! The analysis notebooks' "read many small per-day artifacts" pattern is
//! abstracted as a single idempotent loader: a [`PsdStore`] hands out per-day
//! PSD fragments, and [`load_merged`] folds them into one combined matrix per
//! channel. Missing days are simply absent; unreadable or conflicting
//! fragments are logged and skipped so one bad day never fails a run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HvsrError;
use crate::types::{ChannelId, PsdMatrix};

/// Injected data-access handle for stored per-day PSD artifacts.
///
/// Implementations own the artifact format; the pipeline only sees parsed
/// matrices. `Ok(None)` means no artifact exists for that channel and day.
pub trait PsdStore {
    fn fragment(&self, channel: &ChannelId, day: NaiveDate)
        -> Result<Option<PsdMatrix>, HvsrError>;
}

/// Load and merge daily fragments for every requested channel.
///
/// Idempotent: fragments carrying already-loaded timestamps do not duplicate
/// rows, so calling this twice over overlapping day ranges yields the same
/// tables. Fragments that fail to load or to merge are skipped with a
/// warning.
pub fn load_merged(
    store: &dyn PsdStore,
    channels: &[ChannelId],
    days: &[NaiveDate],
) -> HashMap<ChannelId, PsdMatrix> {
    let mut merged: HashMap<ChannelId, PsdMatrix> = HashMap::new();

    for channel in channels {
        for day in days {
            let fragment = match store.fragment(channel, *day) {
                Ok(Some(fragment)) => fragment,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("skipping {} {}: {}", channel, day, e);
                    continue;
                }
            };

            match merged.get_mut(channel) {
                Some(matrix) => {
                    if let Err(e) = matrix.merge(fragment) {
                        log::warn!("skipping {} {}: {}", channel, day, e);
                    }
                }
                None => {
                    merged.insert(channel.clone(), fragment);
                }
            }
        }
    }

    merged
}

/// Inclusive day range helper for callers driving [`load_merged`]
pub fn day_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = from;
    while day <= to {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// Filesystem store of one JSON-encoded [`PsdMatrix`] per channel per day.
///
/// Artifacts are named `{network}.{station}.{location}.{component}.{date}.json`
/// under a single root directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, channel: &ChannelId, day: NaiveDate) -> PathBuf {
        self.root.join(format!(
            "{}.{}.{}.{}.{}.json",
            channel.station.network,
            channel.station.station,
            channel.station.location,
            channel.component,
            day.format("%Y-%m-%d")
        ))
    }
}

impl PsdStore for JsonDirStore {
    fn fragment(
        &self,
        channel: &ChannelId,
        day: NaiveDate,
    ) -> Result<Option<PsdMatrix>, HvsrError> {
        let path = self.artifact_path(channel, day);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)?;
        let matrix: PsdMatrix = serde_json::from_str(&raw)?;
        Ok(Some(matrix))
    }
}

/// Reference spectral-ratio curve produced by external HV-processing software.
///
/// Used for comparison against computed curves, never as a computation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCurve {
    pub frequencies: Vec<f64>,
    pub mean: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// Read a tab-delimited reference curve file.
///
/// Format: `#`-prefixed comment lines, then one row per frequency bin with
/// four columns (frequency, mean amplitude, minimum, maximum).
pub fn read_reference_curve(path: &Path) -> Result<ReferenceCurve, HvsrError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut curve = ReferenceCurve {
        frequencies: Vec::new(),
        mean: Vec::new(),
        min: Vec::new(),
        max: Vec::new(),
    };

    for record in reader.records() {
        let record = record?;
        if record.len() != 4 {
            return Err(HvsrError::ShapeMismatch(format!(
                "reference curve row has {} columns, expected 4",
                record.len()
            )));
        }

        let mut fields = [0.0f64; 4];
        for (slot, raw) in fields.iter_mut().zip(record.iter()) {
            *slot = raw.trim().parse::<f64>().map_err(|e| {
                HvsrError::ParseError(format!("bad reference curve value {:?}: {}", raw, e))
            })?;
        }

        curve.frequencies.push(fields[0]);
        curve.mean.push(fields[1]);
        curve.min.push(fields[2]);
        curve.max.push(fields[3]);
    }

    Ok(curve)
}
