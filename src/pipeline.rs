//! Pipeline orchestration
//!
//! Public API tying the stages together: load merged PSD matrices, convert
//! each component to a velocity spectrum, combine into an HVSR table, and
//! reduce to the two summary curves. The processor is stateless between
//! invocations; every run recomputes from the stored matrices.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::combiner::{combine_hvsr, mean_of_ratios, ratio_of_means, station_ratio};
use crate::converter::{psd_to_velocity, ConverterConfig};
use crate::error::HvsrError;
use crate::loader::{load_merged, PsdStore};
use crate::types::{
    ChannelId, ComponentCode, Provenance, PsdMatrix, RatioTable, SpectrumCurve, StationId,
    VelocitySpectrum,
};

/// Complete HVSR output for one station: the full time-frequency table plus
/// both summary reductions, stamped with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvsrResult {
    pub station: StationId,
    pub provenance: Provenance,
    pub table: RatioTable,
    /// Per-frequency time average of the per-window ratios
    pub mean_of_ratios: SpectrumCurve,
    /// Ratio formula applied once to the time-averaged component spectra
    pub ratio_of_means: SpectrumCurve,
}

/// Compute HVSR for one station directly from a store.
///
/// Convenience wrapper over [`HvsrProcessor`]: loads and merges the three
/// component matrices for the given days, then runs the full pipeline.
pub fn psd_to_hvsr(
    store: &dyn PsdStore,
    station: &StationId,
    days: &[NaiveDate],
    config: &ConverterConfig,
) -> Result<HvsrResult, HvsrError> {
    config.validate()?;

    let channels: Vec<ChannelId> = [ComponentCode::Z, ComponentCode::N, ComponentCode::E]
        .into_iter()
        .map(|component| ChannelId::new(station.clone(), component))
        .collect();

    let merged = load_merged(store, &channels, days);

    let processor = HvsrProcessor::with_config(config.clone());
    processor.station_hvsr(&merged, station)
}

/// Stateless processor holding the conversion configuration
pub struct HvsrProcessor {
    config: ConverterConfig,
}

impl Default for HvsrProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HvsrProcessor {
    /// Create a processor with the default 30-minute cadence
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
        }
    }

    /// Create a processor with a specific resampling cadence in minutes
    pub fn with_cadence(cadence_minutes: i64) -> Self {
        Self {
            config: ConverterConfig::new(cadence_minutes),
        }
    }

    pub fn with_config(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Convert one channel's PSD matrix to a velocity amplitude spectrum
    pub fn velocity_spectrum(&self, psd: &PsdMatrix) -> Result<VelocitySpectrum, HvsrError> {
        psd_to_velocity(psd, &self.config)
    }

    /// Run the full HVSR pipeline for one station from merged PSD matrices.
    ///
    /// All three components must be present in the map; a missing component
    /// is an error naming the absent channel.
    pub fn station_hvsr(
        &self,
        merged: &HashMap<ChannelId, PsdMatrix>,
        station: &StationId,
    ) -> Result<HvsrResult, HvsrError> {
        let component = |code: ComponentCode| -> Result<&PsdMatrix, HvsrError> {
            let channel = ChannelId::new(station.clone(), code);
            merged
                .get(&channel)
                .ok_or_else(|| HvsrError::MissingComponent(channel.to_string()))
        };

        let z = self.velocity_spectrum(component(ComponentCode::Z)?)?;
        let n = self.velocity_spectrum(component(ComponentCode::N)?)?;
        let e = self.velocity_spectrum(component(ComponentCode::E)?)?;

        let table = combine_hvsr(&z, &n, &e)?;
        let per_window = mean_of_ratios(&table);
        let from_means = ratio_of_means(&z, &n, &e)?;

        Ok(HvsrResult {
            station: station.clone(),
            provenance: Provenance::new(),
            table,
            mean_of_ratios: per_window,
            ratio_of_means: from_means,
        })
    }

    /// Cross-station amplification: top sensor's spectrum over the bottom
    /// sensor's, for the same component.
    pub fn station_amplification(
        &self,
        top: &PsdMatrix,
        bottom: &PsdMatrix,
    ) -> Result<RatioTable, HvsrError> {
        let top_spectrum = self.velocity_spectrum(top)?;
        let bottom_spectrum = self.velocity_spectrum(bottom)?;
        station_ratio(&top_spectrum, &bottom_spectrum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn station() -> StationId {
        StationId::new("BE", "UCCS", "00")
    }

    fn ts(day: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, minute, 0).unwrap()
    }

    fn matrix(component: ComponentCode, day: u32, db: f64) -> PsdMatrix {
        PsdMatrix::new(
            ChannelId::new(station(), component),
            vec![ts(day, 0), ts(day, 10)],
            vec![0.5, 1.0],
            vec![vec![Some(db), Some(db)], vec![Some(db), Some(db)]],
        )
        .unwrap()
    }

    /// In-memory store for end-to-end tests
    struct MemoryStore {
        fragments: HashMap<(ChannelId, NaiveDate), PsdMatrix>,
    }

    impl PsdStore for MemoryStore {
        fn fragment(
            &self,
            channel: &ChannelId,
            day: NaiveDate,
        ) -> Result<Option<PsdMatrix>, HvsrError> {
            Ok(self.fragments.get(&(channel.clone(), day)).cloned())
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn store_with_station(db_z: f64, db_n: f64, db_e: f64) -> MemoryStore {
        let mut fragments = HashMap::new();
        for (component, db) in [
            (ComponentCode::Z, db_z),
            (ComponentCode::N, db_n),
            (ComponentCode::E, db_e),
        ] {
            let m = matrix(component, 1, db);
            fragments.insert((m.channel.clone(), date(1)), m);
        }
        MemoryStore { fragments }
    }

    #[test]
    fn test_end_to_end_equal_components_give_unit_ratio() {
        // Identical PSDs on all three components: every velocity amplitude
        // matches, so (N + E) / (2 * Z) = 1 at every defined cell.
        let store = store_with_station(-120.0, -120.0, -120.0);
        let result = psd_to_hvsr(
            &store,
            &station(),
            &[date(1)],
            &ConverterConfig::default(),
        )
        .unwrap();

        assert_eq!(result.table.frequencies, vec![1.0, 2.0]);
        for row in &result.table.values {
            for cell in row {
                assert!((cell.unwrap() - 1.0).abs() < 1e-12);
            }
        }
        for curve in [&result.mean_of_ratios, &result.ratio_of_means] {
            for value in curve.values.iter().flatten() {
                assert!((value - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_end_to_end_ratio_matches_formula() {
        // Horizontals 20 dB above the vertical: each horizontal amplitude is
        // 10x the vertical one, so the ratio is (10 + 10) / 2 = 10.
        let store = store_with_station(-140.0, -120.0, -120.0);
        let result = psd_to_hvsr(
            &store,
            &station(),
            &[date(1)],
            &ConverterConfig::default(),
        )
        .unwrap();

        for row in &result.table.values {
            for cell in row {
                assert!((cell.unwrap() - 10.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_missing_component_is_an_error() {
        let mut store = store_with_station(-120.0, -120.0, -120.0);
        store
            .fragments
            .remove(&(ChannelId::new(station(), ComponentCode::E), date(1)));

        let result = psd_to_hvsr(
            &store,
            &station(),
            &[date(1)],
            &ConverterConfig::default(),
        );
        match result {
            Err(HvsrError::MissingComponent(name)) => assert!(name.ends_with(".E")),
            other => panic!("expected MissingComponent, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_provenance_is_stamped() {
        let store = store_with_station(-120.0, -120.0, -120.0);
        let result = psd_to_hvsr(
            &store,
            &station(),
            &[date(1)],
            &ConverterConfig::default(),
        )
        .unwrap();

        assert_eq!(result.provenance.producer, crate::PRODUCER_NAME);
        assert_eq!(result.provenance.version, crate::HVSRKIT_VERSION);
        assert!(!result.provenance.instance_id.is_empty());
    }

    #[test]
    fn test_result_serializes() {
        let store = store_with_station(-120.0, -120.0, -120.0);
        let result = psd_to_hvsr(
            &store,
            &station(),
            &[date(1)],
            &ConverterConfig::default(),
        )
        .unwrap();

        let json = serde_json::to_string(&result).unwrap();
        let parsed: HvsrResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.station, result.station);
        assert_eq!(parsed.table.frequencies, result.table.frequencies);
    }

    #[test]
    fn test_station_amplification_end_to_end() {
        // Top sensor 20 dB louder than the bottom one: amplitude factor 10
        let top = matrix(ComponentCode::Z, 1, -100.0);
        let mut bottom = matrix(ComponentCode::Z, 1, -120.0);
        bottom.channel.station = StationId::new("BE", "DEEP", "00");

        let processor = HvsrProcessor::new();
        let table = processor.station_amplification(&top, &bottom).unwrap();

        assert!(!table.is_empty());
        for row in &table.values {
            for cell in row {
                assert!((cell.unwrap() - 10.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_invalid_cadence_fails_before_loading() {
        let store = store_with_station(-120.0, -120.0, -120.0);
        let result = psd_to_hvsr(&store, &station(), &[date(1)], &ConverterConfig::new(-5));
        assert!(matches!(result, Err(HvsrError::InvalidConfig(_))));
    }
}
