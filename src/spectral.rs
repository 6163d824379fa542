//! Imaginary-part HVSR from autocorrelation waveforms
//!
//! Alternate HVSR method operating on single-station autocorrelations (ZZ, EE,
//! NN) instead of stored PSDs: each waveform is zero-padded and transformed
//! with a real FFT, only the imaginary part of the non-negative-frequency half
//! is kept, and bins combine as `HVSR(f) = sqrt((imag(EE) + imag(NN)) / imag(ZZ))`.
//! The ratio and the root can both be undefined; those bins stay `None`.
//!
//! This is a deliberately different method from the PSD-based combiner and
//! shares no code path with it.

use chrono::{DateTime, Utc};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

use crate::error::HvsrError;
use crate::types::{RatioTable, SpectrumCurve, StationId};

/// Default FFT length for autocorrelation spectra
pub const DEFAULT_FFT_LEN: usize = 16384;

/// Configuration for the imaginary-part HVSR method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Transform length; waveforms shorter than this are zero-padded
    pub fft_len: usize,
    /// Sampling rate of the autocorrelation waveforms, in Hz
    pub sampling_rate: f64,
}

impl SpectralConfig {
    pub fn new(fft_len: usize, sampling_rate: f64) -> Self {
        Self {
            fft_len,
            sampling_rate,
        }
    }

    /// Fail fast before any computation runs
    pub fn validate(&self) -> Result<(), HvsrError> {
        if self.fft_len == 0 || self.fft_len % 2 != 0 {
            return Err(HvsrError::InvalidConfig(format!(
                "fft_len must be a positive even number, got {}",
                self.fft_len
            )));
        }
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(HvsrError::InvalidConfig(format!(
                "sampling rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}

/// One time bucket of autocorrelation stacks for a station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocorrSet {
    pub time: DateTime<Utc>,
    pub zz: Vec<f64>,
    pub ee: Vec<f64>,
    pub nn: Vec<f64>,
}

/// Frequency axis of the non-negative-frequency half of the transform
pub fn frequency_axis(config: &SpectralConfig) -> Vec<f64> {
    let n = config.fft_len;
    (0..=n / 2)
        .map(|i| i as f64 * config.sampling_rate / n as f64)
        .collect()
}

/// Compute an imaginary-part HVSR curve from one set of autocorrelations.
///
/// The three waveforms must be time-aligned and equally long, and no longer
/// than the transform length. Bins where `imag(ZZ)` is zero, or where the
/// ratio under the root is negative or non-finite, come out as `None` rather
/// than raising or producing a complex value.
pub fn imaginary_hvsr(
    zz: &[f64],
    ee: &[f64],
    nn: &[f64],
    config: &SpectralConfig,
) -> Result<SpectrumCurve, HvsrError> {
    config.validate()?;

    if zz.len() != ee.len() || zz.len() != nn.len() {
        return Err(HvsrError::InvalidWaveform(format!(
            "component lengths differ: zz={}, ee={}, nn={}",
            zz.len(),
            ee.len(),
            nn.len()
        )));
    }

    let imag_zz = imaginary_spectrum(zz, config)?;
    let imag_ee = imaginary_spectrum(ee, config)?;
    let imag_nn = imaginary_spectrum(nn, config)?;

    let values = imag_zz
        .iter()
        .zip(imag_ee.iter().zip(&imag_nn))
        .map(|(&iz, (&ie, &inn))| {
            if iz == 0.0 {
                return None;
            }
            let ratio = (ie + inn) / iz;
            if !ratio.is_finite() || ratio < 0.0 {
                return None;
            }
            Some(ratio.sqrt())
        })
        .collect();

    Ok(SpectrumCurve {
        frequencies: frequency_axis(config),
        values,
    })
}

/// Repeat [`imaginary_hvsr`] per time bucket, assembling a time-frequency
/// table. Buckets that fail (bad lengths, FFT failure) are logged and
/// skipped; the remaining buckets still produce output.
pub fn imaginary_hvsr_series(
    station: &StationId,
    buckets: &[AutocorrSet],
    config: &SpectralConfig,
) -> Result<RatioTable, HvsrError> {
    config.validate()?;

    let mut entries: Vec<(DateTime<Utc>, Vec<Option<f64>>)> = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        match imaginary_hvsr(&bucket.zz, &bucket.ee, &bucket.nn, config) {
            Ok(curve) => entries.push((bucket.time, curve.values)),
            Err(e) => {
                log::warn!("skipping bucket {} for {}: {}", bucket.time, station, e);
            }
        }
    }

    entries.sort_by_key(|(time, _)| *time);

    let (times, values): (Vec<_>, Vec<_>) = entries.into_iter().unzip();

    Ok(RatioTable {
        station: station.clone(),
        times,
        frequencies: frequency_axis(config),
        values,
    })
}

/// Imaginary part of the first half of the waveform's discrete spectrum,
/// after zero-padding to the transform length.
fn imaginary_spectrum(waveform: &[f64], config: &SpectralConfig) -> Result<Vec<f64>, HvsrError> {
    if waveform.len() > config.fft_len {
        return Err(HvsrError::InvalidWaveform(format!(
            "waveform of {} samples exceeds transform length {}",
            waveform.len(),
            config.fft_len
        )));
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(config.fft_len);

    let mut input = fft.make_input_vec();
    input[..waveform.len()].copy_from_slice(waveform);

    let mut spectrum = fft.make_output_vec();
    fft.process(&mut input, &mut spectrum)
        .map_err(|e| HvsrError::FftError(e.to_string()))?;

    Ok(spectrum.iter().map(|bin| bin.im).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::f64::consts::PI;

    fn config(n: usize) -> SpectralConfig {
        SpectralConfig::new(n, 100.0)
    }

    fn sine(n: usize, cycles: usize) -> Vec<f64> {
        (0..n)
            .map(|t| (2.0 * PI * cycles as f64 * t as f64 / n as f64).sin())
            .collect()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_frequency_axis_shape() {
        let cfg = config(64);
        let freqs = frequency_axis(&cfg);
        assert_eq!(freqs.len(), 33);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1] - 100.0 / 64.0).abs() < 1e-12);
        assert!((freqs[32] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_components_give_sqrt_two() {
        // With zz == ee == nn the ratio is exactly 2 wherever imag(ZZ) != 0
        let wave = sine(64, 4);
        let curve = imaginary_hvsr(&wave, &wave, &wave, &config(64)).unwrap();

        assert_eq!(curve.values.len(), 33);
        let defined: Vec<f64> = curve.values.iter().flatten().copied().collect();
        assert!(!defined.is_empty());
        for v in defined {
            assert!((v - 2f64.sqrt()).abs() < 1e-12);
        }
        // A pure sine at bin 4 certainly has a non-zero imaginary part there
        assert!(curve.values[4].is_some());
    }

    #[test]
    fn test_negative_ratio_is_undefined_not_complex() {
        // Flipping the horizontals makes the ratio exactly -2 at every
        // defined bin; all cells must come out None.
        let zz = sine(64, 4);
        let flipped: Vec<f64> = zz.iter().map(|v| -v).collect();
        let curve = imaginary_hvsr(&zz, &flipped, &flipped, &config(64)).unwrap();

        assert!(curve.values.iter().all(Option::is_none));
    }

    #[test]
    fn test_zero_vertical_spectrum_is_undefined() {
        let zeros = vec![0.0; 64];
        let wave = sine(64, 4);
        let curve = imaginary_hvsr(&zeros, &wave, &wave, &config(64)).unwrap();
        assert!(curve.values.iter().all(Option::is_none));
    }

    #[test]
    fn test_zero_padding_shorter_waveform() {
        let wave = sine(40, 4);
        let curve = imaginary_hvsr(&wave, &wave, &wave, &config(64)).unwrap();
        assert_eq!(curve.values.len(), 33);
    }

    #[test]
    fn test_waveform_longer_than_transform_rejected() {
        let wave = sine(128, 4);
        let result = imaginary_hvsr(&wave, &wave, &wave, &config(64));
        assert!(matches!(result, Err(HvsrError::InvalidWaveform(_))));
    }

    #[test]
    fn test_component_length_mismatch_rejected() {
        let zz = sine(64, 4);
        let short = sine(32, 4);
        let result = imaginary_hvsr(&zz, &short, &zz, &config(64));
        assert!(matches!(result, Err(HvsrError::InvalidWaveform(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let wave = sine(64, 4);
        assert!(matches!(
            imaginary_hvsr(&wave, &wave, &wave, &SpectralConfig::new(0, 100.0)),
            Err(HvsrError::InvalidConfig(_))
        ));
        assert!(matches!(
            imaginary_hvsr(&wave, &wave, &wave, &SpectralConfig::new(63, 100.0)),
            Err(HvsrError::InvalidConfig(_))
        ));
        assert!(matches!(
            imaginary_hvsr(&wave, &wave, &wave, &SpectralConfig::new(64, 0.0)),
            Err(HvsrError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_series_skips_bad_buckets() {
        let station = StationId::new("BE", "UCCS", "00");
        let good = sine(64, 4);
        let buckets = vec![
            AutocorrSet {
                time: day(2),
                zz: good.clone(),
                ee: good.clone(),
                nn: good.clone(),
            },
            AutocorrSet {
                // Mismatched lengths: skipped, not fatal
                time: day(1),
                zz: good.clone(),
                ee: sine(32, 4),
                nn: good.clone(),
            },
            AutocorrSet {
                time: day(3),
                zz: good.clone(),
                ee: good.clone(),
                nn: good.clone(),
            },
        ];

        let table = imaginary_hvsr_series(&station, &buckets, &config(64)).unwrap();
        assert_eq!(table.times, vec![day(2), day(3)]);
        assert_eq!(table.values.len(), 2);
        assert_eq!(table.frequencies.len(), 33);
    }
}
