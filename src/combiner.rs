//! HVSR combination and reductions
//!
//! Combines three single-component velocity amplitude spectra (Z, N, E) of one
//! station into a horizontal-to-vertical ratio table via
//! `HVSR(t,f) = (N + E) / (2 * Z)` — the simple-sum convention, deliberately
//! not the quadrature sum. Also provides the two summary reductions
//! (mean-of-ratios and ratio-of-means) and the cross-station amplification
//! variant.

use crate::error::HvsrError;
use crate::types::{axis_value_eq, ComponentCode, RatioTable, SpectrumCurve, VelocitySpectrum};

/// Combine Z, N and E spectra of one station into an HVSR time-frequency table.
///
/// Time and frequency axes are reconciled by intersection; cells where any
/// component is missing, or where Z is zero, come out as `None`. An empty
/// intersection yields an empty table, which callers treat as "no result".
pub fn combine_hvsr(
    z: &VelocitySpectrum,
    n: &VelocitySpectrum,
    e: &VelocitySpectrum,
) -> Result<RatioTable, HvsrError> {
    check_components(z, n, e)?;

    let join = inner_join(&[z, n, e]);

    let values: Vec<Vec<Option<f64>>> = join
        .rows
        .iter()
        .map(|&[tz, tn, te]| {
            join.cols
                .iter()
                .map(|&[fz, fn_, fe]| {
                    hvsr_cell(
                        n.amplitudes[tn][fn_],
                        e.amplitudes[te][fe],
                        z.amplitudes[tz][fz],
                    )
                })
                .collect()
        })
        .collect();

    Ok(RatioTable {
        station: z.channel.station.clone(),
        times: join.times,
        frequencies: join.frequencies,
        values,
    })
}

/// Summary curve a): average the per-window ratios over time.
pub fn mean_of_ratios(table: &RatioTable) -> SpectrumCurve {
    table.mean_over_time()
}

/// Summary curve b): average N, E and Z over time first, then apply the
/// ratio formula once to the mean spectra.
///
/// This is a genuinely different computation from [`mean_of_ratios`] and the
/// two curves differ whenever the inputs vary over time.
pub fn ratio_of_means(
    z: &VelocitySpectrum,
    n: &VelocitySpectrum,
    e: &VelocitySpectrum,
) -> Result<SpectrumCurve, HvsrError> {
    check_components(z, n, e)?;

    let join = inner_join(&[z, n, e]);

    let values: Vec<Option<f64>> = (0..join.cols.len())
        .map(|c| {
            let [fz, fn_, fe] = join.cols[c];
            let mean_component = |spectrum: &VelocitySpectrum, t_slot: usize, f_col: usize| {
                let mut sum = 0.0;
                let mut count = 0usize;
                for row in &join.rows {
                    if let Some(v) = spectrum.amplitudes[row[t_slot]][f_col] {
                        sum += v;
                        count += 1;
                    }
                }
                (count > 0).then(|| sum / count as f64)
            };

            let mean_z = mean_component(z, 0, fz);
            let mean_n = mean_component(n, 1, fn_);
            let mean_e = mean_component(e, 2, fe);
            hvsr_cell(mean_n, mean_e, mean_z)
        })
        .collect();

    Ok(SpectrumCurve {
        frequencies: join.frequencies,
        values,
    })
}

/// Cross-station amplification: ratio of two stations' velocity spectra for
/// the same component (e.g. top sensor over bottom sensor).
///
/// Missing-data propagation follows the HVSR rules: any missing input or a
/// zero denominator yields `None`. The output carries the numerator's station.
pub fn station_ratio(
    numerator: &VelocitySpectrum,
    denominator: &VelocitySpectrum,
) -> Result<RatioTable, HvsrError> {
    if numerator.channel.component != denominator.channel.component {
        return Err(HvsrError::ComponentMismatch(format!(
            "cannot ratio {} against {}",
            numerator.channel, denominator.channel
        )));
    }

    let join = inner_join(&[numerator, denominator]);

    let values: Vec<Vec<Option<f64>>> = join
        .rows
        .iter()
        .map(|&[ta, tb]| {
            join.cols
                .iter()
                .map(|&[fa, fb]| {
                    ratio_cell(numerator.amplitudes[ta][fa], denominator.amplitudes[tb][fb])
                })
                .collect()
        })
        .collect();

    Ok(RatioTable {
        station: numerator.channel.station.clone(),
        times: join.times,
        frequencies: join.frequencies,
        values,
    })
}

/// The HVSR cell formula: `(N + E) / (2 * Z)`.
fn hvsr_cell(n: Option<f64>, e: Option<f64>, z: Option<f64>) -> Option<f64> {
    match (n, e, z) {
        (Some(n), Some(e), Some(z)) if z != 0.0 => {
            let ratio = (n + e) / (2.0 * z);
            ratio.is_finite().then_some(ratio)
        }
        _ => None,
    }
}

fn ratio_cell(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(a), Some(b)) if b != 0.0 => {
            let ratio = a / b;
            ratio.is_finite().then_some(ratio)
        }
        _ => None,
    }
}

fn check_components(
    z: &VelocitySpectrum,
    n: &VelocitySpectrum,
    e: &VelocitySpectrum,
) -> Result<(), HvsrError> {
    for (spectrum, expected) in [
        (z, ComponentCode::Z),
        (n, ComponentCode::N),
        (e, ComponentCode::E),
    ] {
        if spectrum.channel.component != expected {
            return Err(HvsrError::ComponentMismatch(format!(
                "expected component {}, got {}",
                expected, spectrum.channel
            )));
        }
    }

    if z.channel.station != n.channel.station || z.channel.station != e.channel.station {
        return Err(HvsrError::StationMismatch(format!(
            "components from different stations: {} / {} / {}",
            z.channel.station, n.channel.station, e.channel.station
        )));
    }

    Ok(())
}

/// Result of an inner join of K spectra on time and frequency: the shared
/// axes plus, for each shared position, the source index in each input.
struct Join<const K: usize> {
    times: Vec<chrono::DateTime<chrono::Utc>>,
    frequencies: Vec<f64>,
    rows: Vec<[usize; K]>,
    cols: Vec<[usize; K]>,
}

fn inner_join<const K: usize>(spectra: &[&VelocitySpectrum; K]) -> Join<K> {
    let mut times = Vec::new();
    let mut rows = Vec::new();

    'outer_t: for (i0, t) in spectra[0].times.iter().enumerate() {
        let mut row = [0usize; K];
        row[0] = i0;
        for (slot, spectrum) in spectra.iter().enumerate().skip(1) {
            match spectrum.times.binary_search(t) {
                Ok(idx) => row[slot] = idx,
                Err(_) => continue 'outer_t,
            }
        }
        times.push(*t);
        rows.push(row);
    }

    let mut frequencies = Vec::new();
    let mut cols = Vec::new();

    'outer_f: for (i0, f) in spectra[0].frequencies.iter().enumerate() {
        let mut col = [0usize; K];
        col[0] = i0;
        for (slot, spectrum) in spectra.iter().enumerate().skip(1) {
            match spectrum
                .frequencies
                .iter()
                .position(|g| axis_value_eq(*f, *g))
            {
                Some(idx) => col[slot] = idx,
                None => continue 'outer_f,
            }
        }
        frequencies.push(*f);
        cols.push(col);
    }

    Join {
        times,
        frequencies,
        rows,
        cols,
    }
}
