//! hvsrkit - Compute engine for ambient-noise HVSR from stored power spectral densities
//!
//! hvsrkit transforms per-channel PSD matrices of ambient seismic noise into
//! horizontal-to-vertical spectral ratios over time through a deterministic
//! pipeline: artifact loading/merging → temporal resampling → PSD-to-velocity
//! conversion → HVSR combination → summary reduction.
//!
//! ## Modules
//!
//! - **PSD pipeline**: Convert stored PSD matrices into velocity spectra and
//!   HVSR tables, with two summary reductions and a cross-station
//!   amplification variant
//! - **Spectral module**: The alternate imaginary-part HVSR method computed
//!   directly from autocorrelation waveforms

pub mod combiner;
pub mod converter;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod spectral;
pub mod types;

pub use combiner::{combine_hvsr, mean_of_ratios, ratio_of_means, station_ratio};
pub use converter::{psd_to_velocity, ConverterConfig, DEFAULT_CADENCE_MINUTES};
pub use error::HvsrError;
pub use loader::{day_range, load_merged, read_reference_curve, JsonDirStore, PsdStore};
pub use pipeline::{psd_to_hvsr, HvsrProcessor, HvsrResult};
pub use spectral::{imaginary_hvsr, imaginary_hvsr_series, AutocorrSet, SpectralConfig};
pub use types::{
    ChannelId, ComponentCode, Provenance, PsdMatrix, RatioTable, SpectrumCurve, StationId,
    VelocitySpectrum,
};

/// hvsrkit version embedded in result provenance
pub const HVSRKIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for result provenance
pub const PRODUCER_NAME: &str = "hvsrkit";
