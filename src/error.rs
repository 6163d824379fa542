//! Error types for hvsrkit

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum HvsrError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid period axis: {0}")]
    InvalidPeriodAxis(String),

    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Station mismatch: {0}")]
    StationMismatch(String),

    #[error("Component mismatch: {0}")]
    ComponentMismatch(String),

    #[error("Missing component: {0}")]
    MissingComponent(String),

    #[error("Invalid waveform: {0}")]
    InvalidWaveform(String),

    #[error("FFT failure: {0}")]
    FftError(String),

    #[error("Failed to parse component code: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid reference curve: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
