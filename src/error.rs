//! # Tide Subsystem Errors
//!
//! Every failure in the tide chain is local to one catalog load or one site.
//! The orchestrator logs the error and carries on with the next site, so none
//! of these variants is fatal to a forecast run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the tide model or predicting tides.
#[derive(Error, Debug)]
pub enum TideError {
    /// Tide model file is missing or unreadable. Site forecasts proceed
    /// without tide columns.
    #[error("tide model unavailable at {}: {reason}", path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    /// Tide model file was read but its contents are inconsistent.
    #[error("malformed tide model: {0}")]
    MalformedDataset(String),

    /// Requested number of constituents is outside 1..=10.
    #[error("constituent count {0} outside 1..=10")]
    InvalidConstituentCount(usize),

    /// Every constituent interpolated to NaN at the requested coordinate.
    #[error("coordinate ({lat:.3}, {lon:.3}) outside tide model coverage")]
    CoordinateOutOfCoverage { lat: f64, lon: f64 },

    /// Non-finite nodal factors or an invalid synthesis window.
    #[error("tide computation failed: {0}")]
    Computation(String),

    /// NetCDF library error while reading a TPXO model.
    #[cfg(feature = "netcdf")]
    #[error("netcdf: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// Site worker pool could not be started.
    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
