//! # Coastal Tides Core Library
//!
//! Tidal prediction for the coastal site forecasts. A gridded harmonic tide
//! model (amplitude and phase per astronomical constituent, per grid cell) is
//! turned into a site-specific sea-level curve for the forecast window, and the
//! curve's turning points become the high and low tide times shown in each
//! site's hourly forecast table.
//!
//! ## Data Flow
//! 1. **Catalog**: load the harmonic model once per run ([`catalog`]; TPXO
//!    NetCDF files need the `netcdf` feature)
//! 2. **Nodal correction**: amplitude/phase modulation for the forecast date ([`nodal`])
//! 3. **Point extraction**: interpolate to the site and apply the corrections ([`point`])
//! 4. **Synthesis**: one-minute sea-level series by cosine superposition ([`synth`])
//! 5. **Events**: high/low tide detection, snapped to the hourly grid ([`events`])
//! 6. **Pipeline**: steps 3-5 for every site on a fixed-size worker pool ([`pipeline`])
//!
//! Everything after the catalog load is pure computation: the same inputs
//! always give bit-identical outputs, and the catalog is shared read-only
//! across workers.
//!
//! ## Core Types
//! - [`Sample`]: a single sea-level value at an instant
//! - [`TideSeries`]: evenly spaced, mean-removed sea-level series
//! - [`TideEvent`]: one detected high or low tide

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod config;
pub mod constituent;
pub mod error;
pub mod events;
pub mod nodal;
pub mod pipeline;
pub mod point;
pub mod synth;
#[cfg(feature = "netcdf")]
pub mod tpxo;

pub use catalog::{load_catalog, GriddedHarmonics, Interpolation};
pub use constituent::Constituent;
pub use error::TideError;

/// A single sea-level value at a specific instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Instant in the series' native (UTC) time basis
    pub time: DateTime<Utc>,
    /// Height relative to the series mean, in model length units
    pub height: f64,
}

/// Evenly spaced sea-level series relative to the local mean.
///
/// Timestamps are implicit: sample `i` sits at `start + i * step`, so they are
/// strictly increasing and evenly spaced by construction.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use coastal_tides::TideSeries;
///
/// let series = TideSeries {
///     start: Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap(),
///     step: Duration::minutes(1),
///     heights: vec![-0.1, 0.0, 0.1],
/// };
///
/// assert_eq!(series.len(), 3);
/// assert_eq!(series.end(), Utc.with_ymd_and_hms(2024, 6, 16, 0, 2, 0).unwrap());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TideSeries {
    /// Timestamp of the first sample (UTC)
    pub start: DateTime<Utc>,
    /// Spacing between consecutive samples
    pub step: Duration,
    /// Heights about the series mean
    pub heights: Vec<f64>,
}

impl TideSeries {
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Timestamp of sample `index`.
    pub fn timestamp(&self, index: usize) -> DateTime<Utc> {
        self.start + self.step * index as i32
    }

    /// Timestamp of the last sample, or `start` for an empty series.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp(self.len().saturating_sub(1))
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.heights.iter().enumerate().map(|(i, &height)| Sample {
            time: self.timestamp(i),
            height,
        })
    }

    /// True when at least one sample is finite.
    pub fn has_data(&self) -> bool {
        self.heights.iter().any(|h| h.is_finite())
    }

    /// Linearly interpolated height at `when`.
    ///
    /// Returns `None` outside the series span. NaN samples propagate.
    pub fn sample_at(&self, when: DateTime<Utc>) -> Option<f64> {
        if self.is_empty() || when < self.start || when > self.end() {
            return None;
        }
        let step_ms = self.step.num_milliseconds();
        if step_ms <= 0 {
            return None;
        }

        let offset_ms = (when - self.start).num_milliseconds();
        let index = (offset_ms / step_ms) as usize;
        let remainder = offset_ms % step_ms;
        if remainder == 0 || index + 1 >= self.len() {
            return Some(self.heights[index]);
        }

        let alpha = remainder as f64 / step_ms as f64;
        let h0 = self.heights[index];
        let h1 = self.heights[index + 1];
        Some(h0 + alpha * (h1 - h0))
    }
}

/// Kind of tidal turning point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

/// One detected high or low tide.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideEvent {
    /// Local wall-clock time of the turning point
    pub time: NaiveDateTime,
    /// Height about the series mean
    pub height: f64,
    pub kind: TideKind,
}
