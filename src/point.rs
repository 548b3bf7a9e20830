//! # Point Extraction & Nodal Correction
//!
//! Interpolates the gridded model to one site and folds in the nodal
//! corrections for the forecast date, producing the amplitude/phase list the
//! synthesizer consumes.
//!
//! For each constituent:
//! - `amplitude' = amplitude · pf`
//! - `phase' = mod(-phase - pu, 360)`
//!
//! The model phase is a lag while `pu` is an advance, hence the negation.
//! Off-grid constituents keep their NaN so the gap shows up downstream instead
//! of silently dropping out of the sum.

use crate::catalog::{GriddedHarmonics, Interpolation};
use crate::constituent::Constituent;
use crate::error::TideError;
use crate::nodal::{modified_julian_day, nodal_correction};
use chrono::NaiveDate;

/// Corrected harmonic constants for one constituent at one site.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstituentHarmonic {
    pub constituent: Constituent,
    /// Nodally corrected amplitude (length units, NaN off-grid)
    pub amplitude: f64,
    /// Corrected phase in degrees, [0, 360) (NaN off-grid)
    pub phase: f64,
}

/// Site-specific, date-corrected harmonic constants.
#[derive(Clone, Debug, PartialEq)]
pub struct PointHarmonics {
    pub lat: f64,
    pub lon: f64,
    /// Date the nodal corrections were evaluated for
    pub date: NaiveDate,
    pub constituents: Vec<ConstituentHarmonic>,
}

impl PointHarmonics {
    /// True when at least one constituent has a finite amplitude.
    pub fn is_covered(&self) -> bool {
        self.constituents.iter().any(|c| c.amplitude.is_finite())
    }

    /// Error out when every constituent is NaN at this coordinate.
    pub fn ensure_covered(&self) -> Result<(), TideError> {
        if self.is_covered() {
            Ok(())
        } else {
            Err(TideError::CoordinateOutOfCoverage {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// Extract corrected harmonic constants at `(lat, lon)` for `date`.
pub fn point_harmonics(
    catalog: &GriddedHarmonics,
    lat: f64,
    lon: f64,
    date: NaiveDate,
    method: Interpolation,
) -> Result<PointHarmonics, TideError> {
    let nodal = nodal_correction(modified_julian_day(date))?;

    let constituents = catalog
        .sample(lat, lon, method)
        .into_iter()
        .map(|(constituent, amplitude, phase)| {
            let factor = nodal.get(constituent);
            ConstituentHarmonic {
                constituent,
                amplitude: amplitude * factor.pf,
                phase: (-phase - factor.pu).rem_euclid(360.0),
            }
        })
        .collect();

    Ok(PointHarmonics {
        lat,
        lon,
        date,
        constituents,
    })
}
