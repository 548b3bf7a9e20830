//! # Nodal Corrections
//!
//! The Moon's orbital plane precesses with an 18.61-year period, which slowly
//! modulates the amplitude and phase of every lunar constituent. This module
//! evaluates those modulations for a single epoch, following the closed-form
//! tables of Cartwright as used by the Egbert–Erofeeva tide model software.
//!
//! ## Algorithm
//! 1. Days since J2000: `timetemp = mjd - 51544.4993`
//! 2. Mean longitude of lunar perigee: `P = 83.3535 + 0.11140353 · timetemp`
//! 3. Mean longitude of the ascending lunar node: `N = 125.0445 - 0.05295377 · timetemp`
//! 4. Per-constituent factor `pf` and phase offset `pu` from trig terms in `N`
//!
//! Solar constituents (S2, P1) and Mm carry no nodal modulation and always
//! return `pf = 1`, `pu = 0`.
//!
//! ## Validity
//! The coefficients were fitted for 1990–2010 and remain within a fraction of
//! a percent for several decades either side.

use crate::constituent::{Constituent, CONSTITUENT_COUNT};
use crate::error::TideError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Offset between chrono's proleptic day count (0001-01-01 = 1) and MJD.
const MJD_FROM_CE_OFFSET: i64 = 678_576;

/// J2000.0 expressed as a modified Julian day (TT-UT adjusted).
const J2000_MJD: f64 = 51_544.4993;

/// Amplitude factor and phase offset for one constituent at one epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodalFactor {
    /// Amplitude scale factor (dimensionless, close to 1)
    pub pf: f64,
    /// Phase correction in degrees
    pub pu: f64,
}

impl NodalFactor {
    /// No modulation.
    pub const UNIT: NodalFactor = NodalFactor { pf: 1.0, pu: 0.0 };
}

/// Nodal factors for all ten constituents at one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct NodalCorrection {
    /// Epoch the factors were evaluated for
    pub mjd: f64,
    /// Mean longitude of lunar perigee, degrees in [0, 360)
    pub perigee_deg: f64,
    /// Mean longitude of the ascending lunar node, degrees in [0, 360)
    pub node_deg: f64,
    factors: [NodalFactor; CONSTITUENT_COUNT],
}

impl NodalCorrection {
    pub fn get(&self, constituent: Constituent) -> NodalFactor {
        self.factors[constituent.index()]
    }

    /// Factors in canonical constituent order.
    pub fn iter(&self) -> impl Iterator<Item = (Constituent, NodalFactor)> + '_ {
        Constituent::ALL.iter().copied().zip(self.factors.iter().copied())
    }

    /// Astronomical arguments (radians) at the model epoch, as added by the
    /// synthesizer.
    pub fn phase_mkb(&self) -> [(Constituent, f64); CONSTITUENT_COUNT] {
        Constituent::ALL.map(|c| (c, c.phase_mkb()))
    }
}

/// Modified Julian day at 00:00 of `date`.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use coastal_tides::nodal::modified_julian_day;
///
/// let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// assert_eq!(modified_julian_day(date), 58849.0);
/// ```
pub fn modified_julian_day(date: NaiveDate) -> f64 {
    (i64::from(date.num_days_from_ce()) - MJD_FROM_CE_OFFSET) as f64
}

/// Modified Julian day including the fraction of the day elapsed.
pub fn modified_julian_date_time(when: NaiveDateTime) -> f64 {
    let seconds = when.num_seconds_from_midnight() as f64 + when.nanosecond() as f64 * 1e-9;
    modified_julian_day(when.date()) + seconds / 86_400.0
}

/// Evaluate nodal factors for every constituent at `mjd`.
///
/// Fails with [`TideError::Computation`] if `mjd` is not finite or any factor
/// comes out non-finite.
pub fn nodal_correction(mjd: f64) -> Result<NodalCorrection, TideError> {
    if !mjd.is_finite() {
        return Err(TideError::Computation(format!(
            "modified julian day {mjd} is not finite"
        )));
    }

    let timetemp = mjd - J2000_MJD;
    let perigee_deg = (83.3535 + 0.111_403_53 * timetemp).rem_euclid(360.0);
    let node_deg = (125.0445 - 0.052_953_77 * timetemp).rem_euclid(360.0);
    let n = node_deg.to_radians();

    let (sinn, cosn) = n.sin_cos();
    let (sin2n, cos2n) = (2.0 * n).sin_cos();
    let sin3n = (3.0 * n).sin();

    // Semi-diurnal lunar (M2, N2)
    let m2_re = 1.0 - 0.037_31 * cosn + 0.000_52 * cos2n;
    let m2_im = 0.037_31 * sinn - 0.000_52 * sin2n;
    let m2 = NodalFactor {
        pf: m2_re.hypot(m2_im),
        pu: (-m2_im / m2_re).atan().to_degrees(),
    };

    let k2_re = 1.0 + 0.2852 * cosn + 0.0324 * cos2n;
    let k2_im = 0.3108 * sinn + 0.0324 * sin2n;
    let k2 = NodalFactor {
        pf: k2_re.hypot(k2_im),
        pu: (-k2_im / k2_re).atan().to_degrees(),
    };

    let k1_re = 1.0 + 0.1158 * cosn - 0.0029 * cos2n;
    let k1_im = 0.1554 * sinn - 0.0029 * sin2n;
    let k1 = NodalFactor {
        pf: k1_re.hypot(k1_im),
        pu: (-k1_im / k1_re).atan().to_degrees(),
    };

    // Diurnal lunar (O1, Q1); phase table is already in degrees
    let o1 = NodalFactor {
        pf: (1.0 + 0.189 * cosn - 0.0058 * cos2n).hypot(0.189 * sinn - 0.0058 * sin2n),
        pu: 10.8 * sinn - 1.3 * sin2n + 0.2 * sin3n,
    };

    let mf = NodalFactor {
        pf: 1.043 + 0.414 * cosn,
        pu: -23.7 * sinn + 2.7 * sin2n - 0.4 * sin3n,
    };

    let factors = Constituent::ALL.map(|c| match c {
        Constituent::M2 | Constituent::N2 => m2,
        Constituent::K2 => k2,
        Constituent::K1 => k1,
        Constituent::O1 | Constituent::Q1 => o1,
        Constituent::Mf => mf,
        Constituent::S2 | Constituent::P1 | Constituent::Mm => NodalFactor::UNIT,
    });

    if let Some((c, f)) = Constituent::ALL
        .iter()
        .zip(factors.iter())
        .find(|(_, f)| !(f.pf.is_finite() && f.pu.is_finite()))
    {
        return Err(TideError::Computation(format!(
            "non-finite nodal factor for {c} at mjd {mjd}: pf={} pu={}",
            f.pf, f.pu
        )));
    }

    Ok(NodalCorrection {
        mjd,
        perigee_deg,
        node_deg,
        factors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_mjd_reference_dates() {
        assert_eq!(modified_julian_day(date(1858, 11, 17)), 0.0);
        assert_eq!(modified_julian_day(date(2000, 1, 1)), 51544.0);
        assert_eq!(modified_julian_day(date(2020, 1, 1)), 58849.0);
    }

    #[test]
    fn test_mjd_fractional_day() {
        let noon = date(2000, 1, 1).and_hms_opt(12, 0, 0).unwrap();
        assert_abs_diff_eq!(modified_julian_date_time(noon), 51544.5, epsilon = 1e-12);
    }

    #[test]
    fn test_factors_within_physical_bounds() {
        // One sample every ~3 days across a full nodal cycle and then some.
        let mut mjd = 40_000.0;
        while mjd < 70_000.0 {
            let nodal = nodal_correction(mjd).unwrap();
            for (c, f) in nodal.iter() {
                assert!((0.5..=1.5).contains(&f.pf), "{c} pf {} at {mjd}", f.pf);
                assert!((-30.0..=30.0).contains(&f.pu), "{c} pu {} at {mjd}", f.pu);
            }
            mjd += 3.1;
        }
    }

    #[test]
    fn test_unmodulated_constituents_are_exact() {
        for mjd in [0.0, 45_000.5, 51_544.0, 58_849.0, 61_234.75] {
            let nodal = nodal_correction(mjd).unwrap();
            for c in [Constituent::S2, Constituent::P1, Constituent::Mm] {
                assert_eq!(nodal.get(c), NodalFactor { pf: 1.0, pu: 0.0 });
            }
        }
    }

    #[test]
    fn test_m2_factor_near_unity() {
        for d in [date(2000, 1, 1), date(2020, 1, 1)] {
            let nodal = nodal_correction(modified_julian_day(d)).unwrap();
            let pf = nodal.get(Constituent::M2).pf;
            assert!((0.97..=1.03).contains(&pf), "M2 pf {pf} on {d}");
        }
    }

    #[test]
    fn test_shared_factor_pairs() {
        let nodal = nodal_correction(55_000.0).unwrap();
        assert_eq!(nodal.get(Constituent::M2), nodal.get(Constituent::N2));
        assert_eq!(nodal.get(Constituent::O1), nodal.get(Constituent::Q1));
    }

    #[test]
    fn test_node_longitude_in_range() {
        let nodal = nodal_correction(10.0).unwrap();
        assert!((0.0..360.0).contains(&nodal.node_deg));
        assert!((0.0..360.0).contains(&nodal.perigee_deg));
    }

    #[test]
    fn test_non_finite_epoch_is_rejected() {
        assert!(matches!(
            nodal_correction(f64::NAN),
            Err(TideError::Computation(_))
        ));
        assert!(nodal_correction(f64::INFINITY).is_err());
    }

    #[test]
    fn test_phase_table_in_canonical_order() {
        let nodal = nodal_correction(51_544.0).unwrap();
        let table = nodal.phase_mkb();
        assert_eq!(table[0].0, Constituent::M2);
        assert_abs_diff_eq!(table[0].1, 1.731_557_546, epsilon = 1e-12);
        assert_eq!(table[1].1, 0.0);
    }
}
