//! # Tidal Constituents
//!
//! The ten astronomical constituents carried by the harmonic tide model, in the
//! fixed order used by the model files, the nodal correction table and the
//! synthesizer's speed table.
//!
//! A single enum indexes all three tables, so a gridded field, its nodal factor
//! and its angular speed can never drift out of step with each other.
//!
//! | Index | Name | Speed (°/h)  | Period (h) | Family        |
//! |-------|------|--------------|------------|---------------|
//! | 0     | M2   | 28.9841042   | 12.42      | semi-diurnal  |
//! | 1     | S2   | 30.0000000   | 12.00      | semi-diurnal  |
//! | 2     | N2   | 28.4397295   | 12.66      | semi-diurnal  |
//! | 3     | K2   | 30.0821373   | 11.97      | semi-diurnal  |
//! | 4     | K1   | 15.0410686   | 23.93      | diurnal       |
//! | 5     | O1   | 13.9430356   | 25.82      | diurnal       |
//! | 6     | P1   | 14.9589314   | 24.07      | diurnal       |
//! | 7     | Q1   | 13.3986609   | 26.87      | diurnal       |
//! | 8     | Mf   | 1.0980331    | 327.86     | long period   |
//! | 9     | Mm   | 0.5443747    | 661.31     | long period   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of constituents in the canonical set.
pub const CONSTITUENT_COUNT: usize = 10;

/// Reference epoch of the astronomical arguments, 1992-01-01 00:00 UTC
/// (MJD 48622), as Unix seconds.
pub const MODEL_EPOCH_UNIX_SECONDS: i64 = 694_224_000;

/// A named astronomical tidal component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Constituent {
    /// Principal lunar semi-diurnal
    M2,
    /// Principal solar semi-diurnal
    S2,
    /// Larger lunar elliptic semi-diurnal
    N2,
    /// Lunisolar semi-diurnal
    K2,
    /// Lunisolar diurnal
    K1,
    /// Principal lunar diurnal
    O1,
    /// Principal solar diurnal
    P1,
    /// Larger lunar elliptic diurnal
    Q1,
    /// Lunar fortnightly
    Mf,
    /// Lunar monthly
    Mm,
}

impl Constituent {
    /// All constituents in canonical model order.
    pub const ALL: [Constituent; CONSTITUENT_COUNT] = [
        Constituent::M2,
        Constituent::S2,
        Constituent::N2,
        Constituent::K2,
        Constituent::K1,
        Constituent::O1,
        Constituent::P1,
        Constituent::Q1,
        Constituent::Mf,
        Constituent::Mm,
    ];

    /// The first `count` constituents of the canonical order.
    ///
    /// Returns `None` unless `count` is in `1..=10`.
    pub fn leading(count: usize) -> Option<&'static [Constituent]> {
        if (1..=CONSTITUENT_COUNT).contains(&count) {
            Some(&Self::ALL[..count])
        } else {
            None
        }
    }

    /// Position in the canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Constituent::M2 => "M2",
            Constituent::S2 => "S2",
            Constituent::N2 => "N2",
            Constituent::K2 => "K2",
            Constituent::K1 => "K1",
            Constituent::O1 => "O1",
            Constituent::P1 => "P1",
            Constituent::Q1 => "Q1",
            Constituent::Mf => "Mf",
            Constituent::Mm => "Mm",
        }
    }

    /// Angular speed in degrees per solar hour.
    pub fn speed_deg_per_hour(self) -> f64 {
        match self {
            Constituent::M2 => 28.984_104_2,
            Constituent::S2 => 30.0,
            Constituent::N2 => 28.439_729_5,
            Constituent::K2 => 30.082_137_3,
            Constituent::K1 => 15.041_068_6,
            Constituent::O1 => 13.943_035_6,
            Constituent::P1 => 14.958_931_4,
            Constituent::Q1 => 13.398_660_9,
            Constituent::Mf => 1.098_033_1,
            Constituent::Mm => 0.544_374_7,
        }
    }

    /// Period in hours.
    pub fn period_hours(self) -> f64 {
        360.0 / self.speed_deg_per_hour()
    }

    /// Astronomical argument (radians) at [`MODEL_EPOCH_UNIX_SECONDS`].
    pub fn phase_mkb(self) -> f64 {
        match self {
            Constituent::M2 => 1.731_557_546,
            Constituent::S2 => 0.0,
            Constituent::N2 => 6.050_721_243,
            Constituent::K2 => 3.487_600_001,
            Constituent::K1 => 0.173_003_674,
            Constituent::O1 => 1.558_553_872,
            Constituent::P1 => 6.110_181_633,
            Constituent::Q1 => 5.877_717_569,
            Constituent::Mf => 1.756_042_456,
            Constituent::Mm => 1.964_021_610,
        }
    }
}

impl fmt::Display for Constituent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a constituent name is not one of the canonical ten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tidal constituent '{0}'")]
pub struct UnknownConstituent(pub String);

impl FromStr for Constituent {
    type Err = UnknownConstituent;

    /// Model files write names in lower case (`m2 s2 n2 ...`); matching is
    /// case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownConstituent(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, c) in Constituent::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
        assert_eq!(Constituent::ALL[0], Constituent::M2);
        assert_eq!(Constituent::ALL[9], Constituent::Mm);
    }

    #[test]
    fn test_leading_prefix() {
        assert_eq!(
            Constituent::leading(3),
            Some(&[Constituent::M2, Constituent::S2, Constituent::N2][..])
        );
        assert_eq!(Constituent::leading(10).map(|c| c.len()), Some(10));
        assert!(Constituent::leading(0).is_none());
        assert!(Constituent::leading(11).is_none());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("m2".parse::<Constituent>().unwrap(), Constituent::M2);
        assert_eq!(" MF ".parse::<Constituent>().unwrap(), Constituent::Mf);
        assert!("2n2".parse::<Constituent>().is_err());
    }

    #[test]
    fn test_unknown_constituent_error() {
        let err = "2n2".parse::<Constituent>().unwrap_err();
        assert_eq!(err, UnknownConstituent("2n2".to_string()));
        assert_eq!(err.to_string(), "unknown tidal constituent '2n2'");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_model_epoch_is_1992() {
        use chrono::{TimeZone, Utc};
        let epoch = Utc.with_ymd_and_hms(1992, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch.timestamp(), MODEL_EPOCH_UNIX_SECONDS);
    }

    #[test]
    fn test_m2_period() {
        let period = Constituent::M2.period_hours();
        assert!((period - 12.4206).abs() < 1e-3, "M2 period {period}");
        assert_eq!(Constituent::S2.period_hours(), 12.0);
    }
}
