//! # Harmonic Synthesis
//!
//! Rebuilds the astronomical tide at a site as a sum of cosines, one per
//! constituent:
//!
//! ```text
//! h(t) = Σᵢ Aᵢ · cos(ωᵢ · hours_since_epoch(t) + χᵢ - φᵢ)
//! ```
//!
//! with `ωᵢ` in degrees per solar hour, `χᵢ` the constituent's astronomical
//! argument (phase_mkB) and the epoch fixed at 1992-01-01 00:00 UTC. The
//! argument therefore depends only on the instant, never on the run date. The
//! mean over the window is removed so the result is an oscillation about local
//! mean sea level.
//!
//! The default one-minute step deliberately over-samples the hourly output
//! grid so turning points can be localized to within a few minutes.

use crate::constituent::MODEL_EPOCH_UNIX_SECONDS;
use crate::error::TideError;
use crate::point::PointHarmonics;
use crate::TideSeries;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Hours elapsed since the astronomical argument epoch.
pub fn hours_since_model_epoch(when: DateTime<Utc>) -> f64 {
    (when.timestamp_millis() - MODEL_EPOCH_UNIX_SECONDS * 1000) as f64 / MS_PER_HOUR
}

/// Default synthesis resolution.
pub fn default_step() -> Duration {
    Duration::minutes(1)
}

/// Synthesize a mean-removed series from `start` to `end` (inclusive when
/// `end` falls on the step grid) at spacing `step`.
///
/// NaN amplitudes propagate: a site with any NaN constituent yields an all-NaN
/// series rather than a silently truncated sum.
///
/// # Errors
/// [`TideError::Computation`] if `step` is not positive or `end < start`.
pub fn synthesize(
    harmonics: &PointHarmonics,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<TideSeries, TideError> {
    let step_ms = step.num_milliseconds();
    if step_ms <= 0 {
        return Err(TideError::Computation(format!(
            "synthesis step must be positive, got {step}"
        )));
    }
    if end < start {
        return Err(TideError::Computation(format!(
            "synthesis window ends ({end}) before it starts ({start})"
        )));
    }

    let count = ((end - start).num_milliseconds() / step_ms) as usize + 1;
    let start_hours = hours_since_model_epoch(start);
    let step_hours = step_ms as f64 / MS_PER_HOUR;

    let terms: Vec<(f64, f64, f64)> = harmonics
        .constituents
        .iter()
        .map(|h| {
            let c = h.constituent;
            (h.amplitude, c.speed_deg_per_hour(), c.phase_mkb().to_degrees() - h.phase)
        })
        .collect();

    let mut heights: Vec<f64> = (0..count)
        .map(|i| {
            let hours = start_hours + i as f64 * step_hours;
            terms
                .iter()
                .map(|&(amplitude, speed, offset)| {
                    let angle = (speed * hours + offset).rem_euclid(360.0);
                    amplitude * angle.to_radians().cos()
                })
                .sum()
        })
        .collect();

    let mean = heights.iter().sum::<f64>() / count as f64;
    for h in &mut heights {
        *h -= mean;
    }

    debug!(
        lat = harmonics.lat,
        lon = harmonics.lon,
        samples = count,
        mean,
        "synthesized tide series"
    );

    Ok(TideSeries {
        start,
        step,
        heights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituent::Constituent;
    use crate::point::ConstituentHarmonic;
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, TimeZone};

    fn harmonics(terms: &[(Constituent, f64, f64)]) -> PointHarmonics {
        PointHarmonics {
            lat: -33.0,
            lon: -71.6,
            date: NaiveDate::from_ymd_opt(2024, 6, 16).unwrap(),
            constituents: terms
                .iter()
                .map(|&(constituent, amplitude, phase)| ConstituentHarmonic {
                    constituent,
                    amplitude,
                    phase,
                })
                .collect(),
        }
    }

    fn window_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap()
    }

    /// Solve `m · x = rhs` by Gaussian elimination with partial pivoting.
    fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Vec<f64> {
        let n = rhs.len();
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
                .unwrap();
            m.swap(col, pivot);
            rhs.swap(col, pivot);
            for row in col + 1..n {
                let factor = m[row][col] / m[col][col];
                for k in col..n {
                    m[row][k] -= factor * m[col][k];
                }
                rhs[row] -= factor * rhs[col];
            }
        }
        let mut x = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
            x[row] = (rhs[row] - tail) / m[row][row];
        }
        x
    }

    /// Least-squares fit of a constant plus cos/sin pairs at `speeds`, with
    /// time measured from the model epoch. Returns `(amplitude, phase_deg)`
    /// per speed.
    fn harmonic_fit(series: &TideSeries, speeds: &[f64]) -> Vec<(f64, f64)> {
        let n = 1 + 2 * speeds.len();
        let mut normal = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];
        for (i, &h) in series.heights.iter().enumerate() {
            let hours = hours_since_model_epoch(series.timestamp(i));
            let mut basis = vec![1.0];
            for &speed in speeds {
                let angle = (speed * hours).to_radians();
                basis.push(angle.cos());
                basis.push(angle.sin());
            }
            for r in 0..n {
                rhs[r] += basis[r] * h;
                for c in 0..n {
                    normal[r][c] += basis[r] * basis[c];
                }
            }
        }
        let x = solve(normal, rhs);
        speeds
            .iter()
            .enumerate()
            .map(|(k, _)| {
                let (a, b) = (x[1 + 2 * k], x[2 + 2 * k]);
                (a.hypot(b), b.atan2(a).to_degrees().rem_euclid(360.0))
            })
            .collect()
    }

    #[test]
    fn test_series_shape() {
        let h = harmonics(&[(Constituent::M2, 1.0, 0.0)]);
        let end = window_start() + Duration::hours(24);
        let series = synthesize(&h, window_start(), end, default_step()).unwrap();

        assert_eq!(series.len(), 24 * 60 + 1);
        assert_eq!(series.end(), end);
        for (a, b) in series.samples().zip(series.samples().skip(1)) {
            assert_eq!(b.time - a.time, Duration::minutes(1));
        }
        let mean = series.heights.iter().sum::<f64>() / series.len() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_constituent_shape() {
        // S2 runs whole cycles per day from the model epoch and has zero
        // phase_mkB, so zero phase puts a crest at midnight.
        let h = harmonics(&[(Constituent::S2, 2.0, 0.0)]);
        let series = synthesize(&h, window_start(), window_start() + Duration::hours(12), default_step()).unwrap();
        let crest = series.heights[0];
        let trough = series.heights[6 * 60];
        assert_abs_diff_eq!(crest - trough, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(series.heights[0], series.heights[12 * 60], epsilon = 1e-9);
    }

    #[test]
    fn test_two_constituent_fit_recovers_constants() {
        let m2 = (Constituent::M2, 0.62, 137.0);
        let k1 = (Constituent::K1, 0.21, 301.5);
        let h = harmonics(&[m2, k1]);
        let series = synthesize(&h, window_start(), window_start() + Duration::days(9), default_step()).unwrap();

        let fit = harmonic_fit(
            &series,
            &[
                Constituent::M2.speed_deg_per_hour(),
                Constituent::K1.speed_deg_per_hour(),
            ],
        );

        for ((constituent, amplitude, phase), (fit_amplitude, fit_phase)) in [m2, k1].iter().zip(fit) {
            assert!(
                (fit_amplitude - amplitude).abs() / amplitude < 0.01,
                "amplitude {fit_amplitude} vs {amplitude}"
            );
            // The fitted phase is the lag relative to the astronomical argument.
            let expected = phase - constituent.phase_mkb().to_degrees();
            let diff = (fit_phase - expected + 180.0).rem_euclid(360.0) - 180.0;
            assert!(diff.abs() < 2.0, "phase {fit_phase} vs {phase}");
        }
    }

    #[test]
    fn test_nan_amplitude_poisons_series() {
        let h = harmonics(&[(Constituent::M2, f64::NAN, f64::NAN), (Constituent::S2, 0.2, 10.0)]);
        let series = synthesize(&h, window_start(), window_start() + Duration::hours(3), default_step()).unwrap();
        assert!(series.heights.iter().all(|v| v.is_nan()));
        assert!(!series.has_data());
    }

    #[test]
    fn test_invalid_window_rejected() {
        let h = harmonics(&[(Constituent::M2, 1.0, 0.0)]);
        assert!(matches!(
            synthesize(&h, window_start(), window_start() - Duration::hours(1), default_step()),
            Err(TideError::Computation(_))
        ));
        assert!(synthesize(&h, window_start(), window_start(), Duration::zero()).is_err());
    }

    #[test]
    fn test_model_epoch_hours() {
        let epoch = Utc.with_ymd_and_hms(1992, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(hours_since_model_epoch(epoch), 0.0);
        assert_eq!(hours_since_model_epoch(epoch + Duration::minutes(90)), 1.5);
        assert_eq!(hours_since_model_epoch(epoch - Duration::hours(24)), -24.0);
    }

    #[test]
    fn test_argument_at_model_epoch() {
        // At the epoch the argument is phase_mkB - phase.
        let epoch = Utc.with_ymd_and_hms(1992, 1, 1, 0, 0, 0).unwrap();
        let mut h = harmonics(&[(Constituent::M2, 1.0, 30.0)]);
        h.date = NaiveDate::from_ymd_opt(1992, 1, 1).unwrap();
        let series = synthesize(&h, epoch, epoch + Duration::hours(1), Duration::hours(1)).unwrap();
        let angle = |hours: f64| {
            (Constituent::M2.speed_deg_per_hour() * hours + Constituent::M2.phase_mkb().to_degrees() - 30.0)
                .to_radians()
                .cos()
        };
        let mean = (angle(0.0) + angle(1.0)) / 2.0;
        assert_abs_diff_eq!(series.heights[0], angle(0.0) - mean, epsilon = 1e-9);
        assert_abs_diff_eq!(series.heights[1], angle(1.0) - mean, epsilon = 1e-9);
    }

    #[test]
    fn test_same_instant_same_height_across_run_dates() {
        // Identical constants evaluated for consecutive run dates must give
        // the same curve over a shared window.
        let mut today = harmonics(&[(Constituent::M2, 0.5, 120.0), (Constituent::K1, 0.2, 40.0)]);
        let mut yesterday = today.clone();
        today.date = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        yesterday.date = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 6, 17, 0, 0, 0).unwrap();
        let end = start + Duration::hours(24);
        let a = synthesize(&today, start, end, default_step()).unwrap();
        let b = synthesize(&yesterday, start, end, default_step()).unwrap();
        for (x, y) in a.heights.iter().zip(&b.heights) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sample_at_interpolates() {
        let h = harmonics(&[(Constituent::M2, 1.0, 40.0)]);
        let series = synthesize(&h, window_start(), window_start() + Duration::hours(2), default_step()).unwrap();
        let midway = window_start() + Duration::seconds(90);
        let expected = (series.heights[1] + series.heights[2]) / 2.0;
        assert_abs_diff_eq!(series.sample_at(midway).unwrap(), expected, epsilon = 1e-12);
        assert_eq!(series.sample_at(window_start() + Duration::minutes(7)), Some(series.heights[7]));
        assert!(series.sample_at(window_start() - Duration::minutes(1)).is_none());
        assert!(series.sample_at(window_start() + Duration::hours(3)).is_none());
    }
}
