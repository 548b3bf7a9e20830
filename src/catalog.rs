//! # Harmonic Tide Model Catalog
//!
//! Loads the gridded harmonic tide model and holds it, read-only, for the rest
//! of a forecast run.
//!
//! ## File Formats
//! Files ending in `.nc` are TPXO NetCDF models, read by the `tpxo` module when
//! the `netcdf` feature is enabled. Anything else is a JSON document with the
//! same layout:
//!
//! ```json
//! {
//!   "components": "m2 s2 n2 k2 k1 o1 p1 q1 mf mm",
//!   "lat": [-34.0, -33.5],
//!   "lon": [287.0, 287.5, 288.0],
//!   "ssh_r": [[[0.21, 0.22, null], [0.20, 0.21, 0.22]], ...],
//!   "ssh_i": [[[0.05, 0.05, null], [0.05, 0.04, 0.04]], ...]
//! }
//! ```
//!
//! `ssh_r`/`ssh_i` are the real and imaginary harmonic coefficients shaped
//! `[constituent][lat][lon]`, with `null` over land.
//!
//! ## Processing on Load
//! 1. **Restrict** to the first `n` constituents of the canonical order
//! 2. **Normalize** longitudes to [-180, 180) and sort both axes ascending
//! 3. **Convert** coefficients to amplitude `|z|` and phase `arg(z)` in degrees
//! 4. **Fill** land and coast cells from their neighbours so a coastal site
//!    never lands in a hole
//!
//! ## Error Handling
//! A missing or unreadable file is [`TideError::DataUnavailable`]. Callers treat
//! the tide model as optional and produce site tables without tide columns.

use crate::constituent::Constituent;
use crate::error::TideError;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Back-fill along latitude is limited to this many cells so that only
/// narrow bays are filled from the north before the unbounded passes.
const BAY_FILL_LIMIT: usize = 4;

/// Raw harmonic model document as stored on disk.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HarmonicDataset {
    /// Space-separated constituent names, model order
    pub components: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Real coefficients `[constituent][lat][lon]`
    pub ssh_r: Vec<Vec<Vec<Option<f64>>>>,
    /// Imaginary coefficients `[constituent][lat][lon]`
    pub ssh_i: Vec<Vec<Vec<Option<f64>>>>,
}

/// Spatial interpolation used to extract a site from the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Value of the closest grid cell
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding cells, done on the complex
    /// coefficient so phases near 0/360 do not average to 180
    Bilinear,
}

/// Amplitude and phase grids for one constituent.
#[derive(Clone, Debug)]
pub struct HarmonicField {
    pub constituent: Constituent,
    /// Row-major `[lat][lon]`, length units
    amplitude: Vec<f64>,
    /// Row-major `[lat][lon]`, degrees in [0, 360)
    phase: Vec<f64>,
}

impl HarmonicField {
    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn phase(&self) -> &[f64] {
        &self.phase
    }
}

/// Gridded amplitude/phase for a prefix of the canonical constituents.
///
/// Immutable after construction; share it by reference across site workers.
#[derive(Clone, Debug)]
pub struct GriddedHarmonics {
    lat: Vec<f64>,
    lon: Vec<f64>,
    fields: Vec<HarmonicField>,
}

/// Load the harmonic tide model at `path`, keeping the first
/// `constituent_count` constituents.
///
/// # Example
/// ```no_run
/// use coastal_tides::catalog::load_catalog;
///
/// match load_catalog("data/tide_model.json", 10) {
///     Ok(catalog) => println!("{} constituents", catalog.fields().len()),
///     Err(err) => eprintln!("tides disabled: {err}"),
/// }
/// ```
pub fn load_catalog<P: AsRef<Path>>(
    path: P,
    constituent_count: usize,
) -> Result<GriddedHarmonics, TideError> {
    let path = path.as_ref();
    let unavailable = |reason: String| TideError::DataUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(unavailable("file does not exist".to_string()));
    }
    let dataset = if is_netcdf(path) {
        read_netcdf(path)?
    } else {
        let contents = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
        serde_json::from_slice::<HarmonicDataset>(&contents)
            .map_err(|e| TideError::MalformedDataset(format!("{}: {e}", path.display())))?
    };

    let catalog = GriddedHarmonics::from_dataset(&dataset, constituent_count)?;
    info!(
        path = %path.display(),
        constituents = catalog.fields.len(),
        nlat = catalog.lat.len(),
        nlon = catalog.lon.len(),
        "loaded tide model"
    );
    Ok(catalog)
}

fn is_netcdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("nc") || ext.eq_ignore_ascii_case("nc4"))
}

#[cfg(feature = "netcdf")]
fn read_netcdf(path: &Path) -> Result<HarmonicDataset, TideError> {
    crate::tpxo::read_dataset(path)
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(path: &Path) -> Result<HarmonicDataset, TideError> {
    Err(TideError::DataUnavailable {
        path: path.to_path_buf(),
        reason: "built without NetCDF support (enable the `netcdf` feature)".to_string(),
    })
}

impl GriddedHarmonics {
    /// Build the catalog from an in-memory dataset.
    pub fn from_dataset(
        dataset: &HarmonicDataset,
        constituent_count: usize,
    ) -> Result<Self, TideError> {
        let constituents = Constituent::leading(constituent_count)
            .ok_or(TideError::InvalidConstituentCount(constituent_count))?;
        validate_components(&dataset.components, constituents)?;
        validate_shape(dataset, constituent_count)?;

        let normalized_lon: Vec<f64> = dataset.lon.iter().map(|&x| normalize_lon(x)).collect();
        let lat_order = ascending_order(&dataset.lat);
        let lon_order = ascending_order(&normalized_lon);
        let lat: Vec<f64> = lat_order.iter().map(|&i| dataset.lat[i]).collect();
        let lon: Vec<f64> = lon_order.iter().map(|&j| normalized_lon[j]).collect();
        let (nlat, nlon) = (lat.len(), lon.len());

        let fields = constituents
            .iter()
            .enumerate()
            .map(|(k, &constituent)| {
                let mut amplitude = Vec::with_capacity(nlat * nlon);
                let mut phase = Vec::with_capacity(nlat * nlon);
                for &i in &lat_order {
                    for &j in &lon_order {
                        let (a, p) = to_polar(dataset.ssh_r[k][i][j], dataset.ssh_i[k][i][j]);
                        amplitude.push(a);
                        phase.push(p);
                    }
                }
                fill_borders(&mut amplitude, nlat, nlon);
                fill_borders(&mut phase, nlat, nlon);
                HarmonicField {
                    constituent,
                    amplitude,
                    phase,
                }
            })
            .collect();

        Ok(Self { lat, lon, fields })
    }

    /// Ascending latitude axis.
    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    /// Ascending longitude axis in [-180, 180).
    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn fields(&self) -> &[HarmonicField] {
        &self.fields
    }

    pub fn constituents(&self) -> impl Iterator<Item = Constituent> + '_ {
        self.fields.iter().map(|f| f.constituent)
    }

    /// Uncorrected `(constituent, amplitude, phase)` at a coordinate.
    ///
    /// Coordinates outside the grid extent yield NaN amplitude and phase for
    /// every constituent.
    pub fn sample(&self, lat: f64, lon: f64, method: Interpolation) -> Vec<(Constituent, f64, f64)> {
        let lon = normalize_lon(lon);
        let inside = lat.is_finite()
            && lon.is_finite()
            && within(&self.lat, lat)
            && within(&self.lon, lon);
        if !inside {
            debug!(lat, lon, "coordinate outside tide model extent");
            return self
                .fields
                .iter()
                .map(|f| (f.constituent, f64::NAN, f64::NAN))
                .collect();
        }

        let nlon = self.lon.len();
        match method {
            Interpolation::Nearest => {
                let cell = nearest_index(&self.lat, lat) * nlon + nearest_index(&self.lon, lon);
                self.fields
                    .iter()
                    .map(|f| (f.constituent, f.amplitude[cell], f.phase[cell]))
                    .collect()
            }
            Interpolation::Bilinear => {
                let (i0, i1, wy) = bracket(&self.lat, lat);
                let (j0, j1, wx) = bracket(&self.lon, lon);
                let corners = [
                    (i0 * nlon + j0, (1.0 - wy) * (1.0 - wx)),
                    (i0 * nlon + j1, (1.0 - wy) * wx),
                    (i1 * nlon + j0, wy * (1.0 - wx)),
                    (i1 * nlon + j1, wy * wx),
                ];
                self.fields
                    .iter()
                    .map(|f| {
                        let z: Complex64 = corners
                            .iter()
                            .map(|&(cell, w)| {
                                Complex64::from_polar(f.amplitude[cell], f.phase[cell].to_radians())
                                    * w
                            })
                            .sum();
                        let (a, p) = polar_parts(z);
                        (f.constituent, a, p)
                    })
                    .collect()
            }
        }
    }
}

/// Map a longitude onto [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn validate_components(components: &str, expected: &[Constituent]) -> Result<(), TideError> {
    let names: Vec<&str> = components.split_whitespace().collect();
    if names.len() < expected.len() {
        return Err(TideError::MalformedDataset(format!(
            "model lists {} constituents, {} requested",
            names.len(),
            expected.len()
        )));
    }
    for (name, &want) in names.iter().zip(expected) {
        let got: Constituent = name
            .parse()
            .map_err(|e| TideError::MalformedDataset(format!("{e}")))?;
        if got != want {
            return Err(TideError::MalformedDataset(format!(
                "constituent order mismatch: found {got} where {want} expected"
            )));
        }
    }
    Ok(())
}

fn validate_shape(dataset: &HarmonicDataset, count: usize) -> Result<(), TideError> {
    let (nlat, nlon) = (dataset.lat.len(), dataset.lon.len());
    if nlat == 0 || nlon == 0 {
        return Err(TideError::MalformedDataset("empty coordinate axis".into()));
    }
    if dataset.lat.iter().chain(&dataset.lon).any(|v| !v.is_finite()) {
        return Err(TideError::MalformedDataset("non-finite coordinate".into()));
    }
    for (label, cube) in [("ssh_r", &dataset.ssh_r), ("ssh_i", &dataset.ssh_i)] {
        if cube.len() < count {
            return Err(TideError::MalformedDataset(format!(
                "{label} holds {} constituents, {count} requested",
                cube.len()
            )));
        }
        let well_formed = cube[..count]
            .iter()
            .all(|plane| plane.len() == nlat && plane.iter().all(|row| row.len() == nlon));
        if !well_formed {
            return Err(TideError::MalformedDataset(format!(
                "{label} is not shaped [constituent][{nlat}][{nlon}]"
            )));
        }
    }
    Ok(())
}

/// Indices that sort `values` ascending, dropping repeated coordinates.
fn ascending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order.dedup_by(|b, a| values[*a] == values[*b]);
    order
}

fn to_polar(re: Option<f64>, im: Option<f64>) -> (f64, f64) {
    match (re, im) {
        (Some(re), Some(im)) => polar_parts(Complex64::new(re, im)),
        _ => (f64::NAN, f64::NAN),
    }
}

fn polar_parts(z: Complex64) -> (f64, f64) {
    let (amplitude, angle) = z.to_polar();
    (amplitude, angle.to_degrees().rem_euclid(360.0))
}

fn within(axis: &[f64], x: f64) -> bool {
    match (axis.first(), axis.last()) {
        (Some(&lo), Some(&hi)) => lo <= x && x <= hi,
        _ => false,
    }
}

/// Closest axis index; `x` must lie within the axis.
fn nearest_index(axis: &[f64], x: f64) -> usize {
    let upper = axis.partition_point(|&v| v < x);
    if upper == 0 {
        return 0;
    }
    if upper >= axis.len() {
        return axis.len() - 1;
    }
    if x - axis[upper - 1] <= axis[upper] - x {
        upper - 1
    } else {
        upper
    }
}

/// Surrounding axis indices and the weight of the upper one.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    if axis.len() == 1 {
        return (0, 0, 0.0);
    }
    let upper = axis.partition_point(|&v| v < x).clamp(1, axis.len() - 1);
    let lower = upper - 1;
    let weight = (x - axis[lower]) / (axis[upper] - axis[lower]);
    (lower, upper, weight)
}

/// Fill NaN cells from their neighbours: short back-fill along latitude for
/// bays, then forward/back fills along longitude and latitude.
fn fill_borders(grid: &mut [f64], nlat: usize, nlon: usize) {
    fill_axis(grid, nlat, nlon, Axis::Lat, Direction::Backward, Some(BAY_FILL_LIMIT));
    fill_axis(grid, nlat, nlon, Axis::Lon, Direction::Forward, None);
    fill_axis(grid, nlat, nlon, Axis::Lon, Direction::Backward, None);
    fill_axis(grid, nlat, nlon, Axis::Lat, Direction::Forward, None);
    fill_axis(grid, nlat, nlon, Axis::Lat, Direction::Backward, None);
}

#[derive(Clone, Copy)]
enum Axis {
    Lat,
    Lon,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn fill_axis(
    grid: &mut [f64],
    nlat: usize,
    nlon: usize,
    axis: Axis,
    direction: Direction,
    limit: Option<usize>,
) {
    let (lines, len) = match axis {
        Axis::Lat => (nlon, nlat),
        Axis::Lon => (nlat, nlon),
    };
    for line in 0..lines {
        let cell = |k: usize| match axis {
            Axis::Lat => k * nlon + line,
            Axis::Lon => line * nlon + k,
        };
        let mut last: Option<f64> = None;
        let mut run = 0usize;
        for step in 0..len {
            let k = match direction {
                Direction::Forward => step,
                Direction::Backward => len - 1 - step,
            };
            let value = grid[cell(k)];
            if value.is_nan() {
                run += 1;
                if let Some(fill) = last {
                    if limit.map_or(true, |l| run <= l) {
                        grid[cell(k)] = fill;
                    }
                }
            } else {
                last = Some(value);
                run = 0;
            }
        }
    }
}
