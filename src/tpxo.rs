//! # TPXO NetCDF Reader
//!
//! Reads the regional TPXO harmonic file the forecast system is delivered
//! with. Only built with the `netcdf` feature, which links libnetcdf.
//!
//! Expected layout:
//! - `lat_r` / `lon_r` (or `lat` / `lon`): 1D coordinate axes
//! - `ssh_r` / `ssh_i`: real and imaginary coefficients `(periods, lat, lon)`
//! - global attribute `components`: space-separated constituent names in
//!   `periods` order
//!
//! Land is marked by `_FillValue`, NaN, or CF fill magnitudes and becomes a
//! missing cell in the [`HarmonicDataset`].

use crate::catalog::HarmonicDataset;
use crate::error::TideError;
use std::path::Path;
use tracing::debug;

/// Values at or beyond this magnitude are treated as fill.
const FILL_THRESHOLD: f64 = 1.0e30;

/// Read a TPXO NetCDF model into the in-memory dataset layout.
pub fn read_dataset(path: &Path) -> Result<HarmonicDataset, TideError> {
    let file = netcdf::open(path)?;

    let components = read_components(&file)?;
    let lat = read_axis(&file, &["lat_r", "lat"])?;
    let lon = read_axis(&file, &["lon_r", "lon"])?;
    let ssh_r = read_cube(&file, "ssh_r", lat.len(), lon.len())?;
    let ssh_i = read_cube(&file, "ssh_i", lat.len(), lon.len())?;

    debug!(
        path = %path.display(),
        periods = ssh_r.len(),
        nlat = lat.len(),
        nlon = lon.len(),
        "read TPXO model"
    );
    Ok(HarmonicDataset {
        components,
        lat,
        lon,
        ssh_r,
        ssh_i,
    })
}

fn read_components(file: &netcdf::File) -> Result<String, TideError> {
    let value = file
        .attribute("components")
        .ok_or_else(|| TideError::MalformedDataset("missing `components` attribute".into()))?
        .value()?;
    match value {
        netcdf::AttributeValue::Str(names) => Ok(names),
        netcdf::AttributeValue::Strs(names) => Ok(names.join(" ")),
        other => Err(TideError::MalformedDataset(format!(
            "`components` attribute is not text: {other:?}"
        ))),
    }
}

fn read_axis(file: &netcdf::File, names: &[&str]) -> Result<Vec<f64>, TideError> {
    for name in names {
        if let Some(var) = file.variable(name) {
            return Ok(var.get_values::<f64, _>(..)?);
        }
    }
    Err(TideError::MalformedDataset(format!(
        "missing coordinate {}",
        names.join(" or ")
    )))
}

fn fill_value(var: &netcdf::Variable) -> Option<f64> {
    var.attribute_value("_FillValue")
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Double(d) => Some(d),
            netcdf::AttributeValue::Float(f) => Some(f as f64),
            _ => None,
        })
}

/// Read a `(periods, lat, lon)` variable, mapping fill to `None`.
fn read_cube(
    file: &netcdf::File,
    name: &str,
    nlat: usize,
    nlon: usize,
) -> Result<Vec<Vec<Vec<Option<f64>>>>, TideError> {
    let var = file
        .variable(name)
        .ok_or_else(|| TideError::MalformedDataset(format!("missing variable {name}")))?;
    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    if dims.len() != 3 || dims[1] != nlat || dims[2] != nlon {
        return Err(TideError::MalformedDataset(format!(
            "{name} has shape {dims:?}, expected (periods, {nlat}, {nlon})"
        )));
    }

    let fill = fill_value(&var);
    let raw: Vec<f64> = var.get_values(..)?;
    let cube = raw
        .chunks(nlat * nlon)
        .map(|plane| {
            plane
                .chunks(nlon)
                .map(|row| row.iter().map(|&v| valid(v, fill)).collect())
                .collect()
        })
        .collect();
    Ok(cube)
}

fn valid(value: f64, fill: Option<f64>) -> Option<f64> {
    let is_fill = fill.is_some_and(|f| value == f);
    (value.is_finite() && value.abs() < FILL_THRESHOLD && !is_fill).then_some(value)
}
