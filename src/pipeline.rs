//! # Site Tide Pipeline
//!
//! Runs the tide chain (point extraction, synthesis, event detection and
//! snapping) for every coastal site and assembles the tide columns of each
//! site's hourly forecast table.
//!
//! ## Concurrency
//! Sites are independent. They are spread across a fixed-size rayon pool and
//! share the catalog by reference; nothing is written across sites. Output
//! order follows the input site order.
//!
//! ## Failure Handling
//! A site whose tides cannot be computed (missing catalog, coordinate outside
//! the model, computation error) still gets a table, just without tide
//! columns. The failure is logged and the batch carries on.

use crate::catalog::{GriddedHarmonics, Interpolation};
use crate::config::{Config, SiteConfig, TideConfig};
use crate::error::TideError;
use crate::events::{detect_events, separation_in_samples, snap_events};
use crate::point::point_harmonics;
use crate::synth::synthesize;
use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-run prediction settings derived from [`TideConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictionSettings {
    pub interpolation: Interpolation,
    pub step: Duration,
    /// Minimum turning-point spacing in samples
    pub min_separation: usize,
    pub utc_offset_hours: i64,
}

impl PredictionSettings {
    pub fn from_config(tides: &TideConfig) -> Self {
        let step = Duration::minutes(tides.step_minutes.max(1));
        Self {
            interpolation: tides.interpolation,
            step,
            min_separation: separation_in_samples(tides.min_separation_minutes, step),
            utc_offset_hours: tides.utc_offset_hours,
        }
    }
}

/// Tide columns of a site's hourly table, aligned with its index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideColumns {
    /// Astronomical tide height about the mean
    pub ssh_tides: Vec<Option<f64>>,
    /// Exact local time of the high tide snapped to this hour
    pub high_tide: Vec<Option<NaiveDateTime>>,
    /// Exact local time of the low tide snapped to this hour
    pub low_tide: Vec<Option<NaiveDateTime>>,
}

/// Hourly tide table for one site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteTideTable {
    pub site: String,
    pub lat: f64,
    pub lon: f64,
    /// Local hourly time index
    pub index: Vec<NaiveDateTime>,
    /// Absent when tides could not be computed for this site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tides: Option<TideColumns>,
}

/// Inclusive hourly index from `start` spanning `horizon_hours`.
pub fn hourly_index(start: NaiveDateTime, horizon_hours: i64) -> Vec<NaiveDateTime> {
    (0..=horizon_hours.max(0))
        .map(|h| start + Duration::hours(h))
        .collect()
}

/// Compute the tide columns for one site.
///
/// The series is synthesized over the UTC span covering `index` (local time),
/// with nodal corrections evaluated for `date`.
pub fn site_tides(
    catalog: &GriddedHarmonics,
    site: &SiteConfig,
    date: NaiveDate,
    index: &[NaiveDateTime],
    settings: &PredictionSettings,
) -> Result<TideColumns, TideError> {
    let (Some(&first), Some(&last)) = (index.first(), index.last()) else {
        return Err(TideError::Computation(format!(
            "empty hourly index for {}",
            site.name
        )));
    };
    let offset = Duration::hours(settings.utc_offset_hours);

    let harmonics = point_harmonics(catalog, site.lat, site.lon, date, settings.interpolation)?;
    let series = synthesize(
        &harmonics,
        (first + offset).and_utc(),
        (last + offset).and_utc(),
        settings.step,
    )?;
    if !series.has_data() {
        return Err(TideError::CoordinateOutOfCoverage {
            lat: site.lat,
            lon: site.lon,
        });
    }

    let events = detect_events(&series, settings.min_separation, settings.utc_offset_hours);
    let slots = snap_events(&events, index);
    let ssh_tides = index
        .iter()
        .map(|&t| {
            series
                .sample_at((t + offset).and_utc())
                .filter(|h| h.is_finite())
        })
        .collect();

    Ok(TideColumns {
        ssh_tides,
        high_tide: slots.high_times(),
        low_tide: slots.low_times(),
    })
}

fn build_table(
    catalog: Option<&GriddedHarmonics>,
    site: &SiteConfig,
    date: NaiveDate,
    index: &[NaiveDateTime],
    settings: &PredictionSettings,
) -> SiteTideTable {
    let tides = catalog.and_then(|catalog| {
        match site_tides(catalog, site, date, index, settings) {
            Ok(columns) => {
                info!(site = %site.name, "created tide data");
                Some(columns)
            }
            Err(e) => {
                warn!(site = %site.name, "tide columns omitted: {e}");
                None
            }
        }
    });

    SiteTideTable {
        site: site.name.clone(),
        lat: site.lat,
        lon: site.lon,
        index: index.to_vec(),
        tides,
    }
}

/// Build hourly tide tables for every configured site starting at local
/// midnight of `date`.
///
/// With no catalog every table is produced without tide columns.
pub fn run(
    catalog: Option<&GriddedHarmonics>,
    date: NaiveDate,
    config: &Config,
) -> Result<Vec<SiteTideTable>, TideError> {
    let settings = PredictionSettings::from_config(&config.tides);
    let index = hourly_index(date.and_time(NaiveTime::MIN), config.forecast.horizon_hours);
    if catalog.is_none() {
        warn!("no tide model loaded, site tables will have no tide columns");
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.forecast.n_jobs.max(1))
        .build()?;
    let tables: Vec<SiteTideTable> = pool.install(|| {
        config
            .sites
            .par_iter()
            .map(|site| build_table(catalog, site, date, &index, &settings))
            .collect()
    });
    Ok(tables)
}

/// Output file for a site: underscores are dropped from the name.
pub fn output_path(dir: &Path, site: &str) -> PathBuf {
    dir.join(format!("{}_TIDES_CURRENT.json", site.replace('_', "")))
}

/// Write each table as JSON under `dir`.
pub fn write_tables(tables: &[SiteTideTable], dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create output dir {}", dir.display()))?;
    tables
        .iter()
        .map(|table| -> anyhow::Result<PathBuf> {
            let path = output_path(dir, &table.site);
            let data = serde_json::to_vec_pretty(table)?;
            fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
