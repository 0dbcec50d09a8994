//! Population to point style mapping.

use crate::types::{RawCityRecord, StyledPoint};
use thiserror::Error;

/// Populations at or below this value land in the first bucket.
pub const POPULATION_FLOOR: f64 = 50_000.0;
/// Width of one population bucket.
pub const POPULATION_STEP: f64 = 100_000.0;

const BASE_RADIUS: f64 = 1.0;
const RADIUS_INCREMENT: f64 = 0.2;
const MAX_RADIUS_STEP: usize = 3;

/// Point colors, smallest populations first.
pub const PALETTE: [&str; 5] = ["#8F1CCD", "#A221B9", "#E0329D", "#DF7B90", "#E8AD85"];

/// Bucket index for `population`, clamped to `0..=cap`.
///
/// Populations below the floor (negative raw steps) and NaN both resolve to 0.
pub fn population_step(population: f64, cap: usize) -> usize {
    let step = ((population - POPULATION_FLOOR) / POPULATION_STEP).floor();
    if step.is_nan() || step <= 0.0 {
        return 0;
    }
    (step as usize).min(cap)
}

pub fn point_radius(population: f64) -> f64 {
    BASE_RADIUS + population_step(population, MAX_RADIUS_STEP) as f64 * RADIUS_INCREMENT
}

pub fn point_color(population: f64) -> &'static str {
    PALETTE[population_step(population, PALETTE.len() - 1)]
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` is not a finite number")]
    NotFinite(&'static str),
}

fn finite(value: Option<f64>, field: &'static str) -> Result<f64, MalformedRecord> {
    match value {
        None => Err(MalformedRecord::Missing(field)),
        Some(v) if !v.is_finite() => Err(MalformedRecord::NotFinite(field)),
        Some(v) => Ok(v),
    }
}

/// Turns a raw record into a styled point, or reports why it can't.
pub fn style_record(record: &RawCityRecord) -> Result<StyledPoint, MalformedRecord> {
    let name = record.city.clone().ok_or(MalformedRecord::Missing("city"))?;
    let latitude = finite(record.lat, "lat")?;
    let longitude = finite(record.long, "long")?;
    let population = finite(record.data_point, "dataPoint")?;

    Ok(StyledPoint {
        name,
        latitude,
        longitude,
        radius: point_radius(population),
        color: point_color(population).to_string(),
    })
}
