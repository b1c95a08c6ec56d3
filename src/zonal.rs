//! Zonal statistics over classified rasters.
//!
//! The summary is a regression oracle for reclassification: it reports the
//! observed class range over a zone, and treats any class value outside the
//! 1..=4 scale as a defect instead of clamping it.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::boundary::Boundary;
use crate::classifier::SuitabilityClass;
use crate::error::Result;
use crate::raster::ClassifiedRaster;

/// Summary of the classes observed inside a zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ZonalStats {
    /// The zone holds no valid sample.
    NoData,
    Observed {
        min: SuitabilityClass,
        max: SuitabilityClass,
        /// Sampled cell count per class, index 0 = class 1.
        histogram: [u64; 4],
    },
}

impl ZonalStats {
    pub fn range(&self) -> Option<(SuitabilityClass, SuitabilityClass)> {
        match self {
            ZonalStats::NoData => None,
            ZonalStats::Observed { min, max, .. } => Some((*min, *max)),
        }
    }

    pub fn sampled_cells(&self) -> u64 {
        match self {
            ZonalStats::NoData => 0,
            ZonalStats::Observed { histogram, .. } => histogram.iter().sum(),
        }
    }

    /// Fraction of sampled cells in `class`; 0 when nothing was sampled.
    pub fn share(&self, class: SuitabilityClass) -> f64 {
        match self {
            ZonalStats::NoData => 0.0,
            ZonalStats::Observed { histogram, .. } => {
                histogram[class.value() as usize - 1] as f64 / self.sampled_cells() as f64
            }
        }
    }
}

impl fmt::Display for ZonalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZonalStats::NoData => write!(f, "{{min: null, max: null}}"),
            ZonalStats::Observed { min, max, .. } => {
                write!(f, "{{min: {}, max: {}}}", min.value(), max.value())
            }
        }
    }
}

/// Sampling step in cells for a requested resolution in metres. Resolutions at
/// or finer than the native pixel size (or non-positive) sample every cell.
fn sampling_step(raster: &ClassifiedRaster, resolution: f64) -> usize {
    let native = raster
        .geo
        .nominal_scale_meters(raster.width(), raster.height());
    if !(resolution.is_finite() && native > 0.0 && resolution > native) {
        return 1;
    }
    ((resolution / native).round() as usize).max(1)
}

/// Sample positions along one axis: the cell nearest each sample-grid centre.
fn sample_positions(len: usize, step: usize) -> impl Iterator<Item = usize> {
    (0..len)
        .step_by(step)
        .map(move |start| (start + step / 2).min(len - 1))
}

/// Minimum, maximum and histogram of classes whose cell centres fall in `zone`,
/// sampled at `resolution` metres.
///
/// Fails with `ClassOutOfRange` if any sampled cell holds a value off the scale.
pub fn summarize(
    raster: &ClassifiedRaster,
    zone: &Boundary,
    resolution: f64,
) -> Result<ZonalStats> {
    let step = sampling_step(raster, resolution);
    let mut histogram = [0u64; 4];

    for y in sample_positions(raster.height(), step) {
        for x in sample_positions(raster.width(), step) {
            let Some(value) = raster.class_at(x, y) else {
                continue;
            };
            let (lon, lat) = raster.geo.cell_center(x, y);
            if !zone.contains(lon, lat) {
                continue;
            }
            let class = SuitabilityClass::from_value(value)?;
            histogram[class.value() as usize - 1] += 1;
        }
    }

    let observed: Vec<SuitabilityClass> = SuitabilityClass::all()
        .iter()
        .copied()
        .filter(|c| histogram[c.value() as usize - 1] > 0)
        .collect();

    debug!(
        criterion = %raster.criterion,
        step,
        sampled = histogram.iter().sum::<u64>(),
        "zonal statistics"
    );

    Ok(match (observed.first(), observed.last()) {
        (Some(&min), Some(&max)) => ZonalStats::Observed {
            min,
            max,
            histogram,
        },
        _ => ZonalStats::NoData,
    })
}
