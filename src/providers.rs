//! Collaborator seams of the analysis pipeline.
//!
//! Dataset access, boundary lookup, clipping, export and rendering are external
//! concerns. The pipeline only talks to these traits, so the synthetic backend,
//! the PNG writers and the in-memory test doubles are interchangeable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::boundary::Boundary;
use crate::criteria::{DatasetRequest, DateRange, Palette};
use crate::error::{Result, SuitabilityError};
use crate::raster::{ClassifiedRaster, Extent, Raster};

/// Source of raster datasets.
pub trait DataProvider: Send + Sync {
    /// Every frame of `dataset_id`/`band` inside `date_range`. Static images
    /// yield a single frame whatever the range.
    fn frames(&self, dataset_id: &str, band: &str, date_range: Option<&DateRange>)
        -> Result<Vec<Raster>>;

    /// Resolve a full request: frames, temporal reduction, value transform and
    /// derivation, in that order.
    fn fetch(&self, request: &DatasetRequest) -> Result<Raster> {
        crate::composite::resolve(self, request)
    }
}

/// Lookup of named administrative regions.
pub trait GeometryProvider: Send + Sync {
    fn boundary(&self, region_key: &str) -> Result<Arc<Boundary>>;
}

/// Masks rasters to a region.
pub trait Clipper: Send + Sync {
    fn clip(&self, raster: &Raster, boundary: &Boundary) -> Result<Raster>;
    fn clip_classified(&self, raster: &ClassifiedRaster, boundary: &Boundary)
        -> Result<ClassifiedRaster>;
}

/// Where and how a classified raster is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDestination {
    pub description: String,
    pub folder: String,
    pub file_name_prefix: String,
    pub region: Extent,
    /// Requested ground resolution in metres.
    pub scale: f64,
    pub crs: String,
}

/// Receipt for a submitted export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportHandle {
    pub task_id: String,
    pub description: String,
    pub path: PathBuf,
}

pub trait Exporter: Send + Sync {
    /// Submit `raster` for export. Fails with `QuotaExceeded` when the export
    /// would need more than `max_pixels` pixels, `InvalidDestination` when the
    /// destination cannot be written.
    fn submit(
        &self,
        raster: &ClassifiedRaster,
        destination: &ExportDestination,
        max_pixels: u64,
    ) -> Result<ExportHandle>;
}

/// A layer handed to the visualizer.
#[derive(Clone, Copy, Debug)]
pub enum Layer<'a> {
    Raw(&'a Raster),
    Classified(&'a ClassifiedRaster),
}

impl Layer<'_> {
    pub fn width(&self) -> usize {
        match self {
            Layer::Raw(r) => r.width(),
            Layer::Classified(c) => c.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Layer::Raw(r) => r.height(),
            Layer::Classified(c) => c.height(),
        }
    }

    pub fn value(&self, x: usize, y: usize) -> Option<f32> {
        match self {
            Layer::Raw(r) => r.value(x, y),
            Layer::Classified(c) => c.class_at(x, y).map(f32::from),
        }
    }
}

/// Best-effort display sink. Rendering problems are logged, never returned,
/// and have no effect on classification or export.
pub trait Visualizer: Send + Sync {
    fn render(&self, layer: Layer<'_>, palette: &Palette, label: &str);
}

/// Renders nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn render(&self, _layer: Layer<'_>, _palette: &Palette, _label: &str) {}
}

/// In-memory dataset store. Frames may carry an acquisition date; dated frames
/// are filtered by the requested range, undated ones are always returned.
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    datasets: HashMap<(String, String), Vec<(Option<NaiveDate>, Raster)>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset_id: &str, band: &str, raster: Raster) {
        self.push(dataset_id, band, None, raster);
    }

    pub fn insert_frame(&mut self, dataset_id: &str, band: &str, date: NaiveDate, raster: Raster) {
        self.push(dataset_id, band, Some(date), raster);
    }

    fn push(&mut self, dataset_id: &str, band: &str, date: Option<NaiveDate>, raster: Raster) {
        self.datasets
            .entry((dataset_id.to_string(), band.to_string()))
            .or_default()
            .push((date, raster));
    }
}

impl DataProvider for MemoryProvider {
    fn frames(
        &self,
        dataset_id: &str,
        band: &str,
        date_range: Option<&DateRange>,
    ) -> Result<Vec<Raster>> {
        let stored = self
            .datasets
            .get(&(dataset_id.to_string(), band.to_string()))
            .ok_or_else(|| SuitabilityError::DatasetNotFound(format!("{dataset_id}/{band}")))?;

        let frames: Vec<Raster> = stored
            .iter()
            .filter(|(date, _)| match (date, date_range) {
                (Some(date), Some(range)) => range.contains(*date),
                _ => true,
            })
            .map(|(_, raster)| raster.clone())
            .collect();

        if frames.is_empty() {
            return Err(SuitabilityError::Unavailable(format!(
                "{dataset_id}/{band} has no frames in the requested range"
            )));
        }
        Ok(frames)
    }
}
