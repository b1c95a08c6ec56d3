//! Raster export to the local filesystem.
//!
//! A [`PngExporter`] stands in for a cloud storage export job: each submission
//! writes an 8-bit grayscale PNG of the class values plus a JSON sidecar with
//! the georeference, and returns a handle naming the task.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use image::{GrayImage, ImageBuffer, Luma};
use serde::Serialize;
use tracing::info;

use crate::error::{Result, SuitabilityError};
use crate::providers::{ExportDestination, ExportHandle, Exporter};
use crate::raster::{ClassifiedRaster, Extent, GeoReference, METERS_PER_DEGREE};

/// Pixel value written for no-data cells.
pub const NODATA_PIXEL: u8 = 0;

/// Pixels needed to cover `region` at `scale` metres per pixel.
pub fn pixel_count(region: &Extent, scale: f64, crs: &str) -> u64 {
    let (width_m, height_m) = if crs.eq_ignore_ascii_case("EPSG:4326") {
        let mid_lat = ((region.north + region.south) / 2.0).to_radians();
        (
            region.width() * METERS_PER_DEGREE * mid_lat.cos(),
            region.height() * METERS_PER_DEGREE,
        )
    } else {
        (region.width(), region.height())
    };
    let cols = (width_m / scale).ceil().max(0.0) as u64;
    let rows = (height_m / scale).ceil().max(0.0) as u64;
    cols.saturating_mul(rows)
}

pub fn validate_destination(destination: &ExportDestination) -> Result<()> {
    if destination.folder.trim().is_empty() {
        return Err(SuitabilityError::InvalidDestination("export folder is empty".into()));
    }
    if destination.folder.split(['/', '\\']).any(|part| part == "..") {
        return Err(SuitabilityError::InvalidDestination(format!(
            "folder {:?} escapes the output directory",
            destination.folder
        )));
    }
    if destination.file_name_prefix.trim().is_empty() {
        return Err(SuitabilityError::InvalidDestination("file name prefix is empty".into()));
    }
    if destination.file_name_prefix.contains(['/', '\\']) {
        return Err(SuitabilityError::InvalidDestination(format!(
            "file name prefix {:?} contains a path separator",
            destination.file_name_prefix
        )));
    }
    if !(destination.scale.is_finite() && destination.scale > 0.0) {
        return Err(SuitabilityError::InvalidDestination(format!(
            "scale must be positive, got {}",
            destination.scale
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct ExportManifest<'a> {
    task_id: &'a str,
    description: &'a str,
    criterion: &'a str,
    image: &'a str,
    region: Extent,
    crs: &'a str,
    scale: f64,
    pixels_at_scale: u64,
    width: usize,
    height: usize,
    geo: &'a GeoReference,
    nodata: u8,
    created_at: DateTime<Utc>,
}

/// Writes exports under `<output_dir>/<folder>/`.
#[derive(Debug)]
pub struct PngExporter {
    output_dir: PathBuf,
    next_task: AtomicU64,
}

impl PngExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            next_task: AtomicU64::new(1),
        }
    }
}

fn class_image(raster: &ClassifiedRaster) -> GrayImage {
    let mut img: GrayImage = ImageBuffer::new(raster.width() as u32, raster.height() as u32);
    for (x, y, cell) in raster.grid.iter() {
        img.put_pixel(x as u32, y as u32, Luma([cell.unwrap_or(NODATA_PIXEL)]));
    }
    img
}

impl Exporter for PngExporter {
    fn submit(
        &self,
        raster: &ClassifiedRaster,
        destination: &ExportDestination,
        max_pixels: u64,
    ) -> Result<ExportHandle> {
        validate_destination(destination)?;

        let pixels = pixel_count(&destination.region, destination.scale, &destination.crs);
        if pixels > max_pixels {
            return Err(SuitabilityError::QuotaExceeded { pixels, max_pixels });
        }

        let task_id = format!(
            "{}_{:04}",
            destination.description,
            self.next_task.fetch_add(1, Ordering::Relaxed)
        );
        let folder = self.output_dir.join(&destination.folder);
        std::fs::create_dir_all(&folder)?;

        let png_name = format!("{}.png", destination.file_name_prefix);
        let path = folder.join(&png_name);
        class_image(raster).save(&path)?;

        let manifest = ExportManifest {
            task_id: &task_id,
            description: &destination.description,
            criterion: &raster.criterion,
            image: &png_name,
            region: destination.region,
            crs: &destination.crs,
            scale: destination.scale,
            pixels_at_scale: pixels,
            width: raster.width(),
            height: raster.height(),
            geo: &raster.geo,
            nodata: NODATA_PIXEL,
            created_at: Utc::now(),
        };
        let sidecar = folder.join(format!("{}.json", destination.file_name_prefix));
        std::fs::write(&sidecar, serde_json::to_string_pretty(&manifest)?)?;

        info!(task_id = %task_id, path = %path.display(), pixels, "export written");
        Ok(ExportHandle {
            task_id,
            description: destination.description.clone(),
            path,
        })
    }
}

/// One call to [`RecordingExporter::submit`].
#[derive(Clone, Debug)]
pub struct RecordedExport {
    pub criterion: String,
    pub destination: ExportDestination,
    pub valid_cells: usize,
}

/// Exporter double that keeps every submission in memory. Criteria listed with
/// [`RecordingExporter::reject`] fail with `QuotaExceeded`.
#[derive(Debug, Default)]
pub struct RecordingExporter {
    submissions: Mutex<Vec<RecordedExport>>,
    rejected: HashSet<String>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, criterion: &str) -> Self {
        self.rejected.insert(criterion.to_string());
        self
    }

    pub fn submissions(&self) -> Vec<RecordedExport> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Exporter for RecordingExporter {
    fn submit(
        &self,
        raster: &ClassifiedRaster,
        destination: &ExportDestination,
        max_pixels: u64,
    ) -> Result<ExportHandle> {
        validate_destination(destination)?;
        if self.rejected.contains(&raster.criterion) {
            return Err(SuitabilityError::QuotaExceeded {
                pixels: max_pixels.saturating_add(1),
                max_pixels,
            });
        }

        let mut submissions = self
            .submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        submissions.push(RecordedExport {
            criterion: raster.criterion.clone(),
            destination: destination.clone(),
            valid_cells: raster.valid_count(),
        });
        Ok(ExportHandle {
            task_id: format!("{}_{:04}", destination.description, submissions.len()),
            description: destination.description.clone(),
            path: PathBuf::from(&destination.folder).join(&destination.file_name_prefix),
        })
    }
}
