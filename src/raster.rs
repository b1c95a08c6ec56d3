//! Raster grids with geospatial metadata.
//!
//! A [`Grid`] is a plain row-major 2D array. A [`Raster`] pairs a grid of optional
//! continuous values (`None` = no-data) with its georeference and physical unit;
//! a [`ClassifiedRaster`] holds ordinal class values produced by reclassification.
//! Both are immutable values: every transform returns a new raster.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuitabilityError};

/// Mean metres per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A 2D row-major grid. Edges do not wrap.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Build a grid from row-major data, checking the length against the shape.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(SuitabilityError::ShapeMismatch(format!(
                "{} values for a {}x{} grid",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height, "cell ({x}, {y}) out of bounds");
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    /// Bounds-checked access for neighbourhood lookups that may step off the grid.
    pub fn try_get(&self, x: isize, y: isize) -> Option<&T> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.get(x as usize, y as usize))
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Cell-wise map that runs on the rayon pool. `f` sees each cell in isolation.
    pub fn par_map<U, F>(&self, f: F) -> Grid<U>
    where
        T: Sync,
        U: Send,
        F: Fn(usize, usize, &T) -> U + Sync + Send,
    {
        let width = self.width;
        let data = self
            .data
            .par_iter()
            .enumerate()
            .map(|(idx, val)| f(idx % width, idx / width, val))
            .collect();
        Grid {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Like [`Grid::par_map`], but fails if any cell fails. With several failing
    /// cells, which error is returned is unspecified.
    pub fn try_par_map<U, F>(&self, f: F) -> Result<Grid<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(usize, usize, &T) -> Result<U> + Sync + Send,
    {
        let width = self.width;
        let data = self
            .data
            .par_iter()
            .enumerate()
            .map(|(idx, val)| f(idx % width, idx / width, val))
            .collect::<Result<Vec<U>>>()?;
        Ok(Grid {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

/// Physical unit of a raster's cell values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Meters,
    Percent,
    MillimetersPerYear,
    Celsius,
    MetersPerSecond,
    /// Raw sensor digital numbers before scale/offset conversion.
    DigitalNumber,
    /// Ordinal suitability classes; never a valid reclassification input.
    SuitabilityClass,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meters => write!(f, "m"),
            Self::Percent => write!(f, "%"),
            Self::MillimetersPerYear => write!(f, "mm/yr"),
            Self::Celsius => write!(f, "°C"),
            Self::MetersPerSecond => write!(f, "m/s"),
            Self::DigitalNumber => write!(f, "DN"),
            Self::SuitabilityClass => write!(f, "class"),
        }
    }
}

/// Bounding box in CRS units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }
}

/// North-up affine georeference: the top-left corner and the pixel size.
/// Rows run south from `origin_y`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub crs: String,
}

impl GeoReference {
    /// Geographic (lon/lat) georeference covering `extent` with `width` x `height` cells.
    pub fn fit_extent(extent: Extent, width: usize, height: usize, crs: &str) -> Self {
        Self {
            origin_x: extent.west,
            origin_y: extent.north,
            pixel_width: extent.width() / width.max(1) as f64,
            pixel_height: extent.height() / height.max(1) as f64,
            crs: crs.to_string(),
        }
    }

    pub fn cell_center(&self, x: usize, y: usize) -> (f64, f64) {
        (
            self.origin_x + (x as f64 + 0.5) * self.pixel_width,
            self.origin_y - (y as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Cell containing a point, if the point falls on the grid.
    pub fn cell_at(&self, px: f64, py: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let fx = (px - self.origin_x) / self.pixel_width;
        let fy = (self.origin_y - py) / self.pixel_height;
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        let (x, y) = (fx.floor() as usize, fy.floor() as usize);
        (x < width && y < height).then_some((x, y))
    }

    pub fn extent(&self, width: usize, height: usize) -> Extent {
        Extent {
            west: self.origin_x,
            north: self.origin_y,
            east: self.origin_x + width as f64 * self.pixel_width,
            south: self.origin_y - height as f64 * self.pixel_height,
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.crs.eq_ignore_ascii_case("EPSG:4326")
    }

    /// Nominal pixel size in metres (x, y) at a given latitude.
    pub fn pixel_size_meters(&self, latitude: f64) -> (f64, f64) {
        if self.is_geographic() {
            let lat_rad = latitude.to_radians();
            (
                self.pixel_width * METERS_PER_DEGREE * lat_rad.cos(),
                self.pixel_height * METERS_PER_DEGREE,
            )
        } else {
            (self.pixel_width, self.pixel_height)
        }
    }

    /// Nominal pixel size in metres at the centre of the grid.
    pub fn nominal_scale_meters(&self, width: usize, height: usize) -> f64 {
        let extent = self.extent(width, height);
        let mid_lat = (extent.north + extent.south) / 2.0;
        let (sx, sy) = self.pixel_size_meters(mid_lat);
        (sx + sy) / 2.0
    }
}

/// A continuous-valued layer. `None` cells are no-data.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub grid: Grid<Option<f32>>,
    pub geo: GeoReference,
    pub unit: Unit,
}

impl Raster {
    pub fn new(grid: Grid<Option<f32>>, geo: GeoReference, unit: Unit) -> Self {
        Self { grid, geo, unit }
    }

    /// Build from row-major values, turning the `nodata` sentinel into `None`.
    pub fn from_values(
        width: usize,
        height: usize,
        values: Vec<f32>,
        nodata: Option<f32>,
        geo: GeoReference,
        unit: Unit,
    ) -> Result<Self> {
        let cells = values
            .into_iter()
            .map(|v| match nodata {
                Some(sentinel) if v == sentinel => None,
                _ => Some(v),
            })
            .collect();
        Ok(Self::new(Grid::from_vec(width, height, cells)?, geo, unit))
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn value(&self, x: usize, y: usize) -> Option<f32> {
        *self.grid.get(x, y)
    }

    pub fn extent(&self) -> Extent {
        self.geo.extent(self.grid.width, self.grid.height)
    }

    pub fn valid_count(&self) -> usize {
        self.grid.as_slice().iter().filter(|c| c.is_some()).count()
    }

    /// Minimum and maximum over valid, non-NaN cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.grid
            .as_slice()
            .iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// New raster with `f` applied to every valid cell; no-data stays no-data.
    pub fn map_values<F>(&self, unit: Unit, f: F) -> Raster
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        Raster {
            grid: self.grid.par_map(|_, _, cell| cell.map(&f)),
            geo: self.geo.clone(),
            unit,
        }
    }
}

/// A raster of ordinal class values, tagged with the criterion that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedRaster {
    pub grid: Grid<Option<u8>>,
    pub geo: GeoReference,
    pub criterion: String,
}

impl ClassifiedRaster {
    pub fn new(grid: Grid<Option<u8>>, geo: GeoReference, criterion: impl Into<String>) -> Self {
        Self {
            grid,
            geo,
            criterion: criterion.into(),
        }
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn class_at(&self, x: usize, y: usize) -> Option<u8> {
        *self.grid.get(x, y)
    }

    pub fn extent(&self) -> Extent {
        self.geo.extent(self.grid.width, self.grid.height)
    }

    pub fn valid_count(&self) -> usize {
        self.grid.as_slice().iter().filter(|c| c.is_some()).count()
    }

    /// View the class values as a plain raster. The result carries
    /// [`Unit::SuitabilityClass`], which no rule table accepts as input.
    pub fn to_raster(&self) -> Raster {
        Raster {
            grid: self.grid.par_map(|_, _, cell| cell.map(f32::from)),
            geo: self.geo.clone(),
            unit: Unit::SuitabilityClass,
        }
    }
}
