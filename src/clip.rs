//! Polygon masking.

use crate::boundary::Boundary;
use crate::error::Result;
use crate::providers::Clipper;
use crate::raster::{ClassifiedRaster, GeoReference, Grid, Raster};

/// Masks every cell whose centre lies outside the boundary. The raster keeps
/// its extent; masked cells become no-data.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolygonClipper;

fn mask<T: Copy + Send + Sync>(
    grid: &Grid<Option<T>>,
    geo: &GeoReference,
    boundary: &Boundary,
) -> Grid<Option<T>> {
    grid.par_map(|x, y, cell| {
        let (lon, lat) = geo.cell_center(x, y);
        cell.filter(|_| boundary.contains(lon, lat))
    })
}

impl Clipper for PolygonClipper {
    fn clip(&self, raster: &Raster, boundary: &Boundary) -> Result<Raster> {
        Ok(Raster::new(
            mask(&raster.grid, &raster.geo, boundary),
            raster.geo.clone(),
            raster.unit,
        ))
    }

    fn clip_classified(
        &self,
        raster: &ClassifiedRaster,
        boundary: &Boundary,
    ) -> Result<ClassifiedRaster> {
        Ok(ClassifiedRaster::new(
            mask(&raster.grid, &raster.geo, boundary),
            raster.geo.clone(),
            raster.criterion.clone(),
        ))
    }
}
