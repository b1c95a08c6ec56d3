//! Terrain derivatives of an elevation model.

use crate::error::{Result, SuitabilityError};
use crate::raster::{Raster, Unit};

// 3x3 window offsets, row-major from the north-west corner.
const WINDOW: [(isize, isize); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Slope in percent rise (100 * tan of the slope angle) from a DEM in metres,
/// using Horn's weighted 3x3 finite differences.
///
/// Pixel sizes are converted to metres at each row's latitude for geographic
/// rasters. A no-data centre stays no-data. A neighbour that is off the grid or
/// no-data is extrapolated through the centre from the opposite neighbour. When
/// both are missing an edge neighbour takes the centre's elevation and a corner
/// is completed from its two adjacent edges, so a plane keeps its slope up to
/// the border.
pub fn slope_percent(dem: &Raster) -> Result<Raster> {
    if dem.unit != Unit::Meters {
        return Err(SuitabilityError::UnitMismatch {
            expected: Unit::Meters,
            found: dem.unit,
        });
    }

    let geo = &dem.geo;
    let grid = dem.grid.par_map(|x, y, cell| {
        let center = f64::from((*cell)?);
        let window = WINDOW.map(|(dx, dy)| {
            dem.grid
                .try_get(x as isize + dx, y as isize + dy)
                .copied()
                .flatten()
                .map(f64::from)
        });
        // slot 8 - k mirrors slot k through the centre
        let mirrored = |k: usize| match (window[k], window[8 - k]) {
            (Some(v), _) => Some(v),
            (None, Some(opposite)) => Some(2.0 * center - opposite),
            (None, None) => None,
        };
        let edge = |k: usize| mirrored(k).unwrap_or(center);
        let (b, d, f, h) = (edge(1), edge(3), edge(5), edge(7));
        // a corner with neither itself nor its mirror on the grid spans its two edges
        let corner = |k: usize, e1: f64, e2: f64| mirrored(k).unwrap_or(e1 + e2 - center);
        let a = corner(0, b, d);
        let c = corner(2, b, f);
        let g = corner(6, d, h);
        let i = corner(8, f, h);

        let (_, lat) = geo.cell_center(x, y);
        let (dx_m, dy_m) = geo.pixel_size_meters(lat);

        // Horn: rows run south, so dz/dy is north minus south.
        let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx_m);
        let dz_dy = ((a + 2.0 * b + c) - (g + 2.0 * h + i)) / (8.0 * dy_m);
        Some(((dz_dx * dz_dx + dz_dy * dz_dy).sqrt() * 100.0) as f32)
    });

    Ok(Raster::new(grid, dem.geo.clone(), Unit::Percent))
}
