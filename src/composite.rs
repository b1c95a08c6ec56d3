//! Temporal compositing and value conversion for fetched layers.

use tracing::debug;

use crate::criteria::{DatasetRequest, Derivation, Reduction, ValueTransform};
use crate::error::{Result, SuitabilityError};
use crate::providers::DataProvider;
use crate::raster::{Grid, Raster, Unit};
use crate::terrain;

/// Per-cell mean over a stack of co-registered frames, ignoring no-data.
/// A cell that is no-data in every frame stays no-data.
pub fn temporal_mean(frames: &[Raster]) -> Result<Raster> {
    let Some(first) = frames.first() else {
        return Err(SuitabilityError::EmptyRaster);
    };
    if let Some(other) = frames.iter().find(|f| !f.grid.same_shape(&first.grid)) {
        return Err(SuitabilityError::ShapeMismatch(format!(
            "frame is {}x{}, expected {}x{}",
            other.width(),
            other.height(),
            first.width(),
            first.height()
        )));
    }
    if let Some(other) = frames.iter().find(|f| f.unit != first.unit) {
        return Err(SuitabilityError::UnitMismatch {
            expected: first.unit,
            found: other.unit,
        });
    }

    let grid: Grid<Option<f32>> = first.grid.par_map(|x, y, _| {
        let (sum, count) = frames
            .iter()
            .filter_map(|f| f.value(x, y))
            .fold((0.0f64, 0u32), |(sum, count), v| (sum + v as f64, count + 1));
        (count > 0).then(|| (sum / count as f64) as f32)
    });

    debug!(frames = frames.len(), "temporal mean composite");
    Ok(Raster::new(grid, first.geo.clone(), first.unit))
}

/// `value * scale + offset` on every valid cell, relabelled with `unit`.
pub fn apply_transform(raster: &Raster, transform: ValueTransform, unit: Unit) -> Raster {
    raster.map_values(unit, |v| v * transform.scale + transform.offset)
}

/// Turn a [`DatasetRequest`] into the layer a criterion classifies.
///
/// Without a reduction, a multi-frame collection resolves to its first frame.
/// The result must end up in the request's declared unit.
pub fn resolve<P: DataProvider + ?Sized>(provider: &P, request: &DatasetRequest) -> Result<Raster> {
    let frames = provider.frames(
        &request.dataset_id,
        &request.band,
        request.date_range.as_ref(),
    )?;

    let mut raster = match request.reduction {
        Some(Reduction::Mean) => temporal_mean(&frames)?,
        None => frames.into_iter().next().ok_or(SuitabilityError::EmptyRaster)?,
    };

    if let Some(transform) = request.transform {
        raster = apply_transform(&raster, transform, request.unit);
    }
    if let Some(Derivation::SlopePercent) = request.derivation {
        raster = terrain::slope_percent(&raster)?;
    }

    if raster.unit != request.unit {
        return Err(SuitabilityError::UnitMismatch {
            expected: request.unit,
            found: raster.unit,
        });
    }
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::DateRange;
    use crate::providers::MemoryProvider;
    use crate::raster::tests::unit_geo;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn frame(cells: Vec<Option<f32>>) -> Raster {
        Raster::new(
            Grid::from_vec(cells.len(), 1, cells).unwrap(),
            unit_geo(),
            Unit::DigitalNumber,
        )
    }

    #[test]
    fn test_mean_ignores_nodata() {
        let frames = vec![
            frame(vec![Some(1.0), None, None]),
            frame(vec![Some(3.0), Some(4.0), None]),
            frame(vec![Some(5.0), Some(8.0), None]),
        ];
        let mean = temporal_mean(&frames).unwrap();
        assert_relative_eq!(mean.value(0, 0).unwrap(), 3.0);
        assert_relative_eq!(mean.value(1, 0).unwrap(), 6.0);
        assert_eq!(mean.value(2, 0), None);
    }

    #[test]
    fn test_mean_rejects_bad_stacks() {
        assert!(matches!(temporal_mean(&[]), Err(SuitabilityError::EmptyRaster)));
        let frames = vec![frame(vec![Some(1.0)]), frame(vec![Some(1.0), Some(2.0)])];
        assert!(matches!(
            temporal_mean(&frames),
            Err(SuitabilityError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_transform_converts_lst_to_celsius() {
        let dn = frame(vec![Some(15000.0), None]);
        let celsius = apply_transform(
            &dn,
            ValueTransform {
                scale: 0.02,
                offset: -273.15,
            },
            Unit::Celsius,
        );
        assert_eq!(celsius.unit, Unit::Celsius);
        assert_relative_eq!(celsius.value(0, 0).unwrap(), 26.85, epsilon = 1e-3);
        assert_eq!(celsius.value(1, 0), None);
    }

    #[test]
    fn test_resolve_composites_frames_in_range() {
        let mut provider = MemoryProvider::new();
        for (d, dn) in [(1, 14500.0), (2, 14600.0), (3, 99999.0)] {
            let date = NaiveDate::from_ymd_opt(2020, 1, d).unwrap();
            provider.insert_frame("lst", "day", date, frame(vec![Some(dn)]));
        }
        let request = DatasetRequest {
            dataset_id: "lst".into(),
            band: "day".into(),
            date_range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(),
            )),
            reduction: Some(Reduction::Mean),
            transform: Some(ValueTransform {
                scale: 0.02,
                offset: -273.15,
            }),
            derivation: None,
            unit: Unit::Celsius,
        };
        let raster = provider.fetch(&request).unwrap();
        // mean DN 14550 -> 291.0 K -> 17.85 °C
        assert_relative_eq!(raster.value(0, 0).unwrap(), 17.85, epsilon = 1e-3);
    }

    #[test]
    fn test_resolve_checks_declared_unit() {
        let mut provider = MemoryProvider::new();
        provider.insert("wind", "b1", frame(vec![Some(4.0)]));
        let request = DatasetRequest::image("wind", "b1", Unit::MetersPerSecond);
        assert!(matches!(
            provider.fetch(&request),
            Err(SuitabilityError::UnitMismatch {
                expected: Unit::MetersPerSecond,
                found: Unit::DigitalNumber
            })
        ));
    }
}
