//! Element-wise raster reclassification.

use tracing::debug;

use crate::classifier::{classify, BreakpointRule};
use crate::error::{Result, SuitabilityError};
use crate::raster::{ClassifiedRaster, Raster};

/// Apply `rule` to every cell of `source` independently.
///
/// No-data cells stay no-data. Every valid cell becomes a class on the 1..=4
/// scale. The map has no neighbourhood terms, so it runs cell-parallel.
///
/// Fails with:
/// - `UnitMismatch` when the layer is not in the rule's unit (this is what
///   refuses re-classifying an already classified raster),
/// - `EmptyRaster` when no cell is valid,
/// - `InvalidInput` when a valid cell holds NaN.
pub fn reclassify(
    source: &Raster,
    rule: &BreakpointRule,
    criterion: &str,
) -> Result<ClassifiedRaster> {
    if source.unit != rule.unit() {
        return Err(SuitabilityError::UnitMismatch {
            expected: rule.unit(),
            found: source.unit,
        });
    }

    let valid = source.valid_count();
    if valid == 0 {
        return Err(SuitabilityError::EmptyRaster);
    }

    let grid = source.grid.try_par_map(|x, y, cell| match cell {
        None => Ok(None),
        Some(value) => classify(*value, rule)
            .map(|class| Some(class.value()))
            .ok_or(SuitabilityError::InvalidInput { row: y, col: x }),
    })?;

    debug!(
        criterion,
        valid_cells = valid,
        total_cells = source.grid.len(),
        "reclassified raster"
    );

    Ok(ClassifiedRaster::new(grid, source.geo.clone(), criterion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SuitabilityClass::*;
    use crate::criteria::default_criteria;
    use crate::raster::tests::unit_geo;
    use crate::raster::{Grid, Unit};

    fn elevation_rule() -> BreakpointRule {
        BreakpointRule::four_class(
            Unit::Meters,
            [500.0, 1000.0, 1500.0],
            [Unsuitable, MarginallySuitable, ModeratelySuitable, HighlySuitable],
        )
        .unwrap()
    }

    fn wind_rule() -> BreakpointRule {
        BreakpointRule::four_class(
            Unit::MetersPerSecond,
            [5.0, 10.0, 15.0],
            [ModeratelySuitable, HighlySuitable, MarginallySuitable, Unsuitable],
        )
        .unwrap()
    }

    fn raster(width: usize, height: usize, cells: Vec<Option<f32>>, unit: Unit) -> Raster {
        Raster::new(Grid::from_vec(width, height, cells).unwrap(), unit_geo(), unit)
    }

    #[test]
    fn test_elevation_cells_map_to_classes() {
        let source = raster(
            4,
            1,
            vec![Some(100.0), Some(600.0), Some(1200.0), Some(2000.0)],
            Unit::Meters,
        );
        let classified = reclassify(&source, &elevation_rule(), "elevation").unwrap();
        let classes: Vec<_> = (0..4).map(|x| classified.class_at(x, 0)).collect();
        assert_eq!(classes, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(classified.criterion, "elevation");
        assert_eq!(classified.geo, source.geo);
    }

    #[test]
    fn test_wind_literal_values() {
        let source = raster(
            2,
            2,
            vec![Some(3.0), Some(7.0), Some(12.0), Some(18.0)],
            Unit::MetersPerSecond,
        );
        let classified = reclassify(&source, &wind_rule(), "wind").unwrap();
        assert_eq!(classified.grid.as_slice(), &[Some(3), Some(4), Some(2), Some(1)]);
    }

    #[test]
    fn test_nodata_stays_nodata() {
        let source = raster(3, 1, vec![None, Some(700.0), None], Unit::Meters);
        let classified = reclassify(&source, &elevation_rule(), "elevation").unwrap();
        assert_eq!(classified.grid.as_slice(), &[None, Some(2), None]);
    }

    #[test]
    fn test_all_nodata_is_empty_raster() {
        let source = raster(2, 2, vec![None; 4], Unit::Meters);
        let err = reclassify(&source, &elevation_rule(), "elevation").unwrap_err();
        assert!(matches!(err, SuitabilityError::EmptyRaster));
    }

    #[test]
    fn test_zero_sized_raster_is_empty() {
        let source = raster(0, 0, vec![], Unit::Meters);
        assert!(matches!(
            reclassify(&source, &elevation_rule(), "elevation"),
            Err(SuitabilityError::EmptyRaster)
        ));
    }

    #[test]
    fn test_nan_cell_reports_position() {
        let cells = vec![
            Some(1.0),
            Some(2.0),
            Some(3.0),
            Some(4.0),
            Some(f32::NAN),
            Some(6.0),
        ];
        let source = raster(3, 2, cells, Unit::Meters);
        let err = reclassify(&source, &elevation_rule(), "elevation").unwrap_err();
        match err {
            SuitabilityError::InvalidInput { row, col } => assert_eq!((row, col), (1, 1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reclassifying_classes_is_refused() {
        let source = raster(2, 1, vec![Some(700.0), Some(1800.0)], Unit::Meters);
        let classified = reclassify(&source, &elevation_rule(), "elevation").unwrap();
        let err = reclassify(&classified.to_raster(), &elevation_rule(), "elevation").unwrap_err();
        assert!(matches!(
            err,
            SuitabilityError::UnitMismatch {
                expected: Unit::Meters,
                found: Unit::SuitabilityClass
            }
        ));
    }

    #[test]
    fn test_wrong_unit_is_refused() {
        let source = raster(1, 1, vec![Some(7.0)], Unit::MetersPerSecond);
        assert!(matches!(
            reclassify(&source, &elevation_rule(), "elevation"),
            Err(SuitabilityError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_permuting_cells_permutes_classes() {
        let values: Vec<f32> = (0..64).map(|i| (i as f32 * 37.0) % 2200.0).collect();
        let forward: Vec<Option<f32>> = values.iter().copied().map(Some).collect();
        let reversed: Vec<Option<f32>> = values.iter().rev().copied().map(Some).collect();

        let a = reclassify(&raster(8, 8, forward, Unit::Meters), &elevation_rule(), "e").unwrap();
        let b = reclassify(&raster(8, 8, reversed, Unit::Meters), &elevation_rule(), "e").unwrap();

        let a_cells = a.grid.as_slice();
        let b_cells = b.grid.as_slice();
        for i in 0..64 {
            assert_eq!(a_cells[i], b_cells[63 - i]);
            let expected = elevation_rule().classify(values[i]).unwrap().value();
            assert_eq!(a_cells[i], Some(expected));
        }
    }

    #[test]
    fn test_neighbours_do_not_influence_a_cell() {
        let mut cells = vec![Some(0.0f32); 9];
        cells[4] = Some(1200.0);
        let rule = elevation_rule();
        let isolated = reclassify(&raster(3, 3, cells.clone(), Unit::Meters), &rule, "e").unwrap();
        for (i, cell) in cells.iter_mut().enumerate() {
            if i != 4 {
                *cell = Some(5000.0);
            }
        }
        let surrounded = reclassify(&raster(3, 3, cells, Unit::Meters), &rule, "e").unwrap();
        assert_eq!(isolated.class_at(1, 1), surrounded.class_at(1, 1));
        assert_eq!(surrounded.class_at(1, 1), Some(3));
    }

    #[test]
    fn test_every_finite_value_lands_on_scale() {
        let values: Vec<Option<f32>> = (-50..50)
            .flat_map(|i| [Some(i as f32 * 0.37), Some(i as f32 * 123.457)])
            .chain([Some(f32::MAX), Some(f32::MIN), Some(0.0)])
            .collect();
        let n = values.len();
        for criterion in default_criteria() {
            let source = raster(n, 1, values.clone(), criterion.rule.unit());
            let classified = reclassify(&source, &criterion.rule, &criterion.name).unwrap();
            assert!(
                classified.grid.as_slice().iter().all(|c| matches!(c, Some(1..=4))),
                "{}",
                criterion.name
            );
        }
    }
}
