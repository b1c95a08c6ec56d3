//! Per-criterion suitability pipeline and the multi-criterion driver.
//!
//! Each criterion runs `fetch -> clip -> reclassify -> clip` and then fans out
//! to statistics, visualization and export. Criteria share only the read-only
//! boundary, so they run in parallel on the rayon pool and a failure in one
//! never touches another. Even a failed region lookup is reported per criterion.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use crate::boundary::Boundary;
use crate::config::AnalysisConfig;
use crate::criteria::SuitabilityCriterion;
use crate::error::{Result, SuitabilityError};
use crate::providers::{
    Clipper, DataProvider, ExportDestination, ExportHandle, Exporter, GeometryProvider, Layer,
    Visualizer,
};
use crate::raster::ClassifiedRaster;
use crate::reclassify::reclassify;
use crate::zonal::{summarize, ZonalStats};

/// The external services a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub data: &'a dyn DataProvider,
    pub geometry: &'a dyn GeometryProvider,
    pub clipper: &'a dyn Clipper,
    pub exporter: &'a dyn Exporter,
    pub visualizer: &'a dyn Visualizer,
}

/// Run-wide settings shared by every criterion.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSettings {
    pub region: String,
    pub export_folder: String,
    pub export_scale: f64,
    pub stats_scale: f64,
    pub crs: String,
    pub max_pixels: u64,
    pub parallel: bool,
}

impl From<&AnalysisConfig> for RunSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            region: config.region.clone(),
            export_folder: config.export_folder.clone(),
            export_scale: config.export_scale,
            stats_scale: config.stats_scale,
            crs: config.crs.clone(),
            max_pixels: config.max_pixels,
            parallel: config.parallel,
        }
    }
}

/// What a criterion produced once classification succeeded. The export result
/// is kept separately so a classification stays usable when its export fails.
#[derive(Debug)]
pub struct CriterionOutcome {
    pub classified: ClassifiedRaster,
    pub stats: ZonalStats,
    pub export: Result<ExportHandle>,
}

#[derive(Debug)]
pub struct CriterionReport {
    pub name: String,
    /// Label the statistics are printed under.
    pub stats_label: String,
    pub outcome: Result<CriterionOutcome>,
}

impl CriterionReport {
    /// Classified, summarised and exported.
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(outcome) if outcome.export.is_ok())
    }

    /// The first error this criterion hit, if any.
    pub fn error(&self) -> Option<&SuitabilityError> {
        match &self.outcome {
            Err(e) => Some(e),
            Ok(outcome) => outcome.export.as_ref().err(),
        }
    }

    pub fn stats(&self) -> Option<&ZonalStats> {
        self.outcome.as_ref().ok().map(|o| &o.stats)
    }

    pub fn export(&self) -> Option<&ExportHandle> {
        self.outcome.as_ref().ok().and_then(|o| o.export.as_ref().ok())
    }
}

/// Take one criterion from its source dataset to an exported class raster.
pub fn run_criterion(
    criterion: &SuitabilityCriterion,
    boundary: &Boundary,
    collaborators: &Collaborators<'_>,
    settings: &RunSettings,
) -> Result<CriterionOutcome> {
    let raw = collaborators.data.fetch(&criterion.request)?;
    let clipped = collaborators.clipper.clip(&raw, boundary)?;
    info!(valid_cells = clipped.valid_count(), "source layer clipped");

    if let Some(view) = &criterion.raw_view {
        collaborators
            .visualizer
            .render(Layer::Raw(&clipped), &view.palette, &view.label);
    }

    let classified = reclassify(&clipped, &criterion.rule, &criterion.name)?;
    let classified = collaborators.clipper.clip_classified(&classified, boundary)?;

    let stats = summarize(&classified, boundary, settings.stats_scale)?;
    info!(stats = %stats, "zonal statistics");

    collaborators.visualizer.render(
        Layer::Classified(&classified),
        &criterion.palette,
        &criterion.layer_label,
    );

    let destination = ExportDestination {
        description: criterion.export.description.clone(),
        folder: settings.export_folder.clone(),
        file_name_prefix: criterion.export.file_name_prefix.clone(),
        region: boundary.bbox(),
        scale: settings.export_scale,
        crs: settings.crs.clone(),
    };
    let export = collaborators
        .exporter
        .submit(&classified, &destination, settings.max_pixels);
    if let Err(e) = &export {
        warn!(error = %e, retryable = e.is_retryable(), "export failed");
    }

    Ok(CriterionOutcome {
        classified,
        stats,
        export,
    })
}

fn report_for(
    criterion: &SuitabilityCriterion,
    collaborators: &Collaborators<'_>,
    settings: &RunSettings,
) -> CriterionReport {
    let span = info_span!("criterion", name = %criterion.name);
    let _enter = span.enter();

    let outcome = collaborators
        .geometry
        .boundary(&settings.region)
        .and_then(|boundary: Arc<Boundary>| {
            run_criterion(criterion, &boundary, collaborators, settings)
        });
    if let Err(e) = &outcome {
        error!(error = %e, retryable = e.is_retryable(), "criterion failed");
    }
    CriterionReport {
        name: criterion.name.clone(),
        stats_label: criterion.stats_label.clone(),
        outcome,
    }
}

/// Run every criterion against the configured region. Reports come back in
/// input order, one per criterion, whatever failed.
pub fn run_suitability_analysis(
    criteria: &[SuitabilityCriterion],
    collaborators: &Collaborators<'_>,
    settings: &RunSettings,
) -> Vec<CriterionReport> {
    info!(
        region = %settings.region,
        criteria = criteria.len(),
        parallel = settings.parallel,
        "starting suitability analysis"
    );

    if settings.parallel {
        criteria
            .par_iter()
            .map(|c| report_for(c, collaborators, settings))
            .collect()
    } else {
        criteria
            .iter()
            .map(|c| report_for(c, collaborators, settings))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::StaticGeometryProvider;
    use crate::classifier::SuitabilityClass::*;
    use crate::clip::PolygonClipper;
    use crate::criteria;
    use crate::export::RecordingExporter;
    use crate::providers::{MemoryProvider, NullVisualizer};
    use crate::raster::{Extent, GeoReference, Grid, Raster, Unit};
    use crate::synthetic::{SyntheticParams, SyntheticProvider};

    fn zone_extent() -> Extent {
        Extent {
            west: 0.0,
            south: 0.0,
            east: 0.04,
            north: 0.01,
        }
    }

    fn settings(parallel: bool) -> RunSettings {
        RunSettings {
            region: "Plot".into(),
            parallel,
            ..RunSettings::from(&AnalysisConfig::default())
        }
    }

    fn geometry() -> StaticGeometryProvider {
        let mut geometry = StaticGeometryProvider::new();
        geometry.insert(Boundary::rectangle("Plot", zone_extent()));
        geometry
    }

    /// Four ~1.1 km cells inside the plot plus one cell east of it.
    fn elevation_provider() -> MemoryProvider {
        let mut extent = zone_extent();
        extent.east = 0.05;
        let geo = GeoReference::fit_extent(extent, 5, 1, "EPSG:4326");
        let cells = vec![Some(100.0), Some(600.0), Some(1200.0), Some(2000.0), Some(50.0)];
        let raster = Raster::new(Grid::from_vec(5, 1, cells).unwrap(), geo, Unit::Meters);
        let mut provider = MemoryProvider::new();
        provider.insert(criteria::SRTM_DATASET, "elevation", raster);
        provider
    }

    #[test]
    fn test_elevation_end_to_end() {
        let data = elevation_provider();
        let geometry = geometry();
        let exporter = RecordingExporter::new();
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };

        let criteria = [criteria::elevation()];
        let reports = run_suitability_analysis(&criteria, &collaborators, &settings(false));
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.is_success(), "{:?}", report.error());

        let outcome = report.outcome.as_ref().unwrap();
        assert_eq!(
            outcome.classified.grid.as_slice(),
            &[Some(1), Some(2), Some(3), Some(4), None]
        );
        assert_eq!(outcome.stats.range(), Some((Unsuitable, HighlySuitable)));
        assert_eq!(outcome.stats.to_string(), "{min: 1, max: 4}");

        let submissions = exporter.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].criterion, "elevation");
        assert_eq!(submissions[0].destination.folder, "Banana_reclassified_V2");
        assert_eq!(submissions[0].destination.file_name_prefix, "reclassified_elevation_4class");
        assert_eq!(submissions[0].valid_cells, 4);
    }

    #[test]
    fn test_failures_stay_with_their_criterion() {
        // only elevation is available; the other four fail to fetch
        let data = elevation_provider();
        let geometry = geometry();
        let exporter = RecordingExporter::new();
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };

        let criteria = criteria::default_criteria();
        let reports = run_suitability_analysis(&criteria, &collaborators, &settings(true));

        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["elevation", "slope", "precipitation", "temperature", "wind_speed"]
        );
        assert!(reports[0].is_success());
        // slope derives from the same DEM
        assert!(reports[1].is_success());
        for report in &reports[2..] {
            assert!(matches!(
                report.error(),
                Some(SuitabilityError::DatasetNotFound(_))
            ));
        }
    }

    #[test]
    fn test_export_failure_keeps_classification() {
        let data = elevation_provider();
        let geometry = geometry();
        let exporter = RecordingExporter::new().reject("elevation");
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };

        let criteria = [criteria::elevation()];
        let reports = run_suitability_analysis(&criteria, &collaborators, &settings(true));
        let report = &reports[0];
        assert!(!report.is_success());
        assert!(report.error().unwrap().is_retryable());
        assert_eq!(report.stats().unwrap().to_string(), "{min: 1, max: 4}");
        assert!(report.export().is_none());
    }

    #[test]
    fn test_unknown_region_is_reported_per_criterion() {
        let data = elevation_provider();
        let geometry = StaticGeometryProvider::new();
        let exporter = RecordingExporter::new();
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };
        let criteria = criteria::default_criteria();
        let reports = run_suitability_analysis(&criteria, &collaborators, &settings(true));
        assert_eq!(reports.len(), 5);
        for report in &reports {
            assert!(!report.is_success());
            match report.error() {
                Some(SuitabilityError::RegionNotFound(key)) => assert_eq!(key, "Plot"),
                other => panic!("{}: unexpected {:?}", report.name, other),
            }
        }
        assert!(exporter.submissions().is_empty());
    }

    #[test]
    fn test_zone_without_overlap_is_empty_raster() {
        let data = elevation_provider();
        let mut geometry = StaticGeometryProvider::new();
        geometry.insert(Boundary::rectangle(
            "Plot",
            Extent {
                west: 10.0,
                south: 10.0,
                east: 11.0,
                north: 11.0,
            },
        ));
        let exporter = RecordingExporter::new();
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };
        let criteria = [criteria::elevation()];
        let reports = run_suitability_analysis(&criteria, &collaborators, &settings(false));
        assert!(matches!(reports[0].error(), Some(SuitabilityError::EmptyRaster)));
        assert!(exporter.submissions().is_empty());
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree() {
        let data = SyntheticProvider::new(SyntheticParams {
            width: 40,
            height: 48,
            seed: 3,
            extent: None,
        });
        let geometry = StaticGeometryProvider::with_builtin_regions();
        let exporter = RecordingExporter::new();
        let collaborators = Collaborators {
            data: &data,
            geometry: &geometry,
            clipper: &PolygonClipper,
            exporter: &exporter,
            visualizer: &NullVisualizer,
        };
        let criteria = criteria::default_criteria();
        let run = |parallel| {
            let settings = RunSettings {
                parallel,
                ..RunSettings::from(&AnalysisConfig::default())
            };
            run_suitability_analysis(&criteria, &collaborators, &settings)
        };

        let parallel = run(true);
        let sequential = run(false);
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.name, s.name);
            assert!(p.is_success(), "{}: {:?}", p.name, p.error());
            let (p, s) = (p.outcome.as_ref().unwrap(), s.outcome.as_ref().unwrap());
            assert_eq!(p.classified, s.classified);
            assert_eq!(p.stats, s.stats);
        }
    }
}
