//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::criteria::{self, SuitabilityCriterion};
use crate::error::Result;
use crate::synthetic::SyntheticParams;

/// Everything that parameterises an analysis run. Loaded from JSON; fields
/// missing from the file keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Region looked up from the geometry provider.
    pub region: String,
    /// Catalogue the region outline comes from (recorded, not fetched).
    pub boundary_source: String,
    /// Optional JSON file of extra boundary polygons.
    pub boundaries_file: Option<PathBuf>,
    pub export_folder: String,
    /// Export resolution in metres.
    pub export_scale: f64,
    /// Zonal statistics sampling resolution in metres.
    pub stats_scale: f64,
    pub crs: String,
    pub max_pixels: u64,
    pub output_dir: PathBuf,
    pub render: bool,
    pub parallel: bool,
    pub synthetic: SyntheticParams,
    pub criteria: Vec<SuitabilityCriterion>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            region: "Kenya".to_string(),
            boundary_source: "FAO/GAUL/2015/level0".to_string(),
            boundaries_file: None,
            export_folder: "Banana_reclassified_V2".to_string(),
            export_scale: 100.0,
            stats_scale: 1000.0,
            crs: "EPSG:4326".to_string(),
            max_pixels: 10_000_000_000_000,
            output_dir: PathBuf::from("output"),
            render: true,
            parallel: true,
            synthetic: SyntheticParams::default(),
            criteria: criteria::default_criteria(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Keep only the named criteria, in configuration order. Returns the names
    /// that matched nothing.
    pub fn retain_criteria(&mut self, names: &[String]) -> Vec<String> {
        let unknown = names
            .iter()
            .filter(|n| !self.criteria.iter().any(|c| c.name.eq_ignore_ascii_case(n)))
            .cloned()
            .collect();
        self.criteria
            .retain(|c| names.iter().any(|n| c.name.eq_ignore_ascii_case(n)));
        unknown
    }
}
