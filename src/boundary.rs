//! Administrative boundary polygons and a static geometry catalogue.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuitabilityError};
use crate::providers::GeometryProvider;
use crate::raster::Extent;

/// Simplified national outline of Kenya (lon, lat), ~0.3 degree fidelity.
const KENYA_OUTLINE: &[(f64, f64)] = &[
    (33.99, 4.22),
    (34.39, 4.61),
    (35.30, 5.51),
    (35.82, 5.34),
    (35.82, 4.78),
    (36.16, 4.45),
    (38.12, 3.60),
    (38.67, 3.62),
    (39.56, 3.42),
    (40.77, 4.26),
    (41.86, 3.92),
    (40.99, 2.78),
    (40.99, -0.86),
    (41.58, -1.68),
    (40.95, -2.20),
    (40.25, -2.90),
    (40.15, -3.30),
    (39.75, -3.95),
    (39.70, -4.20),
    (39.22, -4.68),
    (37.77, -3.68),
    (37.70, -3.10),
    (33.92, -1.00),
    (33.89, 0.11),
    (34.18, 0.51),
    (34.67, 1.18),
    (35.04, 1.91),
    (34.47, 3.56),
];

/// An immutable polygon region. Rings combine by the even-odd rule, so an inner
/// ring punches a hole and a disjoint ring adds an island.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Boundary {
    name: String,
    rings: Vec<Vec<(f64, f64)>>,
    #[serde(skip)]
    bbox: Extent,
}

#[derive(Deserialize)]
struct RawBoundary {
    name: String,
    rings: Vec<Vec<(f64, f64)>>,
}

impl<'de> Deserialize<'de> for Boundary {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawBoundary::deserialize(deserializer)?;
        Boundary::new(raw.name, raw.rings).map_err(serde::de::Error::custom)
    }
}

impl Boundary {
    pub fn new(name: impl Into<String>, rings: Vec<Vec<(f64, f64)>>) -> Result<Self> {
        if rings.is_empty() {
            return Err(SuitabilityError::ShapeMismatch("boundary has no rings".into()));
        }
        if let Some(ring) = rings.iter().find(|r| r.len() < 3) {
            return Err(SuitabilityError::ShapeMismatch(format!(
                "boundary ring has {} vertices, need at least 3",
                ring.len()
            )));
        }

        Ok(Self::from_valid_rings(name.into(), rings))
    }

    fn from_valid_rings(name: String, rings: Vec<Vec<(f64, f64)>>) -> Self {
        let mut bbox = Extent {
            west: f64::MAX,
            south: f64::MAX,
            east: f64::MIN,
            north: f64::MIN,
        };
        for &(x, y) in rings.iter().flatten() {
            bbox.west = bbox.west.min(x);
            bbox.east = bbox.east.max(x);
            bbox.south = bbox.south.min(y);
            bbox.north = bbox.north.max(y);
        }

        Self { name, rings, bbox }
    }

    /// Axis-aligned rectangle; handy for tests and synthetic scenes.
    pub fn rectangle(name: impl Into<String>, extent: Extent) -> Self {
        let ring = vec![
            (extent.west, extent.north),
            (extent.east, extent.north),
            (extent.east, extent.south),
            (extent.west, extent.south),
        ];
        Self {
            name: name.into(),
            rings: vec![ring],
            bbox: extent,
        }
    }

    pub fn kenya() -> Self {
        Self::from_valid_rings("Kenya".to_string(), vec![KENYA_OUTLINE.to_vec()])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bbox(&self) -> Extent {
        self.bbox
    }

    /// Even-odd ray casting against every ring.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !self.bbox.contains(x, y) {
            return false;
        }
        let mut inside = false;
        for ring in &self.rings {
            let n = ring.len();
            let mut j = n - 1;
            for i in 0..n {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

/// In-memory region catalogue keyed by region name (case-insensitive).
#[derive(Clone, Debug, Default)]
pub struct StaticGeometryProvider {
    regions: HashMap<String, Arc<Boundary>>,
}

impl StaticGeometryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue preloaded with the built-in outlines.
    pub fn with_builtin_regions() -> Self {
        let mut provider = Self::new();
        provider.insert(Boundary::kenya());
        provider
    }

    pub fn insert(&mut self, boundary: Boundary) {
        self.regions
            .insert(boundary.name().to_lowercase(), Arc::new(boundary));
    }

    /// Register every boundary in a JSON file holding an array of
    /// `{ "name": ..., "rings": [[[lon, lat], ...], ...] }` objects.
    pub fn load_json(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let boundaries: Vec<Boundary> = serde_json::from_str(&text)?;
        let count = boundaries.len();
        for boundary in boundaries {
            self.insert(boundary);
        }
        Ok(count)
    }
}

impl GeometryProvider for StaticGeometryProvider {
    fn boundary(&self, region_key: &str) -> Result<Arc<Boundary>> {
        self.regions
            .get(&region_key.to_lowercase())
            .cloned()
            .ok_or_else(|| SuitabilityError::RegionNotFound(region_key.to_string()))
    }
}
