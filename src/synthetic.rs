//! Offline stand-in for the remote data catalogue.
//!
//! Generates co-registered layers over Kenya from seeded noise, shaped so the
//! broad geography is recognisable: a central highland dome with Mt Kenya and
//! Mt Elgon, a low coastal plain in the south-east, a wet Lake Victoria basin,
//! an arid and windy north. The same seed always produces the same layers.

use chrono::Datelike;
use noise::{NoiseFn, Perlin, Seedable};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boundary::Boundary;
use crate::criteria::{
    DateRange, MODIS_LST_DATASET, SRTM_DATASET, WIND_ATLAS_DATASET, WORLDCLIM_DATASET,
};
use crate::error::{Result, SuitabilityError};
use crate::providers::DataProvider;
use crate::raster::{Extent, GeoReference, Grid, Raster, Unit};

/// Longest collection the provider will composite, in days.
const MAX_FRAMES: usize = 366;

/// Share of cells lost to cloud in a daily LST frame.
const CLOUD_FRACTION: f64 = 0.08;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    /// Area covered; `None` covers the Kenya outline's bounding box.
    pub extent: Option<Extent>,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            width: 320,
            height: 360,
            seed: 42,
            extent: None,
        }
    }
}

pub struct SyntheticProvider {
    params: SyntheticParams,
    geo: GeoReference,
    terrain_noise: Perlin,
    moisture_noise: Perlin,
    wind_noise: Perlin,
    weather_noise: Perlin,
}

/// Fractional Brownian motion over 2D Perlin noise, normalised to about [-1, 1].
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    total / max_value
}

fn bump(lon: f64, lat: f64, center: (f64, f64), radius: f64) -> f64 {
    let d2 = (lon - center.0).powi(2) + (lat - center.1).powi(2);
    (-d2 / (2.0 * radius * radius)).exp()
}

fn ramp(value: f64, from: f64, to: f64) -> f64 {
    ((value - from) / (to - from)).clamp(0.0, 1.0)
}

impl SyntheticProvider {
    pub fn new(params: SyntheticParams) -> Self {
        let extent = params.extent.unwrap_or_else(|| {
            let bbox = Boundary::kenya().bbox();
            Extent {
                west: bbox.west - 0.1,
                south: bbox.south - 0.1,
                east: bbox.east + 0.1,
                north: bbox.north + 0.1,
            }
        });
        let geo = GeoReference::fit_extent(extent, params.width, params.height, "EPSG:4326");
        let seed = params.seed as u32;

        Self {
            terrain_noise: Perlin::new(1).set_seed(seed),
            moisture_noise: Perlin::new(1).set_seed(seed.wrapping_add(1111)),
            wind_noise: Perlin::new(1).set_seed(seed.wrapping_add(2222)),
            weather_noise: Perlin::new(1).set_seed(seed.wrapping_add(3333)),
            params,
            geo,
        }
    }

    /// Elevation in metres at a point.
    fn elevation_at(&self, lon: f64, lat: f64) -> f64 {
        // plateau falling to the Indian Ocean coast
        let plateau = 150.0 + 950.0 * ramp(41.0 - lon + 0.3 * lat, 0.0, 4.0);
        let highlands = 1500.0 * bump(lon, lat, (36.4, -0.4), 1.4);
        let mt_kenya = 2600.0 * bump(lon, lat, (37.31, -0.15), 0.18);
        let mt_elgon = 1800.0 * bump(lon, lat, (34.55, 1.13), 0.15);
        let turkana = -450.0 * bump(lon, lat, (36.1, 3.6), 0.9);
        let detail = 260.0 * fbm(&self.terrain_noise, lon * 0.9, lat * 0.9, 5);

        (plateau + highlands + mt_kenya + mt_elgon + turkana + detail).clamp(-10.0, 5200.0)
    }

    /// Annual precipitation in mm at a point.
    fn precipitation_at(&self, lon: f64, lat: f64, elevation: f64) -> f64 {
        let orographic = 0.42 * elevation;
        let victoria = 850.0 * bump(lon, lat, (34.4, 0.0), 1.1);
        let coast = 450.0 * ramp(lon, 38.8, 40.0) * ramp(-lat, 1.0, 3.0);
        let north = 550.0 * ramp(lat, 0.5, 3.5);
        let east = 250.0 * ramp(lon, 38.5, 41.0) * ramp(lat, -1.0, 1.5);
        let aridity = north + east;
        let detail = 180.0 * fbm(&self.moisture_noise, lon * 0.7, lat * 0.7, 4);

        (420.0 + orographic + victoria + coast - aridity + detail).clamp(200.0, 2400.0)
    }

    /// Mean daytime land surface temperature in °C for a frame index.
    fn temperature_at(&self, lon: f64, lat: f64, elevation: f64, frame: usize) -> f64 {
        let lapse = -6.5 * elevation / 1000.0;
        let daily = 2.0 * self.weather_noise.get([lon * 0.6, lat * 0.6, frame as f64 * 0.37]);
        33.5 + lapse + 2.5 * ramp(lat, 0.0, 4.0) + daily
    }

    /// Mean wind speed at 100 m in m/s.
    fn wind_at(&self, lon: f64, lat: f64, elevation: f64) -> f64 {
        let north = 7.0 * ramp(lat, 0.5, 3.5);
        let coast = 2.0 * ramp(lon, 39.0, 40.5);
        let ridges = 2.5 * ramp(elevation, 1800.0, 3500.0);
        let detail = 2.5 * fbm(&self.wind_noise, lon * 1.2, lat * 1.2, 4);
        (5.0 + north + coast + ridges + detail).clamp(2.0, 18.0)
    }

    fn layer(&self, unit: Unit, f: impl Fn(f64, f64) -> f64 + Sync + Send) -> Raster {
        let blank: Grid<Option<f32>> = Grid::new_with(self.params.width, self.params.height, None);
        let grid = blank.par_map(|x, y, _| {
            let (lon, lat) = self.geo.cell_center(x, y);
            Some(f(lon, lat) as f32)
        });
        Raster::new(grid, self.geo.clone(), unit)
    }

    fn lst_frames(&self, range: &DateRange) -> Result<Vec<Raster>> {
        let days: Vec<_> = range.days().take(MAX_FRAMES + 1).collect();
        if days.len() > MAX_FRAMES {
            return Err(SuitabilityError::Unavailable(format!(
                "collections are limited to {MAX_FRAMES} daily frames"
            )));
        }

        let cells = self.params.width * self.params.height;
        let frames = days
            .iter()
            .enumerate()
            .map(|(frame, day)| {
                let mut rng = ChaCha8Rng::seed_from_u64(
                    self.params.seed ^ (day.num_days_from_ce() as u64).wrapping_mul(0x9E37_79B9),
                );
                let cloud: Vec<bool> = (0..cells).map(|_| rng.gen_bool(CLOUD_FRACTION)).collect();

                let raster = self.layer(Unit::DigitalNumber, |lon, lat| {
                    let t = self.temperature_at(lon, lat, self.elevation_at(lon, lat), frame);
                    ((t + 273.15) / 0.02).round()
                });
                let width = self.params.width;
                let grid = raster
                    .grid
                    .par_map(|x, y, cell| cell.filter(|_| !cloud[y * width + x]));
                Raster::new(grid, raster.geo, raster.unit)
            })
            .collect();
        Ok(frames)
    }
}

impl DataProvider for SyntheticProvider {
    fn frames(
        &self,
        dataset_id: &str,
        band: &str,
        date_range: Option<&DateRange>,
    ) -> Result<Vec<Raster>> {
        debug!(dataset_id, band, "generating synthetic layer");
        let frames = match (dataset_id, band) {
            (SRTM_DATASET, "elevation") => {
                vec![self.layer(Unit::Meters, |lon, lat| self.elevation_at(lon, lat))]
            }
            (WORLDCLIM_DATASET, "bio12") => vec![self.layer(Unit::MillimetersPerYear, |lon, lat| {
                self.precipitation_at(lon, lat, self.elevation_at(lon, lat))
            })],
            (WIND_ATLAS_DATASET, "b1") => vec![self.layer(Unit::MetersPerSecond, |lon, lat| {
                self.wind_at(lon, lat, self.elevation_at(lon, lat))
            })],
            (MODIS_LST_DATASET, "LST_Day_1km") => {
                let range = date_range.ok_or_else(|| {
                    SuitabilityError::Unavailable(format!("{dataset_id} requires a date range"))
                })?;
                if range.is_empty() {
                    return Err(SuitabilityError::Unavailable(format!(
                        "{dataset_id} has no frames between {} and {}",
                        range.start, range.end
                    )));
                }
                self.lst_frames(range)?
            }
            _ => {
                return Err(SuitabilityError::DatasetNotFound(format!(
                    "{dataset_id}/{band}"
                )))
            }
        };
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria;
    use chrono::NaiveDate;

    fn provider() -> SyntheticProvider {
        SyntheticProvider::new(SyntheticParams {
            width: 48,
            height: 56,
            seed: 7,
            extent: None,
        })
    }

    fn at(raster: &Raster, lon: f64, lat: f64) -> f32 {
        let (x, y) = raster
            .geo
            .cell_at(lon, lat, raster.width(), raster.height())
            .unwrap();
        raster.value(x, y).unwrap()
    }

    #[test]
    fn test_layers_stay_in_physical_ranges() {
        let p = provider();
        let checks = [
            (criteria::elevation(), -10.0, 5200.0),
            (criteria::precipitation(), 200.0, 2400.0),
            (criteria::wind_speed(), 2.0, 18.0),
        ];
        for (criterion, lo, hi) in checks {
            let raster = p.fetch(&criterion.request).unwrap();
            let (min, max) = raster.value_range().unwrap();
            assert!(min >= lo && max <= hi, "{}: {min}..{max}", criterion.name);
            assert_eq!(raster.valid_count(), 48 * 56);
        }
    }

    #[test]
    fn test_highlands_are_higher_than_the_coast() {
        let p = provider();
        let dem = p.fetch(&criteria::elevation().request).unwrap();
        assert!(at(&dem, 36.8, -1.0) > 1500.0);
        assert!(at(&dem, 39.9, -3.6) < 700.0);
    }

    #[test]
    fn test_same_seed_same_layers() {
        let request = criteria::precipitation().request;
        let a = provider().fetch(&request).unwrap();
        let b = provider().fetch(&request).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_temperature_composite_is_plausible() {
        let p = provider();
        let raster = p.fetch(&criteria::temperature().request).unwrap();
        assert_eq!(raster.unit, Unit::Celsius);
        let (min, max) = raster.value_range().unwrap();
        assert!(min > -15.0 && max < 45.0, "{min}..{max}");
    }

    #[test]
    fn test_daily_frames_have_cloud_gaps() {
        let p = provider();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 4).unwrap(),
        );
        let frames = p.frames(MODIS_LST_DATASET, "LST_Day_1km", Some(&range)).unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.unit, Unit::DigitalNumber);
            assert!(frame.valid_count() < 48 * 56);
        }
    }

    #[test]
    fn test_unknown_dataset_and_empty_range() {
        let p = provider();
        assert!(matches!(
            p.frames("NASA/NOPE", "b1", None),
            Err(SuitabilityError::DatasetNotFound(_))
        ));
        assert!(matches!(
            p.frames(SRTM_DATASET, "bio12", None),
            Err(SuitabilityError::DatasetNotFound(_))
        ));
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let empty = DateRange::new(day, day);
        let err = p
            .frames(MODIS_LST_DATASET, "LST_Day_1km", Some(&empty))
            .unwrap_err();
        assert!(matches!(err, SuitabilityError::Unavailable(_)));
    }
}
