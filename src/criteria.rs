//! The five banana suitability criteria as plain configuration values.
//!
//! Each criterion bundles where its source layer comes from, the breakpoint table
//! for its native unit, how it is drawn, and how its export is named. Criteria
//! share nothing and can be evaluated in any order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classifier::{BreakpointRule, SuitabilityClass};
use crate::raster::Unit;

use SuitabilityClass::*;

pub const SRTM_DATASET: &str = "USGS/SRTMGL1_003";
pub const WORLDCLIM_DATASET: &str = "WORLDCLIM/V1/BIO";
pub const MODIS_LST_DATASET: &str = "MODIS/061/MOD11A1";
pub const WIND_ATLAS_DATASET: &str = "projects/ee-wonyancha22/assets/KEN_wind-speed_100m";

/// Half-open date interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d < self.end)
    }
}

/// Temporal reduction applied to a multi-frame collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Mean,
}

/// Linear conversion `value * scale + offset`, e.g. MODIS LST DN to °C.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueTransform {
    pub scale: f32,
    pub offset: f32,
}

/// A layer computed from the fetched one rather than fetched directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Terrain slope in percent rise, from an elevation model.
    SlopePercent,
}

/// Everything the data provider needs to produce a criterion's source layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub dataset_id: String,
    pub band: String,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub reduction: Option<Reduction>,
    #[serde(default)]
    pub transform: Option<ValueTransform>,
    #[serde(default)]
    pub derivation: Option<Derivation>,
    /// Unit of the layer once transform and derivation are applied.
    pub unit: Unit,
}

impl DatasetRequest {
    pub fn image(dataset_id: &str, band: &str, unit: Unit) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            band: band.to_string(),
            date_range: None,
            reduction: None,
            transform: None,
            derivation: None,
            unit,
        }
    }
}

/// Presentation-only colour ramp. Never consulted by classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub min: f32,
    pub max: f32,
    pub colors: Vec<String>,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

fn full_opacity() -> f32 {
    1.0
}

impl Palette {
    pub fn new(min: f32, max: f32, colors: &[&str], opacity: f32) -> Self {
        Self {
            min,
            max,
            colors: colors.iter().map(|c| c.to_string()).collect(),
            opacity,
        }
    }

    /// Red (unsuitable) to green (highly suitable) over classes 1..=4.
    pub fn four_class() -> Self {
        Self::new(1.0, 4.0, &["red", "orange", "yellow", "green"], 0.8)
    }
}

/// Export naming for one criterion; folder, scale and CRS come from the run config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportTarget {
    pub description: String,
    pub file_name_prefix: String,
}

/// Renders of the raw (pre-classification) layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLayerView {
    pub label: String,
    pub palette: Palette,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityCriterion {
    pub name: String,
    pub request: DatasetRequest,
    pub rule: BreakpointRule,
    pub layer_label: String,
    pub stats_label: String,
    pub palette: Palette,
    #[serde(default)]
    pub raw_view: Option<RawLayerView>,
    pub export: ExportTarget,
}

fn export_target(description: &str, prefix: &str) -> ExportTarget {
    ExportTarget {
        description: description.to_string(),
        file_name_prefix: prefix.to_string(),
    }
}

const JANUARY_2020: DateRange = DateRange {
    start: match NaiveDate::from_ymd_opt(2020, 1, 1) {
        Some(d) => d,
        None => panic!("invalid start date"),
    },
    end: match NaiveDate::from_ymd_opt(2020, 1, 31) {
        Some(d) => d,
        None => panic!("invalid end date"),
    },
};

/// SRTM elevation: lowlands are unsuitable, highlands above 1500 m best.
pub fn elevation() -> SuitabilityCriterion {
    SuitabilityCriterion {
        name: "elevation".to_string(),
        request: DatasetRequest::image(SRTM_DATASET, "elevation", Unit::Meters),
        rule: BreakpointRule::four_class_literal(
            Unit::Meters,
            [500.0, 1000.0, 1500.0],
            [Unsuitable, MarginallySuitable, ModeratelySuitable, HighlySuitable],
        ),
        layer_label: "Reclassified Elevation for Bananas".to_string(),
        stats_label: "Elevation Suitability Stats".to_string(),
        palette: Palette::four_class(),
        raw_view: None,
        export: export_target("Reclassified_Elevation_4class", "reclassified_elevation_4class"),
    }
}

/// Slope derived from the SRTM model: flat ground is best.
pub fn slope() -> SuitabilityCriterion {
    let mut request = DatasetRequest::image(SRTM_DATASET, "elevation", Unit::Percent);
    request.derivation = Some(Derivation::SlopePercent);
    SuitabilityCriterion {
        name: "slope".to_string(),
        request,
        rule: BreakpointRule::four_class_literal(
            Unit::Percent,
            [2.0, 5.0, 8.0],
            [HighlySuitable, ModeratelySuitable, MarginallySuitable, Unsuitable],
        ),
        layer_label: "Reclassified Slope for Bananas".to_string(),
        stats_label: "Slope Suitability Stats".to_string(),
        palette: Palette::four_class(),
        raw_view: None,
        export: export_target("Reclassified_Slope_4class", "reclassified_slope_4class"),
    }
}

/// WorldClim BIO12 annual precipitation.
pub fn precipitation() -> SuitabilityCriterion {
    SuitabilityCriterion {
        name: "precipitation".to_string(),
        request: DatasetRequest::image(WORLDCLIM_DATASET, "bio12", Unit::MillimetersPerYear),
        rule: BreakpointRule::four_class_literal(
            Unit::MillimetersPerYear,
            [1000.0, 1400.0, 1800.0],
            [Unsuitable, MarginallySuitable, ModeratelySuitable, HighlySuitable],
        ),
        layer_label: "Reclassified Rainfall for Bananas".to_string(),
        stats_label: "Banana Rainfall Suitability Stats".to_string(),
        palette: Palette::four_class(),
        raw_view: Some(RawLayerView {
            label: "Annual Precipitation for Kenya".to_string(),
            palette: Palette::new(
                500.0,
                2500.0,
                &["orange", "yellow", "green", "cyan", "blue"],
                1.0,
            ),
        }),
        export: export_target("Reclassified_Rainfall_4class", "reclassified_rainfall_4class"),
    }
}

/// MODIS daytime land surface temperature, January 2020 mean, in °C.
/// The optimum is the interior 18..26 °C band.
pub fn temperature() -> SuitabilityCriterion {
    let mut request = DatasetRequest::image(MODIS_LST_DATASET, "LST_Day_1km", Unit::Celsius);
    request.date_range = Some(JANUARY_2020);
    request.reduction = Some(Reduction::Mean);
    request.transform = Some(ValueTransform {
        scale: 0.02,
        offset: -273.15,
    });
    SuitabilityCriterion {
        name: "temperature".to_string(),
        request,
        rule: BreakpointRule::four_class_literal(
            Unit::Celsius,
            [10.0, 18.0, 26.0],
            [Unsuitable, MarginallySuitable, HighlySuitable, ModeratelySuitable],
        ),
        layer_label: "Reclassified Temperature for Bananas".to_string(),
        stats_label: "Banana Temperature Suitability Stats".to_string(),
        palette: Palette::four_class(),
        raw_view: Some(RawLayerView {
            label: "Mean Temperature for Kenya".to_string(),
            palette: Palette::new(
                10.0,
                40.0,
                &["blue", "cyan", "green", "yellow", "orange", "red", "darkred"],
                1.0,
            ),
        }),
        export: export_target(
            "Reclassified_Temperature_4class",
            "reclassified_temperature_bananas",
        ),
    }
}

/// Global Wind Atlas mean wind speed at 100 m. Moderate wind is best,
/// calm air is tolerable, strong wind damages the leaves.
pub fn wind_speed() -> SuitabilityCriterion {
    SuitabilityCriterion {
        name: "wind_speed".to_string(),
        request: DatasetRequest::image(WIND_ATLAS_DATASET, "b1", Unit::MetersPerSecond),
        rule: BreakpointRule::four_class_literal(
            Unit::MetersPerSecond,
            [5.0, 10.0, 15.0],
            [ModeratelySuitable, HighlySuitable, MarginallySuitable, Unsuitable],
        ),
        layer_label: "Wind Suitability for Bananas".to_string(),
        stats_label: "Reclassified Wind Suitability Stats".to_string(),
        palette: Palette::four_class(),
        raw_view: Some(RawLayerView {
            label: "Mean Wind Speed (100m)".to_string(),
            palette: Palette::new(0.0, 20.0, &["blue", "green", "yellow", "orange", "red"], 1.0),
        }),
        export: export_target("Reclassified_Wind_4class", "reclassified_wind_4class"),
    }
}

pub fn default_criteria() -> Vec<SuitabilityCriterion> {
    vec![
        elevation(),
        slope(),
        precipitation(),
        temperature(),
        wind_speed(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(criterion: &SuitabilityCriterion, value: f32) -> u8 {
        criterion.rule.classify(value).unwrap().value()
    }

    #[test]
    fn test_default_criteria_are_distinct() {
        let criteria = default_criteria();
        assert_eq!(criteria.len(), 5);
        let mut names: Vec<_> = criteria.iter().map(|c| c.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
        for c in &criteria {
            assert_eq!(c.rule.unit(), c.request.unit, "{}", c.name);
        }
    }

    #[test]
    fn test_default_rules_pass_validation() {
        for c in default_criteria() {
            let revalidated = BreakpointRule::new(c.rule.unit(), c.rule.breaks().to_vec());
            assert_eq!(revalidated.unwrap(), c.rule, "{}", c.name);
        }
    }

    #[test]
    fn test_rule_tables() {
        let elevation = elevation();
        assert_eq!(class_of(&elevation, 499.0), 1);
        assert_eq!(class_of(&elevation, 500.0), 2);
        assert_eq!(class_of(&elevation, 1499.0), 3);
        assert_eq!(class_of(&elevation, 1500.0), 4);

        let slope = slope();
        assert_eq!(class_of(&slope, 0.0), 4);
        assert_eq!(class_of(&slope, 2.0), 3);
        assert_eq!(class_of(&slope, 5.0), 2);
        assert_eq!(class_of(&slope, 8.0), 1);

        let rain = precipitation();
        assert_eq!(class_of(&rain, 999.0), 1);
        assert_eq!(class_of(&rain, 1000.0), 2);
        assert_eq!(class_of(&rain, 1400.0), 3);
        assert_eq!(class_of(&rain, 1800.0), 4);
    }

    #[test]
    fn test_temperature_literals() {
        let t = temperature();
        assert_eq!(class_of(&t, 5.0), 1);
        assert_eq!(class_of(&t, 15.0), 2);
        assert_eq!(class_of(&t, 22.0), 4);
        assert_eq!(class_of(&t, 30.0), 3);
    }

    #[test]
    fn test_wind_literals() {
        let w = wind_speed();
        assert_eq!(class_of(&w, 3.0), 3);
        assert_eq!(class_of(&w, 7.0), 4);
        assert_eq!(class_of(&w, 12.0), 2);
        assert_eq!(class_of(&w, 18.0), 1);
    }

    #[test]
    fn test_temperature_request_is_january_mean() {
        let t = temperature();
        let range = t.request.date_range.unwrap();
        assert_eq!(range.days().count(), 30);
        assert!(range.contains(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()));
        assert_eq!(t.request.reduction, Some(Reduction::Mean));
    }

    #[test]
    fn test_criterion_round_trips_through_json() {
        let original = temperature();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: SuitabilityCriterion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
