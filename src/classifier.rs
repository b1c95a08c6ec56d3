//! Breakpoint classification: continuous value -> ordinal suitability class.
//!
//! A [`BreakpointRule`] partitions the real line into consecutive half-open
//! intervals `[previous bound, bound)`. The last interval is unbounded and catches
//! everything above the final threshold. The class assigned to each interval is
//! arbitrary; temperature and wind peak in an interior band, so the lookup makes
//! no monotonicity assumption.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuitabilityError};
use crate::raster::Unit;

/// Ordinal suitability class on the fixed 1..=4 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SuitabilityClass {
    Unsuitable = 1,
    MarginallySuitable = 2,
    ModeratelySuitable = 3,
    HighlySuitable = 4,
}

impl SuitabilityClass {
    pub fn all() -> &'static [Self] {
        &[
            Self::Unsuitable,
            Self::MarginallySuitable,
            Self::ModeratelySuitable,
            Self::HighlySuitable,
        ]
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Unsuitable),
            2 => Ok(Self::MarginallySuitable),
            3 => Ok(Self::ModeratelySuitable),
            4 => Ok(Self::HighlySuitable),
            other => Err(SuitabilityError::ClassOutOfRange { value: other }),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Unsuitable => "Unsuitable",
            Self::MarginallySuitable => "Marginally Suitable",
            Self::ModeratelySuitable => "Moderately Suitable",
            Self::HighlySuitable => "Highly Suitable",
        }
    }
}

impl TryFrom<u8> for SuitabilityClass {
    type Error = SuitabilityError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<SuitabilityClass> for u8 {
    fn from(class: SuitabilityClass) -> u8 {
        class.value()
    }
}

impl fmt::Display for SuitabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value(), self.description())
    }
}

/// One interval of a rule table: values below `upper` (and at or above the
/// previous bound) map to `class`. `upper = None` is the unbounded catch-all.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub upper: Option<f32>,
    pub class: SuitabilityClass,
}

impl Breakpoint {
    pub fn below(upper: f32, class: SuitabilityClass) -> Self {
        Self {
            upper: Some(upper),
            class,
        }
    }

    pub fn rest(class: SuitabilityClass) -> Self {
        Self { upper: None, class }
    }
}

/// A validated, immutable rule table for one criterion's native unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakpointRule {
    unit: Unit,
    breaks: Vec<Breakpoint>,
}

#[derive(Deserialize)]
struct RawRule {
    unit: Unit,
    breaks: Vec<Breakpoint>,
}

impl<'de> Deserialize<'de> for BreakpointRule {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawRule::deserialize(deserializer)?;
        BreakpointRule::new(raw.unit, raw.breaks).map_err(serde::de::Error::custom)
    }
}

impl BreakpointRule {
    /// Validate and build a rule table.
    ///
    /// Fails with `MalformedRule` when the table is empty, when bounds are not
    /// strictly increasing finite numbers, when an unbounded entry appears
    /// anywhere but last, or when the final entry is bounded.
    pub fn new(unit: Unit, breaks: Vec<Breakpoint>) -> Result<Self> {
        if unit == Unit::SuitabilityClass {
            return Err(SuitabilityError::MalformedRule(
                "rules cannot be defined over suitability classes".into(),
            ));
        }
        let Some(last) = breaks.last() else {
            return Err(SuitabilityError::MalformedRule("rule table is empty".into()));
        };
        if last.upper.is_some() {
            return Err(SuitabilityError::MalformedRule(
                "final rule must be unbounded".into(),
            ));
        }

        let mut previous: Option<f32> = None;
        for (i, bp) in breaks[..breaks.len() - 1].iter().enumerate() {
            let Some(bound) = bp.upper else {
                return Err(SuitabilityError::MalformedRule(format!(
                    "rule {i} is unbounded but is not the last rule"
                )));
            };
            if !bound.is_finite() {
                return Err(SuitabilityError::MalformedRule(format!(
                    "rule {i} has non-finite bound {bound}"
                )));
            }
            if let Some(prev) = previous {
                if bound <= prev {
                    return Err(SuitabilityError::MalformedRule(format!(
                        "bounds must increase strictly: {bound} follows {prev}"
                    )));
                }
            }
            previous = Some(bound);
        }

        Ok(Self { unit, breaks })
    }

    /// Convenience constructor for the common four-interval tables: `thresholds`
    /// are the three cut points, `classes` the four classes from lowest to highest.
    pub fn four_class(
        unit: Unit,
        thresholds: [f32; 3],
        classes: [SuitabilityClass; 4],
    ) -> Result<Self> {
        Self::new(
            unit,
            vec![
                Breakpoint::below(thresholds[0], classes[0]),
                Breakpoint::below(thresholds[1], classes[1]),
                Breakpoint::below(thresholds[2], classes[2]),
                Breakpoint::rest(classes[3]),
            ],
        )
    }

    /// Built-in tables with literal, strictly increasing thresholds. Skips
    /// validation; every caller is covered by a test that revalidates it.
    pub(crate) fn four_class_literal(
        unit: Unit,
        thresholds: [f32; 3],
        classes: [SuitabilityClass; 4],
    ) -> Self {
        Self {
            unit,
            breaks: vec![
                Breakpoint::below(thresholds[0], classes[0]),
                Breakpoint::below(thresholds[1], classes[1]),
                Breakpoint::below(thresholds[2], classes[2]),
                Breakpoint::rest(classes[3]),
            ],
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn breaks(&self) -> &[Breakpoint] {
        &self.breaks
    }

    /// Classify a single value. NaN fails with `InvalidInput` (reported at cell 0, 0;
    /// the reclassifier reports the real cell position).
    pub fn classify(&self, value: f32) -> Result<SuitabilityClass> {
        classify(value, self).ok_or(SuitabilityError::InvalidInput { row: 0, col: 0 })
    }

    /// Bound of each interval as a printable `[lo, hi)` label.
    pub fn interval_labels(&self) -> Vec<(String, SuitabilityClass)> {
        let mut lower: Option<f32> = None;
        self.breaks
            .iter()
            .map(|bp| {
                let label = match (lower, bp.upper) {
                    (None, Some(hi)) => format!("< {hi}"),
                    (Some(lo), Some(hi)) => format!("[{lo}, {hi})"),
                    (Some(lo), None) => format!(">= {lo}"),
                    (None, None) => "any".to_string(),
                };
                lower = bp.upper;
                (label, bp.class)
            })
            .collect()
    }
}

/// Scan the table in ascending order and return the class of the first interval
/// whose bound exceeds `value`. Returns `None` only for NaN.
pub fn classify(value: f32, rule: &BreakpointRule) -> Option<SuitabilityClass> {
    if value.is_nan() {
        return None;
    }
    rule.breaks
        .iter()
        .find(|bp| bp.upper.map_or(true, |upper| value < upper))
        .map(|bp| bp.class)
}
