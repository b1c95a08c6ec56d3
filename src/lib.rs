//! Banana land-suitability analysis
//!
//! Reclassifies environmental rasters (elevation, slope, precipitation,
//! temperature, wind speed) into a four-class suitability scale, summarises
//! each over a national boundary and exports the class rasters.

pub mod boundary;
pub mod classifier;
pub mod clip;
pub mod composite;
pub mod config;
pub mod criteria;
pub mod error;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod raster;
pub mod reclassify;
pub mod render;
pub mod report;
pub mod synthetic;
pub mod terrain;
pub mod zonal;

pub use error::{Result, SuitabilityError};
