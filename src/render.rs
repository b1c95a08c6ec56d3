//! Palette rendering of layers to PNG previews.

use std::path::PathBuf;

use image::{ImageBuffer, Rgb, RgbImage};
use tracing::{debug, warn};

use crate::criteria::Palette;
use crate::error::{Result, SuitabilityError};
use crate::providers::{Layer, Visualizer};

/// Background for no-data cells and for blending translucent colours.
const BACKGROUND: [u8; 3] = [255, 255, 255];

/// CSS colour name or `#rrggbb` hex triplet.
pub fn parse_color(spec: &str) -> Result<[u8; 3]> {
    let spec = spec.trim();
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(rgb) = u32::from_str_radix(hex, 16) {
                return Ok([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]);
            }
        }
        return Err(SuitabilityError::MalformedRule(format!("bad hex colour {spec:?}")));
    }
    let rgb = match spec.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "darkred" => [139, 0, 0],
        "orange" => [255, 165, 0],
        "yellow" => [255, 255, 0],
        "green" => [0, 128, 0],
        "darkgreen" => [0, 100, 0],
        "lime" => [0, 255, 0],
        "cyan" => [0, 255, 255],
        "blue" => [0, 0, 255],
        "navy" => [0, 0, 128],
        "purple" => [128, 0, 128],
        "brown" => [165, 42, 42],
        "gray" | "grey" => [128, 128, 128],
        _ => return Err(SuitabilityError::MalformedRule(format!("unknown colour {spec:?}"))),
    };
    Ok(rgb)
}

/// Colour ramp resolved from a palette.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRamp {
    min: f32,
    max: f32,
    stops: Vec<[u8; 3]>,
    opacity: f32,
}

impl ColorRamp {
    pub fn from_palette(palette: &Palette) -> Result<Self> {
        if palette.colors.is_empty() {
            return Err(SuitabilityError::MalformedRule("palette has no colours".into()));
        }
        let stops = palette
            .colors
            .iter()
            .map(|c| parse_color(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            min: palette.min,
            max: palette.max,
            stops,
            opacity: palette.opacity.clamp(0.0, 1.0),
        })
    }

    /// Linear interpolation between stops, clamped to `[min, max]`, then
    /// blended over white by opacity.
    pub fn color(&self, value: f32) -> [u8; 3] {
        let span = self.max - self.min;
        let t = if span > 0.0 {
            ((value - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let scaled = t * (self.stops.len() - 1) as f32;
        let idx = (scaled as usize).min(self.stops.len().saturating_sub(2));
        let frac = if self.stops.len() > 1 { scaled - idx as f32 } else { 0.0 };

        let c1 = self.stops[idx];
        let c2 = self.stops[(idx + 1).min(self.stops.len() - 1)];
        let mut out = [0u8; 3];
        for i in 0..3 {
            let c = c1[i] as f32 + (c2[i] as f32 - c1[i] as f32) * frac;
            let blended = c * self.opacity + BACKGROUND[i] as f32 * (1.0 - self.opacity);
            out[i] = blended.round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

pub fn render_layer(layer: Layer<'_>, ramp: &ColorRamp) -> RgbImage {
    let mut img: RgbImage = ImageBuffer::new(layer.width() as u32, layer.height() as u32);
    for y in 0..layer.height() {
        for x in 0..layer.width() {
            let color = match layer.value(x, y) {
                Some(v) if !v.is_nan() => ramp.color(v),
                _ => BACKGROUND,
            };
            img.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }
    img
}

/// Turn a layer label into a file stem: "Mean Wind Speed (100m)" -> "mean_wind_speed_100m".
pub fn file_stem(label: &str) -> String {
    let mut stem = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('_') && !stem.is_empty() {
            stem.push('_');
        }
    }
    stem.trim_end_matches('_').to_string()
}

/// Writes `<output_dir>/<label>.png` previews.
#[derive(Clone, Debug)]
pub struct PngVisualizer {
    output_dir: PathBuf,
}

impl PngVisualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn try_render(&self, layer: Layer<'_>, palette: &Palette, label: &str) -> Result<PathBuf> {
        let ramp = ColorRamp::from_palette(palette)?;
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.png", file_stem(label)));
        render_layer(layer, &ramp).save(&path)?;
        Ok(path)
    }
}

impl Visualizer for PngVisualizer {
    fn render(&self, layer: Layer<'_>, palette: &Palette, label: &str) {
        match self.try_render(layer, palette, label) {
            Ok(path) => debug!(label, path = %path.display(), "layer rendered"),
            Err(e) => warn!(label, error = %e, "failed to render layer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::tests::unit_geo;
    use crate::raster::{ClassifiedRaster, Grid};

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("red").unwrap(), [255, 0, 0]);
        assert_eq!(parse_color("DarkRed").unwrap(), [139, 0, 0]);
        assert_eq!(parse_color("#1a2B3c").unwrap(), [0x1a, 0x2b, 0x3c]);
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#zzzzzz").is_err());
        assert!(parse_color("mauvish").is_err());
    }

    #[test]
    fn test_four_class_ramp_hits_each_colour() {
        let mut palette = Palette::four_class();
        palette.opacity = 1.0;
        let ramp = ColorRamp::from_palette(&palette).unwrap();
        assert_eq!(ramp.color(1.0), [255, 0, 0]);
        assert_eq!(ramp.color(2.0), [255, 165, 0]);
        assert_eq!(ramp.color(3.0), [255, 255, 0]);
        assert_eq!(ramp.color(4.0), [0, 128, 0]);
        // clamped outside the range
        assert_eq!(ramp.color(-10.0), [255, 0, 0]);
        assert_eq!(ramp.color(99.0), [0, 128, 0]);
    }

    #[test]
    fn test_opacity_blends_over_white() {
        let ramp = ColorRamp::from_palette(&Palette::new(0.0, 1.0, &["black"], 0.5)).unwrap();
        assert_eq!(ramp.color(0.3), [128, 128, 128]);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Mean Wind Speed (100m)"), "mean_wind_speed_100m");
        assert_eq!(
            file_stem("Reclassified Elevation for Bananas"),
            "reclassified_elevation_for_bananas"
        );
    }

    #[test]
    fn test_visualizer_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid::from_vec(2, 2, vec![Some(1u8), Some(2), None, Some(4)]).unwrap();
        let classified = ClassifiedRaster::new(grid, unit_geo(), "elevation");
        let visualizer = PngVisualizer::new(dir.path());
        visualizer.render(
            Layer::Classified(&classified),
            &Palette::four_class(),
            "Reclassified Elevation for Bananas",
        );

        let img = image::open(dir.path().join("reclassified_elevation_for_bananas.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 1).0, BACKGROUND);
    }

    #[test]
    fn test_bad_palette_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid::from_vec(1, 1, vec![Some(1u8)]).unwrap();
        let classified = ClassifiedRaster::new(grid, unit_geo(), "e");
        let palette = Palette::new(1.0, 4.0, &["not-a-colour"], 1.0);
        PngVisualizer::new(dir.path()).render(Layer::Classified(&classified), &palette, "broken");
        assert!(!dir.path().join("broken.png").exists());
    }
}
