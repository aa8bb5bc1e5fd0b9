use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_color32(hue: f32, saturation: f32, lightness: f32) -> Color32 {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| hsl_to_color32((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

/// Density ramp from dark purple (`t = 0`) to yellow (`t = 1`).
pub fn density_color(t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    hsl_to_color32(280.0 - 220.0 * t, 0.8, 0.25 + 0.35 * t)
}

// ---------------------------------------------------------------------------
// Color mapping: target name → Color32
// ---------------------------------------------------------------------------

/// Maps target names to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = names.into_iter().collect();
        let mapping = names
            .iter()
            .zip(generate_palette(names.len()))
            .map(|(n, c)| (n.to_string(), c))
            .collect();
        ColorMap {
            mapping,
            default_color: Color32::LIGHT_BLUE,
        }
    }

    pub fn color_for(&self, name: &str) -> Color32 {
        self.mapping
            .get(name)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        for i in 0..p.len() {
            for j in i + 1..p.len() {
                assert_ne!(p[i], p[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_color_map_lookup() {
        let cm = ColorMap::new(["Omega Centauri", "47 Tucanae"]);
        assert_ne!(cm.color_for("Omega Centauri"), cm.color_for("47 Tucanae"));
        assert_eq!(cm.color_for("M4"), Color32::LIGHT_BLUE);
    }

    #[test]
    fn test_density_ramp_ends_differ() {
        assert_ne!(density_color(0.0), density_color(1.0));
        assert_eq!(density_color(-1.0), density_color(0.0));
    }
}
