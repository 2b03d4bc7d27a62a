use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use log::warn;
use plotters::style::RGBColor;
use serde::Deserialize;

use crate::color::PaletteName;

// ---------------------------------------------------------------------------
// Output format
// ---------------------------------------------------------------------------

/// Output image format. The rendering backend draws PNG and SVG; SVG is what
/// the journal preset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Svg => ".svg",
        }
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// A partial style: every field optional so presets and command-line flags
/// can be layered. Also the schema of `--preset-file` JSON entries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub description: Option<String>,
    pub format: Option<ImageFormat>,
    pub dpi: Option<u32>,
    pub palette: Option<PaletteName>,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub grid_major: Option<f64>,
    pub grid_minor: Option<f64>,
    pub n_major_ticks: Option<usize>,
    pub n_minor_ticks: Option<usize>,
}

/// The three stock configurations.
pub fn builtin_presets() -> BTreeMap<String, Preset> {
    let mut presets = BTreeMap::new();
    presets.insert(
        "explore".to_string(),
        Preset {
            description: Some("Quick exploratory analysis".to_string()),
            format: Some(ImageFormat::Png),
            dpi: Some(300),
            palette: Some(PaletteName::Muted),
            grid_major: Some(0.2),
            grid_minor: Some(0.1),
            n_major_ticks: Some(8),
            n_minor_ticks: Some(2),
            ..Preset::default()
        },
    );
    presets.insert(
        "presentation".to_string(),
        Preset {
            description: Some("High-quality plots for presentations".to_string()),
            format: Some(ImageFormat::Png),
            dpi: Some(300),
            palette: Some(PaletteName::Vibrant),
            grid_major: Some(0.3),
            grid_minor: Some(0.15),
            n_major_ticks: Some(6),
            n_minor_ticks: Some(1),
            ..Preset::default()
        },
    );
    presets.insert(
        "journal".to_string(),
        Preset {
            description: Some("Publication-ready plots".to_string()),
            format: Some(ImageFormat::Svg),
            dpi: Some(600),
            palette: Some(PaletteName::Okabe),
            grid_major: Some(0.2),
            grid_minor: Some(0.1),
            n_major_ticks: Some(8),
            n_minor_ticks: Some(2),
            ..Preset::default()
        },
    );
    presets
}

/// Load additional presets from a user JSON file mapping name → preset.
pub fn load_preset_file(path: &Path) -> Result<BTreeMap<String, Preset>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading preset file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing preset file {}", path.display()))
}

/// Find a preset by name: user file entries shadow the builtins.
pub fn lookup_preset(name: &str, custom: &BTreeMap<String, Preset>) -> Result<Preset> {
    if let Some(preset) = custom.get(name) {
        return Ok(preset.clone());
    }
    if let Some(preset) = builtin_presets().get(name) {
        return Ok(preset.clone());
    }
    let mut known: Vec<String> = builtin_presets().keys().cloned().collect();
    known.extend(custom.keys().cloned());
    bail!("unknown preset '{name}' (available: {})", known.join(", "));
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// A text annotation placed at data coordinates.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: RGBColor,
    pub font_size: u32,
}

/// Parse `--annotate` values of the form `x,y,text[,color[,fontsize]]`.
/// Invalid entries are warned about and dropped, matching the tolerant
/// handling of the rest of the CLI surface.
pub fn parse_annotations(specs: &[String]) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    for spec in specs {
        let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            warn!("invalid annotation '{spec}': need at least x,y,text");
            continue;
        }
        let (Ok(x), Ok(y)) = (parts[0].parse::<f64>(), parts[1].parse::<f64>()) else {
            warn!("invalid annotation '{spec}': x and y must be numbers");
            continue;
        };
        let color = parts
            .get(3)
            .map(|name| parse_color(name))
            .unwrap_or(RGBColor(0, 0, 0));
        let font_size = parts.get(4).and_then(|s| s.parse().ok()).unwrap_or(10);
        annotations.push(Annotation {
            x,
            y,
            text: parts[2].to_string(),
            color,
            font_size,
        });
    }
    annotations
}

/// A small named-colour vocabulary plus `#RRGGBB`; anything else falls back
/// to black with a warning.
fn parse_color(name: &str) -> RGBColor {
    match name.to_ascii_lowercase().as_str() {
        "black" => RGBColor(0, 0, 0),
        "white" => RGBColor(255, 255, 255),
        "red" => RGBColor(211, 47, 47),
        "green" => RGBColor(56, 142, 60),
        "blue" => RGBColor(25, 118, 210),
        "orange" => RGBColor(230, 81, 0),
        "purple" => RGBColor(123, 31, 162),
        "gray" | "grey" => RGBColor(117, 117, 117),
        hex => {
            if let Some(rgb) = parse_hex(hex) {
                rgb
            } else {
                warn!("unknown annotation colour '{name}', using black");
                RGBColor(0, 0, 0)
            }
        }
    }
}

fn parse_hex(text: &str) -> Option<RGBColor> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(RGBColor(r, g, b))
}

// ---------------------------------------------------------------------------
// Resolved plot style
// ---------------------------------------------------------------------------

/// Style knobs as given on the command line, before preset/default filling.
#[derive(Debug, Clone, Default)]
pub struct StyleOverrides {
    pub format: Option<ImageFormat>,
    pub dpi: Option<u32>,
    pub palette: Option<PaletteName>,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub grid_major: Option<f64>,
    pub grid_minor: Option<f64>,
    pub n_major_ticks: Option<usize>,
    pub n_minor_ticks: Option<usize>,
}

/// The fully resolved style every render call receives.
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub format: ImageFormat,
    pub dpi: u32,
    pub palette: PaletteName,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub grid_major: f64,
    pub grid_minor: f64,
    pub n_major_ticks: usize,
    pub n_minor_ticks: usize,
    pub annotations: Vec<Annotation>,
    pub legend_labels: Vec<String>,
}

impl PlotStyle {
    /// Layer command-line overrides on top of an optional preset, then fill
    /// the hard defaults. A flag given explicitly always wins over the
    /// preset.
    pub fn resolve(overrides: &StyleOverrides, preset: Option<&Preset>) -> PlotStyle {
        let preset = preset.cloned().unwrap_or_default();
        PlotStyle {
            format: overrides
                .format
                .or(preset.format)
                .unwrap_or(ImageFormat::Png),
            dpi: overrides.dpi.or(preset.dpi).unwrap_or(300),
            palette: overrides
                .palette
                .or(preset.palette)
                .unwrap_or(PaletteName::Muted),
            x_range: overrides.x_range.or(preset.x_range),
            y_range: overrides.y_range.or(preset.y_range),
            grid_major: overrides.grid_major.or(preset.grid_major).unwrap_or(0.2),
            grid_minor: overrides.grid_minor.or(preset.grid_minor).unwrap_or(0.1),
            n_major_ticks: overrides
                .n_major_ticks
                .or(preset.n_major_ticks)
                .unwrap_or(8),
            n_minor_ticks: overrides
                .n_minor_ticks
                .or(preset.n_minor_ticks)
                .unwrap_or(2),
            annotations: Vec::new(),
            legend_labels: Vec::new(),
        }
    }

    /// Figure size in pixels: 8×6 inches at the configured DPI.
    pub fn figure_size(&self) -> (u32, u32) {
        (8 * self.dpi, 6 * self.dpi)
    }
}
