use clap::ValueEnum;
use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Named palettes
// ---------------------------------------------------------------------------

/// Okabe-Ito colorblind-safe palette.
pub const OKABE_ITO: &[RGBColor] = &[
    RGBColor(0xE6, 0x9F, 0x00),
    RGBColor(0x56, 0xB4, 0xE9),
    RGBColor(0x00, 0x9E, 0x73),
    RGBColor(0xF0, 0xE4, 0x42),
    RGBColor(0x00, 0x72, 0xB2),
    RGBColor(0xD5, 0x5E, 0x00),
    RGBColor(0xCC, 0x79, 0xA7),
    RGBColor(0x00, 0x00, 0x00),
];

/// Paul Tol muted scheme.
pub const TOL_MUTED: &[RGBColor] = &[
    RGBColor(0xCC, 0x66, 0x77),
    RGBColor(0x33, 0x22, 0x88),
    RGBColor(0xDD, 0xCC, 0x77),
    RGBColor(0x11, 0x77, 0x33),
    RGBColor(0x88, 0xCC, 0xEE),
    RGBColor(0x88, 0x22, 0x55),
    RGBColor(0x44, 0xAA, 0x99),
    RGBColor(0x99, 0x99, 0x33),
    RGBColor(0xAA, 0x44, 0x99),
    RGBColor(0xDD, 0xDD, 0xDD),
];

/// Paul Tol bright scheme.
pub const TOL_BRIGHT: &[RGBColor] = &[
    RGBColor(0x44, 0x77, 0xAA),
    RGBColor(0xEE, 0x66, 0x77),
    RGBColor(0x22, 0x88, 0x33),
    RGBColor(0xCC, 0xBB, 0x44),
    RGBColor(0x66, 0xCC, 0xEE),
    RGBColor(0xAA, 0x33, 0x77),
    RGBColor(0xBB, 0xBB, 0xBB),
];

/// Paul Tol vibrant scheme.
pub const TOL_VIBRANT: &[RGBColor] = &[
    RGBColor(0xEE, 0x77, 0x33),
    RGBColor(0x00, 0x77, 0xBB),
    RGBColor(0x33, 0xBB, 0xEE),
    RGBColor(0xEE, 0x33, 0x77),
    RGBColor(0xCC, 0x33, 0x11),
    RGBColor(0x00, 0x99, 0x88),
    RGBColor(0xBB, 0xBB, 0xBB),
];

/// IBM accessible palette.
pub const IBM_ACCESSIBLE: &[RGBColor] = &[
    RGBColor(0x00, 0x2D, 0x9C),
    RGBColor(0xEE, 0x53, 0x8B),
    RGBColor(0xB2, 0x86, 0x00),
    RGBColor(0x00, 0x9D, 0x9A),
    RGBColor(0x9F, 0x18, 0x53),
    RGBColor(0x19, 0x80, 0x38),
    RGBColor(0xA5, 0x6E, 0xFF),
    RGBColor(0xFA, 0x4D, 0x56),
    RGBColor(0x08, 0xBD, 0xBA),
    RGBColor(0xBA, 0xE6, 0xFF),
    RGBColor(0xD4, 0xBB, 0xFF),
    RGBColor(0xFF, 0x7E, 0xB6),
    RGBColor(0xD2, 0xA1, 0x06),
    RGBColor(0x69, 0x29, 0xC4),
];

/// Palette selection, by the names the lab uses on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteName {
    Okabe,
    Muted,
    Bright,
    Vibrant,
    Ibm,
}

impl PaletteName {
    pub fn colors(&self) -> &'static [RGBColor] {
        match self {
            PaletteName::Okabe => OKABE_ITO,
            PaletteName::Muted => TOL_MUTED,
            PaletteName::Bright => TOL_BRIGHT,
            PaletteName::Vibrant => TOL_VIBRANT,
            PaletteName::Ibm => IBM_ACCESSIBLE,
        }
    }

    /// Colour for the i-th series, cycling when the palette runs out.
    pub fn series_color(&self, idx: usize) -> RGBColor {
        let colors = self.colors();
        colors[idx % colors.len()]
    }
}

// ---------------------------------------------------------------------------
// Generated gradients
// ---------------------------------------------------------------------------

/// `n` evenly hue-spaced colours for plots whose series count is unbounded
/// (the diagnostic overlay colours one series per detected sweep).
pub fn gradient(n: usize) -> Vec<RGBColor> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n.max(1) as f32) * 300.0;
            let rgb: Srgb = Hsl::new(hue, 0.75, 0.45).into_color();
            RGBColor(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}
