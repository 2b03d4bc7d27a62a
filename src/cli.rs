use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};

use crate::color::PaletteName;
use crate::data::model::MeasurementKind;
use crate::render::naming::NamingScheme;
use crate::render::style::{
    load_preset_file, lookup_preset, parse_annotations, ImageFormat, PlotStyle, StyleOverrides,
};

// ---------------------------------------------------------------------------
// Top-level command
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "aatplot",
    version,
    about = "Plot AAT/FET sweep measurements with systematic output names",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Group sweeps by material/electrode keywords, one plot per group
    /// (falls back to a single merged plot when nothing matches)
    Merged(MergedArgs),
    /// One plot per input file, with output-name collision handling
    Single(SingleArgs),
    /// Report how each file splits into bias sweeps
    Diagnose(DiagnoseArgs),
}

// ---------------------------------------------------------------------------
// Shared render arguments
// ---------------------------------------------------------------------------

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Data file(s) or directory(ies) to process
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    pub inputs: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<ImageFormat>,

    /// Resolution in DPI (default: 300)
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Device ID (default: auto-detect from settings file, fallback DV-26-XX)
    #[arg(short, long)]
    pub device: Option<String>,

    /// X-axis (Vg) range in volts
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub x_range: Option<Vec<f64>>,

    /// Y-axis (Id) range in display units
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub y_range: Option<Vec<f64>>,

    /// Color palette (default: muted)
    #[arg(short, long, value_enum)]
    pub palette: Option<PaletteName>,

    /// Major grid intensity (0-1, default: 0.2)
    #[arg(long)]
    pub grid_major: Option<f64>,

    /// Minor grid intensity (0-1, default: 0.1)
    #[arg(long)]
    pub grid_minor: Option<f64>,

    /// Number of major ticks per axis (default: 8)
    #[arg(long)]
    pub n_major_ticks: Option<usize>,

    /// Minor grid subdivisions between major ticks (default: 2)
    #[arg(long)]
    pub n_minor_ticks: Option<usize>,

    /// Output directory (default: next to the input)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Preset configuration: explore, presentation, journal, or a name from
    /// --preset-file
    #[arg(long)]
    pub preset: Option<String>,

    /// JSON file with additional presets (entries shadow the builtins)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub preset_file: Option<PathBuf>,

    /// Text annotation "x,y,text[,color[,fontsize]]"; repeatable
    #[arg(long = "annotate", action = ArgAction::Append, allow_hyphen_values = true)]
    pub annotate: Vec<String>,

    /// Custom legend labels replacing the generated "Vd = …" entries
    #[arg(long, num_args = 1..)]
    pub legend_labels: Vec<String>,

    /// Output filename layout
    #[arg(long, value_enum, default_value_t = NamingScheme::Standard)]
    pub naming: NamingScheme,
}

impl RenderArgs {
    /// Resolve the fully-specified plot style: explicit flags, then preset
    /// values, then hard defaults.
    pub fn resolve_style(&self) -> Result<PlotStyle> {
        let custom = match &self.preset_file {
            Some(path) => load_preset_file(path)?,
            None => BTreeMap::new(),
        };
        let preset = match &self.preset {
            Some(name) => Some(lookup_preset(name, &custom)?),
            None => None,
        };
        let overrides = StyleOverrides {
            format: self.format,
            dpi: self.dpi,
            palette: self.palette,
            x_range: pair(&self.x_range),
            y_range: pair(&self.y_range),
            grid_major: self.grid_major,
            grid_minor: self.grid_minor,
            n_major_ticks: self.n_major_ticks,
            n_minor_ticks: self.n_minor_ticks,
        };
        let mut style = PlotStyle::resolve(&overrides, preset.as_ref());
        style.annotations = parse_annotations(&self.annotate);
        style.legend_labels = self.legend_labels.clone();
        Ok(style)
    }

    /// Where plots land: `--output` when given, else a named directory next
    /// to (or inside) the first input.
    pub fn output_dir(&self, default_name: &str) -> PathBuf {
        if let Some(dir) = &self.output {
            return dir.clone();
        }
        let first = &self.inputs[0];
        if first.is_dir() {
            first.join(default_name)
        } else {
            first
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
                .join(default_name)
        }
    }
}

fn pair(values: &Option<Vec<f64>>) -> Option<(f64, f64)> {
    match values.as_deref() {
        Some([lo, hi]) => Some((*lo, *hi)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Subcommand arguments
// ---------------------------------------------------------------------------

/// Measurement-kind choice for merged plots; `auto` resolves from the
/// current magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KindChoice {
    Aat,
    Fet,
    #[default]
    Auto,
}

impl KindChoice {
    pub fn as_kind(self) -> Option<MeasurementKind> {
        match self {
            KindChoice::Aat => Some(MeasurementKind::Aat),
            KindChoice::Fet => Some(MeasurementKind::Fet),
            KindChoice::Auto => None,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct MergedArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Force all measurements into a single plot, ignoring keyword grouping
    #[arg(long)]
    pub force_merge: bool,

    /// Label for the merged plot (e.g. "Outer_AAT", "Device_Comparison")
    #[arg(short, long)]
    pub label: Option<String>,

    /// Measurement type for the merged plot (affects Y-axis units)
    #[arg(short = 't', long = "type", value_enum, default_value_t = KindChoice::Auto)]
    pub kind: KindChoice,
}

#[derive(clap::Args, Debug)]
pub struct SingleArgs {
    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(clap::Args, Debug)]
pub struct DiagnoseArgs {
    /// Data file(s) to analyze
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    pub inputs: Vec<PathBuf>,

    /// Directory for diagnostic figures (default: next to each input)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Output format for the diagnostic figure
    #[arg(short, long, value_enum)]
    pub format: Option<ImageFormat>,

    /// Resolution in DPI (default: 300)
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Print the split report only, skip the figure
    #[arg(long)]
    pub no_plot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merged_flags_parse() {
        let cli = Cli::try_parse_from([
            "aatplot",
            "merged",
            "data/",
            "--preset",
            "journal",
            "--y-range",
            "-8",
            "0",
            "--force-merge",
            "--label",
            "Outer_AAT",
            "--type",
            "aat",
            "--annotate",
            "-2,5,peak",
        ])
        .unwrap();

        let Command::Merged(args) = cli.command else {
            panic!("expected merged subcommand");
        };
        assert!(args.force_merge);
        assert_eq!(args.label.as_deref(), Some("Outer_AAT"));
        assert_eq!(args.kind, KindChoice::Aat);
        assert_eq!(args.render.preset.as_deref(), Some("journal"));
        assert_eq!(pair(&args.render.y_range), Some((-8.0, 0.0)));
        assert_eq!(args.render.annotate.len(), 1);
    }

    #[test]
    fn style_resolution_layers_preset_under_flags() {
        let cli = Cli::try_parse_from([
            "aatplot", "merged", "data/", "--preset", "journal", "--dpi", "150",
        ])
        .unwrap();
        let Command::Merged(args) = cli.command else {
            panic!("expected merged subcommand");
        };
        let style = args.render.resolve_style().unwrap();
        assert_eq!(style.dpi, 150);
        assert_eq!(style.format, ImageFormat::Svg);
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let cli = Cli::try_parse_from(["aatplot", "single", "data.txt", "--preset", "nope"])
            .unwrap();
        let Command::Single(args) = cli.command else {
            panic!("expected single subcommand");
        };
        assert!(args.render.resolve_style().is_err());
    }
}
