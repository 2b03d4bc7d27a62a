use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// MeasurementKind / SweepType – small closed vocabularies
// ---------------------------------------------------------------------------

/// The two device classes this lab measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    /// Anti-ambipolar transistor (currents in the nA range).
    Aat,
    /// Field-effect transistor (currents in the µA range).
    Fet,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementKind::Aat => write!(f, "AAT"),
            MeasurementKind::Fet => write!(f, "FET"),
        }
    }
}

/// Which pair of terminals was swept and measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepType {
    /// Transfer curve: drain current vs gate voltage.
    #[default]
    IdVg,
    /// Output curve: drain current vs drain voltage.
    IdVd,
    /// Gate leakage vs gate voltage.
    IgVg,
    /// Gate leakage vs drain voltage.
    IgVd,
}

impl SweepType {
    /// Detect a sweep type from free-form text (filename stem or a settings
    /// `Setup title` value). Accepts both `Id-Vg` and `IdVg` spellings.
    pub fn detect(text: &str) -> Option<SweepType> {
        let lower = text.to_ascii_lowercase();
        if lower.contains("id-vg") || lower.contains("idvg") {
            Some(SweepType::IdVg)
        } else if lower.contains("id-vd") || lower.contains("idvd") {
            Some(SweepType::IdVd)
        } else if lower.contains("ig-vg") || lower.contains("igvg") {
            Some(SweepType::IgVg)
        } else if lower.contains("ig-vd") || lower.contains("igvd") {
            Some(SweepType::IgVd)
        } else {
            None
        }
    }

    /// Output sweeps step the gate and sweep the drain, so axis and filename
    /// range labels swap roles.
    pub fn is_output(&self) -> bool {
        matches!(self, SweepType::IdVd | SweepType::IgVd)
    }
}

impl fmt::Display for SweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepType::IdVg => write!(f, "Id-Vg"),
            SweepType::IdVd => write!(f, "Id-Vd"),
            SweepType::IgVg => write!(f, "Ig-Vg"),
            SweepType::IgVd => write!(f, "Ig-Vd"),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch / Sweep – numeric payload
// ---------------------------------------------------------------------------

/// One direction of travel within a gate-voltage sweep.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    /// Gate voltage samples.
    pub vg: Vec<f64>,
    /// Drain current samples – same length as `vg`.
    pub id: Vec<f64>,
    /// Gate (leakage) current samples – same length as `vg`.
    pub ig: Vec<f64>,
}

impl Branch {
    pub fn len(&self) -> usize {
        self.vg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vg.is_empty()
    }

    /// Minimum and maximum gate voltage, or None for an empty branch.
    pub fn vg_range(&self) -> Option<(f64, f64)> {
        min_max(&self.vg)
    }

    /// Minimum and maximum drain current, or None for an empty branch.
    pub fn id_range(&self) -> Option<(f64, f64)> {
        min_max(&self.id)
    }

    /// Sample with the largest |Id|, as (Vg, Id). Used for AAT peak reporting.
    pub fn peak(&self) -> Option<(f64, f64)> {
        let idx = self
            .id
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))?
            .0;
        Some((self.vg[idx], self.id[idx]))
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// A contiguous run of samples at one fixed drain-voltage level.
///
/// Produced by the splitter, one per distinct rounded Vd found in a file,
/// ordered ascending by that value. Immutable once built.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Drain-voltage level, rounded to 3 decimals.
    pub vd: f64,
    /// Full gate-voltage array for this level (forward + backward).
    pub vg: Vec<f64>,
    /// Full drain-current array.
    pub id: Vec<f64>,
    /// Full gate-current array.
    pub ig: Vec<f64>,
    /// Rising (or only) half of the sweep.
    pub forward: Branch,
    /// Falling half, present only when the gate voltage reversed direction.
    pub backward: Option<Branch>,
    /// Original sample indices into the source trace.
    pub indices: Vec<usize>,
}

impl Sweep {
    pub fn len(&self) -> usize {
        self.vg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vg.is_empty()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.backward.is_some()
    }
}

// ---------------------------------------------------------------------------
// Metadata – one record per file, shared across its sweeps
// ---------------------------------------------------------------------------

/// Where the authoritative metadata values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Inferred from filename tokens only.
    Filename,
    /// A companion instrument settings file was found and parsed.
    SettingsFile,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Filename => write!(f, "filename"),
            Provenance::SettingsFile => write!(f, "settings file"),
        }
    }
}

/// Experiment metadata for one data file.
///
/// Built once per file by the resolver and attached to every [`Sweep`]
/// extracted from that file via `Arc`; never mutated per-sweep.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Data file name (with extension).
    pub filename: String,
    /// Full path of the data file.
    pub path: PathBuf,
    /// Acquisition date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Acquisition time, `HH:MM:SS`.
    pub time: Option<String>,
    /// Free-text description from the bracketed filename segment.
    pub description: Option<String>,
    /// AAT vs FET, when the filename identifies it.
    pub kind: Option<MeasurementKind>,
    /// AAT electrode position (`inner`, `outer`).
    pub electrode: Option<String>,
    /// FET channel material (`ReS2`, `WSe2`).
    pub material: Option<String>,
    /// Sweep configuration, defaulting to the transfer curve.
    pub sweep_type: SweepType,
    /// Lab-assigned identifier of the physical sample.
    pub device_id: Option<String>,
    /// Primary sweep start voltage from the settings file.
    pub vg_start: Option<f64>,
    /// Primary sweep stop voltage from the settings file.
    pub vg_stop: Option<f64>,
    /// Primary sweep step from the settings file.
    pub vg_step: Option<f64>,
    /// Bias source voltage from the settings file.
    pub vd_bias: Option<f64>,
    /// Whether the instrument was configured for a double (there-and-back)
    /// locus.
    pub bidirectional: Option<bool>,
    /// Which source the final values came from.
    pub source: Provenance,
    /// Path of the settings file, when one was found.
    pub settings_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// SweepRecord – what the loader hands downstream
// ---------------------------------------------------------------------------

/// One sweep paired with its file's shared metadata.
#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub sweep: Sweep,
    pub metadata: Arc<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_type_detection_accepts_both_spellings() {
        assert_eq!(
            SweepType::detect("Id-Vg [ ; 2026_02_05]"),
            Some(SweepType::IdVg)
        );
        assert_eq!(SweepType::detect("device_IdVd_run3"), Some(SweepType::IdVd));
        assert_eq!(SweepType::detect("IG-VG leakage"), Some(SweepType::IgVg));
        assert_eq!(SweepType::detect("plain name"), None);
    }

    #[test]
    fn output_sweeps_swap_range_labels() {
        assert!(SweepType::IdVd.is_output());
        assert!(SweepType::IgVd.is_output());
        assert!(!SweepType::IdVg.is_output());
        assert!(!SweepType::IgVg.is_output());
    }

    #[test]
    fn branch_peak_picks_largest_magnitude() {
        let branch = Branch {
            vg: vec![-2.0, -1.0, 0.0, 1.0],
            id: vec![1e-9, -5e-9, 2e-9, 3e-9],
            ig: vec![0.0; 4],
        };
        let (vpeak, ipeak) = branch.peak().unwrap();
        assert_eq!(vpeak, -1.0);
        assert_eq!(ipeak, -5e-9);
    }
}
