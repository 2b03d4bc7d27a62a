use clap::ValueEnum;
use log::debug;

use crate::data::model::{MeasurementKind, SweepRecord, SweepType};

/// Which of the three name layouts to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NamingScheme {
    /// Subtype, kind, sweep type, count, ranges, device, date.
    #[default]
    Standard,
    /// No count or date.
    Compact,
    /// Adds the mean point count and an HH-MM time suffix.
    Detailed,
}

/// Generate the output name under the chosen scheme. None only for the
/// standard scheme on an empty collection; the caller picks its fallback.
pub fn plot_name(
    scheme: NamingScheme,
    records: &[SweepRecord],
    kind: MeasurementKind,
    subtype: &str,
    device_id: &str,
    extension: &str,
) -> Option<String> {
    match scheme {
        NamingScheme::Standard => standard_name(records, kind, subtype, device_id, extension),
        NamingScheme::Compact => Some(compact_name(records, kind, subtype, device_id, extension)),
        NamingScheme::Detailed => Some(detailed_name(records, kind, subtype, device_id, extension)),
    }
}

// ---------------------------------------------------------------------------
// Output filename assembly
// ---------------------------------------------------------------------------
//
// Names are deterministic joins of measurement parameters so a directory of
// plots stays self-describing:
//
//   ReS2_FET_Id-Vg_5sweeps_Vd-1.0to1.0V_Vg-8to0V_DV-25-06_2026-02-05.png

/// Range labels for the stepped parameter and the swept axis. For output
/// sweeps (`Id-Vd`, `Ig-Vd`) the bias column actually carries the stepped Vg
/// values and the "gate" arrays hold the swept Vd, so the labels swap.
fn range_labels(records: &[SweepRecord], sweep_type: SweepType) -> (String, String) {
    let vd_min = records.iter().map(|r| r.sweep.vd).fold(f64::INFINITY, f64::min);
    let vd_max = records
        .iter()
        .map(|r| r.sweep.vd)
        .fold(f64::NEG_INFINITY, f64::max);
    let (vg_min, vg_max) = records[0].sweep.forward.vg_range().unwrap_or((0.0, 0.0));

    if sweep_type.is_output() {
        (
            format!("Vg{vd_min:.1}to{vd_max:.1}V"),
            format!("Vd{vg_min:.0}to{vg_max:.0}V"),
        )
    } else {
        let param = if (vd_min - vd_max).abs() < 0.01 {
            format!("Vd{vd_min:.1}V")
        } else {
            format!("Vd{vd_min:.1}to{vd_max:.1}V")
        };
        (param, format!("Vg{vg_min:.0}to{vg_max:.0}V"))
    }
}

fn sanitize(name: String) -> String {
    name.replace(' ', "_").replace(':', "-")
}

/// The standard plot name: subtype, kind, sweep type, sweep count, both
/// voltage ranges, device id, and the date when known. Returns None for an
/// empty collection so the caller can pick its own fallback.
pub fn standard_name(
    records: &[SweepRecord],
    kind: MeasurementKind,
    subtype: &str,
    device_id: &str,
    extension: &str,
) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    let meta = &records[0].metadata;
    let sweep_type = meta.sweep_type;
    let (param_str, sweep_str) = range_labels(records, sweep_type);

    let n = records.len();
    let sweep_word = if n == 1 { "sweep" } else { "sweeps" };

    let mut components = vec![
        subtype.to_string(),
        kind.to_string(),
        sweep_type.to_string(),
        format!("{n}{sweep_word}"),
        param_str,
        sweep_str,
        device_id.to_string(),
    ];
    if let Some(date) = &meta.date {
        components.push(date.clone());
    }

    let name = sanitize(components.join("_") + extension);
    debug!("generated filename: {name}");
    Some(name)
}

/// Shorter variant: no sweep count, no date.
pub fn compact_name(
    records: &[SweepRecord],
    kind: MeasurementKind,
    subtype: &str,
    device_id: &str,
    extension: &str,
) -> String {
    if records.is_empty() {
        return sanitize(format!("{subtype}_{kind}_{device_id}{extension}"));
    }
    let sweep_type = records[0].metadata.sweep_type;
    let (param_str, sweep_str) = range_labels(records, sweep_type);
    sanitize(format!(
        "{subtype}_{kind}_{sweep_type}_{param_str}_{sweep_str}_{device_id}{extension}"
    ))
}

/// Maximum-information variant: adds the mean forward point count and an
/// `HH-MM` time suffix when the metadata carries one.
pub fn detailed_name(
    records: &[SweepRecord],
    kind: MeasurementKind,
    subtype: &str,
    device_id: &str,
    extension: &str,
) -> String {
    if records.is_empty() {
        return sanitize(format!("{subtype}_{kind}_{device_id}{extension}"));
    }
    let meta = &records[0].metadata;
    let sweep_type = meta.sweep_type;
    let (param_str, sweep_str) = range_labels(records, sweep_type);

    let n = records.len();
    let sweep_word = if n == 1 { "sweep" } else { "sweeps" };
    let avg_points = records
        .iter()
        .map(|r| r.sweep.forward.len())
        .sum::<usize>()
        / n;

    let mut components = vec![
        subtype.to_string(),
        kind.to_string(),
        sweep_type.to_string(),
        format!("{n}{sweep_word}"),
        param_str,
        sweep_str,
        format!("{avg_points}pts"),
        device_id.to_string(),
    ];
    if let Some(date) = &meta.date {
        components.push(date.clone());
    }
    if let Some(time) = &meta.time {
        let short: String = time.chars().take(5).collect();
        components.push(short.replace(':', "-"));
    }

    sanitize(components.join("_") + extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Branch, Metadata, Provenance, Sweep};
    use std::path::Path;
    use std::sync::Arc;

    fn record(vd: f64, sweep_type: SweepType, date: Option<&str>, time: Option<&str>) -> SweepRecord {
        let vg: Vec<f64> = (0..101).map(|i| -8.0 + i as f64 * 0.08).collect();
        let n = vg.len();
        let meta = Metadata {
            filename: "test.txt".to_string(),
            path: Path::new("test.txt").to_path_buf(),
            date: date.map(String::from),
            time: time.map(String::from),
            description: None,
            kind: Some(MeasurementKind::Fet),
            electrode: None,
            material: Some("ReS2".to_string()),
            sweep_type,
            device_id: None,
            vg_start: None,
            vg_stop: None,
            vg_step: None,
            vd_bias: None,
            bidirectional: None,
            source: Provenance::Filename,
            settings_path: None,
        };
        SweepRecord {
            sweep: Sweep {
                vd,
                vg: vg.clone(),
                id: vec![1e-6; n],
                ig: vec![0.0; n],
                forward: Branch {
                    vg,
                    id: vec![1e-6; n],
                    ig: vec![0.0; n],
                },
                backward: None,
                indices: (0..n).collect(),
            },
            metadata: Arc::new(meta),
        }
    }

    #[test]
    fn standard_name_joins_all_components() {
        let records = vec![
            record(-1.0, SweepType::IdVg, Some("2026-02-05"), None),
            record(0.0, SweepType::IdVg, Some("2026-02-05"), None),
            record(1.0, SweepType::IdVg, Some("2026-02-05"), None),
        ];
        let name =
            standard_name(&records, MeasurementKind::Fet, "ReS2", "DV-25-06", ".png").unwrap();
        assert_eq!(
            name,
            "ReS2_FET_Id-Vg_3sweeps_Vd-1.0to1.0V_Vg-8to0V_DV-25-06_2026-02-05.png"
        );
    }

    #[test]
    fn single_bias_level_collapses_the_range() {
        let records = vec![record(0.5, SweepType::IdVg, None, None)];
        let name =
            standard_name(&records, MeasurementKind::Aat, "Inner", "DV-26-XX", ".svg").unwrap();
        assert_eq!(name, "Inner_AAT_Id-Vg_1sweep_Vd0.5V_Vg-8to0V_DV-26-XX.svg");
    }

    #[test]
    fn output_sweeps_swap_the_range_labels() {
        let records = vec![
            record(-2.0, SweepType::IdVd, None, None),
            record(2.0, SweepType::IdVd, None, None),
        ];
        let name =
            standard_name(&records, MeasurementKind::Fet, "WSe2", "DV-25-06", ".png").unwrap();
        assert!(name.contains("Vg-2.0to2.0V"), "{name}");
        assert!(name.contains("Vd-8to0V"), "{name}");
    }

    #[test]
    fn detailed_name_appends_points_and_time() {
        let records = vec![record(
            -1.0,
            SweepType::IdVg,
            Some("2026-02-05"),
            Some("09:59:53"),
        )];
        let name = detailed_name(&records, MeasurementKind::Fet, "ReS2", "DV-25-06", ".png");
        assert!(name.contains("101pts"), "{name}");
        assert!(name.ends_with("2026-02-05_09-59.png"), "{name}");
    }

    #[test]
    fn empty_collection_has_no_standard_name() {
        assert!(standard_name(&[], MeasurementKind::Fet, "X", "D", ".png").is_none());
        assert_eq!(
            compact_name(&[], MeasurementKind::Fet, "X", "D", ".png"),
            "X_FET_D.png"
        );
    }
}
