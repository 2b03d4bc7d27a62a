use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::data::model::{MeasurementKind, SweepRecord};

// ---------------------------------------------------------------------------
// Plain-text sidecar written next to every plot
// ---------------------------------------------------------------------------

const RULE: &str =
    "======================================================================";

/// Write the human-readable measurement summary companion for a plot.
/// AAT summaries include the peak current and its gate position.
pub fn write_summary(
    path: &Path,
    device_id: &str,
    kind: MeasurementKind,
    subtype: &str,
    records: &[SweepRecord],
) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating summary file {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);

    writeln!(out, "{RULE}")?;
    writeln!(out, "MEASUREMENT METADATA")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;
    writeln!(out, "Device ID: {device_id}")?;
    writeln!(out, "Measurement Type: {kind}")?;
    match kind {
        MeasurementKind::Fet => writeln!(out, "Material: {subtype}")?,
        MeasurementKind::Aat => writeln!(out, "Electrode Type: {subtype}")?,
    }
    writeln!(out)?;
    writeln!(out, "Number of sweeps: {}", records.len())?;
    writeln!(out)?;

    for (idx, record) in records.iter().enumerate() {
        let forward = &record.sweep.forward;
        let (vg_min, vg_max) = forward.vg_range().unwrap_or((0.0, 0.0));
        let (id_min, id_max) = forward.id_range().unwrap_or((0.0, 0.0));

        writeln!(out, "Sweep {}:", idx + 1)?;
        writeln!(out, "  Vd = {:.3} V", record.sweep.vd)?;
        writeln!(out, "  Vg range: {vg_min:.2} to {vg_max:.2} V")?;
        writeln!(out, "  Id range: {id_min:.3e} to {id_max:.3e} A")?;
        writeln!(out, "  Data points: {}", forward.len())?;
        if kind == MeasurementKind::Aat {
            if let Some((vpeak, ipeak)) = forward.peak() {
                writeln!(out, "  Peak current: {ipeak:.3e} A")?;
                writeln!(out, "  Peak position: {vpeak:.2} V")?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "{RULE}")?;
    out.flush().context("flushing summary file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Branch, Metadata, Provenance, Sweep, SweepType};
    use std::sync::Arc;

    fn record() -> SweepRecord {
        let meta = Metadata {
            filename: "test.txt".to_string(),
            path: Path::new("test.txt").to_path_buf(),
            date: None,
            time: None,
            description: None,
            kind: Some(MeasurementKind::Aat),
            electrode: Some("inner".to_string()),
            material: None,
            sweep_type: SweepType::IdVg,
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
                vd: -1.0,
                vg: vec![-2.0, -1.0, 0.0],
                id: vec![1e-9, 5e-9, 2e-9],
                ig: vec![0.0; 3],
                forward: Branch {
                    vg: vec![-2.0, -1.0, 0.0],
                    id: vec![1e-9, 5e-9, 2e-9],
                    ig: vec![0.0; 3],
                },
                backward: None,
                indices: vec![0, 1, 2],
            },
            metadata: Arc::new(meta),
        }
    }

    #[test]
    fn aat_summary_reports_the_peak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.txt");
        write_summary(&path, "DV-26-07", MeasurementKind::Aat, "Inner", &[record()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Device ID: DV-26-07"));
        assert!(text.contains("Electrode Type: Inner"));
        assert!(text.contains("Number of sweeps: 1"));
        assert!(text.contains("Vd = -1.000 V"));
        assert!(text.contains("Peak position: -1.00 V"));
    }
}
