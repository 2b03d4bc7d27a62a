use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use super::metadata;
use super::model::SweepRecord;
use super::splitter::{split_by_drain_bias, RawTrace};

// ---------------------------------------------------------------------------
// Per-file loading
// ---------------------------------------------------------------------------

/// Load one measurement file: read the numeric block, split it into sweeps,
/// resolve metadata, and attach the shared record to every sweep.
///
/// A malformed file is an error with no partial result; a missing or broken
/// settings sidecar is not (the resolver falls back to filename metadata).
pub fn load_file(path: &Path) -> Result<Vec<SweepRecord>> {
    let trace = RawTrace::from_path(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let sweeps = split_by_drain_bias(&trace);
    let bidirectional = sweeps.iter().filter(|s| s.is_bidirectional()).count();
    debug!(
        "{}: {} sweep(s), {bidirectional} bidirectional",
        path.display(),
        sweeps.len()
    );
    let meta = Arc::new(metadata::resolve(path));

    Ok(sweeps
        .into_iter()
        .map(|sweep| SweepRecord {
            sweep,
            metadata: Arc::clone(&meta),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Directory / batch loading
// ---------------------------------------------------------------------------

/// Is this a data file the batch loader should pick up?  Settings sidecars
/// and diagnostic outputs share the directory and must be skipped.
pub fn is_data_file(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("txt") {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    !stem.ends_with("-s") && !stem.to_lowercase().contains("diagnostic")
}

/// All data files in a directory, in filename sort order.
pub fn data_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_data_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Load every data file in a directory, concatenating the sweeps in filename
/// sort order. Files that fail to load are reported and skipped; the batch
/// continues.
pub fn load_directory(dir: &Path) -> Result<Vec<SweepRecord>> {
    let files = data_files_in(dir)?;
    info!("found {} data file(s) in {}", files.len(), dir.display());

    let mut all = Vec::new();
    for path in &files {
        match load_file(path) {
            Ok(records) => {
                info!(
                    "{}: {} sweep(s)",
                    path.file_name().unwrap_or_default().to_string_lossy(),
                    records.len()
                );
                all.extend(records);
            }
            Err(err) => error!("skipping {}: {err:#}", path.display()),
        }
    }
    info!("total sweeps loaded: {}", all.len());
    Ok(all)
}

/// Batch entry point for the CLI: each input may be a file or a directory.
/// Missing paths are reported and skipped so the rest of the batch still
/// runs.
pub fn load_inputs(inputs: &[PathBuf]) -> Vec<SweepRecord> {
    let mut all = Vec::new();
    for input in inputs {
        if input.is_file() {
            match load_file(input) {
                Ok(records) => all.extend(records),
                Err(err) => error!("skipping {}: {err:#}", input.display()),
            }
        } else if input.is_dir() {
            match load_directory(input) {
                Ok(records) => all.extend(records),
                Err(err) => error!("skipping {}: {err:#}", input.display()),
            }
        } else {
            warn!("path does not exist: {}", input.display());
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Provenance;
    use std::fs;

    const DATA: &str = "V2\tI1\tI2\tV1\nV\tA\tA\tV\n\
                        -8\t1e-9\t1e-12\t-1\n\
                        -4\t2e-9\t1e-12\t-1\n\
                        0\t3e-9\t1e-12\t-1\n\
                        -8\t4e-9\t1e-12\t0\n\
                        -4\t5e-9\t1e-12\t0\n\
                        0\t6e-9\t1e-12\t0\n\
                        -8\t7e-9\t1e-12\t1\n\
                        -4\t8e-9\t1e-12\t1\n\
                        0\t9e-9\t1e-12\t1\n";

    const SETTINGS: &str = "Setup title\tId-Vg\nDevice ID\tDV-26-07\n";

    #[test]
    fn three_bias_levels_yield_three_ordered_sweeps() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("Id-Vg [ AAT inner; 2026_02_05 10_15_57].txt");
        fs::write(&data, DATA).unwrap();

        let records = load_file(&data).unwrap();
        let levels: Vec<f64> = records.iter().map(|r| r.sweep.vd).collect();
        assert_eq!(levels, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn settings_device_id_is_shared_by_every_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("Id-Vg [ AAT inner; 2026_02_05 10_15_57].txt");
        fs::write(&data, DATA).unwrap();
        fs::write(
            dir.path().join("Id-Vg [ AAT inner; 2026_02_05 10_15_57]-s.txt"),
            SETTINGS,
        )
        .unwrap();

        let records = load_file(&data).unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.metadata.device_id.as_deref(), Some("DV-26-07"));
            assert_eq!(record.metadata.source, Provenance::SettingsFile);
        }
    }

    #[test]
    fn directory_scan_excludes_sidecars_and_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_run.txt"), DATA).unwrap();
        fs::write(dir.path().join("a_run.txt"), DATA).unwrap();
        fs::write(dir.path().join("a_run-s.txt"), SETTINGS).unwrap();
        fs::write(dir.path().join("a_run_diagnostic.txt"), DATA).unwrap();
        fs::write(dir.path().join("notes.csv"), "x").unwrap();

        let files = data_files_in(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_run.txt", "b_run.txt"]);
    }

    #[test]
    fn broken_file_does_not_abort_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), "V2\tI1\nV\tA\n0\t1\n").unwrap();
        fs::write(dir.path().join("good.txt"), DATA).unwrap();

        let records = load_directory(dir.path()).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn missing_input_is_skipped_in_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, DATA).unwrap();
        let records = load_inputs(&[dir.path().join("nope.txt"), good]);
        assert_eq!(records.len(), 3);
    }
}
