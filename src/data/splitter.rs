use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use super::model::{Branch, Sweep};

/// Bias levels are compared after rounding to this many decimals, so jitter
/// in the instrument's reported Vd does not fragment a sweep.
const BIAS_DECIMALS: i32 = 3;

/// Sweeps shorter than this are never split into forward/backward halves.
const MIN_SPLIT_SAMPLES: usize = 10;

/// Minimum |median dVg| for a half-trend to count as a real direction.
const TREND_THRESHOLD: f64 = 0.001;

// ---------------------------------------------------------------------------
// RawTrace – the 4-column numeric block of one data file
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TraceError {
    /// The instrument writes Vg, Id, Ig, Vd; anything narrower is unusable.
    #[error("expected at least 4 data columns, got {0}")]
    ColumnCount(usize),
}

/// The verbatim numeric content of one measurement file: four equal-length
/// columns, immutable once read.
#[derive(Debug, Clone)]
pub struct RawTrace {
    /// Gate voltage (V2), the swept parameter.
    pub vg: Vec<f64>,
    /// Drain current (I1), the primary measurement.
    pub id: Vec<f64>,
    /// Gate current (I2), leakage.
    pub ig: Vec<f64>,
    /// Drain voltage (V1), constant within a sweep, stepped between sweeps.
    pub vd: Vec<f64>,
}

impl RawTrace {
    /// Read the tab-separated numeric block, skipping the two header lines
    /// (column names + units).
    pub fn from_path(path: &Path) -> Result<RawTrace> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening data file {}", path.display()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<RawTrace> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut trace = RawTrace {
            vg: Vec::new(),
            id: Vec::new(),
            ig: Vec::new(),
            vd: Vec::new(),
        };

        for (row_no, result) in rdr.records().enumerate() {
            // First 2 rows are header + units.
            if row_no < 2 {
                result.with_context(|| format!("reading header row {row_no}"))?;
                continue;
            }
            let record = result.with_context(|| format!("reading data row {row_no}"))?;
            if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
                continue;
            }
            if record.len() < 4 {
                return Err(TraceError::ColumnCount(record.len()).into());
            }
            let cell = |col: usize| -> Result<f64> {
                let raw = record.get(col).unwrap_or("");
                raw.trim()
                    .parse::<f64>()
                    .with_context(|| format!("row {row_no}, column {col}: '{raw}' is not a number"))
            };
            trace.vg.push(cell(0)?);
            trace.id.push(cell(1)?);
            trace.ig.push(cell(2)?);
            trace.vd.push(cell(3)?);
        }

        Ok(trace)
    }

    pub fn len(&self) -> usize {
        self.vg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vg.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Splitting – one Sweep per rounded drain-voltage level
// ---------------------------------------------------------------------------

/// Partition a trace into sweeps, one per distinct rounded Vd, ordered
/// ascending by that value.
///
/// The partition is exhaustive and disjoint: every sample index lands in
/// exactly one sweep. Within each group the forward/backward halves are
/// separated when the gate-voltage trend reverses.
pub fn split_by_drain_bias(trace: &RawTrace) -> Vec<Sweep> {
    // Group indices by millivolt-quantized bias. BTreeMap keeps the groups
    // in ascending bias order.
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &vd) in trace.vd.iter().enumerate() {
        groups.entry(quantize(vd)).or_default().push(i);
    }

    groups
        .into_iter()
        .map(|(key, indices)| {
            let vg: Vec<f64> = indices.iter().map(|&i| trace.vg[i]).collect();
            let id: Vec<f64> = indices.iter().map(|&i| trace.id[i]).collect();
            let ig: Vec<f64> = indices.iter().map(|&i| trace.ig[i]).collect();
            let (forward, backward) = split_branches(&vg, &id, &ig);
            Sweep {
                vd: key as f64 / 1000.0,
                vg,
                id,
                ig,
                forward,
                backward,
                indices,
            }
        })
        .collect()
}

fn quantize(vd: f64) -> i64 {
    (vd * 10f64.powi(BIAS_DECIMALS)).round() as i64
}

/// Decide whether a single-bias group is bidirectional and split it.
///
/// The trend test compares the medians of consecutive gate-voltage
/// differences over the first and second halves; opposite signs with both
/// magnitudes above [`TREND_THRESHOLD`] mean the sweep turned around. The
/// split point is the global Vg extremum (max when rising first, min when
/// falling first), kept on the forward side.
fn split_branches(vg: &[f64], id: &[f64], ig: &[f64]) -> (Branch, Option<Branch>) {
    let whole = Branch {
        vg: vg.to_vec(),
        id: id.to_vec(),
        ig: ig.to_vec(),
    };

    if vg.len() < MIN_SPLIT_SAMPLES {
        return (whole, None);
    }

    let dvg: Vec<f64> = vg.windows(2).map(|w| w[1] - w[0]).collect();
    let half = dvg.len() / 2;
    let first_trend = median(&dvg[..half]);
    let second_trend = median(&dvg[half..]);

    let reverses = first_trend * second_trend < 0.0
        && first_trend.abs() > TREND_THRESHOLD
        && second_trend.abs() > TREND_THRESHOLD;
    if !reverses {
        return (whole, None);
    }

    let split_idx = if first_trend > 0.0 {
        position_of_extremum(vg, f64::gt)
    } else {
        position_of_extremum(vg, f64::lt)
    };

    let forward = Branch {
        vg: vg[..=split_idx].to_vec(),
        id: id[..=split_idx].to_vec(),
        ig: ig[..=split_idx].to_vec(),
    };
    if split_idx + 1 >= vg.len() {
        return (forward, None);
    }
    let backward = Branch {
        vg: vg[split_idx + 1..].to_vec(),
        id: id[split_idx + 1..].to_vec(),
        ig: ig[split_idx + 1..].to_vec(),
    };
    (forward, Some(backward))
}

/// Index of the first occurrence of the extremum selected by `better`.
fn position_of_extremum(values: &[f64], better: fn(&f64, &f64) -> bool) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if better(v, &values[best]) {
            best = i;
        }
    }
    best
}

/// Median of a slice; robust to measurement noise in the trend test.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_with(vd: Vec<f64>) -> RawTrace {
        let n = vd.len();
        RawTrace {
            vg: (0..n).map(|i| i as f64 * 0.1).collect(),
            id: vec![1e-9; n],
            ig: vec![0.0; n],
            vd,
        }
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let trace = trace_with(vec![0.5, 0.5, -1.0, -1.0, 0.5, 1.0, 1.0]);
        let sweeps = split_by_drain_bias(&trace);

        let mut seen = vec![false; trace.len()];
        for sweep in &sweeps {
            for &i in &sweep.indices {
                assert!(!seen[i], "index {i} appears in more than one sweep");
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s), "every index must be covered");
    }

    #[test]
    fn groups_are_ordered_by_ascending_bias() {
        let vd = vec![-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let sweeps = split_by_drain_bias(&trace_with(vd));
        let levels: Vec<f64> = sweeps.iter().map(|s| s.vd).collect();
        assert_eq!(levels, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn rounding_merges_close_bias_levels() {
        // 0.0004 apart: same level after rounding to 3 decimals.
        let sweeps = split_by_drain_bias(&trace_with(vec![0.5001, 0.5005, 0.5001]));
        assert_eq!(sweeps.len(), 1);

        // 0.003 apart: distinct levels.
        let sweeps = split_by_drain_bias(&trace_with(vec![0.500, 0.503, 0.500, 0.503]));
        assert_eq!(sweeps.len(), 2);
    }

    #[test]
    fn bidirectional_split_lands_after_global_maximum() {
        // Rise -5 → 5, fall back to -5; 21 points, peak at index 10.
        let up: Vec<f64> = (0..=10).map(|i| -5.0 + i as f64).collect();
        let down: Vec<f64> = (1..=10).map(|i| 5.0 - i as f64).collect();
        let vg: Vec<f64> = up.into_iter().chain(down).collect();
        let n = vg.len();
        let trace = RawTrace {
            vg,
            id: vec![1e-9; n],
            ig: vec![0.0; n],
            vd: vec![1.0; n],
        };

        let sweeps = split_by_drain_bias(&trace);
        assert_eq!(sweeps.len(), 1);
        let sweep = &sweeps[0];
        let backward = sweep.backward.as_ref().expect("must detect reversal");
        assert_eq!(sweep.forward.len(), 11);
        assert_eq!(sweep.forward.vg.last(), Some(&5.0));
        assert_eq!(backward.vg.first(), Some(&4.0));
    }

    #[test]
    fn descending_first_splits_at_global_minimum() {
        let down: Vec<f64> = (0..=8).map(|i| 4.0 - i as f64).collect();
        let up: Vec<f64> = (1..=8).map(|i| -4.0 + i as f64).collect();
        let vg: Vec<f64> = down.into_iter().chain(up).collect();
        let n = vg.len();
        let trace = RawTrace {
            vg,
            id: vec![0.0; n],
            ig: vec![0.0; n],
            vd: vec![0.0; n],
        };

        let sweep = &split_by_drain_bias(&trace)[0];
        assert_eq!(sweep.forward.vg.last(), Some(&-4.0));
        assert!(sweep.backward.is_some());
    }

    #[test]
    fn monotonic_sweep_stays_forward_only() {
        let vg: Vec<f64> = (0..20).map(|i| -5.0 + i as f64 * 0.5).collect();
        let n = vg.len();
        let trace = RawTrace {
            vg,
            id: vec![0.0; n],
            ig: vec![0.0; n],
            vd: vec![0.0; n],
        };

        let sweep = &split_by_drain_bias(&trace)[0];
        assert!(sweep.backward.is_none());
        assert_eq!(sweep.forward.len(), n);
    }

    #[test]
    fn short_sweeps_are_never_split() {
        let trace = RawTrace {
            vg: vec![0.0, 1.0, 2.0, 1.0, 0.0],
            id: vec![0.0; 5],
            ig: vec![0.0; 5],
            vd: vec![0.0; 5],
        };
        let sweep = &split_by_drain_bias(&trace)[0];
        assert!(sweep.backward.is_none());
    }

    #[test]
    fn reader_rejects_narrow_files() {
        let text = "Vg\tId\nV\tA\n0.0\t1e-9\n";
        let err = RawTrace::from_reader(text.as_bytes()).unwrap_err();
        let trace_err = err.downcast_ref::<TraceError>().expect("typed error");
        assert!(matches!(trace_err, TraceError::ColumnCount(2)));
    }

    #[test]
    fn reader_skips_two_header_rows() {
        let text = "Vg\tId\tIg\tVd\nV\tA\tA\tV\n\
                    0.0\t1e-9\t1e-12\t0.5\n\
                    0.1\t2e-9\t1e-12\t0.5\n";
        let trace = RawTrace::from_reader(text.as_bytes()).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.vg, vec![0.0, 0.1]);
        assert_eq!(trace.vd, vec![0.5, 0.5]);
    }
}
