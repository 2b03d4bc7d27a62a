use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;

use super::model::SweepType;

// ---------------------------------------------------------------------------
// Settings sidecar lookup
// ---------------------------------------------------------------------------

/// Embedded acquisition stamp, `YYYY_MM_DD H_M_S` with `_` or space between
/// fields. Shared by data files and their settings sidecars.
fn datetime_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}[_\s]\d{2}[_\s]\d{2}[_\s]\d{1,2}[_\s]\d{1,2}[_\s]\d{1,2}")
            .expect("valid datetime regex")
    })
}

/// Find the `-s` settings sidecar for a data file, if any.
///
/// Exact-name variants are tried first (`-s`, ` -s`, `_-s`, then the same
/// with trailing underscores/spaces stripped from the stem). Failing those,
/// every `*-s.txt` in the directory whose embedded date-time stamp equals
/// the data file's is a fuzzy match; the first one in name order wins.
pub fn find_settings_file(data_path: &Path) -> Option<PathBuf> {
    let stem = data_path.file_stem()?.to_str()?;
    let parent = data_path.parent()?;
    let cleaned = stem.trim_end_matches(['_', ' ']);

    let candidates = [
        format!("{stem}-s.txt"),
        format!("{stem} -s.txt"),
        format!("{stem}_-s.txt"),
        format!("{cleaned}-s.txt"),
        format!("{cleaned}_-s.txt"),
    ];
    for name in candidates {
        let candidate = parent.join(&name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    // Fuzzy scan: same acquisition stamp, different base name.
    let data_stamp = datetime_pattern().find(stem)?.as_str().to_string();
    let mut sidecars: Vec<PathBuf> = std::fs::read_dir(parent)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("-s.txt"))
        })
        .collect();
    sidecars.sort();

    for candidate in sidecars {
        let Some(candidate_stem) = candidate.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(stamp) = datetime_pattern().find(candidate_stem) {
            if stamp.as_str() == data_stamp {
                debug!(
                    "fuzzy settings match for {}: {}",
                    data_path.display(),
                    candidate.display()
                );
                return Some(candidate);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Settings sidecar parsing
// ---------------------------------------------------------------------------

/// Acquisition parameters extracted from a Keysight B2912A settings dump.
/// Every field is optional; absent keys leave the filename-derived value in
/// force.
#[derive(Debug, Clone, Default)]
pub struct SettingsInfo {
    pub sweep_type: Option<SweepType>,
    /// `YYYY-MM-DD` (the instrument writes `YYYY/MM/DD`).
    pub date: Option<String>,
    /// `HH:MM:SS`.
    pub time: Option<String>,
    pub device_id: Option<String>,
    pub vg_start: Option<f64>,
    pub vg_stop: Option<f64>,
    pub vg_step: Option<f64>,
    /// First `Measurement.Bias.Source` value (SMU1, the drain).
    pub vd_bias: Option<f64>,
    /// `Measurement.Primary.Locus` equal to `Double`.
    pub bidirectional: Option<bool>,
}

/// Parse a settings sidecar. Unknown keys are ignored; unparseable numeric
/// values leave their field unset rather than failing the whole file.
pub fn parse_settings_file(path: &Path) -> Result<SettingsInfo> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening settings file {}", path.display()))?;
    parse_settings_reader(file)
}

pub fn parse_settings_reader<R: Read>(reader: R) -> Result<SettingsInfo> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut info = SettingsInfo::default();

    for (row_no, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading settings row {row_no}"))?;
        let key = record.get(0).map(str::trim).unwrap_or("");
        let values: Vec<&str> = record
            .iter()
            .skip(1)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if key.is_empty() || values.is_empty() {
            continue;
        }
        let first = values[0];

        match key {
            "Setup title" => info.sweep_type = SweepType::detect(first),
            "Test date" => info.date = Some(first.replace('/', "-")),
            "Test time" => info.time = Some(first.to_string()),
            "Device ID" => info.device_id = Some(first.to_string()),
            "Measurement.Primary.Start" => info.vg_start = first.parse().ok(),
            "Measurement.Primary.Stop" => info.vg_stop = first.parse().ok(),
            "Measurement.Primary.Step" => info.vg_step = first.parse().ok(),
            // Two values, one per SMU; the first is the drain.
            "Measurement.Bias.Source" => info.vd_bias = first.parse().ok(),
            "Measurement.Primary.Locus" => {
                info.bidirectional = Some(first.eq_ignore_ascii_case("double"));
            }
            _ => {}
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = "Setup title\tId-Vg\n\
                          Test date\t2026/02/05\n\
                          Test time\t09:59:53\n\
                          Device ID\tDV-26-07\n\
                          Measurement.Primary.Start\t-8\n\
                          Measurement.Primary.Stop\t0\n\
                          Measurement.Primary.Step\t0.08\n\
                          Measurement.Bias.Source\t-1\t0\n\
                          Measurement.Primary.Locus\tDouble\n";

    #[test]
    fn parses_recognized_keys() {
        let info = parse_settings_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.sweep_type, Some(SweepType::IdVg));
        assert_eq!(info.date.as_deref(), Some("2026-02-05"));
        assert_eq!(info.time.as_deref(), Some("09:59:53"));
        assert_eq!(info.device_id.as_deref(), Some("DV-26-07"));
        assert_eq!(info.vg_start, Some(-8.0));
        assert_eq!(info.vg_stop, Some(0.0));
        assert_eq!(info.vg_step, Some(0.08));
        assert_eq!(info.vd_bias, Some(-1.0));
        assert_eq!(info.bidirectional, Some(true));
    }

    #[test]
    fn single_locus_is_not_bidirectional() {
        let info = parse_settings_reader("Measurement.Primary.Locus\tSingle\n".as_bytes()).unwrap();
        assert_eq!(info.bidirectional, Some(false));
    }

    #[test]
    fn unknown_keys_and_comments_are_ignored() {
        let text = "# instrument dump\nFrequency\t1000\nTest time\t10:15:57\n";
        let info = parse_settings_reader(text.as_bytes()).unwrap();
        assert_eq!(info.time.as_deref(), Some("10:15:57"));
        assert!(info.device_id.is_none());
    }

    #[test]
    fn exact_name_wins_over_fuzzy_match() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("Id-Vg [ ; 2026_02_05 10_15_57].txt");
        fs::write(&data, "").unwrap();
        fs::write(dir.path().join("Id-Vg [ ; 2026_02_05 10_15_57]-s.txt"), SAMPLE).unwrap();
        fs::write(dir.path().join("other 2026_02_05 10_15_57-s.txt"), SAMPLE).unwrap();

        let found = find_settings_file(&data).unwrap();
        assert_eq!(
            found.file_name().unwrap().to_str().unwrap(),
            "Id-Vg [ ; 2026_02_05 10_15_57]-s.txt"
        );
    }

    #[test]
    fn fuzzy_match_requires_equal_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("run_2026_02_05 10_15_57.txt");
        fs::write(&data, "").unwrap();
        fs::write(dir.path().join("renamed 2026_02_05 10_15_58-s.txt"), SAMPLE).unwrap();
        assert!(find_settings_file(&data).is_none());

        fs::write(dir.path().join("renamed 2026_02_05 10_15_57-s.txt"), SAMPLE).unwrap();
        let found = find_settings_file(&data).unwrap();
        assert_eq!(
            found.file_name().unwrap().to_str().unwrap(),
            "renamed 2026_02_05 10_15_57-s.txt"
        );
    }

    #[test]
    fn stem_with_trailing_underscore_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("sweep_A_.txt");
        fs::write(&data, "").unwrap();
        fs::write(dir.path().join("sweep_A-s.txt"), SAMPLE).unwrap();
        assert!(find_settings_file(&data).is_some());
    }
}
