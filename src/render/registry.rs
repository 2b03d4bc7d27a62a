use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// NameRegistry – per-batch output-name disambiguation
// ---------------------------------------------------------------------------
//
// Two measurement files taken minutes apart can generate identical plot
// names (same device, same ranges, same date). The registry is constructed
// per batch render and threaded through explicitly, so renders stay pure and
// collision handling is testable on its own.

/// Outcome of claiming an output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// The name the new plot must be written under.
    pub name: String,
    /// `(old, new)`: an earlier output file that should be renamed on disk
    /// so both collision partners end up timestamp-tagged.
    pub rename_earlier: Option<(String, String)>,
}

#[derive(Debug, Default)]
pub struct NameRegistry {
    use_count: BTreeMap<String, u32>,
    /// Source data file → assigned output name.
    source_map: BTreeMap<PathBuf, String>,
}

impl NameRegistry {
    pub fn new() -> NameRegistry {
        NameRegistry::default()
    }

    /// Reserve an output name for `source`. On collision the source file's
    /// embedded acquisition time is appended first (`_t101557`); when no
    /// timestamp is available, or it is taken too, a numeric counter is
    /// used.
    pub fn claim(&mut self, wanted: &str, source: &Path) -> Claim {
        if !self.use_count.contains_key(wanted) {
            self.use_count.insert(wanted.to_string(), 1);
            self.source_map
                .insert(source.to_path_buf(), wanted.to_string());
            return Claim {
                name: wanted.to_string(),
                rename_earlier: None,
            };
        }

        let (stem, ext) = split_name(wanted);

        // Preferred: tag with this source's acquisition time.
        if let Some(stamp) = timestamp_token(source) {
            let tagged = format!("{stem}_t{stamp}{ext}");
            if !self.use_count.contains_key(&tagged) {
                // First collision on this name: retroactively tag the
                // earlier file the same way so neither keeps the bare name.
                let rename_earlier = if self.use_count[wanted] == 1 {
                    self.retag_earlier(wanted, stem, ext)
                } else {
                    None
                };
                self.use_count.insert(tagged.clone(), 1);
                self.source_map.insert(source.to_path_buf(), tagged.clone());
                return Claim {
                    name: tagged,
                    rename_earlier,
                };
            }
        }

        // Fallback: numeric counter, skipping anything already taken.
        let count = self.use_count.get_mut(wanted).expect("name present");
        *count += 1;
        let mut counter = *count;
        let mut candidate = format!("{stem}_{counter}{ext}");
        while self.use_count.contains_key(&candidate) {
            counter += 1;
            candidate = format!("{stem}_{counter}{ext}");
        }
        self.use_count.insert(candidate.clone(), 1);
        self.source_map
            .insert(source.to_path_buf(), candidate.clone());
        Claim {
            name: candidate,
            rename_earlier: None,
        }
    }

    fn retag_earlier(&mut self, wanted: &str, stem: &str, ext: &str) -> Option<(String, String)> {
        let earlier_source = self
            .source_map
            .iter()
            .find(|(_, name)| name.as_str() == wanted)
            .map(|(path, _)| path.clone())?;
        let stamp = timestamp_token(&earlier_source)?;
        let renamed = format!("{stem}_t{stamp}{ext}");
        if self.use_count.contains_key(&renamed) {
            return None;
        }
        self.use_count.insert(renamed.clone(), 1);
        self.source_map.insert(earlier_source, renamed.clone());
        Some((wanted.to_string(), renamed))
    }
}

/// `HHMMSS` from a measurement filename like
/// `Id-Vg [ ; 2026_02_05 10_15_57].txt` → `101557`.
fn timestamp_token(path: &Path) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(\d{2})_(\d{2})_(\d{2})\]").expect("valid timestamp regex")
    });
    let name = path.file_name()?.to_str()?;
    let caps = re.captures(name)?;
    Some(format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    }
}
