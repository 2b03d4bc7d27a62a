use super::model::{MeasurementKind, SweepRecord};

// ---------------------------------------------------------------------------
// Keyword table – category → subtype → keyword list
// ---------------------------------------------------------------------------

/// One named bucket within a category, with the keywords that select it.
#[derive(Debug, Clone)]
pub struct SubtypeRule {
    /// Bucket label used in plot filenames (e.g. `ReS2`, `inner`).
    pub name: String,
    /// Lowercased substrings that select this bucket; first match wins.
    pub keywords: Vec<String>,
}

impl SubtypeRule {
    fn new(name: &str, keywords: &[&str]) -> SubtypeRule {
        SubtypeRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// The configurable keyword table. New materials or electrode layouts are a
/// one-line addition here.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    pub fet_materials: Vec<SubtypeRule>,
    pub aat_electrodes: Vec<SubtypeRule>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        KeywordTable {
            fet_materials: vec![
                SubtypeRule::new("ReS2", &["res2"]),
                SubtypeRule::new("WSe2", &["wse2"]),
                SubtypeRule::new("MoS2", &["mos2"]),
                SubtypeRule::new("MoSe2", &["mose2"]),
                SubtypeRule::new("Graphene", &["graphene", "gr"]),
                SubtypeRule::new("hBN", &["hbn"]),
            ],
            aat_electrodes: vec![
                SubtypeRule::new("inner", &["inner", "inner_electrode"]),
                SubtypeRule::new("outer", &["outer", "outter", "outer_electrode"]),
                SubtypeRule::new("middle", &["middle", "mid"]),
                SubtypeRule::new("top", &["top"]),
                SubtypeRule::new("bottom", &["bottom"]),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Organizing sweeps into buckets
// ---------------------------------------------------------------------------

/// One resolved bucket: every sweep that matched this subtype.
#[derive(Debug)]
pub struct Bucket {
    pub kind: MeasurementKind,
    pub subtype: String,
    pub records: Vec<SweepRecord>,
}

/// Result of classifying a flat sweep collection.
#[derive(Debug, Default)]
pub struct Organized {
    /// Matched buckets, in table order, empty ones omitted.
    pub buckets: Vec<Bucket>,
    /// Known kind but no subtype keyword matched.
    pub unknown_fet: Vec<SweepRecord>,
    pub unknown_aat: Vec<SweepRecord>,
    /// Measurement kind itself unknown.
    pub unknown: Vec<SweepRecord>,
}

impl Organized {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.records.len()).sum::<usize>()
            + self.unknown_fet.len()
            + self.unknown_aat.len()
            + self.unknown.len()
    }
}

impl KeywordTable {
    /// Does any sweep match a keyword bucket? Lets the CLI decide on the
    /// merged-plot fallback without consuming the collection.
    pub fn any_keyword_match(&self, records: &[SweepRecord]) -> bool {
        records.iter().any(|record| {
            let haystack = metadata_text(record);
            match record.metadata.kind {
                Some(MeasurementKind::Fet) => {
                    first_match(&self.fet_materials, &haystack).is_some()
                }
                Some(MeasurementKind::Aat) => {
                    first_match(&self.aat_electrodes, &haystack).is_some()
                }
                None => false,
            }
        })
    }

    /// Group sweeps into named buckets. Each sweep is tested against the
    /// rules of its measurement kind; the first keyword found in its
    /// metadata text decides the bucket, no match lands in the category's
    /// unknown list.
    pub fn organize(&self, records: Vec<SweepRecord>) -> Organized {
        let mut organized = Organized::default();
        let mut matched: Vec<(MeasurementKind, usize, Vec<SweepRecord>)> = Vec::new();

        for record in records {
            let haystack = metadata_text(&record);
            match record.metadata.kind {
                Some(MeasurementKind::Fet) => {
                    match first_match(&self.fet_materials, &haystack) {
                        Some(idx) => push_bucket(&mut matched, MeasurementKind::Fet, idx, record),
                        None => organized.unknown_fet.push(record),
                    }
                }
                Some(MeasurementKind::Aat) => {
                    match first_match(&self.aat_electrodes, &haystack) {
                        Some(idx) => push_bucket(&mut matched, MeasurementKind::Aat, idx, record),
                        None => organized.unknown_aat.push(record),
                    }
                }
                None => organized.unknown.push(record),
            }
        }

        // Emit buckets in table order: FET materials first, then electrodes.
        matched.sort_by_key(|(kind, idx, _)| {
            (matches!(*kind, MeasurementKind::Aat) as u8, *idx)
        });
        for (kind, idx, records) in matched {
            let subtype = match kind {
                MeasurementKind::Fet => self.fet_materials[idx].name.clone(),
                MeasurementKind::Aat => self.aat_electrodes[idx].name.clone(),
            };
            organized.buckets.push(Bucket {
                kind,
                subtype,
                records,
            });
        }
        organized
    }
}

/// The searchable text for one sweep: explicit subtype fields first, then
/// the free-form description and filename.
fn metadata_text(record: &SweepRecord) -> String {
    let meta = &record.metadata;
    let mut text = String::new();
    for part in [
        meta.material.as_deref(),
        meta.electrode.as_deref(),
        meta.description.as_deref(),
        Some(meta.filename.as_str()),
    ]
    .into_iter()
    .flatten()
    {
        text.push_str(&part.to_lowercase());
        text.push(' ');
    }
    text
}

fn first_match(rules: &[SubtypeRule], haystack: &str) -> Option<usize> {
    rules
        .iter()
        .position(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)))
}

fn push_bucket(
    matched: &mut Vec<(MeasurementKind, usize, Vec<SweepRecord>)>,
    kind: MeasurementKind,
    idx: usize,
    record: SweepRecord,
) {
    if let Some((_, _, records)) = matched
        .iter_mut()
        .find(|(k, i, _)| *k == kind && *i == idx)
    {
        records.push(record);
    } else {
        matched.push((kind, idx, vec![record]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Branch, Metadata, Provenance, Sweep, SweepType};
    use std::path::Path;
    use std::sync::Arc;

    fn record(kind: Option<MeasurementKind>, description: &str) -> SweepRecord {
        let meta = Metadata {
            filename: "test.txt".to_string(),
            path: Path::new("test.txt").to_path_buf(),
            date: None,
            time: None,
            description: Some(description.to_string()),
            kind,
            electrode: None,
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
                vd: 0.0,
                vg: vec![0.0],
                id: vec![0.0],
                ig: vec![0.0],
                forward: Branch {
                    vg: vec![0.0],
                    id: vec![0.0],
                    ig: vec![0.0],
                },
                backward: None,
                indices: vec![0],
            },
            metadata: Arc::new(meta),
        }
    }

    #[test]
    fn first_matching_keyword_decides_the_bucket() {
        let table = KeywordTable::default();
        let organized = table.organize(vec![
            record(Some(MeasurementKind::Fet), "ReS2 FET dark"),
            record(Some(MeasurementKind::Aat), "AAT outter electrode"),
            record(Some(MeasurementKind::Fet), "WSe2 FET"),
        ]);

        let labels: Vec<(&str, usize)> = organized
            .buckets
            .iter()
            .map(|b| (b.subtype.as_str(), b.records.len()))
            .collect();
        assert_eq!(labels, vec![("ReS2", 1), ("WSe2", 1), ("outer", 1)]);
    }

    #[test]
    fn unmatched_sweeps_land_in_unknown() {
        let table = KeywordTable::default();
        let organized = table.organize(vec![
            record(Some(MeasurementKind::Fet), "mystery channel"),
            record(None, "no kind at all"),
        ]);
        assert!(organized.buckets.is_empty());
        assert_eq!(organized.unknown_fet.len(), 1);
        assert_eq!(organized.unknown.len(), 1);
        assert_eq!(organized.total(), 2);
    }
}
