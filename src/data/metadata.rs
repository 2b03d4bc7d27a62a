use std::path::Path;
use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;

use super::model::{MeasurementKind, Metadata, Provenance, SweepType};
use super::settings::{find_settings_file, parse_settings_file, SettingsInfo};

// ---------------------------------------------------------------------------
// Filename parsing – the weak metadata source
// ---------------------------------------------------------------------------

fn bracket_description() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(.+?);").expect("valid bracket regex"))
}

fn double_underscore() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_{2,}").expect("valid separator regex"))
}

fn filename_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})_(\d{1,2})_(\d{1,2})").expect("valid date regex"))
}

fn filename_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"_(\d{1,2})_(\d{1,2})_(\d{1,2})(?:_|\.)").expect("valid time regex")
    })
}

impl Metadata {
    /// Build the filename-derived record for a data file. This is the weak
    /// source: a settings sidecar, when present, overrides it field by field
    /// via [`Metadata::apply_settings`].
    pub fn from_filename(path: &Path) -> Metadata {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let mut meta = Metadata {
            filename: path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
            path: path.to_path_buf(),
            date: None,
            time: None,
            description: None,
            kind: None,
            electrode: None,
            material: None,
            sweep_type: SweepType::detect(stem).unwrap_or_default(),
            device_id: None,
            vg_start: None,
            vg_stop: None,
            vg_step: None,
            vd_bias: None,
            bidirectional: None,
            source: Provenance::Filename,
            settings_path: None,
        };

        // Description: bracketed `[ text; …]` form first, then the second
        // chunk of a double-underscore separated name.
        if let Some(caps) = bracket_description().captures(stem) {
            let text = caps[1].trim();
            if !text.is_empty() {
                meta.description = Some(text.to_string());
            }
        } else {
            let parts: Vec<&str> = double_underscore().split(stem).collect();
            if parts.len() >= 2 {
                meta.description = Some(parts[1].trim().to_string());
            }
        }

        if let Some(desc) = meta.description.clone() {
            classify_description(&desc, &mut meta);
        }

        if let Some(caps) = filename_date().captures(stem) {
            meta.date = Some(format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]));
        }
        if let Some(caps) = filename_time().captures(stem) {
            meta.time = Some(format!("{:0>2}:{:0>2}:{:0>2}", &caps[1], &caps[2], &caps[3]));
        }

        meta
    }

    /// Override every field the settings file populated. Fields absent from
    /// the sidecar keep their filename-derived value.
    pub fn apply_settings(&mut self, settings: &SettingsInfo, settings_path: &Path) {
        if let Some(sweep_type) = settings.sweep_type {
            self.sweep_type = sweep_type;
        }
        if let Some(date) = &settings.date {
            self.date = Some(date.clone());
        }
        if let Some(time) = &settings.time {
            self.time = Some(time.clone());
        }
        if let Some(device_id) = &settings.device_id {
            self.device_id = Some(device_id.clone());
        }
        if let Some(vg_start) = settings.vg_start {
            self.vg_start = Some(vg_start);
        }
        if let Some(vg_stop) = settings.vg_stop {
            self.vg_stop = Some(vg_stop);
        }
        if let Some(vg_step) = settings.vg_step {
            self.vg_step = Some(vg_step);
        }
        if let Some(vd_bias) = settings.vd_bias {
            self.vd_bias = Some(vd_bias);
        }
        if let Some(bidirectional) = settings.bidirectional {
            self.bidirectional = Some(bidirectional);
        }
        self.source = Provenance::SettingsFile;
        self.settings_path = Some(settings_path.to_path_buf());
    }
}

/// Keyword analysis of the description text: measurement kind, then the
/// electrode or material sub-keyword.
fn classify_description(description: &str, meta: &mut Metadata) {
    let lower = description.to_lowercase();

    if lower.contains("aat") {
        meta.kind = Some(MeasurementKind::Aat);
        if lower.contains("inner") {
            meta.electrode = Some("inner".to_string());
        } else if lower.contains("outer") || lower.contains("outter") {
            // "outter" shows up in real lab filenames.
            meta.electrode = Some("outer".to_string());
        }
    } else if lower.contains("fet") {
        meta.kind = Some(MeasurementKind::Fet);
        if lower.contains("res2") || lower.contains("res₂") {
            meta.material = Some("ReS2".to_string());
        } else if lower.contains("wse2") || lower.contains("wse₂") {
            meta.material = Some("WSe2".to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver – filename record + optional settings override
// ---------------------------------------------------------------------------

/// Produce the final metadata record for a data file.
///
/// A settings sidecar always wins over filename inference when found and
/// parseable; a sidecar that fails to parse only costs a warning.
pub fn resolve(path: &Path) -> Metadata {
    let mut meta = Metadata::from_filename(path);

    let Some(settings_path) = find_settings_file(path) else {
        return meta;
    };
    info!(
        "found settings file: {}",
        settings_path.file_name().unwrap_or_default().to_string_lossy()
    );

    match parse_settings_file(&settings_path) {
        Ok(settings) => {
            meta.apply_settings(&settings, &settings_path);
            match &meta.device_id {
                Some(id) => info!("loaded settings metadata (device ID: {id})"),
                None => info!("loaded settings metadata"),
            }
        }
        Err(err) => {
            warn!(
                "could not parse settings file {}: {err:#}; using filename metadata",
                settings_path.display()
            );
        }
    }

    meta
}
