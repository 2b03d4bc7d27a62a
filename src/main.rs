mod cli;
mod color;
mod data;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use cli::{Cli, Command, DiagnoseArgs, MergedArgs, SingleArgs};
use data::classify::KeywordTable;
use data::loader;
use data::model::{MeasurementKind, SweepRecord};
use data::splitter::RawTrace;
use render::figure::{render_diagnostic, render_group, resolve_kind};
use render::naming::plot_name;
use render::registry::NameRegistry;
use render::style::{PlotStyle, StyleOverrides};
use render::summary::write_summary;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Merged(args) => run_merged(args),
        Command::Single(args) => run_single(args),
        Command::Diagnose(args) => run_diagnose(args),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Device ID priority: command line > settings file > year-coded default.
fn device_id_for(records: &[SweepRecord], override_id: Option<&str>) -> String {
    if let Some(id) = override_id {
        info!("device ID: {id} (from command line)");
        return id.to_string();
    }
    if let Some(id) = records
        .first()
        .and_then(|r| r.metadata.device_id.as_deref())
    {
        info!("device ID: {id} (from settings file)");
        return id.to_string();
    }
    info!("device ID: DV-26-XX (default)");
    "DV-26-XX".to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))
}

/// Render one group and its sidecar; failures are reported, not fatal, so
/// the rest of the batch still runs.
fn render_with_summary(
    records: &[SweepRecord],
    kind: MeasurementKind,
    subtype: &str,
    device_id: &str,
    title: Option<&str>,
    out_path: &Path,
    style: &PlotStyle,
) -> bool {
    match render_group(records, kind, title, out_path, style) {
        Ok(()) => {
            info!("saved {}", out_path.display());
        }
        Err(err) => {
            error!("could not render {}: {err:#}", out_path.display());
            return false;
        }
    }
    let summary_path = out_path.with_extension("txt");
    if let Err(err) = write_summary(&summary_path, device_id, kind, subtype, records) {
        warn!("could not write summary: {err:#}");
    }
    true
}

// ---------------------------------------------------------------------------
// merged – keyword-grouped plots with a merged fallback
// ---------------------------------------------------------------------------

fn run_merged(args: MergedArgs) -> Result<()> {
    let style = args.render.resolve_style()?;
    let out_dir = args.render.output_dir("merged_plots_output");
    ensure_output_dir(&out_dir)?;

    let records = loader::load_inputs(&args.render.inputs);
    if records.is_empty() {
        bail!("no measurements could be loaded");
    }
    info!("loaded {} sweep(s) total", records.len());

    let device_id = device_id_for(&records, args.render.device.as_deref());
    let extension = style.format.extension();
    let table = KeywordTable::default();

    let mut written = 0usize;

    if args.force_merge || !table.any_keyword_match(&records) {
        if args.force_merge {
            info!("force merge: all measurements in a single plot");
        } else {
            info!("no material/electrode keywords found, plotting everything merged");
        }
        let label = args.label.clone().unwrap_or_else(|| "Merged_Plot".to_string());
        let kind = resolve_kind(&records, args.kind.as_kind());
        let name = plot_name(
            args.render.naming,
            &records,
            kind,
            &label,
            &device_id,
            extension,
        )
        .unwrap_or_else(|| format!("{label}_{device_id}_{}sweeps{extension}", records.len()));
        if render_with_summary(
            &records,
            kind,
            &label,
            &device_id,
            None,
            &out_dir.join(name),
            &style,
        ) {
            written += 1;
        }
    } else {
        let organized = table.organize(records);
        for bucket in &organized.buckets {
            // Electrode buckets are lowercase internally but capitalized in
            // plot names (Inner_AAT_…).
            let label = match bucket.kind {
                MeasurementKind::Aat => capitalize(&bucket.subtype),
                MeasurementKind::Fet => bucket.subtype.clone(),
            };
            info!(
                "{} {}: {} sweep(s)",
                bucket.subtype,
                bucket.kind,
                bucket.records.len()
            );
            let name = plot_name(
                args.render.naming,
                &bucket.records,
                bucket.kind,
                &label,
                &device_id,
                extension,
            )
            .unwrap_or_else(|| format!("{label}_{device_id}{extension}"));
            if render_with_summary(
                &bucket.records,
                bucket.kind,
                &label,
                &device_id,
                None,
                &out_dir.join(name),
                &style,
            ) {
                written += 1;
            }
        }
        let plotted: usize = organized.buckets.iter().map(|b| b.records.len()).sum();
        let leftovers = organized.total() - plotted;
        if leftovers > 0 {
            warn!("{leftovers} sweep(s) matched no keyword bucket and were not plotted");
        }
    }

    println!("{written} plot(s) written to {}", out_dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// single – one plot per input file
// ---------------------------------------------------------------------------

/// Subtype and kind for a single-file plot, from the resolved metadata with
/// the description text as fallback.
fn single_file_subtype(records: &[SweepRecord]) -> (String, MeasurementKind) {
    let meta = &records[0].metadata;
    if let Some(material) = &meta.material {
        return (material.clone(), MeasurementKind::Fet);
    }
    if let Some(electrode) = &meta.electrode {
        return (capitalize(electrode), MeasurementKind::Aat);
    }
    let subtype = meta
        .description
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());
    (subtype, meta.kind.unwrap_or(MeasurementKind::Fet))
}

fn run_single(args: SingleArgs) -> Result<()> {
    let style = args.render.resolve_style()?;
    let out_dir = args.render.output_dir("individual_plots_output");
    ensure_output_dir(&out_dir)?;

    // Expand directories up front so collision handling sees every file.
    let mut files: Vec<PathBuf> = Vec::new();
    for input in &args.render.inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            files.extend(loader::data_files_in(input)?);
        } else {
            warn!("path does not exist: {}", input.display());
        }
    }
    if files.is_empty() {
        bail!("no data files to process");
    }
    info!("processing {} file(s)", files.len());

    let extension = style.format.extension();
    let mut registry = NameRegistry::new();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for file in &files {
        let records = match loader::load_file(file) {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                warn!("{}: no sweeps found", file.display());
                failed += 1;
                continue;
            }
            Err(err) => {
                error!("skipping {}: {err:#}", file.display());
                failed += 1;
                continue;
            }
        };

        let device_id = device_id_for(&records, args.render.device.as_deref());
        let (subtype, kind) = single_file_subtype(&records);
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("measurement");

        let wanted = plot_name(args.render.naming, &records, kind, &subtype, &device_id, extension)
            .unwrap_or_else(|| format!("{stem}{extension}"));
        let claim = registry.claim(&wanted, &records[0].metadata.path);
        if let Some((old, new)) = &claim.rename_earlier {
            match std::fs::rename(out_dir.join(old), out_dir.join(new)) {
                Ok(()) => info!("renamed earlier plot: {old} -> {new}"),
                Err(err) => warn!("could not rename earlier plot {old}: {err}"),
            }
        }

        let title = format!("{subtype} - {stem}");
        if render_with_summary(
            &records,
            kind,
            &subtype,
            &device_id,
            Some(&title),
            &out_dir.join(&claim.name),
            &style,
        ) {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    println!("successfully plotted: {successful} file(s)");
    if failed > 0 {
        println!("failed: {failed} file(s)");
    }
    println!("output directory: {}", out_dir.display());

    if successful == 0 {
        bail!("no file produced a plot");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// diagnose – how a file splits into sweeps
// ---------------------------------------------------------------------------

fn run_diagnose(args: DiagnoseArgs) -> Result<()> {
    let overrides = StyleOverrides {
        format: args.format,
        dpi: args.dpi,
        ..StyleOverrides::default()
    };
    let style = PlotStyle::resolve(&overrides, None);

    let mut any = false;
    for file in &args.inputs {
        let trace = match RawTrace::from_path(file) {
            Ok(trace) => trace,
            Err(err) => {
                error!("skipping {}: {err:#}", file.display());
                continue;
            }
        };
        let records = match loader::load_file(file) {
            Ok(records) => records,
            Err(err) => {
                error!("skipping {}: {err:#}", file.display());
                continue;
            }
        };
        any = true;
        print_diagnosis(file, &trace, &records);

        if !args.no_plot {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("measurement");
            let out_dir = args
                .output
                .clone()
                .or_else(|| file.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            ensure_output_dir(&out_dir)?;
            let out_path = out_dir.join(format!(
                "{stem}_multi_sweep_diagnostic{}",
                style.format.extension()
            ));
            let name = file
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("measurement");
            match render_diagnostic(&trace, &records, name, &out_path, &style) {
                Ok(()) => info!("diagnostic plot saved: {}", out_path.display()),
                Err(err) => error!("could not render diagnostic: {err:#}"),
            }
        }
    }

    if !any {
        bail!("no file could be analyzed");
    }
    Ok(())
}

fn print_diagnosis(file: &Path, trace: &RawTrace, records: &[SweepRecord]) {
    const RULE: &str =
        "======================================================================";
    println!("{RULE}");
    println!("MULTI-SWEEP FILE ANALYSIS");
    println!("{RULE}");
    println!(
        "File: {}",
        file.file_name().unwrap_or_default().to_string_lossy()
    );
    println!("Total data points: {}", trace.len());
    println!("Number of sweeps detected: {}", records.len());
    if let Some(meta) = records.first().map(|r| &r.metadata) {
        println!("Metadata source: {}", meta.source);
        if let Some(settings) = &meta.settings_path {
            println!(
                "Settings file: {}",
                settings.file_name().unwrap_or_default().to_string_lossy()
            );
        }
        if let (Some(start), Some(stop)) = (meta.vg_start, meta.vg_stop) {
            let step = meta
                .vg_step
                .map(|s| format!(", step {s} V"))
                .unwrap_or_default();
            println!("Configured Vg sweep: {start} to {stop} V{step}");
        }
        if let Some(bias) = meta.vd_bias {
            println!("Configured Vd bias: {bias} V");
        }
        if meta.bidirectional == Some(true) {
            println!("Instrument locus: double (bidirectional)");
        }
    }
    println!();

    for (idx, record) in records.iter().enumerate() {
        let sweep = &record.sweep;
        let vg_min = sweep.vg.iter().cloned().fold(f64::INFINITY, f64::min);
        let vg_max = sweep.vg.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let id_min = sweep.id.iter().cloned().fold(f64::INFINITY, f64::min);
        let id_max = sweep.id.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        println!("Sweep {}:", idx + 1);
        println!("  Vd = {:.3} V", sweep.vd);
        println!("  Points: {}", sweep.len());
        println!("  Vg range: {vg_min:.2} to {vg_max:.2} V");
        println!("  Id range: {id_min:.3e} to {id_max:.3e} A");
        match &sweep.backward {
            Some(backward) => {
                println!("  Type: Bidirectional");
                println!("    Forward: {} points", sweep.forward.len());
                println!("    Backward: {} points", backward.len());
            }
            None => println!("  Type: Unidirectional"),
        }
        println!();
    }
    println!("{RULE}");
}
