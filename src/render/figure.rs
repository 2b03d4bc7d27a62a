use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::FontStyle;

use super::style::{ImageFormat, PlotStyle};
use crate::color;
use crate::data::model::{MeasurementKind, SweepRecord};
use crate::data::splitter::RawTrace;

// ---------------------------------------------------------------------------
// Measurement-kind resolution
// ---------------------------------------------------------------------------

/// AAT devices run in the nA regime; anything reaching 1 µA is treated as a
/// FET. Used when the caller asked for `auto`.
const AAT_CURRENT_CEILING: f64 = 1e-6;

pub fn resolve_kind(
    records: &[SweepRecord],
    requested: Option<MeasurementKind>,
) -> MeasurementKind {
    if let Some(kind) = requested {
        return kind;
    }
    let max_current = records
        .iter()
        .flat_map(|r| r.sweep.forward.id.iter())
        .fold(0.0f64, |m, &v| m.max(v.abs()));
    if max_current < AAT_CURRENT_CEILING {
        MeasurementKind::Aat
    } else {
        MeasurementKind::Fet
    }
}

/// Scale factor and axis unit for the drain-current axis.
fn current_scale(kind: MeasurementKind) -> (f64, &'static str) {
    match kind {
        MeasurementKind::Aat => (1e9, "nA"),
        MeasurementKind::Fet => (1e6, "µA"),
    }
}

// ---------------------------------------------------------------------------
// Transfer-curve figure
// ---------------------------------------------------------------------------

/// Render one figure for a group of sweeps: forward branches as solid
/// marked lines, backward branches dashed and lighter, one legend entry per
/// bias level. Sweep data is read only, never modified.
pub fn render_group(
    records: &[SweepRecord],
    kind: MeasurementKind,
    title: Option<&str>,
    out_path: &Path,
    style: &PlotStyle,
) -> Result<()> {
    if records.is_empty() {
        warn!("nothing to plot for {}", out_path.display());
        return Ok(());
    }
    let size = style.figure_size();
    match style.format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(out_path, size).into_drawing_area();
            draw_transfer(&root, records, kind, title, style)?;
            root.present()
                .with_context(|| format!("writing {}", out_path.display()))?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(out_path, size).into_drawing_area();
            draw_transfer(&root, records, kind, title, style)?;
            root.present()
                .with_context(|| format!("writing {}", out_path.display()))?;
        }
    }
    Ok(())
}

fn draw_transfer<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    records: &[SweepRecord],
    kind: MeasurementKind,
    title: Option<&str>,
    style: &PlotStyle,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (scale, unit) = current_scale(kind);
    let px = |pt: f64| (pt * style.dpi as f64 / 72.0).round() as u32;

    root.fill(&WHITE)?;

    let (x_range, y_range) = axis_ranges(records, scale, style);

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(px(10.0))
        .x_label_area_size(px(42.0))
        .y_label_area_size(px(52.0));
    if let Some(text) = title {
        builder.caption(text, ("sans-serif", px(13.0)).into_font().style(FontStyle::Bold));
    }
    let mut chart = builder.build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_labels(style.n_major_ticks)
        .y_labels(style.n_major_ticks)
        .max_light_lines(style.n_minor_ticks)
        .bold_line_style(&BLACK.mix(style.grid_major))
        .light_line_style(&BLACK.mix(style.grid_minor))
        .x_desc("Vg (V)")
        .y_desc(format!("Id ({unit})"))
        .axis_desc_style(("sans-serif", px(14.0)).into_font().style(FontStyle::Bold))
        .label_style(("sans-serif", px(12.0)).into_font().style(FontStyle::Bold))
        .draw()?;

    for (idx, record) in records.iter().enumerate() {
        let color = style.palette.series_color(idx);
        let sweep = &record.sweep;

        let label = style
            .legend_labels
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("Vd = {:.1} V", sweep.vd));

        let forward: Vec<(f64, f64)> = sweep
            .forward
            .vg
            .iter()
            .zip(&sweep.forward.id)
            .map(|(&v, &i)| (v, i * scale))
            .collect();

        chart
            .draw_series(LineSeries::new(
                forward.iter().copied(),
                color.stroke_width(px(1.8).max(2)),
            ))?
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
            });

        // Circle markers on every 5th forward sample.
        chart.draw_series(
            forward
                .iter()
                .step_by(5)
                .map(|&(x, y)| Circle::new((x, y), px(2.2).max(2) as i32, color.filled())),
        )?;

        if let Some(backward) = &sweep.backward {
            let points: Vec<(f64, f64)> = backward
                .vg
                .iter()
                .zip(&backward.id)
                .map(|(&v, &i)| (v, i * scale))
                .collect();
            chart.draw_series(DashedLineSeries::new(
                points,
                px(4.0).max(4),
                px(3.0).max(3),
                color.mix(0.4).stroke_width(px(1.4).max(1)),
            ))?;
        }
    }

    for annotation in &style.annotations {
        let font = ("sans-serif", annotation.font_size * style.dpi / 72)
            .into_font()
            .style(FontStyle::Bold)
            .color(&annotation.color);
        chart.draw_series(std::iter::once(Text::new(
            annotation.text.clone(),
            (annotation.x, annotation.y),
            font,
        )))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(&BLACK.mix(0.3))
        .background_style(&WHITE.mix(0.9))
        .label_font(("sans-serif", px(11.0)))
        .draw()?;

    Ok(())
}

/// Axis ranges: explicit style ranges win, otherwise the data extent with a
/// 5% margin (and a fixed pad for degenerate spans).
fn axis_ranges(
    records: &[SweepRecord],
    scale: f64,
    style: &PlotStyle,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut vg_lo = f64::INFINITY;
    let mut vg_hi = f64::NEG_INFINITY;
    let mut id_lo = f64::INFINITY;
    let mut id_hi = f64::NEG_INFINITY;
    for record in records {
        for &v in &record.sweep.vg {
            vg_lo = vg_lo.min(v);
            vg_hi = vg_hi.max(v);
        }
        for &i in &record.sweep.id {
            id_lo = id_lo.min(i * scale);
            id_hi = id_hi.max(i * scale);
        }
    }

    let x_range = match style.x_range {
        Some((lo, hi)) => lo..hi,
        None => padded(vg_lo, vg_hi),
    };
    let y_range = match style.y_range {
        Some((lo, hi)) => lo..hi,
        None => padded(id_lo, id_hi),
    };
    (x_range, y_range)
}

fn padded(lo: f64, hi: f64) -> std::ops::Range<f64> {
    let span = hi - lo;
    let pad = if span.abs() < f64::EPSILON {
        1.0
    } else {
        span * 0.05
    };
    (lo - pad)..(hi + pad)
}

// ---------------------------------------------------------------------------
// Diagnostic figure – how a file was split
// ---------------------------------------------------------------------------

/// Three stacked panels: all sweeps overlaid, Vd vs sample index (sweep
/// boundaries), and Vg vs sample index (sweep direction).
pub fn render_diagnostic(
    trace: &RawTrace,
    records: &[SweepRecord],
    source_name: &str,
    out_path: &Path,
    style: &PlotStyle,
) -> Result<()> {
    if trace.is_empty() || records.is_empty() {
        warn!("no samples to diagnose for {}", out_path.display());
        return Ok(());
    }
    let size = (8 * style.dpi, 12 * style.dpi);
    match style.format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(out_path, size).into_drawing_area();
            draw_diagnostic(&root, trace, records, source_name, style)?;
            root.present()
                .with_context(|| format!("writing {}", out_path.display()))?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(out_path, size).into_drawing_area();
            draw_diagnostic(&root, trace, records, source_name, style)?;
            root.present()
                .with_context(|| format!("writing {}", out_path.display()))?;
        }
    }
    Ok(())
}

fn draw_diagnostic<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    trace: &RawTrace,
    records: &[SweepRecord],
    source_name: &str,
    style: &PlotStyle,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let px = |pt: f64| (pt * style.dpi as f64 / 72.0).round() as u32;
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 1));
    let colors = color::gradient(records.len());

    // ---- Panel 1: all sweeps overlaid, nA scale ----
    {
        let (scale, unit) = (1e9, "nA");
        let (x_range, y_range) = axis_ranges(records, scale, &PlotStyle {
            x_range: None,
            y_range: None,
            ..style.clone()
        });
        let mut chart = ChartBuilder::on(&panels[0])
            .margin(px(8.0))
            .x_label_area_size(px(36.0))
            .y_label_area_size(px(48.0))
            .caption(
                format!("All sweeps: {source_name}"),
                ("sans-serif", px(12.0)).into_font().style(FontStyle::Bold),
            )
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_labels(style.n_major_ticks)
            .y_labels(style.n_major_ticks)
            .bold_line_style(&BLACK.mix(0.2))
            .light_line_style(&BLACK.mix(0.1))
            .x_desc("Vg (V)")
            .y_desc(format!("Id ({unit})"))
            .axis_desc_style(("sans-serif", px(11.0)).into_font().style(FontStyle::Bold))
            .draw()?;

        for (idx, record) in records.iter().enumerate() {
            let color = colors[idx];
            chart
                .draw_series(LineSeries::new(
                    record
                        .sweep
                        .vg
                        .iter()
                        .zip(&record.sweep.id)
                        .map(|(&v, &i)| (v, i * scale)),
                    color.stroke_width(px(1.0).max(1)),
                ))?
                .label(format!("Vd = {:.2} V", record.sweep.vd))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
                });
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .border_style(&BLACK.mix(0.3))
            .background_style(&WHITE.mix(0.9))
            .label_font(("sans-serif", px(9.0)))
            .draw()?;
    }

    // ---- Panel 2: Vd vs index, sweep boundaries dashed ----
    {
        let n = trace.len().max(1);
        let (vd_lo, vd_hi) = extent(&trace.vd);
        let mut chart = ChartBuilder::on(&panels[1])
            .margin(px(8.0))
            .x_label_area_size(px(36.0))
            .y_label_area_size(px(48.0))
            .caption(
                "Vd vs index (sweep boundaries)",
                ("sans-serif", px(12.0)).into_font().style(FontStyle::Bold),
            )
            .build_cartesian_2d(0f64..n as f64, padded(vd_lo, vd_hi))?;
        chart
            .configure_mesh()
            .bold_line_style(&BLACK.mix(0.2))
            .light_line_style(&BLACK.mix(0.1))
            .x_desc("Sample index")
            .y_desc("Vd (V)")
            .axis_desc_style(("sans-serif", px(11.0)).into_font().style(FontStyle::Bold))
            .draw()?;

        chart.draw_series(LineSeries::new(
            trace.vd.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            RGBColor(0xE6, 0x9F, 0x00).stroke_width(px(1.0).max(1)),
        ))?;

        let boundary = RGBColor(0xCC, 0x33, 0x11);
        for record in records {
            for &edge in [record.sweep.indices.first(), record.sweep.indices.last()]
                .into_iter()
                .flatten()
            {
                chart.draw_series(DashedLineSeries::new(
                    vec![(edge as f64, vd_lo), (edge as f64, vd_hi)],
                    px(3.0).max(3),
                    px(3.0).max(3),
                    boundary.mix(0.5).stroke_width(1),
                ))?;
            }
        }
    }

    // ---- Panel 3: Vg vs index, coloured per sweep ----
    {
        let n = trace.len().max(1);
        let (vg_lo, vg_hi) = extent(&trace.vg);
        let mut chart = ChartBuilder::on(&panels[2])
            .margin(px(8.0))
            .x_label_area_size(px(36.0))
            .y_label_area_size(px(48.0))
            .caption(
                "Vg vs index (sweep direction)",
                ("sans-serif", px(12.0)).into_font().style(FontStyle::Bold),
            )
            .build_cartesian_2d(0f64..n as f64, padded(vg_lo, vg_hi))?;
        chart
            .configure_mesh()
            .bold_line_style(&BLACK.mix(0.2))
            .light_line_style(&BLACK.mix(0.1))
            .x_desc("Sample index")
            .y_desc("Vg (V)")
            .axis_desc_style(("sans-serif", px(11.0)).into_font().style(FontStyle::Bold))
            .draw()?;

        for (idx, record) in records.iter().enumerate() {
            chart.draw_series(LineSeries::new(
                record
                    .sweep
                    .indices
                    .iter()
                    .zip(&record.sweep.vg)
                    .map(|(&i, &v)| (i as f64, v)),
                colors[idx].stroke_width(px(1.0).max(1)),
            ))?;
        }
    }

    Ok(())
}

fn extent(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Branch, Metadata, Provenance, Sweep, SweepType};
    use std::sync::Arc;

    fn record_with_current(id_level: f64) -> SweepRecord {
        let meta = Metadata {
            filename: "test.txt".to_string(),
            path: Path::new("test.txt").to_path_buf(),
            date: None,
            time: None,
            description: None,
            kind: None,
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
        let vg = vec![-2.0, -1.0, 0.0, 1.0];
        SweepRecord {
            sweep: Sweep {
                vd: 1.0,
                vg: vg.clone(),
                id: vec![id_level; 4],
                ig: vec![0.0; 4],
                forward: Branch {
                    vg,
                    id: vec![id_level; 4],
                    ig: vec![0.0; 4],
                },
                backward: None,
                indices: vec![0, 1, 2, 3],
            },
            metadata: Arc::new(meta),
        }
    }

    #[test]
    fn auto_kind_resolves_by_current_magnitude() {
        let nano = vec![record_with_current(5e-9)];
        let micro = vec![record_with_current(3e-6)];
        assert_eq!(resolve_kind(&nano, None), MeasurementKind::Aat);
        assert_eq!(resolve_kind(&micro, None), MeasurementKind::Fet);
        assert_eq!(
            resolve_kind(&nano, Some(MeasurementKind::Fet)),
            MeasurementKind::Fet
        );
    }

    #[test]
    fn svg_render_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plot.svg");
        let style = PlotStyle {
            format: ImageFormat::Svg,
            dpi: 100,
            ..crate::render::style::PlotStyle::resolve(
                &crate::render::style::StyleOverrides::default(),
                None,
            )
        };
        let records = vec![record_with_current(5e-9)];
        render_group(&records, MeasurementKind::Aat, None, &out, &style).unwrap();
        assert!(out.exists());
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
    }
}
