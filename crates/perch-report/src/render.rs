//! SVG rendering of chart specifications with plotters

use crate::chart::{ChartKind, ChartSpec, Interval, Mark, SeriesData};
use perch_core::moments::quantile_sorted;
use perch_core::{Error, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;
type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const SIZE: (u32, u32) = (960, 640);
const CAPTION_FONT: (&str, i32) = ("sans-serif", 22);

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

/// Draw `spec` into an SVG file at `path`, creating the parent directory
pub fn render_svg(spec: &ChartSpec, path: &Path) -> Result<()> {
    spec.validate()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    {
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        draw(&root, spec)
            .and_then(|()| root.present().map_err(Into::into))
            .map_err(|e| Error::Render(format!("{}: {e}", path.display())))?;
    }
    debug!(path = %path.display(), title = %spec.title, "rendered chart");
    Ok(())
}

fn draw(root: &Area<'_>, spec: &ChartSpec) -> DrawResult {
    root.fill(&WHITE)?;
    match spec.kind {
        ChartKind::Scatter | ChartKind::Line => draw_xy(root, spec),
        ChartKind::Bar => draw_bars(root, spec, false),
        ChartKind::StackedBar => draw_bars(root, spec, true),
        ChartKind::Histogram { bins } => draw_histogram(root, spec, bins),
        ChartKind::BoxPlot => draw_boxes(root, spec),
        ChartKind::Forest { reference } => draw_forest(root, spec, reference),
        ChartKind::Heatmap => draw_heatmap(root, spec),
    }
}

/// Range covering `values` with a margin; widened when all values coincide
fn padded(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    let margin = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.5 };
    (lo - margin)..(hi + margin)
}

/// Label for integer positions on a categorical axis, blank elsewhere
fn category_label(labels: &[String], value: f64) -> String {
    let index = value.round();
    if (value - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

fn series_labels(spec: &ChartSpec) -> Vec<String> {
    spec.series.iter().map(|s| s.name.clone()).collect()
}

fn draw_xy(root: &Area<'_>, spec: &ChartSpec) -> DrawResult {
    let points: Vec<(f64, f64)> = spec
        .series
        .iter()
        .filter_map(|s| match &s.data {
            SeriesData::Points(p) => Some(p.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect();

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(
            padded(points.iter().map(|p| p.0)),
            padded(points.iter().map(|p| p.1)),
        )?;
    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    for (i, series) in spec.series.iter().enumerate() {
        let SeriesData::Points(points) = &series.data else {
            continue;
        };
        let c = color(i);
        if spec.kind == ChartKind::Line || series.mark == Mark::Line {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), c.stroke_width(2)))?
                .label(series.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(2)));
        } else {
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 3, c.mix(0.6).filled())))?
                .label(series.name.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), 3, c.filled()));
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_bars(root: &Area<'_>, spec: &ChartSpec, stacked: bool) -> DrawResult {
    let n = spec.categories.len();
    let k = spec.series.len();
    let values: Vec<&[f64]> = spec
        .series
        .iter()
        .filter_map(|s| match &s.data {
            SeriesData::Values(v) => Some(v.as_slice()),
            _ => None,
        })
        .collect();

    let top = if stacked {
        (0..n)
            .map(|i| values.iter().map(|v| v[i].max(0.0)).sum::<f64>())
            .fold(0.0, f64::max)
    } else {
        values.iter().flat_map(|v| v.iter().copied()).fold(0.0, f64::max)
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..(top * 1.1).max(1.0))?;
    let formatter = |v: &f64| category_label(&spec.categories, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(4 * n + 1)
        .x_label_formatter(&formatter)
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    let width = 0.8 / k.max(1) as f64;
    let mut base = vec![0.0; n];
    for (j, (series, v)) in spec.series.iter().zip(&values).enumerate() {
        let c = color(j);
        let rects: Vec<Rectangle<(f64, f64)>> = (0..n)
            .map(|i| {
                let centre = i as f64;
                let (x0, x1, y0) = if stacked {
                    (centre - 0.4, centre + 0.4, base[i])
                } else {
                    let x0 = centre - 0.4 + j as f64 * width;
                    (x0, x0 + width, 0.0)
                };
                Rectangle::new([(x0, y0), (x1, y0 + v[i])], c.filled())
            })
            .collect();
        if stacked {
            for (b, value) in base.iter_mut().zip(v.iter()) {
                *b += value;
            }
        }
        chart
            .draw_series(rects)?
            .label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], c.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_histogram(root: &Area<'_>, spec: &ChartSpec, bins: usize) -> DrawResult {
    let values: Vec<f64> = spec
        .series
        .iter()
        .filter_map(|s| match &s.data {
            SeriesData::Values(v) => Some(v.iter().copied()),
            _ => None,
        })
        .flatten()
        .filter(|v| v.is_finite())
        .collect();

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = match (lo.is_finite(), hi > lo) {
        (true, true) => (lo, hi),
        (true, false) => (lo - 0.5, lo + 0.5),
        (false, _) => (0.0, 1.0),
    };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0u32; bins];
    for v in &values {
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let top = counts.iter().copied().max().unwrap_or(0);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0.0..(f64::from(top) * 1.1).max(1.0))?;
    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    let c = color(0);
    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = lo + i as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, f64::from(count))], c.mix(0.8).filled())
    }))?;
    Ok(())
}

/// Quartiles and 1.5 IQR whiskers clipped to the data
struct BoxStats {
    lower_whisker: f64,
    q1: f64,
    median: f64,
    q3: f64,
    upper_whisker: f64,
}

fn box_stats(values: &[f64]) -> Result<BoxStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let fence = 1.5 * (q3 - q1);
    let lower_whisker = sorted.iter().copied().find(|&v| v >= q1 - fence).unwrap_or(q1);
    let upper_whisker = sorted.iter().rev().copied().find(|&v| v <= q3 + fence).unwrap_or(q3);
    Ok(BoxStats {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
    })
}

fn draw_boxes(root: &Area<'_>, spec: &ChartSpec) -> DrawResult {
    let labels = series_labels(spec);
    let samples: Vec<&[f64]> = spec
        .series
        .iter()
        .filter_map(|s| match &s.data {
            SeriesData::Values(v) => Some(v.as_slice()),
            _ => None,
        })
        .collect();
    let stats = samples
        .iter()
        .map(|s| box_stats(s))
        .collect::<Result<Vec<_>>>()?;

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(
            -0.5..(labels.len() as f64 - 0.5),
            padded(samples.iter().flat_map(|s| s.iter().copied())),
        )?;
    let formatter = |v: &f64| category_label(&labels, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(4 * labels.len() + 1)
        .x_label_formatter(&formatter)
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    for (i, (s, sample)) in stats.iter().zip(&samples).enumerate() {
        let x = i as f64;
        let c = color(i);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.25, s.q1), (x + 0.25, s.q3)],
            c.mix(0.4).filled(),
        )))?;
        chart.draw_series(
            [
                vec![(x - 0.25, s.median), (x + 0.25, s.median)],
                vec![(x, s.q3), (x, s.upper_whisker)],
                vec![(x, s.q1), (x, s.lower_whisker)],
                vec![(x - 0.1, s.upper_whisker), (x + 0.1, s.upper_whisker)],
                vec![(x - 0.1, s.lower_whisker), (x + 0.1, s.lower_whisker)],
            ]
            .into_iter()
            .map(|path| PathElement::new(path, BLACK.stroke_width(2))),
        )?;
        // Outliers beyond the whiskers
        chart.draw_series(
            sample
                .iter()
                .filter(|&&v| v < s.lower_whisker || v > s.upper_whisker)
                .map(|&v| Circle::new((x, v), 2, c.filled())),
        )?;
    }
    Ok(())
}

fn draw_forest(root: &Area<'_>, spec: &ChartSpec, reference: f64) -> DrawResult {
    let intervals: Vec<&Interval> = spec
        .series
        .iter()
        .filter_map(|s| match &s.data {
            SeriesData::Intervals(i) => Some(i.iter()),
            _ => None,
        })
        .flatten()
        .collect();
    let labels: Vec<String> = intervals.iter().map(|i| i.label.clone()).collect();
    let k = intervals.len();

    let x_range = padded(
        intervals
            .iter()
            .flat_map(|i| [i.lower, i.upper, i.estimate])
            .chain(std::iter::once(reference)),
    );
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(160)
        .build_cartesian_2d(x_range.clone(), -0.5..(k as f64 - 0.5))?;
    let formatter = |v: &f64| category_label(&labels, *v);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(4 * k + 1)
        .y_label_formatter(&formatter)
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(reference, -0.5), (reference, k as f64 - 0.5)],
        RGBColor(120, 120, 120).stroke_width(1),
    )))?;
    let c = color(0);
    chart.draw_series(intervals.iter().enumerate().map(|(i, interval)| {
        PathElement::new(
            vec![(interval.lower, i as f64), (interval.upper, i as f64)],
            c.stroke_width(2),
        )
    }))?;
    chart.draw_series(
        intervals
            .iter()
            .enumerate()
            .map(|(i, interval)| Circle::new((interval.estimate, i as f64), 5, c.filled())),
    )?;
    Ok(())
}

/// Diverging blue-white-red scale over [-1, 1]
fn diverging(value: f64) -> RGBColor {
    if !value.is_finite() {
        return RGBColor(200, 200, 200);
    }
    let t = value.clamp(-1.0, 1.0);
    let blend = |from: u8, to: u8, w: f64| (f64::from(from) + (f64::from(to) - f64::from(from)) * w) as u8;
    if t < 0.0 {
        RGBColor(blend(255, 59, -t), blend(255, 76, -t), blend(255, 192, -t))
    } else {
        RGBColor(blend(255, 180, t), blend(255, 4, t), blend(255, 38, t))
    }
}

fn draw_heatmap(root: &Area<'_>, spec: &ChartSpec) -> DrawResult {
    let k = spec.categories.len();
    let Some(rows) = spec.series.iter().find_map(|s| match &s.data {
        SeriesData::Matrix(rows) => Some(rows),
        _ => None,
    }) else {
        return Ok(());
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(160)
        .build_cartesian_2d(-0.5..(k as f64 - 0.5), -0.5..(k as f64 - 0.5))?;
    let formatter = |v: &f64| category_label(&spec.categories, *v);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(4 * k + 1)
        .y_labels(4 * k + 1)
        .x_label_formatter(&formatter)
        .y_label_formatter(&formatter)
        .draw()?;

    for (i, row) in rows.iter().enumerate() {
        let y = i as f64;
        chart.draw_series(row.iter().enumerate().map(|(j, &value)| {
            let x = j as f64;
            Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], diverging(value).filled())
        }))?;
        chart.draw_series(row.iter().enumerate().map(|(j, &value)| {
            Text::new(format!("{value:.2}"), (j as f64 - 0.12, y), ("sans-serif", 16).into_font())
        }))?;
    }
    Ok(())
}
