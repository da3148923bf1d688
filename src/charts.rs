//! SVG chart rendering.
//!
//! Each `*_chart` function draws one figure into one file. `ChartWriter`
//! owns the output directory and numbers files in report order so the
//! directory listing follows the console report.

use crate::reports::CrossTab;
use crate::stats::{min_max, quantile_sorted, Histogram, Kde, ProbPlot};
use anyhow::{ensure, Context, Result};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};

const SIZE: (u32, u32) = (1000, 600);
const FONT: &str = "sans-serif";

pub struct ChartWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ChartWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating chart directory {}", dir.display()))?;
        Ok(ChartWriter {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    /// Render one chart to `<dir>/<nn>_<name>.svg`.
    pub fn render<F>(&mut self, name: &str, draw: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let path = self
            .dir
            .join(format!("{:02}_{}.svg", self.written.len() + 1, name));
        draw(&path).with_context(|| format!("rendering {}", path.display()))?;
        info!("chart written: {}", path.display());
        self.written.push(path.clone());
        Ok(path)
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Colour maps used by the report.
#[derive(Debug, Clone, Copy)]
pub enum Palette {
    CoolWarm,
    Viridis,
}

impl Palette {
    fn stops(self) -> &'static [(f64, (u8, u8, u8))] {
        match self {
            Palette::CoolWarm => &[
                (0.0, (59, 76, 192)),
                (0.25, (124, 159, 249)),
                (0.5, (221, 221, 221)),
                (0.75, (246, 152, 121)),
                (1.0, (180, 4, 38)),
            ],
            Palette::Viridis => &[
                (0.0, (68, 1, 84)),
                (0.25, (59, 82, 139)),
                (0.5, (33, 145, 140)),
                (0.75, (94, 201, 98)),
                (1.0, (253, 231, 37)),
            ],
        }
    }

    /// Continuous lookup, `t` clamped to `[0, 1]`.
    pub fn at(self, t: f64) -> RGBColor {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
        let stops = self.stops();
        for pair in stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let f = (t - t0) / (t1 - t0);
                let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
                return RGBColor(mix(c0.0, c1.0), mix(c0.1, c1.1), mix(c0.2, c1.2));
            }
        }
        let (_, c) = stops[stops.len() - 1];
        RGBColor(c.0, c.1, c.2)
    }

    /// `n` colours sampled evenly across the map.
    pub fn sample(self, n: usize) -> Vec<RGBColor> {
        match n {
            0 => Vec::new(),
            1 => vec![self.at(0.0)],
            _ => (0..n).map(|i| self.at(i as f64 / (n - 1) as f64)).collect(),
        }
    }
}

/// Colour `i` of a cycle, blue when the cycle is empty.
fn color_at(colors: &[RGBColor], i: usize) -> RGBColor {
    if colors.is_empty() {
        BLUE
    } else {
        colors[i % colors.len()]
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn category_label(labels: &[String], x: f64) -> String {
    let i = x.round();
    if (x - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

/// Unique labels in first-seen order, then sorted for a stable legend.
fn distinct_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for l in labels {
        if !out.iter().any(|x| x == l) {
            out.push(l.to_string());
        }
    }
    out.sort();
    out
}

pub struct Axes<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
}

/// One bar per category.
pub fn bar_chart(
    path: &Path,
    axes: &Axes,
    bars: &[(String, f64)],
    colors: &[RGBColor],
) -> Result<()> {
    ensure!(!bars.is_empty(), "no bars to draw");
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
    let top = bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::max) * 1.1;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(bars.len() as f64 - 0.5), 0f64..top.max(1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
        let color = color_at(colors, i);
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], color.filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Pie chart starting at twelve o'clock, slices labelled with their share.
pub fn pie_chart(
    path: &Path,
    title: &str,
    slices: &[(String, f64)],
    colors: &[RGBColor],
) -> Result<()> {
    let total: f64 = slices.iter().map(|(_, v)| *v).sum();
    ensure!(total > 0.0, "pie chart needs a positive total");

    let root = SVGBackend::new(path, (700, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    root.draw(&Text::new(
        title.to_string(),
        (350, 30),
        (FONT, 24)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    let center = (350.0, 380.0);
    let radius = 250.0;
    let mut start = -90.0f64;
    for (i, (label, v)) in slices.iter().enumerate() {
        let sweep = v / total * 360.0;
        let color = color_at(colors, i);
        let steps = ((sweep / 2.0).ceil() as usize).max(2);
        let mut points = vec![(center.0 as i32, center.1 as i32)];
        for s in 0..=steps {
            let angle = (start + sweep * s as f64 / steps as f64).to_radians();
            points.push((
                (center.0 + radius * angle.cos()) as i32,
                (center.1 + radius * angle.sin()) as i32,
            ));
        }
        root.draw(&Polygon::new(points, color.filled()))?;

        let mid = (start + sweep / 2.0).to_radians();
        let text_style = (FONT, 16)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            format!("{:.1}%", v / total * 100.0),
            (
                (center.0 + radius * 0.6 * mid.cos()) as i32,
                (center.1 + radius * 0.6 * mid.sin()) as i32,
            ),
            text_style.clone(),
        ))?;
        root.draw(&Text::new(
            label.clone(),
            (
                (center.0 + radius * 1.1 * mid.cos()) as i32,
                (center.1 + radius * 1.1 * mid.sin()) as i32,
            ),
            text_style,
        ))?;
        start += sweep;
    }

    root.present()?;
    Ok(())
}

/// Bars from a cross-tabulation: one category per row key, one series per
/// column value, either side by side or stacked.
pub fn crosstab_chart(
    path: &Path,
    axes: &Axes,
    ct: &CrossTab,
    stacked: bool,
    palette: Palette,
) -> Result<()> {
    ensure!(!ct.is_empty(), "cross-tabulation is empty");
    let labels: Vec<String> = ct.rows.iter().map(|r| CrossTab::row_label(r)).collect();
    let colors = palette.sample(ct.columns.len());
    let top_count = if stacked {
        ct.rows.iter().map(|r| ct.row_total(r)).max().unwrap_or(0)
    } else {
        ct.rows
            .iter()
            .flat_map(|r| ct.columns.iter().map(move |c| ct.cell(r, c)))
            .max()
            .unwrap_or(0)
    };
    let top = top_count as f64;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            -0.5f64..(ct.rows.len() as f64 - 0.5),
            0f64..(top * 1.1).max(1.0),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(ct.rows.len())
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    let width = 0.8;
    let series = ct.columns.len() as f64;
    for (ci, column) in ct.columns.iter().enumerate() {
        let color = colors[ci];
        let bars = ct.rows.iter().enumerate().map(|(ri, row)| {
            let x = ri as f64;
            let count = ct.cell(row, column) as f64;
            if stacked {
                let below: usize = ct.columns[..ci].iter().map(|c| ct.cell(row, c)).sum();
                let base = below as f64;
                Rectangle::new(
                    [(x - width / 2.0, base), (x + width / 2.0, base + count)],
                    color.filled(),
                )
            } else {
                let left = x - width / 2.0 + width * ci as f64 / series;
                Rectangle::new(
                    [(left, 0.0), (left + width / series, count)],
                    color.filled(),
                )
            }
        });
        chart
            .draw_series(bars)?
            .label(column.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// A named polyline.
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

fn xy_bounds(series: &[Series], y_from_zero: bool) -> Option<((f64, f64), (f64, f64))> {
    let xs: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .collect();
    let ys: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.1))
        .collect();
    let (x0, x1) = min_max(&xs)?;
    let (y0, y1) = min_max(&ys)?;
    let y0 = if y_from_zero { 0.0 } else { y0 };
    Some((padded(x0, x1), padded(y0, y1)))
}

/// Line chart with point markers; a legend is drawn once there is more
/// than one series.
pub fn line_chart(path: &Path, axes: &Axes, series: &[Series]) -> Result<()> {
    let ((x0, x1), (y0, y1)) = xy_bounds(series, true).context("no points to draw")?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.points.iter().copied(),
                color.stroke_width(2),
            ))?
            .label(s.label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        chart.draw_series(s.points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

/// Vertical drop lines from the x axis to each point, one colour per series.
pub fn drop_line_chart(path: &Path, axes: &Axes, series: &[Series]) -> Result<()> {
    let ((x0, x1), (y0, y1)) = xy_bounds(series, true).context("no points to draw")?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    for s in series {
        let color = s.color;
        chart.draw_series(s.points.iter().map(|&(x, y)| {
            PathElement::new(vec![(x, 0.0), (x, y)], color.mix(0.7).stroke_width(2))
        }))?;
        chart
            .draw_series(s.points.iter().map(|&p| Circle::new(p, 5, color.filled())))?
            .label(s.label.clone())
            .legend(move |(x, y)| Circle::new((x + 6, y), 5, color.filled()));
        chart.draw_series(
            s.points
                .iter()
                .map(|&p| Circle::new(p, 5, BLACK.stroke_width(1))),
        )?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Box-and-whisker plot per group. Whiskers reach the furthest value within
/// 1.5 IQR of the box; values beyond are drawn as outliers.
pub fn box_chart(
    path: &Path,
    axes: &Axes,
    groups: &[(String, Vec<f64>)],
    colors: &[RGBColor],
) -> Result<()> {
    let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let (lo, hi) = min_max(&all).context("no values to draw")?;
    let (lo, hi) = padded(lo, hi);
    let labels: Vec<String> = groups.iter().map(|(l, _)| l.clone()).collect();

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(groups.len() as f64 - 0.5), lo..hi)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(groups.len())
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    for (i, (_, values)) in groups.iter().enumerate() {
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let (Some(q1), Some(q2), Some(q3)) = (
            quantile_sorted(&sorted, 0.25),
            quantile_sorted(&sorted, 0.5),
            quantile_sorted(&sorted, 0.75),
        ) else {
            continue;
        };
        let iqr = q3 - q1;
        let (fence_lo, fence_hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let whisker_lo = sorted
            .iter()
            .copied()
            .find(|v| *v >= fence_lo)
            .unwrap_or(q1);
        let whisker_hi = sorted
            .iter()
            .rev()
            .copied()
            .find(|v| *v <= fence_hi)
            .unwrap_or(q3);

        let x = i as f64;
        let color = color_at(colors, i);
        let thin = BLACK.stroke_width(1);
        chart.draw_series([
            Rectangle::new([(x - 0.3, q1), (x + 0.3, q3)], color.filled()),
            Rectangle::new([(x - 0.3, q1), (x + 0.3, q3)], thin),
        ])?;
        chart.draw_series([
            PathElement::new(vec![(x - 0.3, q2), (x + 0.3, q2)], BLACK.stroke_width(2)),
            PathElement::new(vec![(x, q1), (x, whisker_lo)], thin),
            PathElement::new(vec![(x, q3), (x, whisker_hi)], thin),
            PathElement::new(vec![(x - 0.15, whisker_lo), (x + 0.15, whisker_lo)], thin),
            PathElement::new(vec![(x - 0.15, whisker_hi), (x + 0.15, whisker_hi)], thin),
        ])?;
        chart.draw_series(
            sorted
                .iter()
                .filter(|v| **v < fence_lo || **v > fence_hi)
                .map(|v| Circle::new((x, *v), 3, thin)),
        )?;
    }

    root.present()?;
    Ok(())
}

/// Histogram over a shared set of bins with a density curve per group,
/// scaled to counts. Several groups are stacked bin by bin.
pub fn histogram_chart(
    path: &Path,
    axes: &Axes,
    groups: &[(String, Vec<f64>)],
    bins: usize,
    colors: &[RGBColor],
) -> Result<()> {
    let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let (lo, hi) = min_max(&all).context("no values to draw")?;
    let hists: Vec<Histogram> = groups
        .iter()
        .map(|(_, v)| Histogram::with_range(v, bins, lo, hi))
        .collect();
    let edges = hists[0].edges.clone();
    let width = hists[0].bin_width();
    let n_bins = edges.len() - 1;
    let stacked_top = (0..n_bins)
        .map(|b| hists.iter().map(|h| h.counts[b]).sum::<usize>())
        .max()
        .unwrap_or(0) as f64;
    let (x0, x1) = padded(edges[0], edges[n_bins]);

    let curves: Vec<Option<Vec<(f64, f64)>>> = groups
        .iter()
        .map(|(_, v)| {
            Kde::new(v).map(|kde| {
                let scale = v.len() as f64 * width;
                kde.curve(x0, x1, 200)
                    .into_iter()
                    .map(|(x, d)| (x, d * scale))
                    .collect()
            })
        })
        .collect();
    let curve_top = curves
        .iter()
        .flatten()
        .flat_map(|c| c.iter().map(|p| p.1))
        .fold(0.0f64, f64::max);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0f64..(stacked_top.max(curve_top) * 1.1).max(1.0))?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    let mut base = vec![0usize; n_bins];
    for (gi, ((label, _), hist)) in groups.iter().zip(&hists).enumerate() {
        let color = color_at(colors, gi);
        let bars: Vec<Rectangle<(f64, f64)>> = (0..n_bins)
            .map(|b| {
                let bottom = base[b] as f64;
                let top = bottom + hist.counts[b] as f64;
                Rectangle::new(
                    [(edges[b], bottom), (edges[b + 1], top)],
                    color.mix(0.6).filled(),
                )
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(label.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        for (b, count) in hist.counts.iter().enumerate() {
            base[b] += count;
        }
        if let Some(curve) = &curves[gi] {
            chart.draw_series(LineSeries::new(
                curve.iter().copied(),
                color.stroke_width(2),
            ))?;
        }
    }

    if groups.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

/// Normal probability plot with its least-squares reference line.
pub fn qq_chart(path: &Path, title: &str, plot: &ProbPlot) -> Result<()> {
    let (tx0, tx1) = min_max(&plot.theoretical).context("no points to draw")?;
    let (oy0, oy1) = min_max(&plot.ordered).context("no points to draw")?;
    let (x0, x1) = padded(tx0, tx1);
    let (y0, y1) = padded(
        oy0.min(plot.intercept + plot.slope * tx0),
        oy1.max(plot.intercept + plot.slope * tx1),
    );

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("Theoretical quantiles")
        .y_desc("Ordered Values")
        .draw()?;

    chart.draw_series(
        plot.theoretical
            .iter()
            .zip(&plot.ordered)
            .map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())),
    )?;
    chart.draw_series(LineSeries::new(
        [x0, x1].map(|x| (x, plot.intercept + plot.slope * x)),
        RED.stroke_width(2),
    ))?;
    root.draw(&Text::new(
        format!("R² = {:.4}", plot.r * plot.r),
        (SIZE.0 as i32 - 200, 70),
        (FONT, 16).into_font(),
    ))?;

    root.present()?;
    Ok(())
}

/// Scatter plot coloured by a categorical label.
pub fn scatter_chart(
    path: &Path,
    axes: &Axes,
    points: &[(f64, f64, String)],
    palette: Palette,
) -> Result<()> {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (x0, x1) = min_max(&xs).context("no points to draw")?;
    let (y0, y1) = min_max(&ys).context("no points to draw")?;
    let (x0, x1) = padded(x0, x1);
    let (y0, y1) = padded(y0, y1);
    let labels = distinct_labels(points.iter().map(|p| p.2.as_str()));
    let colors = palette.sample(labels.len());

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(axes.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .draw()?;

    for (label, color) in labels.iter().zip(colors) {
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| &p.2 == label)
                    .map(|p| Circle::new((p.0, p.1), 4, color.mix(0.7).filled())),
            )?
            .label(label.clone())
            .legend(move |(x, y)| Circle::new((x + 6, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Annotated heatmap of a square matrix, first row at the top.
pub fn heatmap_chart(
    path: &Path,
    title: &str,
    names: &[&str],
    matrix: &[Vec<Option<f64>>],
) -> Result<()> {
    let n = names.len();
    ensure!(n > 0 && matrix.len() == n, "matrix does not match its labels");
    let values: Vec<f64> = matrix.iter().flatten().flatten().copied().collect();
    let (vmin, vmax) = min_max(&values).unwrap_or((-1.0, 1.0));
    let span = if vmax > vmin { vmax - vmin } else { 1.0 };
    let labels: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let y_labels: Vec<String> = labels.iter().rev().cloned().collect();

    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), -0.5f64..(n as f64 - 0.5))?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|x| category_label(&labels, *x))
        .y_label_formatter(&|y| category_label(&y_labels, *y))
        .draw()?;

    for (r, row) in matrix.iter().enumerate() {
        let y = (n - 1 - r) as f64;
        for (c, v) in row.iter().enumerate() {
            let x = c as f64;
            let color = match v {
                Some(v) => Palette::CoolWarm.at((v - vmin) / span),
                None => RGBColor(240, 240, 240),
            };
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                color.filled(),
            )))?;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                WHITE.stroke_width(2),
            )))?;
            let text = v
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "NaN".into());
            chart.draw_series(std::iter::once(Text::new(
                text,
                (x, y),
                (FONT, 18)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Grid of pairwise scatter plots, diagonal cells showing per-group density.
/// `rows` holds one value per variable plus the group label.
pub fn pair_chart(
    path: &Path,
    title: &str,
    names: &[&str],
    rows: &[(Vec<f64>, String)],
    palette: Palette,
) -> Result<()> {
    let k = names.len();
    ensure!(k > 0 && !rows.is_empty(), "no data for pair plot");
    let labels = distinct_labels(rows.iter().map(|r| r.1.as_str()));
    let colors = palette.sample(labels.len());
    let column = |i: usize| -> Vec<f64> { rows.iter().map(|r| r.0[i]).collect() };
    let ranges: Vec<(f64, f64)> = (0..k)
        .map(|i| {
            min_max(&column(i))
                .map(|(a, b)| padded(a, b))
                .unwrap_or((0.0, 1.0))
        })
        .collect();

    let side = 300 * k as u32;
    let root = SVGBackend::new(path, (side, side + 40)).into_drawing_area();
    root.fill(&WHITE)?;
    let body = root.titled(title, (FONT, 24))?;
    let cells = body.split_evenly((k, k));

    for (idx, area) in cells.iter().enumerate() {
        let (i, j) = (idx / k, idx % k);
        let (x0, x1) = ranges[j];
        if i == j {
            let curves: Vec<Vec<(f64, f64)>> = labels
                .iter()
                .map(|label| {
                    let v: Vec<f64> = rows
                        .iter()
                        .filter(|r| &r.1 == label)
                        .map(|r| r.0[i])
                        .collect();
                    Kde::new(&v)
                        .map(|kde| kde.curve(x0, x1, 100))
                        .unwrap_or_default()
                })
                .collect();
            let top = curves
                .iter()
                .flat_map(|c| c.iter().map(|p| p.1))
                .fold(0.0f64, f64::max);
            let mut chart = ChartBuilder::on(area)
                .margin(5)
                .x_label_area_size(25)
                .y_label_area_size(35)
                .build_cartesian_2d(x0..x1, 0f64..(top * 1.1).max(1e-6))?;
            chart.configure_mesh().x_desc(names[j]).y_labels(3).draw()?;
            for (curve, color) in curves.iter().zip(&colors) {
                chart.draw_series(LineSeries::new(
                    curve.iter().copied(),
                    color.stroke_width(2),
                ))?;
            }
        } else {
            let (y0, y1) = ranges[i];
            let mut chart = ChartBuilder::on(area)
                .margin(5)
                .x_label_area_size(25)
                .y_label_area_size(35)
                .build_cartesian_2d(x0..x1, y0..y1)?;
            chart
                .configure_mesh()
                .x_desc(names[j])
                .y_desc(names[i])
                .draw()?;
            for (label, color) in labels.iter().zip(&colors) {
                let color = *color;
                chart.draw_series(
                    rows.iter()
                        .filter(|r| &r.1 == label)
                        .map(|r| Circle::new((r.0[j], r.0[i]), 2, color.mix(0.7).filled())),
                )?;
            }
        }
    }

    // Shared legend along the bottom edge of the title strip.
    for (n, (label, color)) in labels.iter().zip(&colors).enumerate() {
        let x = 20 + n as i32 * 80;
        root.draw(&Rectangle::new([(x, 8), (x + 12, 20)], color.filled()))?;
        root.draw(&Text::new(
            label.clone(),
            (x + 16, 8),
            (FONT, 14).into_font(),
        ))?;
    }

    root.present()?;
    Ok(())
}
