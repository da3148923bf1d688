// The report itself: a fixed sequence of views over one loaded table.
//
// Steps run in order and share nothing but the dataset and the derived
// `phanlopt1` column, which part 4 adds before anything reads it.
use crate::charts::{self, Axes, ChartWriter, Palette, Series};
use crate::loader::Dataset;
use crate::output::{
    describe_rows, frequency_rows, print_heading, render_counts, render_crosstab, render_matrix,
    render_pivot, render_records, render_rows,
};
use crate::reports::{
    correlation_matrix, crosstab, describe, filter, filter_owned, frequency_table, head,
    labelled_points, pivot, score_counts, score_values, sort_records, value_counts, Predicate,
};
use crate::stats::{mean, median, probplot, sample_std};
use crate::types::{Code, Column, ExamRecord, Score, ScoreBand, SummaryStats};
use crate::util::{format_int, format_number};
use anyhow::Result;
use log::{info, warn};
use plotters::style::RGBColor;
use std::path::Path;

const TAB_BLUE: RGBColor = RGBColor(31, 119, 180);
const TAB_ORANGE: RGBColor = RGBColor(255, 127, 14);
const LIGHT_BLUE: RGBColor = RGBColor(173, 216, 230);
const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
const LINE_BLACK: RGBColor = RGBColor(0, 0, 0);

const HIST_BINS: usize = 20;
const DH_SCORES: [Score; 3] = [Score::Dh1, Score::Dh2, Score::Dh3];

pub struct ReportGenerator {
    data: Dataset,
    charts: Option<ChartWriter>,
    head: usize,
}

/// Render through the writer when charts are enabled.
fn draw<F>(sink: &mut Option<ChartWriter>, name: &str, f: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if let Some(writer) = sink.as_mut() {
        writer.render(name, f)?;
    }
    Ok(())
}

fn score_cols(scores: &[Score]) -> Vec<Column> {
    scores.iter().map(|s| Column::Score(*s)).collect()
}

fn band_colors() -> Vec<RGBColor> {
    Palette::CoolWarm.sample(ScoreBand::ALL.len())
}

fn band_groups(records: &[ExamRecord], score: Score) -> Vec<(String, Vec<f64>)> {
    ScoreBand::ALL
        .iter()
        .map(|band| {
            let values = records
                .iter()
                .filter(|r| r.t1_band == Some(*band))
                .filter_map(|r| r.score(score))
                .collect();
            (band.to_string(), values)
        })
        .collect()
}

/// Print a cross-tabulation and, when it has rows, chart it as bars.
#[allow(clippy::too_many_arguments)]
fn crosstab_step(
    sink: &mut Option<ChartWriter>,
    heading: &str,
    chart_name: &str,
    axes: &Axes,
    records: &[ExamRecord],
    row_keys: &[Code],
    column: Code,
    stacked: bool,
    palette: Palette,
) -> Result<()> {
    let ct = crosstab(records, row_keys, column);
    print_heading(heading);
    println!("{}", render_crosstab(&ct));
    if ct.is_empty() {
        warn!("{}: no rows, chart skipped", chart_name);
    } else {
        draw(sink, chart_name, |p| {
            charts::crosstab_chart(p, axes, &ct, stacked, palette)
        })?;
    }
    Ok(())
}

/// Owned filtered view; every column a predicate reads must exist.
fn filtered(d: &Dataset, predicates: &[Predicate]) -> Result<Vec<ExamRecord>> {
    let columns: Vec<Column> = predicates.iter().map(Predicate::column).collect();
    d.require(&columns)?;
    Ok(filter_owned(&d.records, predicates))
}

impl ReportGenerator {
    pub fn new(data: Dataset, charts: Option<ChartWriter>, head: usize) -> Self {
        ReportGenerator { data, charts, head }
    }

    pub fn charts(&self) -> Option<&ChartWriter> {
        self.charts.as_ref()
    }

    pub fn run(&mut self) -> Result<()> {
        info!("report over {} rows", format_int(self.data.len()));
        self.sorting_and_pivots()?;
        self.variable_presentation()?;
        self.grouped_charts()?;
        self.t1_bands()?;
        self.distributions()?;
        Ok(())
    }

    /// Part 1: sorted views and pivot tables of DH1.
    pub fn sorting_and_pivots(&mut self) -> Result<()> {
        let d = &self.data;
        let dh1 = [Column::Score(Score::Dh1)];
        d.require(&dh1)?;
        print_heading("Rows sorted by DH1 (ascending):");
        println!("{}", render_records(&sort_records(&d.records, &dh1), &dh1));

        let gt_dh2 = [Column::Code(Code::Gt), Column::Score(Score::Dh2)];
        d.require(&gt_dh2)?;
        print_heading("Rows sorted by GT, then DH2:");
        let by_gender = sort_records(&d.records, &gt_dh2);
        println!("{}", render_records(&by_gender, &gt_dh2));

        let total: f64 = score_values(&d.records, Score::Dh1).iter().sum();
        println!("\nTotal DH1: {}", format_number(total, 2));

        let layouts: [&[Code]; 3] = [
            &[Code::Kt],
            &[Code::Kt, Code::Kv],
            &[Code::Kt, Code::Kv, Code::Dt],
        ];
        for keys in layouts {
            let cols: Vec<Column> = keys.iter().map(|c| Column::Code(*c)).collect();
            d.require(&cols)?;
            let names: Vec<&str> = keys.iter().map(|c| c.name()).collect();
            print_heading(&format!("Pivot table of DH1 by {}:", names.join(", ")));
            let groups = pivot(&d.records, Score::Dh1, keys);
            println!("{}", render_pivot(&names, &groups));
        }
        Ok(())
    }

    /// Part 2: frequency tables, descriptive statistics and filtered counts.
    pub fn variable_presentation(&mut self) -> Result<()> {
        let d = &self.data;
        let sink = &mut self.charts;

        d.require(&[Column::Code(Code::Gt)])?;
        let gt = frequency_table(&d.records, Code::Gt);
        print_heading("Frequency table of GT:");
        println!("{}", render_rows(&frequency_rows(&gt)));
        let bars: Vec<(String, f64)> = gt
            .iter()
            .map(|f| (f.value.clone(), f.count as f64))
            .collect();
        let gt_colors = [TAB_BLUE, TAB_ORANGE];
        draw(sink, "gt_frequency_bar", |p| {
            let axes = Axes {
                title: "GT frequency",
                x_desc: "Gender",
                y_desc: "Count",
            };
            charts::bar_chart(p, &axes, &bars, &gt_colors)
        })?;
        draw(sink, "gt_share_pie", |p| {
            charts::pie_chart(p, "GT share", &bars, &gt_colors)
        })?;

        let us_tbm = [Score::UsTbm1, Score::UsTbm2, Score::UsTbm3];
        d.require(&score_cols(&us_tbm))?;
        print_heading("Descriptive statistics for US_TBM1, US_TBM2, US_TBM3:");
        let described = describe(&d.records, &us_tbm);
        println!("{}", render_rows(&describe_rows(&described)));

        d.require(&[Column::Code(Code::Dt)])?;
        let males = filtered(d, &[Predicate::eq(Code::Gt, "M")])?;
        print_heading("DT counts among male students:");
        println!("{}", render_counts(&value_counts(&males, Code::Dt)));

        d.require(&score_cols(&DH_SCORES))?;
        d.require(&[Column::Code(Code::Kv)])?;
        let qualified = filtered(
            d,
            &[
                Predicate::eq(Code::Gt, "M"),
                Predicate::eq(Code::Dt, "1"),
                Predicate::at_least(Score::Dh1, 5.0),
                Predicate::at_least(Score::Dh2, 4.0),
                Predicate::at_least(Score::Dh3, 4.0),
            ],
        )?;
        print_heading("KV counts among male Kinh students with DH1 >= 5, DH2 >= 4, DH3 >= 4:");
        println!("{}", render_counts(&value_counts(&qualified, Code::Kv)));

        let strong_2nt = filter(
            &d.records,
            &[
                Predicate::at_least(Score::Dh1, 5.0),
                Predicate::at_least(Score::Dh2, 5.0),
                Predicate::at_least(Score::Dh3, 5.0),
                Predicate::eq(Code::Kv, "2NT"),
            ],
        );
        let mut cols = score_cols(&DH_SCORES);
        cols.push(Column::Code(Code::Kv));
        print_heading("Students with DH1, DH2, DH3 >= 5 in region 2NT:");
        println!("{}", render_records(&strong_2nt, &cols));

        d.require(&[
            Column::Code(Code::Xl1),
            Column::Code(Code::Xl2),
            Column::Code(Code::Xl3),
        ])?;
        let females = filtered(d, &[Predicate::eq(Code::Gt, "F")])?;
        let ct = crosstab(&females, &[Code::Xl1, Code::Xl2], Code::Xl3);
        print_heading("Female students by XL1, XL2 (rows) and XL3 (columns):");
        println!("{}", render_crosstab(&ct));
        Ok(())
    }

    /// Part 3: cross-tabulations drawn as grouped or stacked bars.
    pub fn grouped_charts(&mut self) -> Result<()> {
        let d = &self.data;
        let sink = &mut self.charts;
        d.require(&[
            Column::Code(Code::Gt),
            Column::Code(Code::Kt),
            Column::Code(Code::Kv),
            Column::Code(Code::Dt),
            Column::Code(Code::Xl1),
            Column::Code(Code::Xl2),
            Column::Code(Code::Xl3),
            Column::Code(Code::Kqxt),
        ])?;

        let females = filtered(d, &[Predicate::eq(Code::Gt, "F")])?;
        crosstab_step(
            sink,
            "Female students by XL1, XL2 and XL3:",
            "female_xl_grouped",
            &Axes {
                title: "Female students by XL1, XL2, XL3",
                x_desc: "XL1 - XL2",
                y_desc: "Students",
            },
            &females,
            &[Code::Xl1, Code::Xl2],
            Code::Xl3,
            false,
            Palette::Viridis,
        )?;

        let blocks_ab = filtered(
            d,
            &[
                Predicate::one_of(Code::Kt, &["A", "A1", "B"]),
                Predicate::one_of(Code::Kv, &["1", "2"]),
            ],
        )?;
        crosstab_step(
            sink,
            "KQXT for exam blocks A, A1, B in regions 1, 2:",
            "kqxt_by_kt_kv",
            &Axes {
                title: "Admission result by exam block and region",
                x_desc: "KT - KV",
                y_desc: "Students",
            },
            &blocks_ab,
            &[Code::Kt, Code::Kv],
            Code::Kqxt,
            true,
            Palette::CoolWarm,
        )?;

        // (row key, column key); one stacked bar per row value.
        let stacked = [
            (Code::Kv, Code::Kt),
            (Code::Kt, Code::Kqxt),
            (Code::Kv, Code::Kqxt),
            (Code::Dt, Code::Kqxt),
            (Code::Gt, Code::Kqxt),
        ];
        for (row, column) in stacked {
            let title = format!("{} per {}", column.name(), row.name());
            let name = format!(
                "{}_by_{}",
                column.name().to_lowercase(),
                row.name().to_lowercase()
            );
            crosstab_step(
                sink,
                &format!("{}:", title),
                &name,
                &Axes {
                    title: &title,
                    x_desc: row.name(),
                    y_desc: "Students",
                },
                &d.records,
                &[row],
                column,
                true,
                Palette::CoolWarm,
            )?;
        }
        Ok(())
    }

    /// Part 4: T1 value counts, band derivation and per-band line charts.
    pub fn t1_bands(&mut self) -> Result<()> {
        self.data.require(&[Column::Score(Score::T1)])?;
        let counts = score_counts(&self.data.records, Score::T1);
        let line = [Series {
            label: "T1".to_string(),
            points: counts.iter().map(|(v, n)| (*v, *n as f64)).collect(),
            color: LINE_BLACK,
        }];
        draw(&mut self.charts, "t1_counts_line", |p| {
            let axes = Axes {
                title: "T1 value counts",
                x_desc: "T1",
                y_desc: "Count",
            };
            charts::line_chart(p, &axes, &line)
        })?;

        self.data.derive_t1_bands()?;
        let d = &self.data;
        let sink = &mut self.charts;

        let first = head(&d.records, self.head);
        let shown = [Column::Score(Score::T1), Column::Code(Code::Phanlopt1)];
        print_heading("T1 with its derived band (phanlopt1):");
        println!("{}", render_records(&first, &shown));

        let bands = frequency_table(&d.records, Code::Phanlopt1);
        print_heading("Frequency table of phanlopt1:");
        println!("{}", render_rows(&frequency_rows(&bands)));

        let colors = band_colors();
        let per_band: Vec<Series> = ScoreBand::ALL
            .iter()
            .zip(&colors)
            .map(|(band, color)| {
                let in_band = [Predicate::eq(Code::Phanlopt1, band.label())];
                let subset = filter_owned(&d.records, &in_band);
                Series {
                    label: band.to_string(),
                    points: score_counts(&subset, Score::T1)
                        .into_iter()
                        .map(|(v, n)| (v, n as f64))
                        .collect(),
                    color: *color,
                }
            })
            .filter(|s| !s.points.is_empty())
            .collect();
        draw(sink, "t1_counts_by_band_lines", |p| {
            let axes = Axes {
                title: "T1 value counts by phanlopt1",
                x_desc: "T1",
                y_desc: "Count",
            };
            charts::line_chart(p, &axes, &per_band)
        })?;
        draw(sink, "t1_counts_by_band_droplines", |p| {
            let axes = Axes {
                title: "T1 drop-lines by phanlopt1",
                x_desc: "T1",
                y_desc: "Count",
            };
            charts::drop_line_chart(p, &axes, &per_band)
        })?;
        Ok(())
    }

    /// Part 5: distribution of T1 and correlation between scores.
    pub fn distributions(&mut self) -> Result<()> {
        let d = &self.data;
        let sink = &mut self.charts;
        d.require(&[Column::Score(Score::T1), Column::Code(Code::Phanlopt1)])?;

        print_heading("Descriptive statistics for T1:");
        let described = describe(&d.records, &[Score::T1]);
        println!("{}", render_rows(&describe_rows(&described)));

        let t1 = score_values(&d.records, Score::T1);
        let whole = vec![("T1".to_string(), t1.clone())];
        draw(sink, "t1_box", |p| {
            let axes = Axes {
                title: "T1 box plot",
                x_desc: "",
                y_desc: "T1",
            };
            charts::box_chart(p, &axes, &whole, &[LIGHT_BLUE])
        })?;
        draw(sink, "t1_histogram", |p| {
            let axes = Axes {
                title: "T1 histogram",
                x_desc: "T1",
                y_desc: "Count",
            };
            charts::histogram_chart(p, &axes, &whole, HIST_BINS, &[LIGHT_CORAL])
        })?;
        if let Some(pp) = probplot(&t1) {
            println!(
                "\nNormal probability plot of T1: slope {:.4}, intercept {:.4}, r {:.4}",
                pp.slope, pp.intercept, pp.r
            );
            draw(sink, "t1_qq", |p| charts::qq_chart(p, "T1 QQ plot", &pp))?;
        } else {
            warn!("T1 has fewer than two values, QQ plot skipped");
        }

        let by_band: Vec<(String, Vec<f64>)> = band_groups(&d.records, Score::T1)
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let colors = band_colors();
        draw(sink, "t1_box_by_band", |p| {
            let axes = Axes {
                title: "T1 by phanlopt1",
                x_desc: "phanlopt1",
                y_desc: "T1",
            };
            charts::box_chart(p, &axes, &by_band, &colors)
        })?;
        draw(sink, "t1_histogram_by_band", |p| {
            let axes = Axes {
                title: "T1 histogram by phanlopt1",
                x_desc: "T1",
                y_desc: "Count",
            };
            charts::histogram_chart(p, &axes, &by_band, HIST_BINS, &colors)
        })?;

        d.require(&[Column::Score(Score::Dh1)])?;
        let pair = [Score::Dh1, Score::T1];
        print_heading("Correlation between DH1 and T1:");
        println!(
            "{}",
            render_matrix(&["DH1", "T1"], &correlation_matrix(&d.records, &pair))
        );
        let by_band_points = labelled_points(&d.records, Score::T1, Score::Dh1, Code::Phanlopt1);
        draw(sink, "dh1_t1_scatter_by_band", |p| {
            let axes = Axes {
                title: "DH1 vs T1",
                x_desc: "T1",
                y_desc: "DH1",
            };
            charts::scatter_chart(p, &axes, &by_band_points, Palette::CoolWarm)
        })?;

        d.require(&[Column::Code(Code::Kv)])?;
        let by_region = labelled_points(&d.records, Score::T1, Score::Dh1, Code::Kv);
        draw(sink, "dh1_t1_scatter_by_kv", |p| {
            let axes = Axes {
                title: "DH1 vs T1 by region",
                x_desc: "T1",
                y_desc: "DH1",
            };
            charts::scatter_chart(p, &axes, &by_region, Palette::CoolWarm)
        })?;

        d.require(&score_cols(&DH_SCORES))?;
        let names = ["DH1", "DH2", "DH3"];
        let matrix = correlation_matrix(&d.records, &DH_SCORES);
        print_heading("Correlation matrix of DH1, DH2, DH3:");
        println!("{}", render_matrix(&names, &matrix));
        draw(sink, "dh_correlation_heatmap", |p| {
            charts::heatmap_chart(p, "Correlation of DH1, DH2, DH3", &names, &matrix)
        })?;

        let rows: Vec<(Vec<f64>, String)> = d
            .records
            .iter()
            .filter_map(|r| {
                let values: Option<Vec<f64>> = DH_SCORES.iter().map(|s| r.score(*s)).collect();
                Some((values?, r.code(Code::Phanlopt1)?.to_string()))
            })
            .collect();
        draw(sink, "dh_pairplot_by_band", |p| {
            charts::pair_chart(p, "DH1, DH2, DH3 by phanlopt1", &names, &rows, Palette::CoolWarm)
        })?;
        Ok(())
    }

    /// Figures for `--summary-json`. Band counts are empty until part 4 ran.
    pub fn summary(&self) -> SummaryStats {
        let records = &self.data.records;
        let t1 = score_values(records, Score::T1);
        let t1_band_counts = if self.data.has_column(Column::Code(Code::Phanlopt1)) {
            ScoreBand::ALL
                .iter()
                .map(|b| (*b, records.iter().filter(|r| r.t1_band == Some(*b)).count()))
                .collect()
        } else {
            Vec::new()
        };
        SummaryStats {
            total_rows: records.len(),
            t1_band_counts,
            t1_mean: mean(&t1),
            t1_median: median(&t1),
            t1_std: sample_std(&t1),
            dh_correlation: correlation_matrix(records, &DH_SCORES),
        }
    }
}
