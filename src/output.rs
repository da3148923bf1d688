// Console rendering of views. Every table goes through `tabled` with the
// markdown style so the report reads the same from step to step.
use crate::error::Result;
use crate::reports::{CrossTab, Frequency, GroupStats};
use crate::stats::Summary;
use crate::types::{Column, CountRow, DescribeRow, ExamRecord, FrequencyRow, Score};
use crate::util::{format_number, format_opt};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn print_heading(title: &str) {
    println!("\n{}", title);
}

pub fn render_rows<T: Tabled + Clone>(rows: &[T]) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

fn render_builder(builder: Builder) -> String {
    builder.build().with(Style::markdown()).to_string()
}

/// Rows with the chosen columns, prefixed by their row index in the source
/// file so sorted and filtered views still point back at the input.
pub fn render_records(records: &[&ExamRecord], columns: &[Column]) -> String {
    if records.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec!["#".to_string()];
    header.extend(columns.iter().map(|c| c.name().to_string()));
    builder.push_record(header);
    for r in records {
        let mut row = vec![r.row.to_string()];
        row.extend(columns.iter().map(|c| c.render(r)));
        builder.push_record(row);
    }
    render_builder(builder)
}

const SUMMARY_HEADERS: [&str; 10] = [
    "count", "sum", "mean", "median", "min", "max", "std", "Q1", "Q2", "Q3",
];

fn summary_cells(s: &Summary) -> Vec<String> {
    vec![
        s.count.to_string(),
        format_number(s.sum, 2),
        format_number(s.mean, 4),
        format_number(s.median, 4),
        format_number(s.min, 2),
        format_number(s.max, 2),
        format_opt(s.std, 4),
        format_number(s.q1, 4),
        format_number(s.q2, 4),
        format_number(s.q3, 4),
    ]
}

pub fn render_pivot(key_names: &[&str], groups: &[GroupStats]) -> String {
    if groups.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header: Vec<String> = key_names.iter().map(|k| k.to_string()).collect();
    header.extend(SUMMARY_HEADERS.iter().map(|s| s.to_string()));
    builder.push_record(header);
    for g in groups {
        let mut row = g.key.clone();
        row.extend(summary_cells(&g.summary));
        builder.push_record(row);
    }
    render_builder(builder)
}

pub fn frequency_rows(table: &[Frequency]) -> Vec<FrequencyRow> {
    table
        .iter()
        .map(|f| FrequencyRow {
            value: f.value.clone(),
            count: f.count,
            percent: format_number(f.percent, 2),
        })
        .collect()
}

pub fn render_counts(counts: &[(String, usize)]) -> String {
    let rows: Vec<CountRow> = counts
        .iter()
        .map(|(value, count)| CountRow {
            value: value.clone(),
            count: *count,
        })
        .collect();
    render_rows(&rows)
}

pub fn render_crosstab(ct: &CrossTab) -> String {
    if ct.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec![format!("{} \\ {}", ct.row_names.join(", "), ct.column_name)];
    header.extend(ct.columns.iter().cloned());
    builder.push_record(header);
    for row in &ct.rows {
        let mut cells = vec![CrossTab::row_label(row)];
        cells.extend(ct.columns.iter().map(|c| ct.cell(row, c).to_string()));
        builder.push_record(cells);
    }
    render_builder(builder)
}

pub fn describe_rows(described: &[(Score, Option<Summary>)]) -> Vec<DescribeRow> {
    described
        .iter()
        .map(|(score, summary)| match summary {
            Some(s) => DescribeRow {
                column: score.name().to_string(),
                count: s.count,
                mean: format_number(s.mean, 4),
                std: format_opt(s.std, 4),
                min: format_number(s.min, 2),
                q1: format_number(s.q1, 4),
                q2: format_number(s.q2, 4),
                q3: format_number(s.q3, 4),
                max: format_number(s.max, 2),
            },
            None => DescribeRow {
                column: score.name().to_string(),
                count: 0,
                mean: "NaN".into(),
                std: "NaN".into(),
                min: "NaN".into(),
                q1: "NaN".into(),
                q2: "NaN".into(),
                q3: "NaN".into(),
                max: "NaN".into(),
            },
        })
        .collect()
}

pub fn render_matrix(names: &[&str], matrix: &[Vec<Option<f64>>]) -> String {
    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(names.iter().map(|n| n.to_string()));
    builder.push_record(header);
    for (name, row) in names.iter().zip(matrix) {
        let mut cells = vec![name.to_string()];
        cells.extend(row.iter().map(|v| format_opt(*v, 6)));
        builder.push_record(cells);
    }
    render_builder(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{crosstab, describe, frequency_table, pivot, sort_records};
    use crate::types::Code;

    fn rows() -> Vec<ExamRecord> {
        [("M", "A", 4.0), ("F", "A", 5.0), ("M", "B", 8.0)]
            .iter()
            .map(|(gt, kt, dh1)| ExamRecord {
                gt: Some(gt.to_string()),
                kt: Some(kt.to_string()),
                dh1: Some(*dh1),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn pivot_table_shows_nan_std_for_singletons() {
        let groups = pivot(&rows(), Score::Dh1, &[Code::Kt]);
        let out = render_pivot(&["KT"], &groups);
        assert!(out.contains("| KT"));
        assert!(out.contains("Q3"));
        assert!(out.contains("NaN"));
        assert!(out.contains("0.7071"));
    }

    #[test]
    fn crosstab_renders_zero_for_absent_pairs() {
        let ct = crosstab(&rows(), &[Code::Kt], Code::Gt);
        let out = render_crosstab(&ct);
        let b_line = out.lines().find(|l| l.starts_with("| B")).unwrap();
        let cells: Vec<&str> = b_line.split('|').map(str::trim).collect();
        assert_eq!(cells[1..4], ["B", "0", "1"]);
    }

    #[test]
    fn frequency_rows_round_to_two_places() {
        let table = frequency_table(&rows(), Code::Gt);
        let fr = frequency_rows(&table);
        assert_eq!(fr[0].value, "M");
        assert_eq!(fr[0].percent, "66.67");
        assert_eq!(fr[1].percent, "33.33");
    }

    #[test]
    fn record_view_prints_source_rows() {
        let mut data = rows();
        for (i, r) in data.iter_mut().enumerate() {
            r.row = i;
        }
        let sorted = sort_records(&data, &[Column::Score(Score::Dh1)]);
        let reversed: Vec<&ExamRecord> = sorted.into_iter().rev().collect();
        let out = render_records(&reversed, &[Column::Score(Score::Dh1)]);
        let first: Vec<&str> = out
            .lines()
            .nth(2)
            .unwrap()
            .split('|')
            .map(str::trim)
            .collect();
        assert_eq!(first[1..3], ["2", "8.00"]);
    }

    #[test]
    fn describe_renders_missing_column_as_nan() {
        let described = describe(&rows(), &[Score::Dh1, Score::T1]);
        let table = describe_rows(&described);
        assert_eq!(table[0].count, 3);
        assert_eq!(table[0].mean, "5.6667");
        assert_eq!(table[1].count, 0);
        assert_eq!(table[1].std, "NaN");
        let out = render_rows(&table);
        let t1_line = out.lines().find(|l| l.starts_with("| T1")).unwrap();
        assert_eq!(t1_line.matches("NaN").count(), 7);
    }

    #[test]
    fn empty_views_render_placeholder() {
        let dh1 = [Column::Score(Score::Dh1)];
        assert_eq!(render_records(&[], &dh1), "(no rows)");
        assert_eq!(render_counts(&[]), "(no rows)");
    }

    #[test]
    fn json_summary_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('2'));
    }
}
