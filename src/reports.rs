use crate::stats::{pearson, Summary};
use crate::types::{Code, Column, ExamRecord, Score};
use crate::util::{compare_code_keys, compare_codes};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Stable ascending sort on `keys`, compared left to right. Missing values
/// sort after present ones; codes compare with `compare_codes`.
pub fn sort_records<'a>(records: &'a [ExamRecord], keys: &[Column]) -> Vec<&'a ExamRecord> {
    let mut rows: Vec<&ExamRecord> = records.iter().collect();
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|k| compare_on(a, b, *k))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

fn compare_on(a: &ExamRecord, b: &ExamRecord, key: Column) -> Ordering {
    match key {
        Column::Score(s) => missing_last(a.score(s), b.score(s), |x, y| {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }),
        Column::Code(c) => missing_last(a.code(c), b.code(c), |x, y| compare_codes(x, y)),
    }
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Values of `codes` for one record, or `None` if any is missing.
fn key_of(r: &ExamRecord, codes: &[Code]) -> Option<Vec<String>> {
    codes
        .iter()
        .map(|c| r.code(*c).map(str::to_string))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub key: Vec<String>,
    pub summary: Summary,
}

/// Group by the given code columns and summarise `value` per group.
/// Groups are returned in key order; groups without a single present value
/// are left out.
pub fn pivot(records: &[ExamRecord], value: Score, group_keys: &[Code]) -> Vec<GroupStats> {
    let mut groups: HashMap<Vec<String>, Vec<f64>> = HashMap::new();
    for r in records {
        let (Some(key), Some(v)) = (key_of(r, group_keys), r.score(value)) else {
            continue;
        };
        groups.entry(key).or_default().push(v);
    }
    let mut out: Vec<GroupStats> = groups
        .into_iter()
        .filter_map(|(key, values)| {
            Summary::from_values(&values).map(|summary| GroupStats { key, summary })
        })
        .collect();
    out.sort_by(|a, b| compare_code_keys(&a.key, &b.key));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frequency {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

/// Count per distinct value of `code`, most frequent first. Percentages are
/// relative to the rows where the code is present.
pub fn frequency_table(records: &[ExamRecord], code: Code) -> Vec<Frequency> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in records.iter().filter_map(|r| r.code(code)) {
        *counts.entry(v).or_default() += 1;
    }
    let total: usize = counts.values().sum();
    let mut rows: Vec<Frequency> = counts
        .into_iter()
        .map(|(value, count)| Frequency {
            value: value.to_string(),
            count,
            percent: count as f64 * 100.0 / total as f64,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| compare_codes(&a.value, &b.value))
    });
    rows
}

/// Count per distinct value of `code`, ordered by value.
pub fn value_counts(records: &[ExamRecord], code: Code) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in records.iter().filter_map(|r| r.code(code)) {
        *counts.entry(v.to_string()).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| compare_codes(&a.0, &b.0));
    out
}

/// Count per distinct numeric value of `score`, ascending.
pub fn score_counts(records: &[ExamRecord], score: Score) -> Vec<(f64, usize)> {
    let mut values: Vec<f64> = records.iter().filter_map(|r| r.score(score)).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let mut out: Vec<(f64, usize)> = Vec::new();
    for v in values {
        match out.last_mut() {
            Some((last, n)) if *last == v => *n += 1,
            _ => out.push((v, 1)),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    CodeEq(Code, String),
    CodeIn(Code, Vec<String>),
    ScoreAtLeast(Score, f64),
}

impl Predicate {
    pub fn eq(code: Code, value: &str) -> Self {
        Predicate::CodeEq(code, value.to_string())
    }

    pub fn one_of(code: Code, values: &[&str]) -> Self {
        Predicate::CodeIn(code, values.iter().map(|v| v.to_string()).collect())
    }

    pub fn at_least(score: Score, min: f64) -> Self {
        Predicate::ScoreAtLeast(score, min)
    }

    /// Missing values never match.
    pub fn matches(&self, r: &ExamRecord) -> bool {
        match self {
            Predicate::CodeEq(c, v) => r.code(*c) == Some(v.as_str()),
            Predicate::CodeIn(c, vs) => r.code(*c).is_some_and(|x| vs.iter().any(|v| v == x)),
            Predicate::ScoreAtLeast(s, min) => r.score(*s).is_some_and(|x| x >= *min),
        }
    }

    pub fn column(&self) -> Column {
        match self {
            Predicate::CodeEq(c, _) | Predicate::CodeIn(c, _) => Column::Code(*c),
            Predicate::ScoreAtLeast(s, _) => Column::Score(*s),
        }
    }
}

/// Rows satisfying every predicate, in input order.
pub fn filter<'a>(records: &'a [ExamRecord], predicates: &[Predicate]) -> Vec<&'a ExamRecord> {
    records
        .iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
        .collect()
}

/// Owned copy of a filtered view, for feeding back into the views above.
pub fn filter_owned(records: &[ExamRecord], predicates: &[Predicate]) -> Vec<ExamRecord> {
    filter(records, predicates).into_iter().cloned().collect()
}

pub fn head(records: &[ExamRecord], n: usize) -> Vec<&ExamRecord> {
    records.iter().take(n).collect()
}

/// Row-key x column-key count matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    pub row_names: Vec<&'static str>,
    pub column_name: &'static str,
    pub rows: Vec<Vec<String>>,
    pub columns: Vec<String>,
    counts: HashMap<(Vec<String>, String), usize>,
}

impl CrossTab {
    /// Rows whose row key and column value both match. Absent pairs are 0.
    pub fn cell(&self, row: &[String], column: &str) -> usize {
        self.counts
            .get(&(row.to_vec(), column.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn row_total(&self, row: &[String]) -> usize {
        self.columns.iter().map(|c| self.cell(row, c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_label(row: &[String]) -> String {
        row.join(" - ")
    }
}

/// Count rows per `(row_keys..., column)` combination. Rows missing any of
/// the keys are not counted.
pub fn crosstab(records: &[ExamRecord], row_keys: &[Code], column: Code) -> CrossTab {
    let mut counts: HashMap<(Vec<String>, String), usize> = HashMap::new();
    let mut rows = HashSet::new();
    let mut columns = HashSet::new();
    for r in records {
        let (Some(rk), Some(ck)) = (key_of(r, row_keys), r.code(column)) else {
            continue;
        };
        rows.insert(rk.clone());
        columns.insert(ck.to_string());
        *counts.entry((rk, ck.to_string())).or_default() += 1;
    }
    let mut rows: Vec<Vec<String>> = rows.into_iter().collect();
    rows.sort_by(|a, b| compare_code_keys(a, b));
    let mut columns: Vec<String> = columns.into_iter().collect();
    columns.sort_by(|a, b| compare_codes(a, b));
    CrossTab {
        row_names: row_keys.iter().map(|c| c.name()).collect(),
        column_name: column.name(),
        rows,
        columns,
        counts,
    }
}

/// Per-column summaries for `describe`-style output. Columns with no values
/// map to `None`.
pub fn describe(records: &[ExamRecord], scores: &[Score]) -> Vec<(Score, Option<Summary>)> {
    scores
        .iter()
        .map(|s| (*s, Summary::from_values(&score_values(records, *s))))
        .collect()
}

pub fn score_values(records: &[ExamRecord], score: Score) -> Vec<f64> {
    records.iter().filter_map(|r| r.score(score)).collect()
}

/// Pearson matrix over `scores`, each pair using rows where both are present.
pub fn correlation_matrix(records: &[ExamRecord], scores: &[Score]) -> Vec<Vec<Option<f64>>> {
    scores
        .iter()
        .map(|a| {
            scores
                .iter()
                .map(|b| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = records
                        .iter()
                        .filter_map(|r| Some((r.score(*a)?, r.score(*b)?)))
                        .unzip();
                    pearson(&xs, &ys)
                })
                .collect()
        })
        .collect()
}

/// Paired `(x, y, label)` points for scatter views; rows missing any part
/// are skipped.
pub fn labelled_points(
    records: &[ExamRecord],
    x: Score,
    y: Score,
    label: Code,
) -> Vec<(f64, f64, String)> {
    records
        .iter()
        .filter_map(|r| Some((r.score(x)?, r.score(y)?, r.code(label)?.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(gt: &str, kt: &str, dh1: f64) -> ExamRecord {
        ExamRecord {
            gt: Some(gt.into()),
            kt: Some(kt.into()),
            dh1: Some(dh1),
            ..Default::default()
        }
    }

    fn fixture() -> Vec<ExamRecord> {
        vec![
            rec("M", "A", 4.0),
            rec("F", "A", 5.0),
            rec("M", "A", 6.0),
            rec("F", "B", 7.0),
            rec("M", "B", 8.0),
            rec("F", "B", 9.0),
        ]
    }

    #[test]
    fn pivot_by_two_valued_key() {
        let groups = pivot(&fixture(), Score::Dh1, &[Code::Kt]);
        assert_eq!(groups.len(), 2);
        let a = &groups[0];
        assert_eq!(a.key, vec!["A".to_string()]);
        assert_eq!(a.summary.mean, 5.0);
        assert_eq!(a.summary.median, 5.0);
        assert_eq!(a.summary.q1, 4.5);
        assert_eq!(a.summary.q3, 5.5);
        let b = &groups[1];
        assert_eq!(b.summary.mean, 8.0);
        assert_eq!(b.summary.q1, 7.5);
        assert_eq!(b.summary.q3, 8.5);
        assert_eq!(b.summary.sum, 24.0);
    }

    #[test]
    fn pivot_omits_groups_without_values() {
        let mut rows = fixture();
        rows.push(ExamRecord {
            kt: Some("C".into()),
            gt: Some("M".into()),
            ..Default::default()
        });
        let groups = pivot(&rows, Score::Dh1, &[Code::Kt, Code::Gt]);
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.key[0] != "C"));
        let am = groups
            .iter()
            .find(|g| g.key == vec!["A".to_string(), "M".to_string()])
            .unwrap();
        assert_eq!(am.summary.count, 2);
        assert_eq!(am.summary.mean, 5.0);
    }

    #[test]
    fn frequency_percentages_sum_to_100() {
        let mut rows = fixture();
        rows.push(rec("X", "C", 1.0));
        let table = frequency_table(&rows, Code::Gt);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].count, 3);
        let total: f64 = table.iter().map(|f| f.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
        let rounded: f64 = table
            .iter()
            .map(|f| (f.percent * 100.0).round() / 100.0)
            .sum();
        assert!((rounded - 100.0).abs() <= 0.01 * table.len() as f64);
    }

    #[test]
    fn crosstab_cells_match_row_counts() {
        let rows = fixture();
        let ct = crosstab(&rows, &[Code::Kt], Code::Gt);
        assert_eq!(ct.columns, vec!["F".to_string(), "M".to_string()]);
        for row in &ct.rows {
            for col in &ct.columns {
                let expected = rows
                    .iter()
                    .filter(|r| r.code(Code::Kt) == Some(row[0].as_str()))
                    .filter(|r| r.code(Code::Gt) == Some(col.as_str()))
                    .count();
                assert_eq!(ct.cell(row, col), expected);
            }
        }
        assert_eq!(ct.cell(&["Z".to_string()], "M"), 0);
        assert_eq!(ct.row_total(&["A".to_string()]), 3);
    }

    #[test]
    fn crosstab_with_composite_row_key_reads_absent_as_zero() {
        let rows = vec![
            ExamRecord {
                xl1: Some("G".into()),
                xl2: Some("K".into()),
                xl3: Some("G".into()),
                ..Default::default()
            },
            ExamRecord {
                xl1: Some("K".into()),
                xl2: Some("K".into()),
                xl3: Some("TB".into()),
                ..Default::default()
            },
        ];
        let ct = crosstab(&rows, &[Code::Xl1, Code::Xl2], Code::Xl3);
        assert_eq!(ct.rows.len(), 2);
        assert_eq!(ct.cell(&["G".into(), "K".into()], "G"), 1);
        assert_eq!(ct.cell(&["G".into(), "K".into()], "TB"), 0);
        assert_eq!(CrossTab::row_label(&ct.rows[0]), "G - K");
    }

    #[test]
    fn five_predicate_filter_matches_row_by_row_check() {
        let mk = |gt: &str, dt: &str, d1: f64, d2: f64, d3: f64| ExamRecord {
            gt: Some(gt.into()),
            dt: Some(dt.into()),
            dh1: Some(d1),
            dh2: Some(d2),
            dh3: Some(d3),
            ..Default::default()
        };
        let rows = vec![
            mk("M", "1", 5.0, 4.0, 4.0),
            mk("M", "1", 4.99, 9.0, 9.0),
            mk("F", "1", 9.0, 9.0, 9.0),
            mk("M", "2", 9.0, 9.0, 9.0),
            mk("M", "1", 7.0, 3.5, 6.0),
            mk("M", "1", 6.0, 6.0, 4.0),
            ExamRecord {
                gt: Some("M".into()),
                dt: Some("1".into()),
                dh1: Some(8.0),
                dh2: None,
                dh3: Some(8.0),
                ..Default::default()
            },
        ];
        let preds = vec![
            Predicate::eq(Code::Gt, "M"),
            Predicate::eq(Code::Dt, "1"),
            Predicate::at_least(Score::Dh1, 5.0),
            Predicate::at_least(Score::Dh2, 4.0),
            Predicate::at_least(Score::Dh3, 4.0),
        ];
        let got = filter(&rows, &preds);
        let expected: Vec<&ExamRecord> = rows
            .iter()
            .filter(|r| {
                r.gt.as_deref() == Some("M")
                    && r.dt.as_deref() == Some("1")
                    && r.dh1.is_some_and(|v| v >= 5.0)
                    && r.dh2.is_some_and(|v| v >= 4.0)
                    && r.dh3.is_some_and(|v| v >= 4.0)
            })
            .collect();
        assert_eq!(got, expected);
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn filter_may_be_empty() {
        let rows = fixture();
        let none = [Predicate::one_of(Code::Kt, &["Z"])];
        let both = [Predicate::one_of(Code::Kt, &["A", "B"])];
        assert!(filter(&rows, &none).is_empty());
        assert_eq!(filter(&rows, &both).len(), 6);
    }

    #[test]
    fn two_key_sort_is_stable() {
        let mk = |gt: &str, dh2: f64, tag: &str| ExamRecord {
            gt: Some(gt.into()),
            dh2: Some(dh2),
            kt: Some(tag.into()),
            ..Default::default()
        };
        let rows = vec![
            mk("M", 5.0, "r0"),
            mk("F", 7.0, "r1"),
            mk("M", 5.0, "r2"),
            mk("F", 3.0, "r3"),
            mk("F", 7.0, "r4"),
            mk("M", 1.0, "r5"),
        ];
        let sorted = sort_records(&rows, &[Code::Gt.into(), Score::Dh2.into()]);
        let tags: Vec<&str> = sorted.iter().filter_map(|r| r.code(Code::Kt)).collect();
        assert_eq!(tags, vec!["r3", "r1", "r4", "r5", "r0", "r2"]);
    }

    #[test]
    fn head_is_capped_by_row_count() {
        let rows = fixture();
        assert_eq!(head(&rows, 2).len(), 2);
        assert_eq!(head(&rows, 2)[1].dh1, Some(5.0));
        assert_eq!(head(&rows, 50).len(), rows.len());
    }

    #[test]
    fn sort_puts_missing_last() {
        let rows = vec![
            ExamRecord::default(),
            rec("M", "A", 2.0),
            rec("M", "A", 1.0),
        ];
        let sorted = sort_records(&rows, &[Score::Dh1.into()]);
        assert_eq!(sorted[0].dh1, Some(1.0));
        assert_eq!(sorted[2].dh1, None);
    }

    #[test]
    fn score_counts_are_ascending() {
        let rows = vec![rec("M", "A", 6.0), rec("M", "A", 4.0), rec("F", "A", 6.0)];
        assert_eq!(score_counts(&rows, Score::Dh1), vec![(4.0, 1), (6.0, 2)]);
        assert_eq!(
            value_counts(&rows, Code::Gt),
            vec![("F".to_string(), 1), ("M".to_string(), 2)]
        );
    }

    #[test]
    fn correlation_matrix_diagonal_is_one() {
        let rows: Vec<ExamRecord> = (0..5)
            .map(|i| ExamRecord {
                dh1: Some(i as f64),
                dh2: Some((i * i) as f64),
                ..Default::default()
            })
            .collect();
        let m = correlation_matrix(&rows, &[Score::Dh1, Score::Dh2]);
        assert!((m[0][0].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(m[0][1], m[1][0]);
        assert!(m[0][1].unwrap() > 0.9);
    }

    #[test]
    fn correlation_uses_only_complete_pairs() {
        let mk = |dh1: Option<f64>, dh2: Option<f64>| ExamRecord {
            dh1,
            dh2,
            ..Default::default()
        };
        let rows = vec![
            mk(Some(1.0), Some(2.0)),
            mk(Some(2.0), Some(4.0)),
            mk(Some(3.0), Some(6.0)),
            mk(Some(100.0), None),
            mk(None, Some(-50.0)),
        ];
        let m = correlation_matrix(&rows, &[Score::Dh1, Score::Dh2]);
        assert!((m[0][1].unwrap() - 1.0).abs() < 1e-12);
        assert!((m[1][0].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn frequency_ignores_rows_missing_the_code() {
        let mut rows = vec![rec("M", "A", 1.0), rec("M", "A", 2.0), rec("F", "A", 3.0)];
        for _ in 0..2 {
            rows.push(ExamRecord {
                kt: Some("A".into()),
                ..Default::default()
            });
        }
        let table = frequency_table(&rows, Code::Gt);
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().map(|f| f.count).sum::<usize>(), 3);
        assert!((table[0].percent - 200.0 / 3.0).abs() < 1e-9);
        assert!((table[1].percent - 100.0 / 3.0).abs() < 1e-9);
        let total: f64 = table.iter().map(|f| f.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn describe_matches_hand_computed_figures() {
        let described = describe(&fixture(), &[Score::Dh1, Score::T1]);
        assert_eq!(described.len(), 2);

        let (score, summary) = &described[0];
        assert_eq!(*score, Score::Dh1);
        let s = summary.as_ref().unwrap();
        assert_eq!(s.count, 6);
        assert_eq!(s.mean, 6.5);
        assert!((s.std.unwrap() - 3.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 4.0);
        assert_eq!(s.q1, 5.25);
        assert_eq!(s.q2, 6.5);
        assert_eq!(s.q3, 7.75);
        assert_eq!(s.max, 9.0);

        assert_eq!(described[1], (Score::T1, None));
    }

    #[test]
    fn numeric_codes_group_in_numeric_order() {
        let mk = |dt: &str, kv: &str| ExamRecord {
            dt: Some(dt.into()),
            kv: Some(kv.into()),
            dh1: Some(5.0),
            ..Default::default()
        };
        let rows = vec![mk("10", "2NT"), mk("2", "1"), mk("1", "2"), mk("2", "2NT")];

        let dts: Vec<String> = value_counts(&rows, Code::Dt)
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(dts, vec!["1", "2", "10"]);

        let ct = crosstab(&rows, &[Code::Dt], Code::Kv);
        assert_eq!(ct.rows, vec![vec!["1"], vec!["2"], vec!["10"]]);
        assert_eq!(ct.columns, vec!["1", "2", "2NT"]);

        let keys: Vec<String> = pivot(&rows, Score::Dh1, &[Code::Dt])
            .into_iter()
            .map(|g| g.key[0].clone())
            .collect();
        assert_eq!(keys, vec!["1", "2", "10"]);

        let sorted = sort_records(&rows, &[Code::Dt.into()]);
        let order: Vec<&str> = sorted.iter().filter_map(|r| r.code(Code::Dt)).collect();
        assert_eq!(order, vec!["1", "2", "2", "10"]);
    }

    #[test]
    fn views_keep_source_row_index() {
        let rows: Vec<ExamRecord> = [6.0, 2.0, 9.0, 4.0]
            .iter()
            .enumerate()
            .map(|(row, dh1)| ExamRecord {
                row,
                dh1: Some(*dh1),
                ..Default::default()
            })
            .collect();
        let sorted = sort_records(&rows, &[Score::Dh1.into()]);
        let idx: Vec<usize> = sorted.iter().map(|r| r.row).collect();
        assert_eq!(idx, vec![1, 3, 0, 2]);

        let kept = filter_owned(&rows, &[Predicate::at_least(Score::Dh1, 5.0)]);
        let idx: Vec<usize> = kept.iter().map(|r| r.row).collect();
        assert_eq!(idx, vec![0, 2]);
    }
}
