use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

use crate::util::{format_number, normalize_code, parse_f64_safe};

/// One CSV row as it comes off the reader. Every field is optional so a
/// missing column or a blank cell never aborts deserialization; steps that
/// need a column check the header set instead.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "DH1")]
    pub dh1: Option<String>,
    #[serde(rename = "DH2")]
    pub dh2: Option<String>,
    #[serde(rename = "DH3")]
    pub dh3: Option<String>,
    #[serde(rename = "T1")]
    pub t1: Option<String>,
    #[serde(rename = "US_TBM1")]
    pub us_tbm1: Option<String>,
    #[serde(rename = "US_TBM2")]
    pub us_tbm2: Option<String>,
    #[serde(rename = "US_TBM3")]
    pub us_tbm3: Option<String>,
    #[serde(rename = "GT")]
    pub gt: Option<String>,
    #[serde(rename = "KT")]
    pub kt: Option<String>,
    #[serde(rename = "KV")]
    pub kv: Option<String>,
    #[serde(rename = "DT")]
    pub dt: Option<String>,
    #[serde(rename = "XL1")]
    pub xl1: Option<String>,
    #[serde(rename = "XL2")]
    pub xl2: Option<String>,
    #[serde(rename = "XL3")]
    pub xl3: Option<String>,
    #[serde(rename = "KQXT")]
    pub kqxt: Option<String>,
}

/// Performance bucket for the T1 (math) score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScoreBand {
    #[serde(rename = "k")]
    Weak,
    #[serde(rename = "tb")]
    Average,
    #[serde(rename = "kha")]
    Good,
    #[serde(rename = "g")]
    Excellent,
}

impl ScoreBand {
    pub const ALL: [ScoreBand; 4] = [
        ScoreBand::Weak,
        ScoreBand::Average,
        ScoreBand::Good,
        ScoreBand::Excellent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Weak => "k",
            ScoreBand::Average => "tb",
            ScoreBand::Good => "kha",
            ScoreBand::Excellent => "g",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket a T1 score. Each bucket is closed on its lower bound and open on
/// its upper bound: [.., 5) k, [5, 7) tb, [7, 8) kha, [8, ..) g.
pub fn classify_t1(score: f64) -> ScoreBand {
    if score < 5.0 {
        ScoreBand::Weak
    } else if score < 7.0 {
        ScoreBand::Average
    } else if score < 8.0 {
        ScoreBand::Good
    } else {
        ScoreBand::Excellent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Dh1,
    Dh2,
    Dh3,
    T1,
    UsTbm1,
    UsTbm2,
    UsTbm3,
}

impl Score {
    pub fn name(self) -> &'static str {
        match self {
            Score::Dh1 => "DH1",
            Score::Dh2 => "DH2",
            Score::Dh3 => "DH3",
            Score::T1 => "T1",
            Score::UsTbm1 => "US_TBM1",
            Score::UsTbm2 => "US_TBM2",
            Score::UsTbm3 => "US_TBM3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Gt,
    Kt,
    Kv,
    Dt,
    Xl1,
    Xl2,
    Xl3,
    Kqxt,
    /// Derived T1 band, only readable once the dataset has derived it.
    Phanlopt1,
}

impl Code {
    pub fn name(self) -> &'static str {
        match self {
            Code::Gt => "GT",
            Code::Kt => "KT",
            Code::Kv => "KV",
            Code::Dt => "DT",
            Code::Xl1 => "XL1",
            Code::Xl2 => "XL2",
            Code::Xl3 => "XL3",
            Code::Kqxt => "KQXT",
            Code::Phanlopt1 => "phanlopt1",
        }
    }
}

/// Any column a view can sort on or print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Score(Score),
    Code(Code),
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Score(s) => s.name(),
            Column::Code(c) => c.name(),
        }
    }

    /// Cell text for tables; missing values print as `NaN` like a dataframe
    /// would show them.
    pub fn render(self, record: &ExamRecord) -> String {
        match self {
            Column::Score(s) => record
                .score(s)
                .map(|v| format_number(v, 2))
                .unwrap_or_else(|| "NaN".to_string()),
            Column::Code(c) => record.code(c).unwrap_or("NaN").to_string(),
        }
    }
}

impl From<Score> for Column {
    fn from(s: Score) -> Self {
        Column::Score(s)
    }
}

impl From<Code> for Column {
    fn from(c: Code) -> Self {
        Column::Code(c)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamRecord {
    /// Zero-based position in the source file; survives sorting and filtering.
    pub row: usize,
    pub dh1: Option<f64>,
    pub dh2: Option<f64>,
    pub dh3: Option<f64>,
    pub t1: Option<f64>,
    pub us_tbm1: Option<f64>,
    pub us_tbm2: Option<f64>,
    pub us_tbm3: Option<f64>,
    pub gt: Option<String>,
    pub kt: Option<String>,
    pub kv: Option<String>,
    pub dt: Option<String>,
    pub xl1: Option<String>,
    pub xl2: Option<String>,
    pub xl3: Option<String>,
    pub kqxt: Option<String>,
    pub t1_band: Option<ScoreBand>,
}

impl ExamRecord {
    pub fn from_raw(index: usize, row: RawRow) -> Self {
        let code = |v: Option<String>| v.as_deref().and_then(normalize_code);
        ExamRecord {
            row: index,
            dh1: parse_f64_safe(row.dh1.as_deref()),
            dh2: parse_f64_safe(row.dh2.as_deref()),
            dh3: parse_f64_safe(row.dh3.as_deref()),
            t1: parse_f64_safe(row.t1.as_deref()),
            us_tbm1: parse_f64_safe(row.us_tbm1.as_deref()),
            us_tbm2: parse_f64_safe(row.us_tbm2.as_deref()),
            us_tbm3: parse_f64_safe(row.us_tbm3.as_deref()),
            gt: code(row.gt),
            kt: code(row.kt),
            kv: code(row.kv),
            dt: code(row.dt),
            xl1: code(row.xl1),
            xl2: code(row.xl2),
            xl3: code(row.xl3),
            kqxt: code(row.kqxt),
            t1_band: None,
        }
    }

    pub fn score(&self, s: Score) -> Option<f64> {
        match s {
            Score::Dh1 => self.dh1,
            Score::Dh2 => self.dh2,
            Score::Dh3 => self.dh3,
            Score::T1 => self.t1,
            Score::UsTbm1 => self.us_tbm1,
            Score::UsTbm2 => self.us_tbm2,
            Score::UsTbm3 => self.us_tbm3,
        }
    }

    pub fn code(&self, c: Code) -> Option<&str> {
        match c {
            Code::Gt => self.gt.as_deref(),
            Code::Kt => self.kt.as_deref(),
            Code::Kv => self.kv.as_deref(),
            Code::Dt => self.dt.as_deref(),
            Code::Xl1 => self.xl1.as_deref(),
            Code::Xl2 => self.xl2.as_deref(),
            Code::Xl3 => self.xl3.as_deref(),
            Code::Kqxt => self.kqxt.as_deref(),
            Code::Phanlopt1 => self.t1_band.map(ScoreBand::label),
        }
    }
}

#[derive(Debug, Tabled, Clone)]
pub struct FrequencyRow {
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Percent (%)")]
    pub percent: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct DescribeRow {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "count")]
    pub count: usize,
    #[tabled(rename = "mean")]
    pub mean: String,
    #[tabled(rename = "std")]
    pub std: String,
    #[tabled(rename = "min")]
    pub min: String,
    #[tabled(rename = "25%")]
    pub q1: String,
    #[tabled(rename = "50%")]
    pub q2: String,
    #[tabled(rename = "75%")]
    pub q3: String,
    #[tabled(rename = "max")]
    pub max: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct CountRow {
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

/// Written by `--summary-json`.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub t1_band_counts: Vec<(ScoreBand, usize)>,
    pub t1_mean: Option<f64>,
    pub t1_median: Option<f64>,
    pub t1_std: Option<f64>,
    pub dh_correlation: Vec<Vec<Option<f64>>>,
}
