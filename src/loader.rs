use crate::error::{ReportError, Result};
use crate::types::{classify_t1, Code, Column, ExamRecord, RawRow, Score};
use csv::ReaderBuilder;
use log::{debug, info};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// The in-memory record table plus what we know about its schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<ExamRecord>,
    headers: HashSet<String>,
    bands_derived: bool,
}

impl Dataset {
    pub fn new(records: Vec<ExamRecord>, headers: impl IntoIterator<Item = String>) -> Self {
        Dataset {
            records,
            headers: headers.into_iter().collect(),
            bands_derived: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_column(&self, column: Column) -> bool {
        match column {
            Column::Code(Code::Phanlopt1) => self.bands_derived,
            other => self.headers.contains(other.name()),
        }
    }

    /// Fail with `MissingColumn` for the first column the table cannot serve.
    pub fn require(&self, columns: &[Column]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(**c)) {
            Some(c) => Err(ReportError::MissingColumn(c.name().to_string())),
            None => Ok(()),
        }
    }

    /// Append the `phanlopt1` column. Runs once; later calls are no-ops so
    /// the column is never recomputed.
    pub fn derive_t1_bands(&mut self) -> Result<()> {
        if self.bands_derived {
            return Ok(());
        }
        self.require(&[Column::Score(Score::T1)])?;
        for r in &mut self.records {
            // A blank T1 stays unbanded instead of landing in `g`.
            r.t1_band = r.t1.map(classify_t1);
        }
        self.bands_derived = true;
        debug!("derived phanlopt1 for {} rows", self.records.len());
        Ok(())
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let ds = read_dataset(file)?;
    info!(
        "loaded {} rows ({} columns) from {}",
        ds.len(),
        ds.headers.len(),
        path.display()
    );
    Ok(ds)
}

/// Read a header-first CSV from any reader. Malformed rows fail the load.
pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (index, result) in rdr.deserialize::<RawRow>().enumerate() {
        records.push(ExamRecord::from_raw(index, result?));
    }
    Ok(Dataset::new(records, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreBand;
    use std::io::Write;

    const SAMPLE: &str = "\
GT,KT,KV,DT,DH1,DH2,DH3,T1
M,A,1,1.0,6.5,5,4,7.5
F,B,2NT,,3,,8,4.0
";

    #[test]
    fn reads_rows_and_headers() {
        let ds = read_dataset(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.has_column(Column::Score(Score::Dh1)));
        assert!(!ds.has_column(Column::Score(Score::UsTbm1)));
        assert_eq!(ds.records[0].code(Code::Dt), Some("1"));
        assert_eq!(ds.records[1].dt, None);
        assert_eq!(ds.records[1].dh2, None);
    }

    #[test]
    fn require_reports_first_missing_column() {
        let ds = read_dataset(SAMPLE.as_bytes()).unwrap();
        let err = ds
            .require(&[Column::Code(Code::Gt), Column::Code(Code::Kqxt)])
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn(ref c) if c == "KQXT"));
    }

    #[test]
    fn band_column_unavailable_until_derived() {
        let mut ds = read_dataset(SAMPLE.as_bytes()).unwrap();
        assert!(ds.require(&[Column::Code(Code::Phanlopt1)]).is_err());
        ds.derive_t1_bands().unwrap();
        ds.require(&[Column::Code(Code::Phanlopt1)]).unwrap();
        assert_eq!(ds.records[0].t1_band, Some(ScoreBand::Good));
        assert_eq!(ds.records[1].t1_band, Some(ScoreBand::Weak));
    }

    #[test]
    fn second_derivation_keeps_first_bands() {
        let mut ds = read_dataset(SAMPLE.as_bytes()).unwrap();
        ds.derive_t1_bands().unwrap();
        ds.records[0].t1 = Some(2.0);
        ds.records[1].t1 = Some(9.5);
        ds.derive_t1_bands().unwrap();
        assert_eq!(ds.records[0].t1_band, Some(ScoreBand::Good));
        assert_eq!(ds.records[1].t1_band, Some(ScoreBand::Weak));
    }

    #[test]
    fn blank_t1_gets_no_band() {
        let mut ds = read_dataset("GT,T1\nM,\nF,8\n".as_bytes()).unwrap();
        ds.derive_t1_bands().unwrap();
        assert_eq!(ds.records[0].t1_band, None);
        assert_eq!(ds.records[1].t1_band, Some(ScoreBand::Excellent));
    }

    #[test]
    fn records_remember_their_source_row() {
        let ds = read_dataset(SAMPLE.as_bytes()).unwrap();
        let rows: Vec<usize> = ds.records.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn deriving_bands_without_t1_fails() {
        let mut ds = read_dataset("GT,DH1\nM,5\n".as_bytes()).unwrap();
        assert!(matches!(
            ds.derive_t1_bands(),
            Err(ReportError::MissingColumn(ref c)) if c == "T1"
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let ds = load_dataset(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_dataset(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
