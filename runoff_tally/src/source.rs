// Where the raw rows of a ballot export come from.

use log::debug;
use snafu::prelude::*;

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::config::*;

/// Produces the raw text rows of one ballot export.
///
/// The rows are returned in file order, header included. No check on the
/// shape of the rows is expected at this level.
pub trait RowSource {
    /// The identifier used in messages (the path, for files).
    fn name(&self) -> String;

    fn read_rows(&self) -> TallyResult<Vec<Vec<String>>>;
}

/// A CSV export on the filesystem.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: String,
}

impl CsvFileSource {
    pub fn new(path: &str) -> CsvFileSource {
        CsvFileSource {
            path: path.to_string(),
        }
    }
}

impl RowSource for CsvFileSource {
    fn name(&self) -> String {
        self.path.clone()
    }

    fn read_rows(&self) -> TallyResult<Vec<Vec<String>>> {
        let p = Path::new(self.path.as_str());
        ensure!(p.exists(), NotFoundSnafu { path: &self.path });
        ensure!(
            p.extension().map(|ext| ext == "csv").unwrap_or(false),
            NotCsvSnafu { path: &self.path }
        );

        let content = fs::read_to_string(p).context(UnreadableSnafu { path: &self.path })?;
        // One row per physical line, blank lines included. Rows of the wrong
        // length are reported later with the line number.
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true);
        let mut rows: Vec<Vec<String>> = Vec::new();
        for line in content.lines() {
            if line.is_empty() {
                rows.push(vec![String::new()]);
                continue;
            }
            let mut record = csv::StringRecord::new();
            builder
                .from_reader(line.as_bytes())
                .read_record(&mut record)
                .context(CsvDecodeSnafu { path: &self.path })?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        debug!("read_rows: {}: {} rows", self.path, rows.len());
        Ok(rows)
    }
}

/// Rows held in memory, for fixtures and for exports that were already
/// decoded by someone else.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    rows: Vec<Vec<String>>,
    reads: Cell<usize>,
}

impl MemorySource {
    pub fn new(name: &str, rows: Vec<Vec<String>>) -> MemorySource {
        MemorySource {
            name: name.to_string(),
            rows,
            reads: Cell::new(0),
        }
    }

    /// Builds the rows from lines of comma-separated cells. No quoting is supported.
    pub fn from_lines(name: &str, lines: &[&str]) -> MemorySource {
        let rows = lines
            .iter()
            .map(|l| l.split(',').map(|s| s.to_string()).collect())
            .collect();
        MemorySource::new(name, rows)
    }

    /// How many times the rows were handed out.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl RowSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_rows(&self) -> TallyResult<Vec<Vec<String>>> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.rows.clone())
    }
}

impl<S: RowSource + ?Sized> RowSource for Rc<S> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn read_rows(&self) -> TallyResult<Vec<Vec<String>>> {
        (**self).read_rows()
    }
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn read_rows(&self) -> TallyResult<Vec<Vec<String>>> {
        (**self).read_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        let src = CsvFileSource::new("does/not/exist.csv");
        let err = src.read_rows().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn wrong_extension() {
        let src = CsvFileSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let err = src.read_rows().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains(".csv extension"));
    }

    #[test]
    fn blank_lines_are_kept() {
        let src = CsvFileSource::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/blank_line_2candidate.csv"
        ));
        let rows = src.read_rows().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], vec!["1", "x", "", "", "x", "", ""]);
        assert_eq!(rows[2], vec![""]);
        assert_eq!(rows[3][0], "2");
    }

    #[test]
    fn crlf_lines() {
        let src = CsvFileSource::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/simple_123_3candidate.csv"
        ));
        let rows = src.read_rows().unwrap();
        assert_eq!(rows.len(), 13);
        assert!(rows.iter().all(|r| r.len() == 9));
        assert_eq!(rows[12][0], "12");
        assert_eq!(rows[12][8], "");
    }

    #[test]
    fn memory_source_counts_reads() {
        let src = MemorySource::from_lines("mem", &["a,b", "1,"]);
        assert_eq!(src.read_count(), 0);
        let rows = src.read_rows().unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", ""]]);
        assert_eq!(src.read_count(), 1);
    }
}
