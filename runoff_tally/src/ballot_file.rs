// Structural validation of one ballot export.
//
// Expected layout:
//   ballot_num, candidate_1 .. candidate_N, no endorsement, candidate_1 .. candidate_N, no endorsement
//
// The first row without any mark ends the ballots. Every row after it must be
// empty as well.

use log::{debug, info};
use snafu::prelude::*;

use std::cell::OnceCell;
use std::fmt;

use crate::config::*;
use crate::source::{CsvFileSource, RowSource};

#[derive(Debug, Clone)]
struct ParsedFile {
    header: Vec<String>,
    rows: Vec<BallotRow>,
}

/// One export of the ballots, validated on first access.
pub struct BallotFile {
    source: Box<dyn RowSource>,
    num_candidates: usize,
    parsed: OnceCell<ParsedFile>,
}

impl fmt::Debug for BallotFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BallotFile")
            .field("name", &self.source.name())
            .field("num_candidates", &self.num_candidates)
            .field("validated", &self.parsed.get().is_some())
            .finish()
    }
}

impl BallotFile {
    pub fn new<S: RowSource + 'static>(source: S, num_candidates: usize) -> BallotFile {
        BallotFile {
            source: Box::new(source),
            num_candidates,
            parsed: OnceCell::new(),
        }
    }

    /// A CSV file on disk. Nothing is read until the content is needed.
    pub fn open(path: &str, num_candidates: usize) -> BallotFile {
        BallotFile::new(CsvFileSource::new(path), num_candidates)
    }

    pub fn name(&self) -> String {
        self.source.name()
    }

    pub fn num_candidates(&self) -> usize {
        self.num_candidates
    }

    /// Reads and validates the content, unless this was already done successfully.
    pub fn read_and_validate(&self) -> TallyResult<()> {
        self.parsed().map(|_| ())
    }

    pub fn header(&self) -> TallyResult<&[String]> {
        Ok(&self.parsed()?.header)
    }

    pub fn ballot_count(&self) -> TallyResult<usize> {
        Ok(self.parsed()?.rows.len())
    }

    pub fn ballot_rows(&self) -> TallyResult<&[BallotRow]> {
        Ok(&self.parsed()?.rows)
    }

    /// The candidate labels of the first round, without the no-endorsement column.
    pub fn candidate_names(&self) -> TallyResult<&[String]> {
        Ok(&self.parsed()?.header[1..self.num_candidates + 1])
    }

    /// Same header, same number of ballots and no differing ballot.
    pub fn equals(&self, other: &BallotFile) -> TallyResult<bool> {
        if self.header()? != other.header()? {
            return Ok(false);
        }
        if self.ballot_count()? != other.ballot_count()? {
            return Ok(false);
        }
        Ok(self.differing_rows(other)?.is_empty())
    }

    /// The ballots of this file that differ from the ballot at the same
    /// position in `other`, in file order.
    ///
    /// Positions are matched from the end of the files. When the files do not
    /// hold the same number of ballots, nothing is compared and the result is
    /// empty: use `equals` to detect that case.
    pub fn differing_rows(&self, other: &BallotFile) -> TallyResult<Vec<BallotRow>> {
        let mine = self.ballot_rows()?;
        let theirs = other.ballot_rows()?;
        if mine.len() != theirs.len() {
            return Ok(Vec::new());
        }
        let mut res: Vec<BallotRow> = mine
            .iter()
            .rev()
            .zip(theirs.iter().rev())
            .filter(|(r1, r2)| r1 != r2)
            .map(|(r1, _)| r1.clone())
            .collect();
        res.reverse();
        Ok(res)
    }

    /// SHA-256 of the normalized content. Exports that only differ in the
    /// content of their marks or in line endings share a fingerprint.
    pub fn fingerprint(&self) -> TallyResult<String> {
        let parsed = self.parsed()?;
        let mut lines: Vec<String> = vec![parsed.header.join(",")];
        for row in parsed.rows.iter() {
            let marks: String = row.marks.iter().map(|m| if *m { '1' } else { '0' }).collect();
            lines.push(format!("{},{}", row.number, marks));
        }
        Ok(sha256::digest(lines.join("\n")))
    }

    fn parsed(&self) -> TallyResult<&ParsedFile> {
        if let Some(p) = self.parsed.get() {
            return Ok(p);
        }
        let p = self.parse()?;
        Ok(self.parsed.get_or_init(|| p))
    }

    fn parse(&self) -> TallyResult<ParsedFile> {
        let path = self.source.name();
        let mut raw = self.source.read_rows()?;
        ensure!(raw.len() >= 2, TooShortSnafu { path: &path });

        let expected = 2 * self.num_candidates + 3;
        let header = raw.remove(0);
        validate_row_length(&path, 1, &header, expected)?;
        let first_round = &header[1..self.num_candidates + 2];
        let runoff = &header[self.num_candidates + 2..];
        ensure!(
            first_round == runoff,
            HeaderMismatchSnafu {
                path: &path,
                first_round: first_round.join(","),
                runoff: runoff.join(","),
            }
        );

        let count = find_ballot_count(&path, &raw)?;
        for (idx, row) in raw[..count].iter().enumerate() {
            validate_row_length(&path, idx + 2, row, expected)?;
        }
        validate_empty_rows(&path, &raw, count)?;

        let rows: Vec<BallotRow> = raw[..count]
            .iter()
            .map(|row| BallotRow {
                number: row[0].clone(),
                marks: row[1..].iter().map(|cell| !cell.is_empty()).collect(),
            })
            .collect();
        info!("{}: {} ballots", path, rows.len());
        Ok(ParsedFile { header, rows })
    }
}

fn find_ballot_count(path: &str, csv: &[Vec<String>]) -> TallyResult<usize> {
    let mut count = 0;
    for (idx, row) in csv.iter().enumerate() {
        if ballot_row_is_empty(path, idx + 2, row)? {
            break;
        }
        count += 1;
    }
    Ok(count)
}

// The ballot number is checked on every row, including the terminating ones.
fn ballot_row_is_empty(path: &str, lineno: usize, row: &[String]) -> TallyResult<bool> {
    let id = row.first().map(|s| s.as_str()).unwrap_or("");
    ensure!(
        is_valid_ballot_number(id),
        InvalidBallotNumberSnafu {
            path,
            lineno,
            value: id,
        }
    );
    Ok(row.iter().skip(1).all(|cell| cell.is_empty()))
}

fn is_valid_ballot_number(id: &str) -> bool {
    let t = id.trim();
    !t.is_empty()
        && id != "0"
        && t.chars().any(|c| c.is_ascii_digit())
        && t.parse::<f64>().is_ok()
}

fn validate_row_length(
    path: &str,
    lineno: usize,
    row: &[String],
    expected: usize,
) -> TallyResult<()> {
    ensure!(
        row.len() == expected,
        RowLengthSnafu {
            path,
            lineno,
            expected,
            found: row.len(),
            row: row.join(","),
        }
    );
    Ok(())
}

fn validate_empty_rows(path: &str, csv: &[Vec<String>], count: usize) -> TallyResult<()> {
    for (idx, row) in csv.iter().enumerate().skip(count) {
        let lineno = idx + 2;
        if !ballot_row_is_empty(path, lineno, row)? {
            return RowAfterEmptySnafu {
                path,
                lineno,
                row: row.join(","),
            }
            .fail();
        }
        debug!("{}: row {} closes the ballots", path, lineno);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::rc::Rc;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const HEADER: &str = "ballot_num,A,B,none,A,B,none";

    #[test]
    fn simple_3_candidates() {
        init();
        let file = BallotFile::open(&fixture("simple_x_3candidate.csv"), 3);
        file.read_and_validate().unwrap();
        assert_eq!(
            file.header().unwrap(),
            [
                "ballot_num",
                "candidate_A",
                "candidate_B",
                "candidate_C",
                "none",
                "candidate_A",
                "candidate_B",
                "candidate_C",
                "none"
            ]
        );
        assert_eq!(file.ballot_count().unwrap(), 10);
        assert_eq!(
            file.candidate_names().unwrap(),
            ["candidate_A", "candidate_B", "candidate_C"]
        );
        for row in file.ballot_rows().unwrap() {
            assert_eq!(row.marks.len() + 1, 9);
        }
    }

    #[test]
    fn crlf_and_mark_content_are_normalized() {
        let file = BallotFile::open(&fixture("simple_123_3candidate.csv"), 3);
        let rows = file.ballot_rows().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].number, "1");
        assert_eq!(
            rows[0].marks,
            vec![true, false, false, false, false, false, false, true]
        );
        assert_eq!(rows[9].first_round(3), [false, false, false]);
        assert!(rows[9].first_round_no_endorsement(3));
        assert_eq!(rows[9].runoff(3), [false, true, false]);
        assert!(!rows[9].runoff_no_endorsement(3));
    }

    #[test]
    fn equals() {
        let file1 = BallotFile::open(&fixture("simple_x_3candidate.csv"), 3);
        let file2 = BallotFile::open(&fixture("simple_123_3candidate.csv"), 3);
        let file3 = BallotFile::open(&fixture("simple_x_3candidate.csv"), 3);
        assert!(file1.equals(&file2).unwrap());
        assert!(file2.equals(&file1).unwrap());
        assert!(file1.equals(&file3).unwrap());
        assert!(file1.equals(&file1).unwrap());

        let different_file = BallotFile::open(&fixture("second_x_3candidate.csv"), 3);
        assert!(!different_file.equals(&file1).unwrap());
        assert!(!file1.equals(&different_file).unwrap());

        let diff_header_file = BallotFile::open(&fixture("diffheader_x_3candidate.csv"), 3);
        assert!(!file1.equals(&diff_header_file).unwrap());
    }

    #[test]
    fn differing_rows() {
        let file1 = BallotFile::open(&fixture("simple_x_3candidate.csv"), 3);
        let file2 = BallotFile::open(&fixture("simple_123_3candidate.csv"), 3);
        assert!(file1.differing_rows(&file2).unwrap().is_empty());

        let different_file = BallotFile::open(&fixture("second_x_3candidate.csv"), 3);
        let diff = file1.differing_rows(&different_file).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].number, "8");
        // The rows come from the file the method is called on.
        assert_eq!(diff[0].first_round(3), [false, false, true]);
    }

    #[test]
    fn differing_rows_is_empty_when_counts_differ() {
        let long = MemorySource::from_lines(
            "long",
            &[HEADER, "1,x,,,x,,", "2,,x,,,x,", "3,,,,,,"],
        );
        let short = MemorySource::from_lines("short", &[HEADER, "1,,x,,x,,", "2,,,,,,"]);
        let f1 = BallotFile::new(long, 2);
        let f2 = BallotFile::new(short, 2);
        assert!(f1.differing_rows(&f2).unwrap().is_empty());
        assert!(f2.differing_rows(&f1).unwrap().is_empty());
        // The files are still unequal.
        assert!(!f1.equals(&f2).unwrap());
    }

    #[test]
    fn rows_are_compared_from_the_end() {
        let f1 = BallotFile::new(
            MemorySource::from_lines("f1", &[HEADER, "1,x,,,x,,", "2,,x,,,x,", "3,,,,,,"]),
            2,
        );
        let f2 = BallotFile::new(
            MemorySource::from_lines("f2", &[HEADER, "1,x,,,x,,", "2,x,,,,x,", "3,,,,,,"]),
            2,
        );
        let diff = f1.differing_rows(&f2).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].number, "2");
        assert_eq!(f2.differing_rows(&f1).unwrap()[0].first_round(2), [true, false]);
    }

    #[test]
    fn single_cell_change_is_detected() {
        let lines = [HEADER, "1,x,,,x,,", "2,,x,,,x,", "3,,,,,,"];
        let f1 = BallotFile::new(MemorySource::from_lines("f1", &lines), 2);
        let f2 = BallotFile::new(MemorySource::from_lines("f2", &lines), 2);
        assert!(f1.equals(&f2).unwrap());
        let changed = [HEADER, "1,x,,,x,,", "2,,x,,,x,x", "3,,,,,,"];
        let f3 = BallotFile::new(MemorySource::from_lines("f3", &changed), 2);
        assert!(!f1.equals(&f3).unwrap());
        let diff = f3.differing_rows(&f1).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].number, "2");
    }

    #[test]
    fn source_is_read_once() {
        let src = Rc::new(MemorySource::from_lines(
            "mem",
            &[HEADER, "1,x,,,x,,", "2,,,,,,"],
        ));
        let file = BallotFile::new(src.clone(), 2);
        assert_eq!(src.read_count(), 0);
        let h1 = file.header().unwrap().to_vec();
        let rows1 = file.ballot_rows().unwrap().to_vec();
        assert_eq!(file.header().unwrap(), h1.as_slice());
        assert_eq!(file.ballot_rows().unwrap(), rows1.as_slice());
        assert_eq!(file.ballot_count().unwrap(), 1);
        file.read_and_validate().unwrap();
        assert_eq!(src.read_count(), 1);
    }

    #[test]
    fn fingerprint_follows_normalized_content() {
        let file1 = BallotFile::open(&fixture("simple_x_3candidate.csv"), 3);
        let file2 = BallotFile::open(&fixture("simple_123_3candidate.csv"), 3);
        let different_file = BallotFile::open(&fixture("second_x_3candidate.csv"), 3);
        let fp = file1.fingerprint().unwrap();
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, file2.fingerprint().unwrap());
        assert_ne!(fp, different_file.fingerprint().unwrap());
    }

    #[test]
    fn missing_file() {
        let file = BallotFile::open(&fixture("missing.csv"), 2);
        let err = file.read_and_validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn wrong_extension() {
        let file = BallotFile::open(&fixture("simple_x_3candidate.txt"), 3);
        let err = file.read_and_validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn too_short() {
        let file = BallotFile::new(MemorySource::from_lines("mem", &[HEADER]), 2);
        let err = file.read_and_validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("at least 2 lines"));
    }

    #[test]
    fn header_of_wrong_length() {
        let file = BallotFile::new(MemorySource::from_lines("mem", &[HEADER, "1,,,,,,"]), 3);
        let err = file.read_and_validate().unwrap_err();
        assert!(matches!(err, TallyError::RowLength { lineno: 1, .. }));
    }

    #[test]
    fn asymmetric_header() {
        let file = BallotFile::new(
            MemorySource::from_lines("mem", &["ballot_num,A,B,none,A,C,none", "1,,,,,,"]),
            2,
        );
        let err = file.read_and_validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(err, TallyError::HeaderMismatch { .. }));
    }

    #[test]
    fn invalid_ballot_number() {
        for bad in ["abc", "", "0", "nan"] {
            let row = format!("{},x,,,x,,", bad);
            let file = BallotFile::new(
                MemorySource::from_lines("mem", &[HEADER, row.as_str(), "2,,,,,,"]),
                2,
            );
            let err = file.read_and_validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(err.to_string().contains("not a valid ballot number"), "{}", err);
        }
    }

    #[test]
    fn blank_line_between_ballots() {
        let file = BallotFile::open(&fixture("blank_line_2candidate.csv"), 2);
        let err = file.ballot_count().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("not a valid ballot number"), "{}", err);
        assert!(matches!(err, TallyError::InvalidBallotNumber { lineno: 3, .. }));
    }

    #[test]
    fn padded_zero_is_a_ballot_number() {
        let file = BallotFile::new(
            MemorySource::from_lines("mem", &[HEADER, " 0,x,,,x,,", "2,,,,,,"]),
            2,
        );
        assert_eq!(file.ballot_count().unwrap(), 1);
        assert_eq!(file.ballot_rows().unwrap()[0].number, " 0");
    }

    #[test]
    fn invalid_ballot_number_after_the_ballots() {
        let file = BallotFile::new(
            MemorySource::from_lines("mem", &[HEADER, "1,x,,,x,,", "2,,,,,,", "abc,,,,,,"]),
            2,
        );
        let err = file.read_and_validate().unwrap_err();
        assert!(err.to_string().contains("not a valid ballot number"));
    }

    #[test]
    fn short_ballot_row() {
        let file = BallotFile::new(
            MemorySource::from_lines("mem", &[HEADER, "1,x,,,x,,", "2,x,", "3,,,,,,"]),
            2,
        );
        let err = file.read_and_validate().unwrap_err();
        assert!(matches!(
            err,
            TallyError::RowLength {
                lineno: 3,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn vote_after_empty_row() {
        let file = BallotFile::open(&fixture("trailing_vote_3candidate.csv"), 3);
        let err = file.read_and_validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("came after an empty row"));
    }

    #[test]
    fn failed_parse_is_not_cached() {
        let file = BallotFile::new(MemorySource::from_lines("mem", &[HEADER]), 2);
        assert!(file.header().is_err());
        assert!(file.ballot_rows().is_err());
    }

    #[test]
    fn trailing_rows_may_be_short_when_empty() {
        let file = BallotFile::new(
            MemorySource::from_lines("mem", &[HEADER, "1,x,,,x,,", "2,,", "3"]),
            2,
        );
        assert_eq!(file.ballot_count().unwrap(), 1);
    }

    #[test]
    fn no_ballots() {
        let file = BallotFile::new(MemorySource::from_lines("mem", &[HEADER, "1,,,,,,"]), 2);
        assert_eq!(file.ballot_count().unwrap(), 0);
    }
}
