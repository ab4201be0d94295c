pub use crate::config::*;
use crate::source::MemorySource;

/// A builder for ballot exports held in memory.
///
/// It is the easiest way to feed ballots that were not read from a CSV file,
/// or to write small elections by hand.
///
/// ```
/// use runoff_tally::builder::Builder;
/// use runoff_tally::{TallyError, TallyManager, TallyRules};
///
/// let mut builder = Builder::new(&["Anna", "Bob", "Clara"]);
/// builder.add_ballots(4, &["Anna"], &[])?;
/// builder.add_ballots(3, &["Bob"], &[])?;
/// builder.add_ballot(&["Clara"], &["Bob"])?;
///
/// let manager = TallyManager::new(vec![builder.build("export-1")], TallyRules::new(3, 1))?;
/// assert_eq!(manager.first_round_results()?.votes_for("Anna"), Some(4));
/// assert_eq!(manager.second_round_results()?.unwrap().votes_for("Bob"), Some(4));
///
/// # Ok::<(), TallyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    candidates: Vec<String>,
    rows: Vec<Vec<String>>,
    next_number: u64,
}

impl Builder {
    pub fn new(candidates: &[&str]) -> Builder {
        Builder {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            next_number: 1,
        }
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Adds a ballot with the next ballot number.
    ///
    /// `first_round` and `runoff` are the names of the candidates marked in
    /// each half. A half without any candidate gets its no-endorsement column
    /// marked, as a voting machine would do.
    pub fn add_ballot(&mut self, first_round: &[&str], runoff: &[&str]) -> TallyResult<()> {
        let number = self.next_number.to_string();
        self.add_ballot_numbered(number.as_str(), first_round, runoff)
    }

    /// Same as `add_ballot`, with an explicit ballot number.
    ///
    /// The following ballots are numbered from this one if it is an integer.
    pub fn add_ballot_numbered(
        &mut self,
        number: &str,
        first_round: &[&str],
        runoff: &[&str],
    ) -> TallyResult<()> {
        let mut row: Vec<String> = vec![number.to_string()];
        row.extend(self.half(first_round)?);
        row.extend(self.half(runoff)?);
        self.rows.push(row);
        self.next_number = match number.trim().parse::<u64>() {
            Ok(n) => n + 1,
            Err(_) => self.next_number + 1,
        };
        Ok(())
    }

    /// Adds `count` identical ballots.
    pub fn add_ballots(
        &mut self,
        count: usize,
        first_round: &[&str],
        runoff: &[&str],
    ) -> TallyResult<()> {
        for _ in 0..count {
            self.add_ballot(first_round, runoff)?;
        }
        Ok(())
    }

    /// Adds a row exactly as given, without any check.
    pub fn add_raw_row(&mut self, row: &[&str]) {
        self.rows.push(row.iter().map(|c| c.to_string()).collect());
        self.next_number += 1;
    }

    /// The header, the ballots, and one empty row closing the ballots.
    pub fn build(&self, name: &str) -> MemorySource {
        let mut header: Vec<String> = vec!["ballot_num".to_string()];
        for _ in 0..2 {
            header.extend(self.candidates.iter().cloned());
            header.push(NO_ENDORSEMENT.to_string());
        }
        let mut terminator: Vec<String> = vec![self.next_number.to_string()];
        terminator.extend(std::iter::repeat(String::new()).take(2 * self.candidates.len() + 2));

        let mut rows: Vec<Vec<String>> = vec![header];
        rows.extend(self.rows.iter().cloned());
        rows.push(terminator);
        MemorySource::new(name, rows)
    }

    fn half(&self, marked: &[&str]) -> TallyResult<Vec<String>> {
        for name in marked {
            if !self.candidates.iter().any(|c| c == name) {
                return UnknownCandidateSnafu { name: *name }.fail();
            }
        }
        let mut cells: Vec<String> = self
            .candidates
            .iter()
            .map(|c| {
                if marked.contains(&c.as_str()) {
                    "x".to_string()
                } else {
                    String::new()
                }
            })
            .collect();
        cells.push(if marked.is_empty() {
            "x".to_string()
        } else {
            String::new()
        });
        Ok(cells)
    }
}
