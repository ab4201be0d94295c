mod ballot_file;
pub mod builder;
mod config;
pub mod manual;
mod source;

use log::{debug, info, warn};
use snafu::prelude::*;

use std::cell::OnceCell;

pub use crate::ballot_file::BallotFile;
pub use crate::config::*;
pub use crate::source::{CsvFileSource, MemorySource, RowSource};

/// Runs the tally over a set of redundant exports of the same ballots.
///
/// The last export is the reference: all the others are compared to it, and
/// the counts are computed from it once every export agrees.
///
/// Every derived value (differences, round results, runoff decision) is
/// computed at most once per manager and then handed out by reference.
#[derive(Debug)]
pub struct TallyManager {
    /// Every file but the reference, in the given order.
    others: Vec<BallotFile>,
    reference: BallotFile,
    rules: TallyRules,
    differences: OnceCell<Vec<String>>,
    first_round: OnceCell<RoundResult>,
    runoff: OnceCell<bool>,
    second_round: OnceCell<SecondRoundResult>,
}

impl TallyManager {
    /// Arguments:
    /// * `sources` the exports, the reference one last. Nothing is read yet.
    /// * `rules` the number of candidates, of seats, and the runoff threshold.
    pub fn new<S: RowSource + 'static>(
        sources: Vec<S>,
        rules: TallyRules,
    ) -> TallyResult<TallyManager> {
        rules.check()?;
        let mut others: Vec<BallotFile> = sources
            .into_iter()
            .map(|s| BallotFile::new(s, rules.num_candidates))
            .collect();
        let reference = others.pop().context(InvalidSetupSnafu {
            message: "at least one ballot file is required",
        })?;
        info!(
            "Tally over {} files, candidates: {}, seats: {}, threshold: {}%",
            others.len() + 1,
            rules.num_candidates,
            rules.num_seats,
            rules.runoff_threshold
        );
        Ok(TallyManager {
            others,
            reference,
            rules,
            differences: OnceCell::new(),
            first_round: OnceCell::new(),
            runoff: OnceCell::new(),
            second_round: OnceCell::new(),
        })
    }

    pub fn from_paths(paths: &[String], rules: TallyRules) -> TallyResult<TallyManager> {
        let sources: Vec<CsvFileSource> = paths.iter().map(|p| CsvFileSource::new(p)).collect();
        TallyManager::new(sources, rules)
    }

    pub fn rules(&self) -> &TallyRules {
        &self.rules
    }

    /// The files compared to the reference, in the given order.
    pub fn others(&self) -> &[BallotFile] {
        &self.others
    }

    /// The file every other file is compared to, and that is counted.
    pub fn reference(&self) -> &BallotFile {
        &self.reference
    }

    /// One message per file that does not match the reference file.
    pub fn differences(&self) -> TallyResult<&[String]> {
        if let Some(d) = self.differences.get() {
            return Ok(d);
        }
        let reference = &self.reference;
        info!(
            "Reference file {}: fingerprint {}",
            reference.name(),
            reference.fingerprint()?
        );
        let mut messages: Vec<String> = Vec::new();
        for file in self.others.iter() {
            debug!("{}: fingerprint {}", file.name(), file.fingerprint()?);
            if !reference.equals(file)? {
                let diff = reference.differing_rows(file)?;
                let ballot_nums: Vec<&str> = diff.iter().map(|r| r.number.as_str()).collect();
                let msg = format!(
                    "Files {} and {} differ. {} rows differ for ballot numbers {}",
                    reference.name(),
                    file.name(),
                    diff.len(),
                    ballot_nums.join(",")
                );
                warn!("{}", msg);
                messages.push(msg);
            }
        }
        Ok(self.differences.get_or_init(|| messages))
    }

    /// Checks that the files agree and that no ballot has more round 1 votes than seats.
    pub fn validate_first_round_votes(&self) -> TallyResult<()> {
        self.check_files_match()?;
        let num_candidates = self.rules.num_candidates;
        let num_seats = self.rules.num_seats;
        let over: Vec<&str> = self
            .reference()
            .ballot_rows()?
            .iter()
            .filter(|r| count_marks(r.first_round(num_candidates)) > num_seats)
            .map(|r| r.number.as_str())
            .collect();
        if !over.is_empty() {
            warn!("Ballots with more than {} round 1 votes: {:?}", num_seats, over);
        }
        ensure!(
            over.is_empty(),
            FirstRoundOvervoteSnafu {
                num_seats,
                ballot_numbers: over.join(","),
            }
        );
        Ok(())
    }

    pub fn first_round_results(&self) -> TallyResult<&RoundResult> {
        if let Some(r) = self.first_round.get() {
            return Ok(r);
        }
        self.validate_first_round_votes()?;
        let num_candidates = self.rules.num_candidates;
        let reference = self.reference();
        let res = tally(
            reference.candidate_names()?,
            reference
                .ballot_rows()?
                .iter()
                .map(|r| r.first_round(num_candidates)),
        );
        info!("First round: {:?}", res);
        Ok(self.first_round.get_or_init(|| res))
    }

    /// A runoff is needed when there are more candidates than seats + 1, and
    /// no entry of the first round (including "no endorsement") reaches the
    /// threshold.
    pub fn runoff_needed(&self) -> TallyResult<bool> {
        if let Some(r) = self.runoff.get() {
            return Ok(*r);
        }
        let results = self.first_round_results()?;
        let mut needed = self.rules.num_candidates > self.rules.num_seats + 1;
        if results.ballot_count > 0 {
            for (name, count) in results.votes.iter() {
                let share = (100 * *count) as f64 / results.ballot_count as f64;
                if share >= self.rules.runoff_threshold {
                    info!("{} holds {:.2}% of the ballots: no runoff", name, share);
                    needed = false;
                }
            }
        }
        debug!("runoff_needed: {}", needed);
        Ok(*self.runoff.get_or_init(|| needed))
    }

    /// Checks that the files agree and that no ballot has more than one runoff vote.
    pub fn validate_second_round_votes(&self) -> TallyResult<()> {
        self.check_files_match()?;
        let num_candidates = self.rules.num_candidates;
        let over: Vec<&str> = self
            .reference()
            .ballot_rows()?
            .iter()
            .filter(|r| count_marks(r.runoff(num_candidates)) > 1)
            .map(|r| r.number.as_str())
            .collect();
        if !over.is_empty() {
            warn!("Ballots with more than 1 runoff vote: {:?}", over);
        }
        ensure!(
            over.is_empty(),
            RunoffOvervoteSnafu {
                ballot_numbers: over.join(","),
            }
        );
        Ok(())
    }

    /// The runoff round, or `None` when no runoff is needed.
    pub fn second_round_results(&self) -> TallyResult<Option<&SecondRoundResult>> {
        self.check_files_match()?;
        if !self.runoff_needed()? {
            return Ok(None);
        }
        if let Some(r) = self.second_round.get() {
            return Ok(Some(r));
        }
        self.validate_second_round_votes()?;

        let num_candidates = self.rules.num_candidates;
        let num_seats = self.rules.num_seats;
        let first = self.first_round_results()?;
        let counts: Vec<u64> = first.votes[..num_candidates]
            .iter()
            .map(|(_, c)| *c)
            .collect();
        let eliminated = eliminated_candidates(&counts, num_seats);

        let reference = self.reference();
        let names = reference.candidate_names()?;
        info!(
            "Eliminated: {:?}",
            eliminated.iter().map(|idx| &names[*idx]).collect::<Vec<_>>()
        );
        let transferred: Vec<Vec<bool>> = reference
            .ballot_rows()?
            .iter()
            .map(|r| transfer_votes(r, num_candidates, &eliminated, num_seats))
            .collect();
        let round = tally(names, transferred.iter().map(|v| v.as_slice()));
        let res = SecondRoundResult {
            eliminated: eliminated.iter().map(|idx| names[*idx].clone()).collect(),
            ballot_count: round.ballot_count,
            votes: round.votes,
        };
        info!("Second round: {:?}", res);
        Ok(Some(self.second_round.get_or_init(|| res)))
    }

    fn check_files_match(&self) -> TallyResult<()> {
        let differences = self.differences()?;
        ensure!(
            differences.is_empty(),
            FilesDifferSnafu {
                messages: differences.to_vec(),
            }
        );
        Ok(())
    }
}

fn count_marks(marks: &[bool]) -> usize {
    marks.iter().filter(|m| **m).count()
}

// A ballot with at least one mark counts once for each marked candidate.
// A ballot without marks counts for no endorsement.
fn tally<'a, I>(names: &[String], ballots: I) -> RoundResult
where
    I: Iterator<Item = &'a [bool]>,
{
    let mut counts: Vec<u64> = vec![0; names.len()];
    let mut no_endorsement: u64 = 0;
    let mut ballot_count: u64 = 0;
    for marks in ballots {
        ballot_count += 1;
        if marks.iter().any(|m| *m) {
            for (idx, m) in marks.iter().enumerate() {
                if *m {
                    counts[idx] += 1;
                }
            }
        } else {
            no_endorsement += 1;
        }
    }
    let mut votes: Vec<(String, u64)> = names.iter().cloned().zip(counts).collect();
    votes.push((NO_ENDORSEMENT.to_string(), no_endorsement));
    RoundResult {
        ballot_count,
        votes,
    }
}

/// Removes all the candidates tied at the lowest count, as many times as
/// needed to leave at most `num_seats + 1` candidates.
///
/// Returns the indices of the eliminated candidates, sorted.
fn eliminated_candidates(counts: &[u64], num_seats: usize) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..counts.len()).collect();
    let mut eliminated: Vec<usize> = Vec::new();
    while remaining.len() > num_seats + 1 {
        let lowest = match remaining.iter().map(|idx| counts[*idx]).min() {
            Some(x) => x,
            None => break,
        };
        let (out, keep): (Vec<usize>, Vec<usize>) = remaining
            .iter()
            .copied()
            .partition(|idx| counts[*idx] == lowest);
        debug!(
            "eliminated_candidates: lowest count {}, removing {:?}",
            lowest, out
        );
        eliminated.extend(out);
        remaining = keep;
    }
    eliminated.sort_unstable();
    eliminated
}

/// The round 1 marks of a ballot once the eliminated candidates are gone.
///
/// The runoff marks are added when the ballot voted for an eliminated
/// candidate, or when it has fewer remaining marks than seats.
fn transfer_votes(
    row: &BallotRow,
    num_candidates: usize,
    eliminated: &[usize],
    num_seats: usize,
) -> Vec<bool> {
    let mut first: Vec<bool> = row.first_round(num_candidates).to_vec();
    let mut runoff: Vec<bool> = row.runoff(num_candidates).to_vec();
    let mut transfer = false;
    for idx in eliminated.iter() {
        if first[*idx] {
            transfer = true;
        }
        first[*idx] = false;
        runoff[*idx] = false;
    }
    if count_marks(&first) < num_seats {
        transfer = true;
    }
    if transfer {
        for (f, r) in first.iter_mut().zip(runoff.iter()) {
            *f |= *r;
        }
        debug!("transfer_votes: ballot {}: {:?}", row.number, first);
    }
    first
}
