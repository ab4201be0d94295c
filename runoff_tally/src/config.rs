// ********* Input data structures ***********

use snafu::Snafu;

/// The label under which ballots without any candidate mark are tallied.
pub const NO_ENDORSEMENT: &str = "no endorsement";

/// One ballot after normalization.
///
/// The ballot number is kept verbatim. Every other cell of the row is reduced
/// to whether it held any content at all.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct BallotRow {
    pub number: String,
    /// `[round-1 marks (N), round-1 no endorsement, runoff marks (N), runoff no endorsement]`
    pub marks: Vec<bool>,
}

impl BallotRow {
    /// The round-1 marks, one per candidate. The no-endorsement column is excluded.
    pub fn first_round(&self, num_candidates: usize) -> &[bool] {
        &self.marks[..num_candidates]
    }

    pub fn first_round_no_endorsement(&self, num_candidates: usize) -> bool {
        self.marks[num_candidates]
    }

    /// The runoff marks, one per candidate. The no-endorsement column is excluded.
    pub fn runoff(&self, num_candidates: usize) -> &[bool] {
        &self.marks[num_candidates + 1..2 * num_candidates + 1]
    }

    pub fn runoff_no_endorsement(&self, num_candidates: usize) -> bool {
        self.marks[2 * num_candidates + 1]
    }
}

// ******** Output data structures *********

/// The tally of one round.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct RoundResult {
    pub ballot_count: u64,
    /// Candidates in header order, followed by the `NO_ENDORSEMENT` entry.
    pub votes: Vec<(String, u64)>,
}

impl RoundResult {
    pub fn votes_for(&self, name: &str) -> Option<u64> {
        self.votes
            .iter()
            .find(|(cname, _)| cname == name)
            .map(|(_, count)| *count)
    }
}

/// The tally of the runoff round, after the elimination and the transfers.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct SecondRoundResult {
    /// In candidate order.
    pub eliminated: Vec<String>,
    pub ballot_count: u64,
    pub votes: Vec<(String, u64)>,
}

impl SecondRoundResult {
    pub fn votes_for(&self, name: &str) -> Option<u64> {
        self.votes
            .iter()
            .find(|(cname, _)| cname == name)
            .map(|(_, count)| *count)
    }
}

/// Broad families of failures, for callers that only need to branch on the category.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    NotFound,
    Format,
    Validation,
    Configuration,
}

/// Errors that prevent a file from being read or a tally from completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("{path} does not exist."))]
    NotFound { path: String },

    #[snafu(display("{path} does not have a .csv extension."))]
    NotCsv { path: String },

    #[snafu(display("{path} could not be read"))]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("{path} could not be decoded as CSV"))]
    CsvDecode { path: String, source: csv::Error },

    #[snafu(display("{path} does not have at least 2 lines."))]
    TooShort { path: String },

    #[snafu(display(
        "{path}: invalid length row (row {lineno}). Expected {expected} elements, found {found}: {row}"
    ))]
    RowLength {
        path: String,
        lineno: usize,
        expected: usize,
        found: usize,
        row: String,
    },

    #[snafu(display(
        "{path}: the header halves do not match: [{first_round}] vs [{runoff}]"
    ))]
    HeaderMismatch {
        path: String,
        first_round: String,
        runoff: String,
    },

    #[snafu(display("{path}: '{value}' is not a valid ballot number (row {lineno})."))]
    InvalidBallotNumber {
        path: String,
        lineno: usize,
        value: String,
    },

    #[snafu(display(
        "{path}: row is not empty, but came after an empty row (row {lineno}): {row}"
    ))]
    RowAfterEmpty {
        path: String,
        lineno: usize,
        row: String,
    },

    #[snafu(display("csv ballot files do not match: {}", messages.join("; ")))]
    FilesDiffer { messages: Vec<String> },

    #[snafu(display(
        "more than {num_seats} round 1 votes on ballot numbers {ballot_numbers}"
    ))]
    FirstRoundOvervote {
        num_seats: usize,
        ballot_numbers: String,
    },

    #[snafu(display("more than 1 runoff vote on ballot numbers {ballot_numbers}"))]
    RunoffOvervote { ballot_numbers: String },

    #[snafu(display("invalid election setup: {message}"))]
    InvalidSetup { message: String },

    #[snafu(display("{name} is not one of the candidates"))]
    UnknownCandidate { name: String },
}

impl TallyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::NotFound { .. } | TallyError::Unreadable { .. } => ErrorKind::NotFound,
            TallyError::NotCsv { .. }
            | TallyError::CsvDecode { .. }
            | TallyError::TooShort { .. }
            | TallyError::RowLength { .. }
            | TallyError::HeaderMismatch { .. }
            | TallyError::InvalidBallotNumber { .. }
            | TallyError::RowAfterEmpty { .. } => ErrorKind::Format,
            TallyError::FilesDiffer { .. }
            | TallyError::FirstRoundOvervote { .. }
            | TallyError::RunoffOvervote { .. } => ErrorKind::Validation,
            TallyError::InvalidSetup { .. } | TallyError::UnknownCandidate { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

pub type TallyResult<T> = Result<T, TallyError>;

// ********* Configuration **********

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct TallyRules {
    pub num_candidates: usize,
    pub num_seats: usize,
    /// Percentage of the ballots at or above which a single entry makes the runoff unnecessary.
    pub runoff_threshold: f64,
}

impl TallyRules {
    pub const DEFAULT_THRESHOLD: f64 = 60.0;

    pub fn new(num_candidates: usize, num_seats: usize) -> TallyRules {
        TallyRules {
            num_candidates,
            num_seats,
            runoff_threshold: TallyRules::DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(self, runoff_threshold: f64) -> TallyRules {
        TallyRules {
            runoff_threshold,
            ..self
        }
    }

    pub(crate) fn check(&self) -> TallyResult<()> {
        if self.num_candidates == 0 {
            return InvalidSetupSnafu {
                message: "the number of candidates must be positive",
            }
            .fail();
        }
        if self.num_seats == 0 {
            return InvalidSetupSnafu {
                message: "the number of seats must be positive",
            }
            .fail();
        }
        if !(self.runoff_threshold > 0.0 && self.runoff_threshold <= 100.0) {
            return InvalidSetupSnafu {
                message: format!(
                    "the runoff threshold must be a percentage, got {}",
                    self.runoff_threshold
                ),
            }
            .fail();
        }
        Ok(())
    }
}
