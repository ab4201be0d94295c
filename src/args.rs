use clap::Parser;

/// Cross-checks redundant CSV exports of the same ballots and tabulates the
/// first round and, when needed, the runoff.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the election: ballot files, number of
    /// candidates and of seats. See the manual of the runoff_tally crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the outcome of an election in JSON format. If provided,
    /// irvcount will check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON
    /// format to the given location. Setting this option overrides the output directory that may be
    /// specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, repeatable) A CSV export of the ballots. The last one is the reference export.
    /// Setting this option overrides the ballot files that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Vec<String>,

    /// The number of candidates on the ballots. Required without --config.
    #[clap(long, value_parser)]
    pub candidates: Option<usize>,

    /// The number of seats to fill. Required without --config.
    #[clap(long, value_parser)]
    pub seats: Option<usize>,

    /// (default 60) The percentage of the ballots that makes a runoff unnecessary when reached by
    /// a single entry of the first round.
    #[clap(long, value_parser)]
    pub threshold: Option<f64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
