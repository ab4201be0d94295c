use log::{debug, info, warn};

use runoff_tally::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;

use crate::rcv::config_reader::*;

#[derive(Debug, Snafu)]
pub enum RcvError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("{source}"))]
    Tally { source: TallyError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RcvResult<T> = Result<T, RcvError>;

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub inputs: Vec<String>,
    pub num_candidates: Option<usize>,
    pub num_seats: Option<usize>,
    pub threshold: Option<f64>,
}

fn tally_to_json(votes: &[(String, u64)]) -> JSMap<String, JSValue> {
    let mut tally: JSMap<String, JSValue> = JSMap::new();
    for (name, count) in votes.iter() {
        tally.insert(name.clone(), json!(count));
    }
    tally
}

fn result_stats_to_json(
    first: &RoundResult,
    second: Option<&SecondRoundResult>,
) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = vec![json!({
        "round": 1,
        "ballotCount": first.ballot_count,
        "tally": tally_to_json(&first.votes),
    })];
    if let Some(rs) = second {
        l.push(json!({
            "round": 2,
            "ballotCount": rs.ballot_count,
            "eliminated": rs.eliminated,
            "tally": tally_to_json(&rs.votes),
        }));
    }
    l
}

fn build_summary_js(config: &TallyConfig, manager: &TallyManager) -> RcvResult<JSValue> {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_jurisdiction.clone(),
        office: config.output_settings.contest_office.clone(),
        threshold: Some(manager.rules().runoff_threshold.to_string()),
    };
    let first = manager.first_round_results().context(TallySnafu {})?;
    let runoff_needed = manager.runoff_needed().context(TallySnafu {})?;
    let second = manager.second_round_results().context(TallySnafu {})?;
    Ok(json!({
        "config": c,
        "runoffNeeded": runoff_needed,
        "results": result_stats_to_json(first, second),
    }))
}

/// The configuration and the paths of the ballot files, once the command-line
/// overrides are applied.
fn resolve_config(
    config_path: Option<String>,
    overrides: &Overrides,
) -> RcvResult<(TallyConfig, Vec<String>)> {
    let (mut config, mut paths) = match config_path {
        Some(config_path) => {
            let config = read_config(config_path.as_str())?;
            let root_p = Path::new(config_path.as_str())
                .parent()
                .context(MissingParentDirSnafu {})?;
            let paths: Vec<String> = config
                .ballot_files
                .iter()
                .map(|bf| {
                    let p: PathBuf = root_p.join(&bf.file_path);
                    p.as_path().display().to_string()
                })
                .collect();
            (config, paths)
        }
        None => {
            let (num_candidates, num_seats) = match (overrides.num_candidates, overrides.num_seats)
            {
                (Some(c), Some(s)) => (c, s),
                _ => whatever!(
                    "Without a configuration file, the number of candidates and of seats must be given"
                ),
            };
            let config = TallyConfig {
                output_settings: OutputSettings::unnamed(),
                ballot_files: Vec::new(),
                rules: RulesConfig {
                    num_candidates,
                    num_seats,
                    runoff_threshold: None,
                },
            };
            (config, Vec::new())
        }
    };

    if !overrides.inputs.is_empty() {
        config.ballot_files = overrides
            .inputs
            .iter()
            .map(|p| BallotFileSource {
                file_path: p.clone(),
            })
            .collect();
        paths = overrides.inputs.clone();
    }
    if let Some(c) = overrides.num_candidates {
        config.rules.num_candidates = c;
    }
    if let Some(s) = overrides.num_seats {
        config.rules.num_seats = s;
    }
    if overrides.threshold.is_some() {
        config.rules.runoff_threshold = overrides.threshold;
    }
    if paths.is_empty() {
        whatever!("No ballot file to count");
    }
    Ok((config, paths))
}

/// Cross-checks the ballot files and counts them, returning the JSON summary.
pub fn tabulate(config: &TallyConfig, paths: &[String]) -> RcvResult<JSValue> {
    info!("Ballot files: {:?}", paths);
    let manager =
        TallyManager::from_paths(paths, config.rules.tally_rules()).context(TallySnafu {})?;
    let differences = manager.differences().context(TallySnafu {})?;
    debug!("{} files differ from the reference", differences.len());
    build_summary_js(config, &manager)
}

fn write_summary(
    pretty_js_stats: &str,
    out_path: Option<String>,
    config: &TallyConfig,
) -> RcvResult<()> {
    let target: Option<String> = match out_path {
        Some(p) if p == "stdout" => None,
        Some(p) => Some(p),
        None => config
            .output_settings
            .output_directory
            .as_ref()
            .map(|dir| {
                let p: PathBuf = [dir.as_str(), "summary.json"].iter().collect();
                p.as_path().display().to_string()
            }),
    };
    match target {
        None => {
            println!("{}", pretty_js_stats);
        }
        Some(path) => {
            info!("Writing summary to {}", path);
            fs::write(path.as_str(), pretty_js_stats).context(WritingSummarySnafu { path })?;
        }
    }
    Ok(())
}

pub fn run_election(
    config_path: Option<String>,
    overrides: &Overrides,
    out_path: Option<String>,
    check_summary_path: Option<String>,
) -> RcvResult<()> {
    let (config, paths) = resolve_config(config_path, overrides)?;
    info!("config: {:?}", config);

    let result_js = tabulate(&config, &paths)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_summary(&pretty_js_stats, out_path, &config)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p.as_str())?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_str(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
