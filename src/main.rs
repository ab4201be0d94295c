use clap::Parser;
use log::{info, LevelFilter};
use snafu::ErrorCompat;

mod args;
mod rcv;

use crate::args::Args;
use crate::rcv::Overrides;

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    info!("args {:?}", args);

    let overrides = Overrides {
        inputs: args.input.clone(),
        num_candidates: args.candidates,
        num_seats: args.seats,
        threshold: args.threshold,
    };

    let res = rcv::run_election(
        args.config.clone(),
        &overrides,
        args.out.clone(),
        args.reference.clone(),
    );

    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("{}", bt);
        }
        std::process::exit(1);
    }
}
