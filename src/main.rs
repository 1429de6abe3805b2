mod args;
mod charts;

use clap::Parser;
use log::warn;
use snafu::ErrorCompat;

use crate::args::Args;
use crate::charts::run_charts;

fn main() {
    let args = Args::parse();
    let mut log_builder = env_logger::Builder::from_default_env();
    if args.verbose {
        log_builder.filter_level(log::LevelFilter::Debug);
    }
    log_builder.init();

    if let Err(e) = run_charts(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
