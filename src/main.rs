use std::process::ExitCode;

use clap::Parser;
use mdipaint::cli::{self, CliArgs};
use mdipaint::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(args.verbose);
    cli::run(args)
}
