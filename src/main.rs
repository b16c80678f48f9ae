use soos_ci::cli::{handle_run, CliArgs};
use soos_ci::util::logging::{init_logging, LoggingConfig};
use soos_ci::VERSION;

use clap::Parser;
use std::env;
use tracing::debug;

fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            // Usage errors exit 1 like every other failure
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };
    init_logging_from_args(&args);

    debug!("soos-ci v{} starting", VERSION);

    std::process::exit(handle_run(&args));
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_lookup(|k| env::var(k).ok());
    if let Some(level) = args.log_level_override() {
        config.level = level;
    }
    init_logging(config);
}
