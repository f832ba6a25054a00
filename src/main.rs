use std::process::ExitCode;

use clap::Parser;

use grimage::cli::{self, CliArgs};
use grimage::logger;
use grimage::settings::EditorSettings;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = EditorSettings::load();
    let args = CliArgs::parse();
    let code = cli::run(args, &settings);
    grimage::log_info!("Exiting with {:?}", code);
    code
}
