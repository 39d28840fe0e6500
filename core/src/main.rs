use std::process::ExitCode;

use log::error;

use oneclickrunner::app;
use oneclickrunner::config::LauncherConfig;
use oneclickrunner::logging;

fn main() -> ExitCode {
    let config = match LauncherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[OneClickRunner] {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_path());

    // The raw command line is the arguments rejoined with single spaces.
    let command_line = raw_command_line(std::env::args().skip(1));

    match app::run(config, command_line) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("[OneClickRunner] Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn raw_command_line(args: impl Iterator<Item = String>) -> Option<String> {
    let line = args.collect::<Vec<_>>().join(" ");
    (!line.trim().is_empty()).then_some(line)
}
