//! `quap-import`: imports questionnaire content into the local store.
//!
//! # Responsibility
//! - Load configuration, start file logging and run one import.
//! - Map the run outcome to the process exit status.
//!
//! Exit status: `0` on completion, `1` when the import document is absent,
//! `2` on any other failure.

use quap_core::{
    flush_logging, init_logging, run_import, ImportConfig, SystemClock,
};
use std::process::ExitCode;

const EXIT_SOURCE_ABSENT: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let config = match ImportConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // Logging is diagnostics only; the import runs without it.
    match std::env::current_dir() {
        Ok(cwd) => {
            if let Err(err) = init_logging(config.log_level, &config.log_dir_in(&cwd)) {
                eprintln!("logging disabled: {err}");
            }
        }
        Err(err) => eprintln!("logging disabled: cannot resolve working directory: {err}"),
    }

    println!("Starting import of questionnaires...");
    let status = match run_import(&config, SystemClock) {
        Ok(summary) => {
            println!("{summary}");
            println!("Questionnaire import process has finished.");
            ExitCode::SUCCESS
        }
        Err(err) if err.is_source_absent() => {
            println!(
                "No data to import. File at {} not found.",
                config.import_path.display()
            );
            ExitCode::from(EXIT_SOURCE_ABSENT)
        }
        Err(err) => {
            log::error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("questionnaire import failed: {err}");
            ExitCode::from(EXIT_FAILURE)
        }
    };

    flush_logging();
    status
}
