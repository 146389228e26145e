//! `agent` CLI entry point.

use clap::Parser;
use tracing::{error, info};

use agent_harness::cli::{parse_run_request, Cli, Command};
use agent_harness::io::run_id::generate_run_id;
use agent_harness::{driver, exit_codes, logging};

fn main() {
    // clap exits with code 2 on unknown commands/flags and bad values.
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;

    logging::init(args.verbose);

    // Bootstrap id tags log lines until the run manager assigns the real id.
    let bootstrap_run_id = generate_run_id();
    info!(run_id = %bootstrap_run_id, "agent interface bootstrapping");

    let request = match parse_run_request(args) {
        Ok(request) => request,
        Err(err) => {
            error!(run_id = %bootstrap_run_id, code = %err.code, "Input error: {}", err.message);
            if let Some(hint) = &err.hint {
                info!("Hint: {hint}");
            }
            std::process::exit(exit_codes::INPUT_ERROR);
        }
    };

    std::process::exit(driver::run(&request));
}
