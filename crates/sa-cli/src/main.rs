use std::process::ExitCode;

use clap::Parser;

mod args;
mod commands;
mod logging;

use args::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing();

    let outcome = match &cli.command {
        Command::Run(args) => commands::run(args),
        Command::Generate(args) => commands::generate(args).map(|()| true),
        Command::WriteImage(args) => commands::write_image(args).map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
