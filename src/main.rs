use std::process::ExitCode;

use clap::Parser;

mod cli;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    cli::utils::init_logging(cli.verbose);

    match cli::run(cli) {
        Ok(report) => {
            println!("\n{}", report.summary());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("\nFatal error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
