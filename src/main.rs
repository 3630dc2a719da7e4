use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use content_copy::cli::{Cli, Command};

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let report = content_copy::migrate::run(args).context("run")?;
            if report.aborted {
                tracing::warn!(book = %report.book_title, "run stopped early");
            }
        }
        Command::Summary(args) => content_copy::migrate::summary(args).context("summary")?,
    }
    Ok(())
}
