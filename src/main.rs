use clap::Parser;
use color_eyre::eyre::{Report, Result};
use treebuilder::{cli, cli::Cli, run, server};

#[tokio::main]
async fn main() -> Result<(), Report> {
    // ------------------------------------------------------------------------
    // CLI Setup

    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    // check which CLI command we're running (serve, run)
    match args.command {
        cli::Command::Serve(args) => server::serve(&args).await?,
        cli::Command::Run(args) => _ = run::run(&args)?,
    }

    Ok(())
}
