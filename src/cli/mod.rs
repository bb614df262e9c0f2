//! [Command-line interface](Cli) (CLI) of the main binary.

use crate::{run, server, Verbosity};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
/// ---
/// The CLI is intended for parsing user input from the command-line in the main function. This is achieved with the `parse` function, which parses the command line arguments from [`std::env::args`](https://doc.rust-lang.org/std/env/fn.args.html).
/// ```no_run
/// use clap::Parser;
/// let args = treebuilder::Cli::parse();
/// ```
/// The command-line arguments from `std::env::args` are simply a vector of space separated strings. Here is a manual example of setting the command-line input:
/// ```rust
/// use clap::Parser;
/// use treebuilder::{cli::Command, Cli};
/// let input = ["treebuilder", "run", "--input", "seqs.fasta", "--output-dir", "output", "--method", "upgma"];
/// let args = Cli::parse_from(input);
/// assert!(matches!(args.command, Command::Run(_)));
/// serde_json::to_string_pretty(&args)?;
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "treebuilder", author, version)]
#[clap(about = "treebuilder aligns sequences and builds phylogenetic trees from FASTA files.")]
pub struct Cli {
    #[clap(subcommand)]
    /// Pass CLI arguments to a particular [Command].
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,
}

/// CLI [commands](#variants). Used to decide which runtime [Command](#variants) the CLI arguments should be passed to.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// Pass CLI arguments to the web [server](crate::server::serve).
    ///
    /// ```rust
    /// use clap::Parser;
    /// use treebuilder::{cli::Command, Cli};
    /// let args = Cli::parse_from(["treebuilder", "serve", "--address", "0.0.0.0:8080"]);
    /// let Command::Serve(args) = args.command else { panic!("expected serve") };
    /// assert_eq!(args.address.port(), 8080);
    /// ```
    #[clap(about = "Serve the web interface.")]
    Serve(server::Args),

    /// Pass CLI arguments to the [run](crate::run::run) method.
    #[clap(about = "Build a tree from a FASTA file and write the outputs to a directory.")]
    Run(run::Args),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_is_global() {
        let args = Cli::parse_from(["treebuilder", "serve", "--verbosity", "debug"]);
        assert_eq!(args.verbosity, Verbosity::Debug);
        assert_eq!(args.verbosity.to_string(), "debug");
    }

    #[test]
    fn run_requires_input_and_output() {
        assert!(Cli::try_parse_from(["treebuilder", "run", "--input", "seqs.fasta"]).is_err());
        assert!(Cli::try_parse_from(["treebuilder", "run", "-i", "seqs.fasta", "-o", "out"]).is_ok());
    }
}
