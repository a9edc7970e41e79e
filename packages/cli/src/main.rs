mod commands;
mod script;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{addresses, replay, AddressesArgs, ReplayArgs};
use tracing_subscriber::EnvFilter;

/// Marrow CLI - drive the editing engine from the command line
#[derive(Parser, Debug)]
#[command(name = "marrow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log engine diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an edit script against a document
    Replay(ReplayArgs),

    /// Print the address of every node in a document
    Addresses(AddressesArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Replay(args) => replay(args),
        Command::Addresses(args) => addresses(args),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
