pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use kindred_core::config::StrategyKind;

#[derive(Debug, Parser)]
#[command(
    name = "kindred",
    about = "Kindred similar-products engine CLI",
    long_about = "Recompute, inspect, and serve precomputed product similarity edges for a catalog.",
    after_help = "Examples:\n  kindred recompute --catalog catalog.json\n  kindred step --catalog catalog.json --batch 0\n  kindred similar --catalog catalog.json --product 42\n  kindred config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Truncate the edge store and recompute similarity for the whole catalog")]
    Recompute {
        #[arg(long, help = "Path to a JSON catalog snapshot")]
        catalog: PathBuf,
        #[arg(long, value_parser = parse_strategy, help = "Selection strategy (tiered|pairwise)")]
        strategy: Option<StrategyKind>,
    },
    #[command(about = "Process one batch of a resumable recompute run (batch 0 restarts)")]
    Step {
        #[arg(long, help = "Path to a JSON catalog snapshot")]
        catalog: PathBuf,
        #[arg(long, help = "Zero-based batch number; 0 truncates and restarts the run")]
        batch: u64,
        #[arg(long, value_parser = parse_strategy, help = "Selection strategy (tiered|pairwise)")]
        strategy: Option<StrategyKind>,
    },
    #[command(about = "Recompute the stored edges of a single product")]
    Update {
        #[arg(long, help = "Path to a JSON catalog snapshot")]
        catalog: PathBuf,
        #[arg(long, help = "Product id to recompute")]
        product: u64,
        #[arg(long, value_parser = parse_strategy, help = "Selection strategy (tiered|pairwise)")]
        strategy: Option<StrategyKind>,
    },
    #[command(about = "Read the stored similar products for one product")]
    Similar {
        #[arg(long, help = "Path to a JSON catalog snapshot")]
        catalog: PathBuf,
        #[arg(long, help = "Product id to look up")]
        product: u64,
        #[arg(long, help = "Maximum results (defaults to engine.max_similar)")]
        limit: Option<usize>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
}

fn parse_strategy(value: &str) -> Result<StrategyKind, kindred_core::config::ConfigError> {
    value.parse()
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Recompute { catalog, strategy } => commands::recompute::run(&catalog, strategy),
        Command::Step { catalog, batch, strategy } => {
            commands::step::run(&catalog, batch, strategy)
        }
        Command::Update { catalog, product, strategy } => {
            commands::update::run(&catalog, product, strategy)
        }
        Command::Similar { catalog, product, limit } => {
            commands::similar::run(&catalog, product, limit)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
