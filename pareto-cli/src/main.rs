//! Pareto: sprint gateway client and live sprint viewer.
//!
//! # Usage
//!
//! ```text
//! pareto sprints <mentee> [--json]
//! pareto keys <mentee> | --from-file <path> [--query-only]
//! pareto live <mentee> [--json]
//! pareto create --athlete <id> [--coach <id>] --template <title> [--player <id>]... --start <YYYY-MM-DD> [--dry-run]
//! pareto config show|path|init [--force]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, create::CreateArgs, keys::KeysArgs, live::LiveArgs,
    sprints::SprintsArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pareto",
    version,
    about = "Browse, create and follow sprints on the Pareto gateway",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the sprints a mentee takes part in.
    Sprints(SprintsArgs),

    /// Print the live channel address for a set of sprints.
    Keys(KeysArgs),

    /// Follow a mentee's sprints as updates are pushed.
    Live(LiveArgs),

    /// Build a sprint from a template and submit it.
    Create(CreateArgs),

    /// Inspect or scaffold ~/.pareto/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pareto_live::init_tracing(cli.verbose, cli.log_json);
    match cli.command {
        Commands::Sprints(args) => args.run(),
        Commands::Keys(args) => args.run(),
        Commands::Live(args) => args.run(),
        Commands::Create(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
