use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "soil",
    about = "soil — relationship-indexed records over a realtime tree store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file. Defaults to ./soil.toml when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile, fingerprint and check the store permission rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Write the deployable rules artifact
    Compile(CompileArgs),
    /// Print the BLAKE3 digest of the artifact
    Digest,
    /// Evaluate one read or write against JSON snapshots
    Check(CheckArgs),
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the configuration as TOML
    Show,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Output file. Prints to stdout when omitted.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(long)]
    pub path: String,
    #[arg(long, value_enum)]
    pub op: Operation,
    /// Caller uid. Anonymous when omitted.
    #[arg(long)]
    pub auth: Option<String>,
    /// Tree before the operation, as a JSON file.
    #[arg(long)]
    pub before: PathBuf,
    /// Tree after the write. Defaults to `--before`.
    #[arg(long)]
    pub after: Option<PathBuf>,
}
