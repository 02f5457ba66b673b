//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

/// Preview which outfits and keywords SPID and SkyPatcher rules give each NPC.
#[derive(Parser, Debug)]
#[command(name = "outfitter")]
#[command(version, about, long_about = None)]
#[command(after_help = "Exit codes:\n  0  Success.\n  1  Internal error.\n  2  Invalid arguments or missing input.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every NPC in a snapshot against the discovered rule files.
    Resolve(ResolveArgs),

    /// List discovered rule files with per-file statistics.
    Files(FilesArgs),
}

/// Arguments for the resolve command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Data directory to scan for `*_DISTR.ini` and `SkyPatcher/npc` files.
    #[arg(long)]
    pub data: PathBuf,

    /// JSON snapshot of loaded records and NPC attributes.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Print the full report as JSON instead of the terminal view.
    #[arg(long)]
    pub json: bool,

    /// Only show NPCs whose editor id or form key matches.
    #[arg(long)]
    pub npc: Option<String>,

    /// Only show NPCs with competing distributions.
    #[arg(long)]
    pub conflicts_only: bool,

    /// NPCs resolved between cancellation checks.
    #[arg(long, default_value_t = 512)]
    pub batch_size: usize,

    #[command(flatten)]
    pub color: ColorArgs,
}

/// Arguments for the files command.
#[derive(Args, Debug)]
pub struct FilesArgs {
    /// Data directory to scan.
    #[arg(long)]
    pub data: PathBuf,

    /// Optional snapshot used to resolve editor ids while parsing.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    #[command(flatten)]
    pub color: ColorArgs,
}

#[derive(Args, Debug)]
pub struct ColorArgs {
    /// Force ANSI color output.
    #[arg(long, overrides_with = "no_color")]
    pub color: bool,

    /// Disable ANSI color output.
    #[arg(long)]
    pub no_color: bool,
}

impl ColorArgs {
    pub fn enabled(&self) -> bool {
        if self.no_color {
            false
        } else {
            self.color || io::stdout().is_terminal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn resolve_flags() {
        let cli = Cli::try_parse_from([
            "outfitter",
            "resolve",
            "--data",
            "Data",
            "--snapshot",
            "snap.json",
            "--conflicts-only",
            "--no-color",
        ])
        .unwrap();

        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.data, PathBuf::from("Data"));
        assert!(args.conflicts_only);
        assert_eq!(args.batch_size, 512);
        assert!(!args.color.enabled());
    }

    #[test]
    fn snapshot_is_required_for_resolve() {
        assert!(Cli::try_parse_from(["outfitter", "resolve", "--data", "Data"]).is_err());
        assert!(Cli::try_parse_from(["outfitter", "files", "--data", "Data"]).is_ok());
    }
}
