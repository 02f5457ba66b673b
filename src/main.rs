mod cli;
mod report;

use std::process::ExitCode;

use clap::Parser;
use outfitter::loader::{self, LoadOutcome};
use outfitter::{Context, DataSnapshot, Error, FormIndex, Options, resolve_with};

use cli::{Cli, Command, FilesArgs, ResolveArgs};

/// Exit code for invalid arguments or missing input; clap uses the same.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Resolve(args) => run_resolve(args),
        Command::Files(args) => run_files(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            match err {
                Error::Io { .. } | Error::Snapshot(_) => ExitCode::from(EXIT_USAGE),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run_resolve(args: ResolveArgs) -> outfitter::Result<()> {
    let snapshot = loader::load_snapshot(&args.snapshot)?;
    let forms = FormIndex::from_records(snapshot.forms);
    let outcome = load(&args.data, &forms)?;

    let options = Options { batch_size: args.batch_size, ..Options::default() };
    let report = resolve_with(&outcome.files, &snapshot.npcs, &Context::new(&forms), &options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| Error::Invariant(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    let view = report::View { npc: args.npc.as_deref(), conflicts_only: args.conflicts_only, color: args.color.enabled() };
    report::print_report(&report, &forms, &view);
    Ok(())
}

fn run_files(args: FilesArgs) -> outfitter::Result<()> {
    let snapshot = match &args.snapshot {
        Some(path) => loader::load_snapshot(path)?,
        None => DataSnapshot::default(),
    };
    let forms = FormIndex::from_records(snapshot.forms);
    let outcome = load(&args.data, &forms)?;

    let failures: Vec<(String, String)> =
        outcome.failures.iter().map(|f| (f.path.display().to_string(), f.error.to_string())).collect();
    report::print_files(&outcome.files, &failures, args.color.enabled());
    Ok(())
}

fn load(data: &std::path::Path, forms: &FormIndex) -> outfitter::Result<LoadOutcome> {
    let sources = loader::discover(data)?;
    Ok(loader::load_files(&sources, forms))
}
