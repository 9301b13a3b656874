use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scrollmotion", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scripted scenario and print the emitted events.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Input scenario JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Pretty-print each event instead of one JSON object per line.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn read_scenario(path: &Path) -> anyhow::Result<scrollmotion::scenario::Scenario> {
    let f = File::open(path).with_context(|| format!("open scenario '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scenario = serde_json::from_reader(r).with_context(|| "parse scenario JSON")?;
    Ok(scenario)
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let scenario = read_scenario(&args.in_path)?;
    let events = scrollmotion::scenario::replay(&scenario).with_context(|| "replay scenario")?;

    for event in &events {
        let line = if args.pretty {
            serde_json::to_string_pretty(event)?
        } else {
            serde_json::to_string(event)?
        };
        println!("{line}");
    }
    eprintln!("{} events", events.len());
    Ok(())
}
