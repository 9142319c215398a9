//! `specsim` — the command-line driver for the transient-execution simulator.
//!
//! Assembles a program, builds a [`Simulator`] over it, and drives it to
//! completion with `Simulator::tick` (spec §6 "CPU driver contract"). This is
//! the minimum ambient surface needed to exercise the core end-to-end — a
//! `run` subcommand and an optional per-tick trace — not a debugger shell
//! (spec §1 explicitly scopes the TUI debugger out as a separate, unbuilt
//! collaborator).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use specsim_core::common::FaultKind;
use specsim_core::{Config, Simulator};

/// Hand-written assembler for the instruction set of spec §6.
pub mod parser;
/// Snapshot/undo history built on `Simulator::snapshot`/`restore`.
pub mod history;

/// Everything that can send `specsim` to exit non-zero, collected into one
/// `thiserror` enum so `main` has a single `Display` to print.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("reading {path}: {source}")]
    ReadFile { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, #[source] source: parser::ParseError },
    #[error("parsing {path}: {source}")]
    Config { path: PathBuf, #[source] source: toml::de::Error },
    #[error(transparent)]
    Core(#[from] specsim_core::common::CoreError),
}

fn read_to_string(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadFile { path: path.to_owned(), source })
}

fn assemble(path: &Path) -> Result<Vec<specsim_core::isa::Instruction>, CliError> {
    let src = read_to_string(path)?;
    parser::parse(&src).map_err(|source| CliError::Parse { path: path.to_owned(), source })
}

fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    let Some(path) = path else { return Ok(Config::default()) };
    let text = read_to_string(path)?;
    toml::from_str(&text).map_err(|source| CliError::Config { path: path.to_owned(), source })
}

/// Resolves every configured `Microprograms.<kind>` filename (spec §6) to its
/// decoded instructions. Filenames are relative to the config file's
/// directory if one was given, otherwise to the current directory.
fn load_microprograms(
    config: &Config,
    config_dir: &Path,
) -> Result<HashMap<FaultKind, Vec<specsim_core::isa::Instruction>>, CliError> {
    let mut out = HashMap::new();
    for kind in [FaultKind::Load, FaultKind::Store, FaultKind::Branch] {
        if let Some(filename) = config.microprogram.filename_for(kind) {
            let instrs = assemble(&config_dir.join(filename))?;
            out.insert(kind, instrs);
        }
    }
    Ok(out)
}

#[derive(Parser, Debug)]
#[command(
    name = "specsim",
    author,
    version,
    about = "Cycle-accurate simulator of a speculative out-of-order processor",
    long_about = "Assembles and runs a program against the out-of-order execution engine, \
front end, branch predictor, and tagged-cache memory subsystem described in the project spec.\n\n\
Examples:\n  specsim run program.asm\n  specsim run program.asm --config cache.toml --trace"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Assemble and run a program to completion (or a tick budget).
    Run {
        /// Path to the assembly source file.
        program: PathBuf,
        /// Optional TOML configuration file (spec §6 "Configuration keys").
        /// Microprogram filenames are resolved relative to this file's
        /// directory, or the current directory if no config is given.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Maximum number of ticks to run before giving up on termination.
        #[arg(long, default_value_t = 1_000_000)]
        max_ticks: u64,
        /// Print a one-line summary of every tick (cycle, pc, fault) to stdout.
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { program, config, max_ticks, trace } => cmd_run(&program, config.as_deref(), max_ticks, trace),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(program_path: &Path, config_path: Option<&Path>, max_ticks: u64, trace: bool) -> Result<(), CliError> {
    let instrs = assemble(program_path)?;
    let config = load_config(config_path)?;
    let config_dir = config_path.and_then(Path::parent).unwrap_or_else(|| Path::new("."));
    let microprograms = load_microprograms(&config, config_dir)?;

    let mut sim = Simulator::new(instrs, &config, microprograms)?;

    println!("assembled {}", program_path.display());
    println!(
        "config: slots={} queue={} cache={}x{}x{}B bpu={}",
        config.reservation_station.slots,
        config.frontend.max_queue_length,
        config.cache.sets,
        config.cache.ways,
        config.cache.line_size,
        if config.bpu.advanced { "indexed" } else { "simple" },
    );
    println!();

    let mut faults = Vec::new();
    let mut elapsed = 0u64;
    while !sim.is_finished() && elapsed < max_ticks {
        let fault = sim.tick();
        if trace {
            match fault {
                Some(trap) => println!("cycle {:>6}  pc={}  FAULT {:?} {:?}", sim.cycle_counter(), trap.pc, trap.kind, trap.address),
                None => println!("cycle {:>6}  pc={}", sim.cycle_counter(), sim.pc()),
            }
        }
        if let Some(trap) = fault {
            faults.push(trap);
        }
        elapsed += 1;
    }

    println!();
    if sim.is_finished() {
        println!("finished after {} cycles, {} fault(s)", sim.cycle_counter(), faults.len());
    } else {
        println!("stopped after {max_ticks} ticks without finishing ({} fault(s) observed)", faults.len());
    }
    println!("{}", sim.registers().dump());

    Ok(())
}
