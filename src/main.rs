//! Dambreak command-line runner
//!
//! Loads a state file, runs the simulation for a number of ticks and renders
//! every tick that moved fluid to stdout. Sending SIGINT writes the current
//! state to `--save-file` and keeps running.

use anyhow::{Context, Result};
use clap::Parser;
use dambreak::constants::run;
use dambreak::{create_simulation, FluidSimulation, OutputTarget, SimulationConfig, SimulationTypes};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// 2D cellular dam-break fluid simulator
#[derive(Parser)]
#[command(name = "dambreak")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "2D cellular dam-break fluid simulator", long_about = None)]
struct Cli {
    /// State file to start from
    #[arg(long)]
    input_file: PathBuf,

    /// Where SIGINT writes the current state
    #[arg(long)]
    save_file: Option<PathBuf>,

    /// Pressure representation: FLOAT, DOUBLE, FIXED(N,K) or FAST_FIXED(N,K)
    #[arg(long, default_value = "FLOAT")]
    p_type: String,

    /// Velocity representation
    #[arg(long, default_value = "FLOAT")]
    v_type: String,

    /// Velocity flow representation
    #[arg(long, default_value = "FLOAT")]
    v_flow_type: String,

    /// Compute pool size (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value_t = run::DEFAULT_TICKS)]
    ticks: u64,

    /// Seed for the advection random stream
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with run settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not render frames
    #[arg(long)]
    quiet: bool,
}

static SAVE_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_save(_signal: libc::c_int) {
    SAVE_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_save_handler() {
    let handler = request_save as extern "C" fn(libc::c_int);
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        log::warn!("[Main] Could not install SIGINT handler; interrupt will not save");
    }
}

fn save_state(sim: &mut dyn FluidSimulation, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    sim.save(&mut writer)
        .with_context(|| format!("Failed to save state to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    log::info!(
        "[Main] Saved state at UT {} to {}",
        sim.tick_counter(),
        path.display()
    );
    Ok(())
}

fn build_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_toml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.quiet {
        config.output = OutputTarget::Discard;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let types = SimulationTypes::parse(&cli.p_type, &cli.v_type, &cli.v_flow_type)?;

    let file = File::open(&cli.input_file)
        .with_context(|| format!("Failed to open {}", cli.input_file.display()))?;
    let mut sim = create_simulation(&types, &config, &mut BufReader::new(file))
        .with_context(|| format!("Failed to load {}", cli.input_file.display()))?;

    if cli.save_file.is_some() {
        install_save_handler();
    }

    let (rows, cols) = sim.dimensions();
    log::info!(
        "[Main] Running {} ticks on {}x{} grid ({})",
        cli.ticks,
        rows,
        cols,
        types
    );

    let start = Instant::now();
    let mut moved_ticks = 0u64;
    for tick in 0..cli.ticks {
        if SAVE_REQUESTED.swap(false, Ordering::SeqCst) {
            if let Some(path) = &cli.save_file {
                save_state(sim.as_mut(), path)?;
            }
        }

        let report = sim.advance(tick)?;
        if report.moved {
            moved_ticks += 1;
        }
    }
    sim.flush_output()?;

    log::info!(
        "[Main] Finished {} ticks ({} with movement) in {:.2?}, UT {}",
        cli.ticks,
        moved_ticks,
        start.elapsed(),
        sim.tick_counter()
    );
    Ok(())
}
