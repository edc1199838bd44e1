use std::path::PathBuf;

use anyhow::{Context, Result};
use burrow::simulation::{Caste, NoProgression};
use burrow::{EventSink, Simulation, SimulationConfig, Snapshot};
use clap::Parser;
use shared::SimEvent;
use tracing::{debug, info};

/// Command-line arguments for the headless runner.
#[derive(Parser)]
#[command(name = "burrow", version, about = "Headless ant colony simulation")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of fixed steps to run.
    #[arg(short, long, default_value_t = 6000)]
    ticks: u64,

    /// Overrides the seed from the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds per step.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Writes a snapshot here when the run ends (`.json` or binary).
    #[arg(long)]
    save: Option<PathBuf>,

    /// Starts from a saved snapshot instead of a generated world.
    #[arg(long)]
    restore: Option<PathBuf>,
}

/// Forwards simulation events to the log.
struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: SimEvent) {
        match &event {
            SimEvent::AntBorn { .. }
            | SimEvent::AntDied { .. }
            | SimEvent::FoodCollected { .. } => debug!(?event, "event"),
            _ => info!(?event, "event"),
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            info!("no config file provided, using defaults");
            SimulationConfig::default()
        }
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn log_day_summary(sim: &Simulation) {
    for colony in sim.colonies().iter().filter(|c| c.alive) {
        info!(
            day = sim.calendar().day,
            colony = colony.id,
            population = colony.population(),
            workers = colony.count(Caste::Worker),
            soldiers = colony.count(Caste::Soldier),
            brood = colony.count(Caste::Egg) + colony.count(Caste::Larva),
            food_stock = colony.food_stock,
            delivered = colony.food_delivered,
            "colony summary"
        );
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut sim = match &cli.restore {
        Some(path) => {
            let snapshot = Snapshot::load(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let mut sim = Simulation::restore(snapshot).context("restoring snapshot")?;
            sim.set_event_sink(Box::new(LogSink));
            sim
        }
        None => {
            let config = load_config(&cli)?;
            Simulation::new(&config, Box::new(LogSink), Box::new(NoProgression))
        }
    };

    info!(ticks = cli.ticks, dt = cli.dt, "starting run");
    let mut day = sim.calendar().day;
    for _ in 0..cli.ticks {
        sim.tick(cli.dt);
        if sim.calendar().day != day {
            day = sim.calendar().day;
            log_day_summary(&sim);
        }
    }
    log_day_summary(&sim);
    info!(
        ticks = sim.tick_count(),
        elapsed = sim.elapsed(),
        ants = sim.ant_count(),
        "run finished"
    );

    if let Some(path) = &cli.save {
        sim.snapshot()
            .save(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }
    Ok(())
}
