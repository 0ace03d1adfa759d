use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use vent_controls::{CycleTiming, PhaseTimingConfig, SafeguardKind};
use vent_core::timing::CENTISEC_PER_SECOND;
use vent_sim::{CycleRecord, Scenario, SimError, load_yaml, run_scenario_with_progress, save_yaml};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Control(#[from] vent_controls::ControlError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "vent-cli")]
#[command(about = "Ventilator pressure-control bench", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Run a scenario against the lung model
    Simulate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Override the number of breaths
        #[arg(long)]
        cycles: Option<u32>,
        /// Print one JSON object per breath instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the phase layout of a breath at a given rate
    Timing {
        /// Breaths per minute
        cycles_per_minute: u16,
        /// Share of inspiration spent ramping before the plateau (%)
        #[arg(long, default_value_t = PhaseTimingConfig::default().plateau_onset_percent)]
        plateau_onset: u8,
    },
    /// Write a scenario with default settings
    Init {
        /// Output YAML file
        output: PathBuf,
        /// Number of breaths
        #[arg(long, default_value_t = 10)]
        cycles: u32,
    },
}

fn main() -> CliResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Simulate {
            scenario_path,
            cycles,
            json,
        } => cmd_simulate(&scenario_path, cycles, json),
        Commands::Timing {
            cycles_per_minute,
            plateau_onset,
        } => cmd_timing(cycles_per_minute, plateau_onset),
        Commands::Init { output, cycles } => cmd_init(&output, cycles),
    }
}

fn cmd_validate(scenario_path: &Path) -> CliResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = load_yaml(scenario_path)?;
    let settings = &scenario.controller.settings;
    println!("✓ Scenario is valid");
    println!("  Name: {}", scenario.name);
    println!("  Breaths: {}", scenario.cycles);
    println!(
        "  Targets: {} cpm, PEEP >= {}, plateau <= {}, peak <= {} mmH2O",
        settings.cycles_per_minute,
        settings.min_peep,
        settings.max_plateau_pressure,
        settings.max_peak_pressure
    );
    println!("  Operator events: {}", scenario.events.len());
    Ok(())
}

fn cmd_simulate(scenario_path: &Path, cycles: Option<u32>, json: bool) -> CliResult<()> {
    let mut scenario = load_yaml(scenario_path)?;
    if let Some(cycles) = cycles {
        scenario.cycles = cycles;
        scenario.validate()?;
    }
    tracing::info!(scenario = %scenario.name, cycles = scenario.cycles, "simulating");

    if !json {
        println!("Simulating {} ({} breaths)", scenario.name, scenario.cycles);
        print_header();
    }

    let started = Instant::now();
    let mut json_error = None;
    let report = run_scenario_with_progress(
        &scenario,
        Some(&mut |record: &CycleRecord| {
            if json {
                match serde_json::to_string(record) {
                    Ok(line) => println!("{line}"),
                    Err(e) => {
                        json_error.get_or_insert(e);
                    }
                }
            } else {
                print_row(record);
            }
        }),
    )?;
    if let Some(e) = json_error {
        return Err(e.into());
    }

    if !json {
        print_summary(&scenario, &report.records);
        println!(
            "✓ {} ticks in {:.1} ms",
            report.ticks,
            started.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}

fn print_header() {
    println!(
        "{:>5} {:>4} {:>6} {:>6} {:>6} {:>6} {:>6}  {:>4} {:>4} {:>4} {:>4}",
        "cycle", "cpm", "peak", "plat", "peep", "min", "max", "pk", "pl", "hold", "mnt"
    );
}

fn print_row(r: &CycleRecord) {
    println!(
        "{:>5} {:>4} {:>6} {:>6} {:>6} {:>6} {:>6}  {:>4} {:>4} {:>4} {:>4}",
        r.cycle_nb,
        r.cycles_per_minute,
        r.peak_pressure,
        r.plateau_pressure,
        r.peep,
        r.min_sample,
        r.max_sample,
        r.activations.peak_pressure,
        r.activations.plateau_pressure,
        r.activations.peep_hold,
        r.activations.peep_maintain
    );
}

fn print_summary(scenario: &Scenario, records: &[CycleRecord]) {
    println!();
    println!("Safeguard activations:");
    for kind in SafeguardKind::ALL {
        let total: u32 = records.iter().map(|r| r.activations.get(kind)).sum();
        println!("  {:<18} {}", kind.to_string(), total);
    }
    let peep_floor = scenario.controller.settings.min_peep;
    let under = records
        .iter()
        .filter(|r| i32::from(r.peep) < i32::from(peep_floor))
        .count();
    println!("  Breaths ending below PEEP target: {under}");
}

fn cmd_timing(cycles_per_minute: u16, plateau_onset: u8) -> CliResult<()> {
    let timing = CycleTiming::new(cycles_per_minute, plateau_onset)?;
    let secs = |cs: u16| f64::from(cs) / f64::from(CENTISEC_PER_SECOND);
    println!("{} breaths per minute:", timing.cycles_per_minute);
    println!(
        "  Breath:      {:>4} cs ({:.2} s)",
        timing.centi_sec_per_cycle,
        secs(timing.centi_sec_per_cycle)
    );
    println!(
        "  Inhalation:  {:>4} cs (0..{})",
        timing.plateau_onset, timing.plateau_onset
    );
    println!(
        "  Plateau:     {:>4} cs ({}..{})",
        timing.centi_sec_per_inhalation - timing.plateau_onset,
        timing.plateau_onset,
        timing.centi_sec_per_inhalation
    );
    println!(
        "  Exhalation:  {:>4} cs ({}..{})",
        timing.centi_sec_per_exhalation(),
        timing.centi_sec_per_inhalation,
        timing.centi_sec_per_cycle
    );
    Ok(())
}

fn cmd_init(output: &Path, cycles: u32) -> CliResult<()> {
    let name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scenario");
    let scenario = Scenario::new(name, cycles);
    save_yaml(output, &scenario)?;
    println!("✓ Wrote {}", output.display());
    Ok(())
}
