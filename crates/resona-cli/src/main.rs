//! Resona command-line interface.
//!
//! Run harmonic cascade jobs from TOML configuration files:
//! ```sh
//! resona run job.toml
//! resona validate job.toml
//! resona materials
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use resona_materials::PRESETS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "resona")]
#[command(about = "Resona: nonlinear focused ultrasound by harmonic cascade")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cascade from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the cascade.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in tissue presets.
    Materials,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Resona Harmonic Cascade");
            println!("=======================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_axis_csv {
                runner::write_axis_csv(&result.cascade, &out_dir.join("harmonics_axis.csv"), &job)?;
            }
            if job.output.save_json {
                runner::write_json(&result.summary, &out_dir.join("summary.json"))?;
                if !result.store.is_empty() {
                    runner::write_store(&result.store, &out_dir.join("convergence.json"))?;
                }
            }

            if let Some(error) = &result.summary.error {
                anyhow::bail!(
                    "cascade stopped after {} harmonics: {error}",
                    result.cascade.history.len()
                );
            }
            println!("Cascade complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let prepared = runner::prepare(&job)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  Grid {:?} at dx = {:.4e} m, p0 = {:.4e} Pa",
                prepared.grid.dims(),
                prepared.grid.spacing(),
                prepared.bowl.surface_pressure
            );
            Ok(())
        }
        Commands::Materials => {
            println!("Available materials (alpha0 in dB/m at 1 MHz):");
            println!();
            for p in &PRESETS {
                let m = p.properties;
                println!(
                    "  {:<6} {:<16} c={:.0} m/s  rho={:.0} kg/m3  alpha0={}  eta={}  beta={}",
                    p.name, p.description, m.c, m.rho, m.alpha0, m.eta, m.beta
                );
            }
            Ok(())
        }
    }
}
