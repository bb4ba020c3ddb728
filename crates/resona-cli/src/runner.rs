//! Job runner: ties together the transducer, medium, grid and cascade.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use resona_compute::{ComputeBackend, CpuBackend};
use resona_core::cascade::{CascadeOutput, HarmonicCascade, OrderReport};
use resona_core::convergence::{default_tolerances, ConvergenceAnalyzer};
use resona_core::scattering::ScatteringCoupler;
use resona_core::store::ConvergenceStore;
use resona_core::{normalise_power, BowlTransducer, Medium, VolumePotentialOperator};
use resona_geometry::{GridManager, VoxelGrid};
use resona_materials::MaterialProperties;

use crate::config::JobConfig;

/// Per-harmonic entry of the run summary.
#[derive(Debug, Serialize)]
pub struct HarmonicSummary {
    pub harmonic: usize,
    pub frequency_hz: f64,
    pub peak_pressure_pa: f64,
    pub spacing_m: f64,
    pub dims: [usize; 3],
    /// Source rule, absent for the fundamental.
    pub coupling: Option<String>,
}

/// Written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub transducer: String,
    pub frequency_hz: f64,
    pub power_w: f64,
    pub surface_pressure_pa: f64,
    pub background: MaterialProperties,
    pub harmonics: Vec<HarmonicSummary>,
    pub scattering: Vec<OrderReport>,
    /// Why the cascade stopped early, if it did.
    pub error: Option<String>,
}

/// Results of a job run.
pub struct RunOutput {
    pub cascade: CascadeOutput,
    pub store: ConvergenceStore,
    pub summary: RunSummary,
}

/// The problem a job describes, resolved and validated.
pub struct PreparedJob {
    pub background: MaterialProperties,
    pub medium: Medium,
    pub bowl: BowlTransducer,
    pub grid: VoxelGrid,
}

/// Resolve materials, transducer and grid without running anything.
pub fn prepare(job: &JobConfig) -> Result<PreparedJob> {
    let background = job.medium.resolve().context("Invalid [medium]")?;
    let f1 = job.transducer.frequency;

    let mut bowl = job.transducer.bowl()?;
    bowl.surface_pressure = normalise_power(job.transducer.power, &background, &bowl)?;

    let ppw = job.domain.points_per_wavelength;
    if !(ppw.is_finite() && ppw > 0.0) {
        anyhow::bail!("points_per_wavelength must be positive, got {ppw}");
    }
    let spacing = background.wavelength(f1) / ppw;
    let x_start = job.domain.x_start(&job.transducer);
    let extents = [job.domain.x_end - x_start, job.domain.width, job.domain.width];
    let grid = resona_geometry::generate_grid(spacing, extents, [x_start, 0.0, 0.0])
        .context("Invalid [domain]")?;

    let mut medium = Medium::homogeneous(background);
    if let Some(scatterer) = &job.scatterer {
        let props = scatterer.material.resolve().context("Invalid [scatterer] material")?;
        medium = medium.with_inclusion(scatterer.shape.clone(), props);
    }

    Ok(PreparedJob {
        background,
        medium,
        bowl,
        grid,
    })
}

fn create_backend() -> Arc<dyn ComputeBackend> {
    let backend = CpuBackend::new();
    println!("Backend: {}", backend.device_info().name);
    Arc::new(backend)
}

/// Run a full cascade from a parsed job configuration.
///
/// A cascade that stops early still yields the orders it computed; the
/// error is recorded in the summary.
pub fn run_job(job: &JobConfig) -> Result<RunOutput> {
    let prepared = prepare(job)?;
    let f1 = job.transducer.frequency;
    log::debug!("Cascade settings: {:?}", job.cascade);
    println!(
        "Transducer '{}': f1 = {:.3} MHz, p0 = {:.4e} Pa for {} W",
        job.transducer.name,
        f1 / 1e6,
        prepared.bowl.surface_pressure,
        job.transducer.power
    );
    println!(
        "Grid: {:?} voxels at dx = {:.4e} m ({} total)",
        prepared.grid.dims(),
        prepared.grid.spacing(),
        prepared.grid.len()
    );

    let k1 = prepared.background.wavenumber(f1)?;
    let incident = prepared
        .bowl
        .incident_on_grid(k1, &prepared.grid)
        .context("Incident field evaluation failed")?;

    let operator = VolumePotentialOperator::new(create_backend());
    let mut cascade = HarmonicCascade::new(
        job.cascade.clone(),
        f1,
        prepared.medium,
        GridManager::new(prepared.grid),
        operator,
    )?;
    if let Some(scatterer) = &job.scatterer {
        cascade = cascade.with_scattering(ScatteringCoupler::new(scatterer.settings));
    }
    if let Some(conv) = job.convergence.as_ref().filter(|c| c.enabled) {
        let tolerances = conv.tolerances.clone().unwrap_or_else(default_tolerances);
        cascade = cascade.with_convergence(ConvergenceAnalyzer::new(tolerances)?);
    }
    let couplings = cascade.couplings().clone();

    let (output, error) = match cascade.run(incident) {
        Ok(output) => (output, None),
        Err(failure) => {
            eprintln!("Warning: {failure}");
            (failure.output, Some(failure.error.to_string()))
        }
    };

    let mut store = ConvergenceStore::new();
    for (order, records) in &output.convergence {
        store.insert_records(&job.transducer.name, job.transducer.power, *order, records);
    }

    let harmonics: Vec<HarmonicSummary> = output
        .history
        .iter()
        .map(|f| HarmonicSummary {
            harmonic: f.harmonic(),
            frequency_hz: f.frequency,
            peak_pressure_pa: f.peak(),
            spacing_m: f.grid.spacing(),
            dims: f.grid.dims(),
            coupling: couplings.get(f.order).ok().map(|c| c.describe()),
        })
        .collect();
    for h in &harmonics {
        println!(
            "  H{}: {:.3} MHz, peak |p| = {:.4e} Pa",
            h.harmonic,
            h.frequency_hz / 1e6,
            h.peak_pressure_pa
        );
    }

    let summary = RunSummary {
        transducer: job.transducer.name.clone(),
        frequency_hz: f1,
        power_w: job.transducer.power,
        surface_pressure_pa: prepared.bowl.surface_pressure,
        background: prepared.background,
        harmonics,
        scattering: output.scattering.clone(),
        error,
    };

    Ok(RunOutput {
        cascade: output,
        store,
        summary,
    })
}

/// Write every harmonic's on-axis line to a CSV file with a metadata header.
///
/// Each harmonic is sampled on its own grid, so rows are in long format.
pub fn write_axis_csv(output: &CascadeOutput, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
    );

    writeln!(file, "# Resona harmonic cascade: on-axis pressure")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# transducer '{}': f1 = {} Hz, power = {} W",
        job.transducer.name, job.transducer.frequency, job.transducer.power
    )?;
    for f in output.history.iter() {
        writeln!(
            file,
            "# harmonic {}: dx = {:.6e} m, dims = {:?}",
            f.harmonic(),
            f.grid.spacing(),
            f.grid.dims()
        )?;
    }
    writeln!(file, "#")?;
    writeln!(file, "harmonic,x_m,re_pa,im_pa,abs_pa")?;

    for f in output.history.iter() {
        let line = f.axis_line();
        for (x, p) in line.x.iter().zip(line.values.iter()) {
            writeln!(file, "{},{:.6e},{:.6e},{:.6e},{:.6e}", f.harmonic(), x, p.re, p.im, p.norm())?;
        }
    }

    println!("Axis lines written to: {}", path.display());
    Ok(())
}

/// Write a serialisable value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("JSON serialisation error")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("JSON written to: {}", path.display());
    Ok(())
}

/// Write the convergence store.
pub fn write_store(store: &ConvergenceStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, store.to_json()?).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Convergence store written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const SMALL_JOB: &str = r#"
[medium]
preset = "water"

[transducer]
frequency = 1.1e6
radius_of_curvature = 0.0632
outer_diameter = 0.064
power = 50.0
n_elements = 64

[domain]
points_per_wavelength = 3
x_start = 0.058
x_end = 0.066
width = 0.002

[cascade]
harmonics = 2
refinement = "never"
"#;

    #[test]
    fn test_prepare_builds_grid_from_wavelength() {
        let job = parse_config(SMALL_JOB).unwrap();
        let prepared = prepare(&job).unwrap();
        let dx = 1480.0 / 1.1e6 / 3.0;
        assert!((prepared.grid.spacing() - dx).abs() < 1e-15);
        assert!((prepared.grid.origin()[0] - 0.058).abs() < 1e-15);
        assert!(prepared.bowl.surface_pressure > 0.0);
        assert!(prepared.medium.is_homogeneous());
    }

    #[test]
    fn test_small_job_writes_outputs() {
        let job = parse_config(SMALL_JOB).unwrap();
        let out = run_job(&job).unwrap();
        assert_eq!(out.cascade.history.len(), 2);
        assert!(out.summary.error.is_none());
        assert_eq!(out.summary.harmonics[1].coupling.as_deref(), Some("-2 (P0^2)"));
        assert!(out.store.is_empty());

        let dir = std::env::temp_dir().join(format!("resona-cli-test-{}", std::process::id()));
        let csv = dir.join("harmonics_axis.csv");
        write_axis_csv(&out.cascade, &csv, &job).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert!(text.lines().any(|l| l == "harmonic,x_m,re_pa,im_pa,abs_pa"));
        let rows = text.lines().filter(|l| !l.starts_with('#')).count();
        assert_eq!(rows, 1 + 2 * out.cascade.history.get(0).unwrap().grid.dims()[0]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
