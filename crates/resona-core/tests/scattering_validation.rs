//! Scattering off inclusions: limits, solver agreement and error paths.

use ndarray::Array3;
use num_complex::Complex64;
use resona_core::cascade::{CascadeSettings, HarmonicCascade, RefinementPolicy};
use resona_core::scattering::{ScatteringCoupler, ScatteringSettings};
use resona_core::solver::SolveMethod;
use resona_core::{GaussianSource, KernelCache, Medium, ResonaError, VolumePotentialOperator};
use resona_geometry::primitives::{Cuboid, Sphere};
use resona_geometry::{GridManager, Primitive, VoxelGrid};
use resona_materials::preset;

const F1: f64 = 1.1e6;

fn grid() -> VoxelGrid {
    VoxelGrid::new([0.0, -7e-4, -7e-4], 2e-4, [14, 8, 8]).unwrap()
}

fn incident(grid: &VoxelGrid) -> Array3<Complex64> {
    GaussianSource {
        centre: grid.centre(),
        width: 8e-4,
        amplitude: 1.0,
    }
    .on_grid(grid)
}

fn sphere(grid: &VoxelGrid) -> Primitive {
    Primitive::Sphere(Sphere {
        centre: grid.centre(),
        radius: 5e-4,
    })
}

fn fat_in_water(grid: &VoxelGrid) -> Medium {
    Medium::homogeneous(preset("water").unwrap().properties)
        .with_inclusion(sphere(grid), preset("fat").unwrap().properties)
}

fn max_norm(a: &Array3<Complex64>) -> f64 {
    a.iter().map(|v| v.norm()).fold(0.0, f64::max)
}

#[test]
fn test_zero_contrast_returns_incident_exactly() {
    let g = grid();
    let water = preset("water").unwrap().properties;
    let medium = Medium::homogeneous(water).with_inclusion(sphere(&g), water);
    let u_inc = incident(&g);

    let result = ScatteringCoupler::default()
        .scatter(
            &VolumePotentialOperator::cpu(),
            &mut KernelCache::default(),
            &medium,
            &g,
            &u_inc,
            F1,
        )
        .unwrap();
    assert_eq!(result.total, u_inc);
    assert!(result.report.converged);
}

#[test]
fn test_gmres_agrees_with_dense_lu() {
    let g = grid();
    let medium = fat_in_water(&g);
    let u_inc = incident(&g);
    let op = VolumePotentialOperator::cpu();

    let direct = ScatteringCoupler::new(ScatteringSettings {
        tolerance: 1e-10,
        direct_threshold: usize::MAX,
        ..Default::default()
    })
    .scatter(&op, &mut KernelCache::default(), &medium, &g, &u_inc, F1)
    .unwrap();
    let iterative = ScatteringCoupler::new(ScatteringSettings {
        tolerance: 1e-11,
        direct_threshold: 0,
        ..Default::default()
    })
    .scatter(&op, &mut KernelCache::default(), &medium, &g, &u_inc, F1)
    .unwrap();

    assert_eq!(direct.report.method, SolveMethod::Direct);
    assert_eq!(iterative.report.method, SolveMethod::Gmres);
    assert!(iterative.report.converged);
    assert_eq!(direct.bbox, iterative.bbox);

    let scale = max_norm(&direct.total);
    for (a, b) in direct.total.iter().zip(iterative.total.iter()) {
        assert!((a - b).norm() <= 1e-7 * scale);
    }
    // A real contrast must change the field.
    assert!(max_norm(&(&direct.total - &u_inc)) > 1e-6 * scale);
}

#[test]
fn test_required_convergence_is_enforced() {
    let g = grid();
    let strict = ScatteringCoupler::new(ScatteringSettings {
        tolerance: 1e-14,
        max_iterations: 1,
        restart: 1,
        direct_threshold: 0,
        require_convergence: true,
    });
    let err = strict
        .scatter(
            &VolumePotentialOperator::cpu(),
            &mut KernelCache::default(),
            &fat_in_water(&g),
            &g,
            &incident(&g),
            F1,
        )
        .unwrap_err();
    assert!(matches!(err, ResonaError::ConvergenceFailure { iterations: 1, .. }));
}

#[test]
fn test_cascade_reports_each_scattered_order() {
    let g = grid();
    let settings = CascadeSettings {
        harmonics: 3,
        refinement: RefinementPolicy::Never,
        ..Default::default()
    };
    let out = HarmonicCascade::new(
        settings,
        F1,
        fat_in_water(&g),
        GridManager::new(g.clone()),
        VolumePotentialOperator::cpu(),
    )
    .unwrap()
    .with_scattering(ScatteringCoupler::default())
    .run(incident(&g))
    .unwrap();

    let orders: Vec<usize> = out.scattering.iter().map(|r| r.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert!(out.scattering.iter().all(|r| r.report.converged));
    assert_ne!(out.history.get(0).unwrap().values, incident(&g));
}

#[test]
fn test_inclusion_outside_grid_aborts_before_fundamental() {
    let g = grid();
    let medium = Medium::homogeneous(preset("water").unwrap().properties).with_inclusion(
        Primitive::Cuboid(Cuboid {
            centre: [0.02, 0.0, 0.0],
            half_extents: [1e-3; 3],
        }),
        preset("liver").unwrap().properties,
    );
    let failure = HarmonicCascade::new(
        CascadeSettings::default(),
        F1,
        medium,
        GridManager::new(g.clone()),
        VolumePotentialOperator::cpu(),
    )
    .unwrap()
    .with_scattering(ScatteringCoupler::default())
    .run(incident(&g))
    .unwrap_err();
    assert!(failure.output.history.is_empty());
    assert!(matches!(failure.error, ResonaError::InvalidRegion(_)));
}
