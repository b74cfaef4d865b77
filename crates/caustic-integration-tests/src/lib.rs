//! Fixtures shared by the cross-crate tests in `tests/`.

use std::path::Path;
use std::sync::Arc;

use caustic_collapse::{CollapseTime, Cosmology, GrowthTable};
use caustic_fragment::{FragmentationSettings, PointRecord};
use caustic_lattice::{Connectivity, Lattice};
use caustic_run::{FieldSource, FragmentationConfig, Perturbation, RunConfig, SmoothingConfig};

/// Small synthetic run writing into `output_dir`.
pub fn synthetic_config(grid_size: usize, workers: usize, output_dir: &Path) -> RunConfig {
    RunConfig {
        run_name: "integration".to_string(),
        grid_size,
        box_size: 2.0 * grid_size as f64,
        cosmology: Cosmology::default(),
        smoothing: SmoothingConfig {
            radii: vec![4.0, 2.0, 0.0],
            tie_tolerance: 0.0,
        },
        perturbation: Perturbation::Second,
        growth_table: None,
        fragmentation: FragmentationConfig {
            min_halo_members: 4,
            batch_count: 6,
            ..FragmentationConfig::default()
        },
        fragmentation_variants: Vec::new(),
        outputs: vec![1.0, 0.0],
        light_cone: None,
        workers,
        field: FieldSource::Synthetic {
            seed: 2024,
            amplitude: 40.0,
            spectral_index: -2.0,
        },
        output_dir: output_dir.to_path_buf(),
        write_collapse_field: true,
    }
}

pub fn lattice(n: usize, connectivity: Connectivity) -> Arc<Lattice> {
    Arc::new(Lattice::new(n, connectivity).expect("lattice"))
}

pub fn growth() -> Arc<GrowthTable> {
    Arc::new(GrowthTable::new(Cosmology::default()).expect("growth table"))
}

/// Points with collapse times drawn from `times` (`None` never collapses).
pub fn points_from(n: usize, times: &[Option<f64>]) -> Vec<PointRecord> {
    (0..n * n * n)
        .map(|i| {
            let time = times.get(i).copied().flatten().map_or(CollapseTime::NEVER, CollapseTime::from_scale_factor);
            let eigenvalues = [1.0, 0.25 + (i % 4) as f64 * 0.2, -0.2];
            PointRecord::new(i, n, time, eigenvalues)
        })
        .collect()
}

pub fn settings(min_members: usize) -> FragmentationSettings {
    FragmentationSettings {
        min_members,
        outputs: vec![3.0, 1.0, 0.0],
        batch_count: 4,
        ..FragmentationSettings::default()
    }
}
