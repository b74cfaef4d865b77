//! Run configuration: a JSON parameter file plus environment overrides.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use caustic_collapse::{Cosmology, LptOrder};
use caustic_fragment::{FilamentCriterion, FragmentationSettings, LightConeSettings, MergeCriterion};
use caustic_lattice::Connectivity;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::catalog_file_name;
use crate::source::FieldSource;

/// Worker count override.
pub const ENV_WORKERS: &str = "CAUSTIC_WORKERS";

/// Output directory override.
pub const ENV_OUTPUT_DIR: &str = "CAUSTIC_OUTPUT_DIR";

/// Everything one run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_run_name")]
    pub run_name: String,
    /// Lattice points per side
    pub grid_size: usize,
    /// Box side in Mpc/h
    pub box_size: f64,
    #[serde(default)]
    pub cosmology: Cosmology,
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub perturbation: Perturbation,
    /// Scale-dependent growth table; scale-independent growth when absent
    #[serde(default)]
    pub growth_table: Option<PathBuf>,
    #[serde(default)]
    pub fragmentation: FragmentationConfig,
    /// Extra parameter sets, each re-run over the same collapse times
    #[serde(default)]
    pub fragmentation_variants: Vec<FragmentationConfig>,
    /// Past-light-cone catalog; off when absent
    #[serde(default)]
    pub light_cone: Option<LightConeConfig>,
    /// Output redshifts
    pub outputs: Vec<f64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub field: FieldSource,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub write_collapse_field: bool,
}

/// Smoothing radii in Mpc/h and the selector's tie window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingConfig {
    pub radii: Vec<f64>,
    /// In scale-factor units
    #[serde(default)]
    pub tie_tolerance: f64,
}

/// LPT order for displacements and collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perturbation {
    First,
    #[default]
    Second,
    Third,
}

impl From<Perturbation> for LptOrder {
    fn from(p: Perturbation) -> Self {
        match p {
            Perturbation::First => LptOrder::First,
            Perturbation::Second => LptOrder::Second,
            Perturbation::Third => LptOrder::Third,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentationConfig {
    #[serde(default = "default_min_members")]
    pub min_halo_members: usize,
    #[serde(default)]
    pub connectivity: Connectivity,
    #[serde(default)]
    pub merge: MergeCriterion,
    #[serde(default)]
    pub filament: FilamentCriterion,
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            min_halo_members: default_min_members(),
            connectivity: Connectivity::default(),
            merge: MergeCriterion::default(),
            filament: FilamentCriterion::default(),
            batch_count: default_batch_count(),
        }
    }
}

/// Observer and depth of the light cone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightConeConfig {
    /// Mpc/h; the box center when absent
    #[serde(default)]
    pub observer: Option<[f64; 3]>,
    pub max_redshift: f64,
}

fn default_run_name() -> String {
    "caustic".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./caustic-out")
}

fn default_min_members() -> usize {
    10
}

fn default_batch_count() -> usize {
    16
}

impl RunConfig {
    /// Parse a parameter file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_json_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("parameter file: {e}")))
    }

    /// Apply `CAUSTIC_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.workers = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_WORKERS}={raw} is not a worker count")))?;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|d| !d.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));
        if self.grid_size < 2 {
            return fail(format!("grid_size must be at least 2, got {}", self.grid_size));
        }
        if !(self.box_size.is_finite() && self.box_size > 0.0) {
            return fail(format!("box_size must be positive, got {}", self.box_size));
        }
        if self.smoothing.radii.is_empty() {
            return fail("no smoothing radii".into());
        }
        if let Some(r) = self.smoothing.radii.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
            return fail(format!("invalid smoothing radius {r}"));
        }
        if !(self.smoothing.tie_tolerance.is_finite() && self.smoothing.tie_tolerance >= 0.0) {
            return fail(format!("invalid tie_tolerance {}", self.smoothing.tie_tolerance));
        }
        if self.perturbation == Perturbation::Third && self.growth_table.is_some() {
            return fail("third-order perturbations need scale-independent growth".into());
        }
        if self.workers == 0 || self.workers > self.grid_size {
            return fail(format!(
                "workers must be between 1 and {} (grid planes), got {}",
                self.grid_size, self.workers
            ));
        }
        if let Some(cone) = self.light_cone_settings() {
            if cone.observer.iter().any(|c| !(0.0..self.box_size).contains(c)) {
                return fail(format!("light cone observer {:?} lies outside the box", cone.observer));
            }
        }
        self.cosmology.validate()?;
        self.field.validate()?;
        let settings = self.settings();
        settings.validate()?;
        for variant in &self.fragmentation_variants {
            self.settings_for(variant).validate()?;
        }

        // one file per distinct output
        let mut names = BTreeSet::new();
        for time in settings.output_times() {
            let name = catalog_file_name(time.redshift().unwrap_or(f64::INFINITY));
            if !names.insert(name.clone()) {
                return fail(format!("two output redshifts would both be written to {name}"));
            }
        }
        Ok(())
    }

    /// Engine settings derived from the fragmentation section.
    pub fn settings(&self) -> FragmentationSettings {
        self.settings_for(&self.fragmentation)
    }

    /// Engine settings for one parameter set, sharing outputs and light cone.
    pub fn settings_for(&self, fragmentation: &FragmentationConfig) -> FragmentationSettings {
        FragmentationSettings {
            min_members: fragmentation.min_halo_members,
            merge: fragmentation.merge,
            filament: fragmentation.filament,
            outputs: self.outputs.clone(),
            batch_count: fragmentation.batch_count,
            light_cone: self.light_cone_settings(),
        }
    }

    /// Light-cone settings with the observer resolved.
    pub fn light_cone_settings(&self) -> Option<LightConeSettings> {
        self.light_cone.map(|cone| LightConeSettings {
            observer: cone.observer.unwrap_or([0.5 * self.box_size; 3]),
            max_redshift: cone.max_redshift,
        })
    }

    pub fn order(&self) -> LptOrder {
        self.perturbation.into()
    }

    /// Banner line naming the perturbation order and growth mode.
    pub fn model_summary(&self) -> String {
        let growth = if self.growth_table.is_some() {
            "scale-dependent"
        } else {
            "scale-independent"
        };
        format!("{} with {growth} growth", self.order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "run_name": "example",
        "grid_size": 32,
        "box_size": 100.0,
        "cosmology": { "omega_matter": 0.3, "omega_lambda": 0.7, "hubble": 0.7 },
        "smoothing": { "radii": [6.0, 4.0, 2.0, 0.0], "tie_tolerance": 1e-9 },
        "perturbation": "second",
        "growth_table": null,
        "fragmentation": {
            "min_halo_members": 10,
            "connectivity": "faces",
            "merge": { "proximity": { "factor": 0.7 } },
            "filament": "never",
            "batch_count": 16
        },
        "outputs": [1.0, 0.0],
        "workers": 4,
        "field": { "synthetic": { "seed": 7, "amplitude": 1.0, "spectral_index": -2.0 } },
        "output_dir": "./caustic-out",
        "write_collapse_field": false
    }"#;

    fn example() -> RunConfig {
        RunConfig::from_json_str(EXAMPLE).unwrap()
    }

    #[test]
    fn parses_documented_example() {
        let config = example();
        assert_eq!(config.grid_size, 32);
        assert_eq!(config.fragmentation.merge, MergeCriterion::Proximity { factor: 0.7 });
        assert_eq!(config.order(), LptOrder::Second);
        assert_eq!(config.model_summary(), "2LPT with scale-independent growth");
        config.validate().unwrap();
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let config = RunConfig::from_json_str(
            r#"{"grid_size": 8, "box_size": 16.0, "smoothing": {"radii": [2.0]},
                "outputs": [0.0], "field": {"real_space_file": {"path": "delta.bin"}}}"#,
        )
        .unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.perturbation, Perturbation::Second);
        assert_eq!(config.fragmentation, FragmentationConfig::default());
        assert_eq!(config.output_dir, PathBuf::from("./caustic-out"));
        assert!(config.fragmentation_variants.is_empty());
        assert_eq!(config.settings().light_cone, None);
        config.validate().unwrap();
    }

    #[test]
    fn light_cone_and_variants() {
        let text = EXAMPLE.replace(
            "\"workers\": 4,",
            r#""workers": 4,
               "light_cone": { "max_redshift": 2.0 },
               "fragmentation_variants": [ { "min_halo_members": 20, "merge": "never" } ],"#,
        );
        let config = RunConfig::from_json_str(&text).unwrap();
        config.validate().unwrap();
        let cone = config.light_cone_settings().unwrap();
        assert_eq!(cone.observer, [50.0; 3]);
        assert_eq!(cone.max_redshift, 2.0);

        let variant = config.settings_for(&config.fragmentation_variants[0]);
        assert_eq!(variant.min_members, 20);
        assert_eq!(variant.merge, MergeCriterion::Never);
        assert_eq!(variant.outputs, config.outputs);
        assert_eq!(variant.light_cone, Some(cone));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let text = EXAMPLE.replace("\"workers\": 4", "\"workers\": 4, \"threads\": 2");
        assert!(matches!(RunConfig::from_json_str(&text), Err(Error::Config(_))));
    }

    #[test]
    fn environment_overrides() {
        let mut config = example();
        config
            .apply_overrides(|key| match key {
                ENV_WORKERS => Some("2".into()),
                ENV_OUTPUT_DIR => Some("/tmp/halos".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/halos"));

        let err = config.apply_overrides(|key| (key == ENV_WORKERS).then(|| "many".to_string()));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let cases: Vec<Box<dyn Fn(&mut RunConfig)>> = vec![
            Box::new(|c| c.outputs.clear()),
            Box::new(|c| c.outputs = vec![-1.0]),
            Box::new(|c| c.box_size = 0.0),
            Box::new(|c| c.grid_size = 1),
            Box::new(|c| c.smoothing.radii.clear()),
            Box::new(|c| c.smoothing.radii = vec![2.0, -1.0]),
            Box::new(|c| c.fragmentation.min_halo_members = 0),
            Box::new(|c| c.workers = 0),
            Box::new(|c| c.workers = 33),
            Box::new(|c| {
                c.perturbation = Perturbation::Third;
                c.growth_table = Some(PathBuf::from("growth.json"));
            }),
            Box::new(|c| c.fragmentation.merge = MergeCriterion::MassRatio { min_ratio: 2.0 }),
            Box::new(|c| c.cosmology.omega_matter = -0.3),
            // both would be catalog_z0.000.json
            Box::new(|c| c.outputs = vec![0.0004, 0.0001]),
            Box::new(|c| {
                c.light_cone = Some(LightConeConfig {
                    observer: Some([100.0, 1.0, 1.0]),
                    max_redshift: 1.0,
                })
            }),
            Box::new(|c| {
                c.light_cone = Some(LightConeConfig {
                    observer: None,
                    max_redshift: 0.0,
                })
            }),
            Box::new(|c| {
                c.fragmentation_variants = vec![FragmentationConfig {
                    min_halo_members: 0,
                    ..FragmentationConfig::default()
                }]
            }),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = example();
            mutate(&mut config);
            assert!(matches!(config.validate(), Err(Error::Config(_))), "case {i}");
        }

        // repeated redshifts collapse to one output
        let mut config = example();
        config.outputs = vec![1.0, 0.0, 1.0];
        config.validate().unwrap();
    }
}
