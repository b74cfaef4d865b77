//! The end-to-end run: density field to halo catalogs.

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use caustic_collapse::{
    CollapseField, CollapseTimeSelector, DisplacementSolver, GrowthGrid, GrowthModel, GrowthTable, PerturbationModel,
};
use caustic_field::{RustFftTransform, SpectralTransform};
use caustic_fragment::{
    build_points, FragmentationEngine, FragmentationOutcome, FragmentationSettings, HaloCatalog, LightConeCatalog,
    Membership, ParallelEngine, PointRecord,
};
use caustic_lattice::Lattice;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::{FragmentationConfig, RunConfig};
use crate::error::Result;
use crate::timings::{Stage, Timings};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One catalog per distinct output, earliest first
    pub catalogs: Vec<HaloCatalog>,
    pub membership: Vec<Membership>,
    pub light_cone: Option<LightConeCatalog>,
    /// One outcome per configured fragmentation variant, in order
    pub variants: Vec<FragmentationOutcome>,
    pub collapse: CollapseField,
    pub timings: Timings,
}

/// Light-cone catalog file, next to the redshift catalogs.
pub const LIGHT_CONE_FILE: &str = "light_cone.json";

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RunConfig,
}

impl Pipeline {
    /// Validates the configuration before anything expensive happens.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage and write the results.
    pub async fn execute(config: RunConfig) -> Result<(PipelineOutput, Vec<PathBuf>)> {
        let pipeline = Self::new(config)?;
        let mut output = pipeline.run().await?;
        let written = pipeline.write(&mut output)?;
        output.timings.log();
        Ok((output, written))
    }

    pub async fn run(&self) -> Result<PipelineOutput> {
        let config = &self.config;
        let n = config.grid_size;
        let mut timings = Timings::new();
        info!(run = %config.run_name, n, box_size = config.box_size, workers = config.workers, "run started");

        // initialization
        let start = Instant::now();
        let lattice = Arc::new(Lattice::new(n, config.fragmentation.connectivity)?);
        let background = GrowthTable::new(config.cosmology)?;
        let growth = match &config.growth_table {
            Some(path) => GrowthModel::ScaleDependent(GrowthGrid::from_path(path)?),
            None => GrowthModel::ScaleIndependent,
        };
        let model = PerturbationModel::new(config.order(), background, growth)?;
        let transform: Arc<dyn SpectralTransform> = Arc::new(RustFftTransform::new(n));
        timings.add(Stage::Initialization, start.elapsed());
        info!(model = %model.describe(), connectivity = %lattice.connectivity(), "model ready");

        let store = timings.time(Stage::Density, || config.field.load(n, config.box_size, transform))?;

        // largest radius first; radius indices follow this order
        let mut radii = config.smoothing.radii.clone();
        radii.sort_by(|a, b| b.total_cmp(a));
        let solver = DisplacementSolver::new(&model);
        let mut sweeps = Vec::with_capacity(radii.len());
        for radius in radii {
            let tensor = timings.time(Stage::Transforms, || store.tensor(radius))?;
            let sweep = timings.time(Stage::CollapseTimes, || solver.sweep(&tensor))?;
            let collapsed = sweep.points.iter().filter(|p| !p.time.is_never()).count();
            info!(radius, collapsed, "radius swept");
            sweeps.push(sweep);
        }
        let selector = CollapseTimeSelector::new(config.smoothing.tie_tolerance)?;
        let collapse = timings.time(Stage::CollapseTimes, || selector.select_all(&sweeps))?;
        drop(sweeps);

        let displacements = timings.time(Stage::Displacements, || store.displacements(model.order()))?;
        let points = timings.time(Stage::Sorting, || build_points(n, &collapse, &displacements));
        drop(displacements);

        let start = Instant::now();
        let growth = Arc::new(model.background().clone());
        let variant_points = (!config.fragmentation_variants.is_empty()).then(|| points.clone());
        let outcome = self.fragment(Arc::clone(&lattice), Arc::clone(&growth), config.settings(), points).await?;
        if let Some(last) = outcome.final_catalog() {
            info!(
                halos = last.len(),
                halo_points = last.halo_points(),
                filament_points = last.filament_points,
                uncollapsed_points = last.uncollapsed_points,
                light_cone = outcome.light_cone.as_ref().map_or(0, LightConeCatalog::len),
                "fragmentation finished"
            );
        }

        let mut variants = Vec::with_capacity(config.fragmentation_variants.len());
        if let Some(points) = variant_points {
            for (k, variant) in config.fragmentation_variants.iter().enumerate() {
                let lattice = self.lattice_for(&lattice, variant)?;
                let outcome = self
                    .fragment(lattice, Arc::clone(&growth), config.settings_for(variant), points.clone())
                    .await?;
                info!(
                    variant = k + 1,
                    halos = outcome.final_catalog().map_or(0, HaloCatalog::len),
                    "variant fragmented"
                );
                variants.push(outcome);
            }
        }
        timings.add(Stage::Fragmentation, start.elapsed());

        Ok(PipelineOutput {
            catalogs: outcome.catalogs,
            membership: outcome.membership,
            light_cone: outcome.light_cone,
            variants,
            collapse,
            timings,
        })
    }

    /// Sequential for one worker, slab-parallel otherwise.
    async fn fragment(
        &self,
        lattice: Arc<Lattice>,
        growth: Arc<GrowthTable>,
        settings: FragmentationSettings,
        points: Vec<PointRecord>,
    ) -> Result<FragmentationOutcome> {
        let config = &self.config;
        let outcome = if config.workers == 1 {
            FragmentationEngine::new(lattice, config.box_size, growth, settings)?.run(points)?
        } else {
            ParallelEngine::new(lattice, config.box_size, growth, settings, config.workers)?
                .run(points)
                .await?
        };
        Ok(outcome)
    }

    /// Reuse the main adjacency view unless the variant asks for another stencil.
    fn lattice_for(&self, lattice: &Arc<Lattice>, variant: &FragmentationConfig) -> Result<Arc<Lattice>> {
        if variant.connectivity == lattice.connectivity() {
            Ok(Arc::clone(lattice))
        } else {
            Ok(Arc::new(Lattice::new(self.config.grid_size, variant.connectivity)?))
        }
    }

    /// Write one `catalog_z<redshift>.json` per output, the light-cone
    /// catalog and the collapse field when configured, and the same catalogs
    /// under `variant_<k>/` for every variant. Every file is staged first and
    /// nothing is left behind when any of them fails. I/O time is added to
    /// the output's timings.
    pub fn write(&self, output: &mut PipelineOutput) -> Result<Vec<PathBuf>> {
        let start = Instant::now();
        let dir = &self.config.output_dir;
        let mut staged = StagedFiles::default();
        staged.catalogs(dir, &output.catalogs, output.light_cone.as_ref())?;
        if self.config.write_collapse_field {
            staged.add(dir.join("collapse_field.json"), &output.collapse)?;
        }
        for (k, variant) in output.variants.iter().enumerate() {
            staged.catalogs(&dir.join(variant_dir_name(k + 1)), &variant.catalogs, variant.light_cone.as_ref())?;
        }
        let written = staged.persist()?;
        output.timings.add(Stage::Io, start.elapsed());
        info!(files = written.len(), dir = %dir.display(), "results written");
        Ok(written)
    }
}

pub fn catalog_file_name(redshift: f64) -> String {
    format!("catalog_z{redshift:.3}.json")
}

/// Directory of the `k`-th fragmentation variant, counting from 1.
pub fn variant_dir_name(k: usize) -> String {
    format!("variant_{k}")
}

/// Serialized files waiting in temporaries next to their destinations.
#[derive(Debug, Default)]
struct StagedFiles {
    files: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedFiles {
    fn catalogs(&mut self, dir: &Path, catalogs: &[HaloCatalog], light_cone: Option<&LightConeCatalog>) -> Result<()> {
        for catalog in catalogs {
            self.add(dir.join(catalog_file_name(catalog.redshift)), catalog)?;
        }
        if let Some(cone) = light_cone {
            self.add(dir.join(LIGHT_CONE_FILE), cone)?;
        }
        Ok(())
    }

    fn add<T: Serialize>(&mut self, path: PathBuf, value: &T) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        self.files.push((file, path));
        Ok(())
    }

    /// Move every file into place. On failure the files already moved are
    /// removed again and the remaining temporaries are dropped.
    fn persist(self) -> Result<Vec<PathBuf>> {
        let mut written: Vec<PathBuf> = Vec::with_capacity(self.files.len());
        for (file, path) in self.files {
            if let Err(e) = file.persist(&path) {
                for done in &written {
                    if let Err(cleanup) = std::fs::remove_file(done) {
                        warn!(path = %done.display(), error = %cleanup, "could not remove partial output");
                    }
                }
                return Err(e.error.into());
            }
            written.push(path);
        }
        Ok(written)
    }
}
