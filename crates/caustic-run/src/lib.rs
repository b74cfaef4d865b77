//! Caustic Run
//!
//! Configuration, density sources and the pipeline that chains the
//! Caustic crates into one halo-finding run:
//!
//! 1. read the parameter file and apply `CAUSTIC_*` overrides
//! 2. load or synthesize the linear density field
//! 3. sweep every smoothing radius for collapse times and select one per point
//! 4. compute LPT displacements and build point records
//! 5. fragment into halos (sequentially, or across slab workers), once for
//!    the main parameter set and once per listed variant
//! 6. write one catalog per output redshift, plus the light-cone catalog
//!    when an observer is configured

pub mod config;
mod error;
pub mod pipeline;
pub mod source;
pub mod timings;

pub use config::{
    FragmentationConfig, LightConeConfig, Perturbation, RunConfig, SmoothingConfig, ENV_OUTPUT_DIR, ENV_WORKERS,
};
pub use error::{Error, Result};
pub use pipeline::{catalog_file_name, variant_dir_name, Pipeline, PipelineOutput, LIGHT_CONE_FILE};
pub use source::FieldSource;
pub use timings::{Stage, Timings};
