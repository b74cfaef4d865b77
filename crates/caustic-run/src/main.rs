//! Caustic binary
//!
//! Usage: `caustic <parameter-file>`

use std::process::ExitCode;

use caustic_run::{Pipeline, RunConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: caustic <parameter-file>

Runs the halo finder described by a JSON parameter file.
Environment overrides: CAUSTIC_WORKERS, CAUSTIC_OUTPUT_DIR
Log filter: RUST_LOG (default caustic=info)";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "caustic=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let config = match RunConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %path, "cannot load parameter file");
            return ExitCode::from(e.exit_code());
        }
    };
    tracing::info!("Caustic {} - {}", env!("CARGO_PKG_VERSION"), config.model_summary());

    match Pipeline::execute(config).await {
        Ok((output, written)) => {
            tracing::info!(catalogs = output.catalogs.len(), files = written.len(), "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
