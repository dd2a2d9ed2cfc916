use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use sleepcca::{logging, run_pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "sleepcca", about = "EEG/EOG canonical correlation across sleep stages")]
struct Args {
    /// TOML config; the `[run]` section selects the steps.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init()?;

    let cfg = PipelineConfig::from_file(&args.config)?;
    tracing::info!(config = %args.config.display(), "configuration loaded");

    run_pipeline(&cfg)
}
