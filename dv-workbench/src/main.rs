use crate::config::cli::CliOpt;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod simulation;
mod util;

fn main() -> anyhow::Result<()> {
    let options = CliOpt::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(simulation::run(&options))
}
