use qteleport::config::ExperimentConfig;
use qteleport::experiments;
use qteleport::logging::init_tracing;
use qteleport::report::print_summary;
use tracing::info;

fn main() -> qteleport::Result<()> {
    let config = ExperimentConfig::load()?;
    init_tracing(&config.logging)?;
    config.log_loaded();
    info!("qteleport starting");

    let summary = experiments::run_all(&config)?;
    print_summary(&summary);
    Ok(())
}
