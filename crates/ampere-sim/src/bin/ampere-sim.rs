//! Ampere scenario runner
//!
//! Runs a scenario on a real-time tick interval and prints JSON snapshots,
//! one per line.
//!
//! Usage: `ampere-sim [scenario] [ticks]`, everything else from `AMPERE_SIM_*`
//! and `AMPERE_*` environment variables.

use std::env;

use ampere_sim::{Simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ampere_sim=info,ampere_grid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = SimulationConfig::from_env()?;
    let args: Vec<String> = env::args().collect();
    if let Some(scenario) = args.get(1) {
        config.scenario = scenario.parse()?;
    }
    if let Some(ticks) = args.get(2) {
        config.ticks = ticks.parse()?;
    }

    tracing::info!(
        "running {:?} for {} ticks every {} ms (seed {})",
        config.scenario,
        config.ticks,
        config.tick_interval_ms,
        config.seed
    );

    let mut sim = Simulation::new(config)?;
    let mut failed = None;
    sim.run_paced(|snapshot| match snapshot.to_json() {
        Ok(line) => println!("{}", line),
        Err(e) => failed = Some(e),
    })
    .await?;
    if let Some(e) = failed {
        return Err(e.into());
    }

    tracing::info!("done: {} events recorded", sim.event_count());
    Ok(())
}
