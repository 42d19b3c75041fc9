//! Local timer wrapper around the single-run collection entry point. The
//! pipeline lives entirely in the collector crate; this loop only decides
//! when to invoke it.

use envconfig::Envconfig;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use collector::pipeline::collect;

mod config;

use config::SchedulerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = SchedulerConfig::init_from_env().expect("Invalid configuration:");
    info!(
        "scheduling a collection run every {:?}",
        config.fetch_interval.0
    );

    let mut interval = tokio::time::interval(config.fetch_interval.0);
    // Runs never overlap: each tick awaits the full run. A run outlasting
    // the interval delays the next tick instead of stacking up.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = collect(&config.collector).await;
                info!("{}", report.summary());
            }
            _ = signal::ctrl_c() => {
                info!("scheduler stopped");
                break;
            }
        }
    }
}
