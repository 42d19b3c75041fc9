use std::process::ExitCode;

use envconfig::Envconfig;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use collector::config::Config;
use collector::pipeline::{collect, RunStatus};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    let report = collect(&config).await;
    info!("{}", report.summary());

    match report.status() {
        RunStatus::Failed => ExitCode::FAILURE,
        RunStatus::Success | RunStatus::Partial => ExitCode::SUCCESS,
    }
}
