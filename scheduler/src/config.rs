use envconfig::Envconfig;

use collector::config::{Config, EnvMsDuration};

#[derive(Envconfig, Clone)]
pub struct SchedulerConfig {
    #[envconfig(from = "FETCH_INTERVAL", default = "300000")]
    pub fetch_interval: EnvMsDuration,

    #[envconfig(nested = true)]
    pub collector: Config,
}
