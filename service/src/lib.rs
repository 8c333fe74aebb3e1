use config::Config;
use sse::Broker;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, broker: &Arc<Broker>) -> Self {
        Self {
            broker: Arc::clone(broker),
            config: app_config,
        }
    }

    pub fn broker_ref(&self) -> &Broker {
        self.broker.as_ref()
    }
}
