use config::Config;
use fanout::{Manager, SessionSettings};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub fanout: Arc<Manager>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        let settings = SessionSettings {
            timeout: app_config.session_timeout(),
            queue_capacity: app_config.outbound_queue_capacity,
            close_grace: app_config.close_grace(),
        };

        info!(
            "Session settings: timeout={}s, queue_capacity={}, close_grace={}s",
            settings.timeout.as_secs(),
            settings.queue_capacity,
            settings.close_grace.as_secs()
        );

        Self {
            fanout: Arc::new(Manager::new(settings)),
            config: app_config,
        }
    }

    pub fn fanout_ref(&self) -> &Manager {
        self.fanout.as_ref()
    }
}
