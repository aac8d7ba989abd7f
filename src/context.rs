use std::sync::Arc;

use anyhow::Result;

use crate::api::{HttpIngestApi, IngestApi};
use crate::config::ClientConfig;
use crate::core::{JobMonitor, PersistentJobHandle, PresentationSink};

/// Everything a command needs, built once from the configuration.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ClientConfig>,
    pub api: Arc<dyn IngestApi>,
    pub handle: PersistentJobHandle,
}

impl AppContext {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = HttpIngestApi::new(config.api_base_url()?, config.api_key.clone());
        let handle = PersistentJobHandle::in_dir(&config.state_dir);

        Ok(Self {
            config: Arc::new(config),
            api: Arc::new(api),
            handle,
        })
    }

    pub fn monitor(&self, sink: Arc<dyn PresentationSink>) -> JobMonitor {
        JobMonitor::new(
            self.config.monitor_settings(),
            self.api.clone(),
            self.handle.clone(),
            sink,
        )
    }
}
