//! Application state management

use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::config::Config;
use crate::error::Result;
use crate::storage::Storage;
use crate::transfer::TransferService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    transfer: TransferService,
    admission: AdmissionController,
}

impl AppState {
    /// Open storage under the configured root and size the admission pools.
    pub async fn new(config: Config) -> Result<Self> {
        let storage = Storage::open(&config.storage.root).await?;
        let admission = AdmissionController::from_config(&config.limits);
        Ok(Self::with_parts(config, TransferService::new(storage), admission))
    }

    pub fn with_parts(
        config: Config,
        transfer: TransferService,
        admission: AdmissionController,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                transfer,
                admission,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the transfer service
    pub fn transfer(&self) -> &TransferService {
        &self.inner.transfer
    }

    /// Get the admission controller
    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }
}
