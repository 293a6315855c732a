//! Dependencies shared by every controller.
//!
//! Built once at startup and passed to controllers explicitly.

use std::sync::Arc;

use crate::api::{DashboardApi, HttpApi};
use crate::bus::EventBus;
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::store::Store;

pub struct AppContext {
    pub config: DashboardConfig,
    pub api: Arc<dyn DashboardApi>,
    pub store: Arc<Store>,
    pub bus: Arc<EventBus>,
    pub notifier: Notifier,
}

impl AppContext {
    pub fn new(config: DashboardConfig, api: Arc<dyn DashboardApi>) -> Arc<Self> {
        Arc::new(Self {
            config,
            api,
            store: Store::new(),
            bus: Arc::new(EventBus::new()),
            notifier: Notifier::new(),
        })
    }

    /// Context backed by the HTTP API at `config.api_url`.
    pub fn from_config(config: DashboardConfig) -> Result<Arc<Self>> {
        let api: Arc<dyn DashboardApi> = Arc::new(HttpApi::from_config(&config)?);
        Ok(Self::new(config, api))
    }
}
