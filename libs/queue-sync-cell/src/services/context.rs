use std::sync::Arc;

use shared_api::BackendClient;
use shared_config::AppConfig;

use crate::services::resolver::ChannelResolver;
use crate::services::subscription::{LiveCounterSubscription, ReconnectPolicy};
use crate::services::transport::{RealtimeConnector, StompConnector};

/// Everything a queue view needs to talk to the backend.
#[derive(Clone)]
pub struct QueueContext {
    pub config: AppConfig,
    pub client: BackendClient,
    pub connector: Arc<dyn RealtimeConnector>,
}

impl QueueContext {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_connector(config, Arc::new(StompConnector::new(config)))
    }

    pub fn with_connector(config: &AppConfig, connector: Arc<dyn RealtimeConnector>) -> Self {
        Self {
            config: config.clone(),
            client: BackendClient::new(config),
            connector,
        }
    }

    pub fn resolver(&self) -> ChannelResolver {
        ChannelResolver::new(self.client.clone())
    }

    /// A fresh, unopened subscription over this context's connector.
    pub fn subscription(&self) -> LiveCounterSubscription {
        LiveCounterSubscription::new(
            Arc::clone(&self.connector),
            ReconnectPolicy::from_config(&self.config),
        )
    }
}
