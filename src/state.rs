use std::sync::Arc;

use crate::services::batch_validator::BatchValidator;
use crate::services::portfolio_service::PortfolioService;
use crate::services::retry::RetryPolicy;
use crate::services::validation_cache::ValidationCache;
use crate::store::PortfolioStore;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PortfolioService>,
    pub store: Arc<dyn PortfolioStore>,
    /// `None` when validation caching is disabled.
    pub validation_cache: Option<Arc<ValidationCache>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        validation_cache: Option<Arc<ValidationCache>>,
        bulk_retry: RetryPolicy,
    ) -> Self {
        let validator = BatchValidator::new(validation_cache.clone());
        let service = PortfolioService::new(store.clone(), validator, bulk_retry);

        Self {
            service: Arc::new(service),
            store,
            validation_cache,
        }
    }
}
