//! Shared application state for all routes. Built once at startup, read-only after.

use crate::auth::{AcceptAnyToken, TokenValidator};
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::rate_limit::RateLimiter;
use crate::registry::ModelRegistry;
use crate::response::Emitter;
use crate::router::ApiRouter;
use crate::routes::register_resource_routes;
use crate::store::StoreProvider;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<dyn StoreProvider>,
    pub registry: Arc<ModelRegistry>,
    pub router: Arc<ApiRouter>,
    pub emitter: Emitter,
    pub auth: Arc<dyn TokenValidator>,
    pub config: Arc<AppConfig>,
    /// Present when `rate_limit_per_minute` is non-zero.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Wire state with the five standard routes for every registered resource.
    pub fn new(
        config: AppConfig,
        registry: ModelRegistry,
        stores: Arc<dyn StoreProvider>,
    ) -> Result<Self, ConfigError> {
        let mut router = ApiRouter::new(&config.base_path);
        register_resource_routes(&mut router, &registry)?;
        let rate_limiter = (config.rate_limit_per_minute > 0)
            .then(|| Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute)));
        Ok(AppState {
            stores,
            registry: Arc::new(registry),
            router: Arc::new(router),
            emitter: Emitter::new(config.is_production(), config.api_version.clone()),
            auth: Arc::new(AcceptAnyToken),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Replace the token policy.
    pub fn with_auth(mut self, auth: impl TokenValidator + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }
}
