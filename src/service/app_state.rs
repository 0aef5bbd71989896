use std::sync::Arc;

use axum::Router;
use cyder_tools::log::warn;

use crate::config::CONFIG;
use crate::provider::ProviderRegistry;

/// Shared immutable state handed to every route handler. Provider adapters
/// are constructed once from the configuration object and never change.
pub struct AppState {
    pub providers: ProviderRegistry,
}

impl AppState {
    pub fn new() -> Self {
        let providers = ProviderRegistry::from_config(&CONFIG.providers, CONFIG.proxy.as_deref());
        if providers.is_empty() {
            warn!("no video providers configured; generation requests will be rejected");
        }
        Self { providers }
    }
}

pub fn create_app_state() -> Arc<AppState> {
    Arc::new(AppState::new())
}

pub type StateRouter = Router<Arc<AppState>>;

pub fn create_state_router() -> StateRouter {
    Router::<Arc<AppState>>::new()
}
