pub mod cache;
pub mod health;
pub mod seasons;
pub mod standings;

use std::sync::Arc;

use crate::services::cache::CacheManager;

/// Shared application state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
}
