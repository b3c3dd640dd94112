//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::cache::Cache;
use crate::config::{JwtConfig, Settings};
use crate::db::CrmStore;
use crate::middleware::RateLimiter;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// CRM datastore (PostgreSQL or in-memory)
    pub store: Arc<dyn CrmStore>,

    /// Redis connection; absent only in tests
    pub cache: Option<Cache>,

    /// Token signing secrets and lifetimes
    pub jwt: JwtConfig,

    pub limiter: RateLimiter,

    /// Deployment environment reported by `/health`
    pub environment: String,
}

impl AppState {
    pub fn new(store: Arc<dyn CrmStore>, cache: Option<Cache>, settings: &Settings) -> Self {
        Self {
            store,
            cache,
            jwt: settings.jwt.clone(),
            limiter: RateLimiter::new(&settings.rate_limit),
            environment: settings.server.environment.clone(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
