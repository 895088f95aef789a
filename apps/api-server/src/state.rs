//! Application state - shared across all handlers.

use std::sync::Arc;

use folio_core::ports::{Clock, SystemClock, TokenService};
use folio_core::services::PostPorts;
use folio_core::{PostService, PostServiceConfig};
use folio_infra::{DatabaseConfig, InMemoryStore};

#[cfg(feature = "auth")]
use folio_infra::{JwtConfig, JwtTokenService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: PostService,
    /// Absent when built without the `auth` feature; authenticated routes
    /// then answer 401.
    pub tokens: Option<Arc<dyn TokenService>>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(db_config: Option<&DatabaseConfig>, posts: PostServiceConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ports = storage_ports(db_config, clock).await;

        #[cfg(feature = "auth")]
        let tokens: Option<Arc<dyn TokenService>> =
            Some(Arc::new(JwtTokenService::new(JwtConfig::from_env())));

        #[cfg(not(feature = "auth"))]
        let tokens: Option<Arc<dyn TokenService>> = {
            tracing::info!("Running without auth feature - write routes are disabled");
            None
        };

        tracing::info!("Application state initialized");

        Self {
            posts: PostService::new(ports, posts),
            tokens,
        }
    }
}

#[cfg(feature = "postgres")]
async fn storage_ports(db_config: Option<&DatabaseConfig>, clock: Arc<dyn Clock>) -> PostPorts {
    let Some(config) = db_config else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return in_memory_ports(clock);
    };

    match folio_infra::database::connect(config).await {
        Ok(db) => folio_infra::database::post_ports(db, clock),
        Err(e) => {
            tracing::error!(
                "Failed to connect to database: {}. Using in-memory fallback.",
                e
            );
            in_memory_ports(clock)
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn storage_ports(db_config: Option<&DatabaseConfig>, clock: Arc<dyn Clock>) -> PostPorts {
    if db_config.is_some() {
        tracing::warn!("DATABASE_URL ignored - built without postgres feature");
    }
    tracing::info!("Running without postgres feature - using in-memory store");
    in_memory_ports(clock)
}

fn in_memory_ports(clock: Arc<dyn Clock>) -> PostPorts {
    Arc::new(InMemoryStore::new()).post_ports(clock)
}
