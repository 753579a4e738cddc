//! Storage implementations.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::StorageConfig;
use crate::interfaces::{CatalogStore, LedgerStore, ReferralStore};

#[cfg(feature = "sqlite")]
pub mod schema;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteCatalogStore, SqliteLedgerStore, SqliteReferralStore};

/// The full set of stores backing the loyalty core.
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub referrals: Arc<dyn ReferralStore>,
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    info!("Storage: {} at {}", config.storage_type, config.path);

    match config.storage_type.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if config.path != ":memory:" {
                if let Some(parent) = std::path::Path::new(&config.path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;

            let ledger = Arc::new(SqliteLedgerStore::new(pool.clone()));
            ledger.init().await?;

            let catalog = Arc::new(SqliteCatalogStore::new(pool.clone()));
            catalog.init().await?;

            let referrals = Arc::new(SqliteReferralStore::new(pool));
            referrals.init().await?;

            Ok(Stores {
                ledger,
                catalog,
                referrals,
            })
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => {
            error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
        other => {
            error!("Unknown storage type: {}", other);
            Err(format!("Unknown storage type: {}", other).into())
        }
    }
}
