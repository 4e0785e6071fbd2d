//! # Depot State
//!
//! The handle every command receives: the database plus the engine settings
//! taken from [`DepotConfig`].
//!
//! The `Database` inside is a pool, so the state is cheap to clone and safe
//! to share between tasks.

use tracing::info;

use crate::config::{DepotConfig, PaginationSettings};
use crate::error::ApiError;
use depot_core::Pagination;
use depot_db::Database;

#[derive(Debug, Clone)]
pub struct DepotState {
    db: Database,
    pages: PaginationSettings,
}

impl DepotState {
    /// Wraps an already connected database with default settings.
    pub fn new(db: Database) -> Self {
        DepotState {
            db,
            pages: PaginationSettings::default(),
        }
    }

    /// Connects the database described by `config` and runs migrations.
    pub async fn open(config: &DepotConfig) -> Result<Self, ApiError> {
        let db_config = config
            .to_db_config()
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let db = Database::new(db_config).await?;
        info!("Depot state initialized");

        Ok(DepotState {
            db,
            pages: config.pagination.clone(),
        })
    }

    /// Returns a reference to the inner Database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Builds a page window from optional caller input.
    pub fn page(&self, limit: Option<u32>, offset: Option<u32>) -> Pagination {
        let limit = limit
            .unwrap_or(self.pages.default_page_size)
            .clamp(1, self.pages.max_page_size);
        Pagination::new(limit, offset.unwrap_or(0))
    }
}
