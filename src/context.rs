//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    database::{self, Db},
    domain::{
        campaigns::{CampaignsService, PgCampaignsService},
        coupons::{CouponsService, PgCouponsService},
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),
}

#[derive(Clone)]
pub struct AppContext {
    pub campaigns: Arc<dyn CampaignsService>,
    pub coupons: Arc<dyn CouponsService>,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails.
    pub async fn from_database_url(url: &str) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        let db = Db::new(pool);

        Ok(Self {
            campaigns: Arc::new(PgCampaignsService::new(db.clone())),
            coupons: Arc::new(PgCouponsService::new(db)),
        })
    }
}
