use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::lookup::{NutritionLookup, OpenFoodFactsClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub lookup: Arc<dyn NutritionLookup>,
    pub cache: Cache,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let lookup =
            Arc::new(OpenFoodFactsClient::new(&config.lookup)?) as Arc<dyn NutritionLookup>;
        let cache = Cache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.ttl_secs),
        );

        Ok(Self {
            db,
            config,
            lookup,
            cache,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        lookup: Arc<dyn NutritionLookup>,
        cache: Cache,
    ) -> Self {
        Self {
            db,
            config,
            lookup,
            cache,
        }
    }
}
