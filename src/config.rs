use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub lookup: LookupConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let lookup = LookupConfig {
            base_url: std::env::var("FOOD_API_BASE_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org".into()),
            timeout_secs: std::env::var("FOOD_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            page_size: std::env::var("FOOD_API_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(24),
            max_pages: std::env::var("FOOD_API_MAX_PAGES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        };
        let cache = CacheConfig {
            max_entries: std::env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1000),
            ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(600),
        };
        Ok(Self {
            database_url,
            lookup,
            cache,
        })
    }
}
