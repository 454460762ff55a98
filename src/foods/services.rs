use sqlx::postgres::PgConnection;
use tracing::{debug, instrument};

use crate::cache::Cache;
use crate::errors::{AppError, AppResult};
use crate::foods::repo;
use crate::foods::repo_types::Food;
use crate::lookup::{FoodCandidate, NutritionLookup};

/// Results returned per info search.
const INFO_RESULT_LIMIT: usize = 3;

pub(crate) fn search_cache_key(prefix: &str, query: &str) -> String {
    format!("{prefix}:{}", query.trim().to_lowercase().replace(' ', "_"))
}

/// Look up nutrition info for a free-text query, serving repeat queries from
/// the TTL cache instead of the external API.
#[instrument(skip(lookup, cache))]
pub async fn search_food_info(
    lookup: &dyn NutritionLookup,
    cache: &Cache,
    query: &str,
) -> AppResult<Vec<FoodCandidate>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("search query must not be empty".into()));
    }

    let key = search_cache_key("food_info", query);
    if let Some(hit) = cache.get::<Vec<FoodCandidate>>(&key).await {
        debug!(query, "food info served from cache");
        return Ok(hit);
    }

    let found = lookup.search(query, INFO_RESULT_LIMIT, 1).await;
    if found.is_empty() {
        return Err(AppError::not_found(format!("food matching \"{query}\"")));
    }

    if let Err(e) = cache.set(&key, &found, cache.default_ttl()).await {
        debug!(query, error = %e, "food info cache write failed");
    }
    Ok(found)
}

/// Resolve an external id to a catalog row, fetching and persisting the food
/// on first sight (targeted addition).
pub async fn resolve_by_external_id(
    conn: &mut PgConnection,
    lookup: &dyn NutritionLookup,
    external_id: &str,
) -> AppResult<Food> {
    if let Some(food) = repo::find_by_external_id(&mut *conn, external_id).await? {
        return Ok(food);
    }
    match lookup.fetch_by_id(external_id).await {
        Some(candidate) => Ok(repo::upsert(conn, &candidate).await?),
        None => Err(AppError::not_found(format!("food {external_id}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLookup {
        candidates: Vec<FoodCandidate>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NutritionLookup for CountingLookup {
        async fn search(
            &self,
            _query: &str,
            max_results: usize,
            _max_pages: u32,
        ) -> Vec<FoodCandidate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.candidates.iter().take(max_results).cloned().collect()
        }

        async fn fetch_by_id(&self, external_id: &str) -> Option<FoodCandidate> {
            self.candidates
                .iter()
                .find(|c| c.external_id == external_id)
                .cloned()
        }
    }

    fn candidate(id: &str) -> FoodCandidate {
        FoodCandidate {
            external_id: id.to_string(),
            name: format!("food {id}"),
            calories: 52.0,
            protein: 0.3,
            carbs: 14.0,
            fat: 0.2,
            contains_nuts: false,
            contains_gluten: false,
            contains_dairy: false,
            categories: vec![],
            ingredient_tags: vec![],
            labels: vec![],
        }
    }

    #[tokio::test]
    async fn second_search_within_ttl_is_served_from_cache() {
        let lookup = CountingLookup {
            candidates: vec![candidate("1"), candidate("2")],
            calls: AtomicUsize::new(0),
        };
        let cache = Cache::new(16, Duration::from_secs(600));

        let first = search_food_info(&lookup, &cache, "apple").await.unwrap();
        let second = search_food_info(&lookup, &cache, "apple").await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queries_differing_only_in_case_share_an_entry() {
        let lookup = CountingLookup {
            candidates: vec![candidate("1")],
            calls: AtomicUsize::new(0),
        };
        let cache = Cache::new(16, Duration::from_secs(600));

        search_food_info(&lookup, &cache, "Brown Rice").await.unwrap();
        search_food_info(&lookup, &cache, "brown rice").await.unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_queries_are_rejected() {
        let lookup = CountingLookup {
            candidates: vec![],
            calls: AtomicUsize::new(0),
        };
        let cache = Cache::new(16, Duration::from_secs(600));

        let result = search_food_info(&lookup, &cache, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unmatched_queries_report_not_found() {
        let lookup = CountingLookup {
            candidates: vec![],
            calls: AtomicUsize::new(0),
        };
        let cache = Cache::new(16, Duration::from_secs(600));

        let result = search_food_info(&lookup, &cache, "unobtainium").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
