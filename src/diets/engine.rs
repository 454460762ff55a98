use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::errors::{AppError, AppResult};
use crate::foods::filter::allowed;
use crate::foods::repo_types::Food;
use crate::foods::services::search_cache_key;
use crate::lookup::{FoodCandidate, NutritionLookup};
use crate::tags::AllergyTag;

/// Foods targeted per generated diet.
pub const SLOT_FOOD_TARGET: usize = 3;
/// Diets generated per batch.
pub const BATCH_SIZE: usize = 3;
/// Candidates pulled from the external API per top-up query.
const CANDIDATE_FETCH_LIMIT: usize = 5;

const DEFAULT_SLOT_NAMES: [&str; BATCH_SIZE] = ["breakfast diet", "lunch diet", "dinner diet"];

/// One diet to be generated: its name and the external search query drawn
/// for it. A query is drawn per slot, not per batch.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub query: String,
}

/// A food chosen for a slot: either already in the catalog or freshly
/// fetched and still to be persisted.
#[derive(Debug, Clone)]
pub enum PlannedFood {
    Existing(Food),
    Fetched(FoodCandidate),
}

impl PlannedFood {
    pub fn external_id(&self) -> &str {
        match self {
            PlannedFood::Existing(food) => &food.external_id,
            PlannedFood::Fetched(candidate) => &candidate.external_id,
        }
    }
}

#[derive(Debug)]
pub struct SlotPlan {
    pub name: String,
    pub foods: Vec<PlannedFood>,
}

/// Name the batch's slots and draw a query for each. Users who already own
/// three or more diets get numbered "extra diet" names instead of a second
/// breakfast/lunch/dinner set.
pub fn slot_specs<R: Rng + ?Sized>(
    existing_diets: i64,
    queries: &[String],
    rng: &mut R,
) -> Vec<SlotSpec> {
    (0..BATCH_SIZE)
        .map(|i| {
            let name = if existing_diets >= BATCH_SIZE as i64 {
                format!("extra diet {}", existing_diets - BATCH_SIZE as i64 + 1 + i as i64)
            } else {
                DEFAULT_SLOT_NAMES[i].to_string()
            };
            let query = queries
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| "organic".to_string());
            SlotSpec { name, query }
        })
        .collect()
}

/// Search memoized through the TTL cache, unfiltered: the same query from a
/// user with different allergies must be able to reuse the entry.
async fn cached_search(
    lookup: &dyn NutritionLookup,
    cache: &Cache,
    query: &str,
    max_pages: u32,
) -> Vec<FoodCandidate> {
    let key = search_cache_key("food_search", query);
    if let Some(hit) = cache.get::<Vec<FoodCandidate>>(&key).await {
        debug!(query, count = hit.len(), "food search served from cache");
        return hit;
    }
    let found = lookup.search(query, CANDIDATE_FETCH_LIMIT, max_pages).await;
    if !found.is_empty() {
        if let Err(e) = cache.set(&key, &found, cache.default_ttl()).await {
            warn!(query, error = %e, "food search cache write failed");
        }
    }
    found
}

/// Distribute foods across the batch's slots.
///
/// A shared pool starts from the allergy-filtered catalog. Each slot tops the
/// pool up from the external API when it holds fewer than the target, then
/// draws its foods at random without replacement. A food drawn for one slot
/// is gone from the pool, so no food lands in two diets of the same batch.
/// When the pool runs low, each slot draws less than the target so that every
/// later slot still gets at least one food; only an exhausted pool fails the
/// batch.
pub async fn plan_slots<R: Rng + ?Sized>(
    catalog: Vec<Food>,
    slots: &[SlotSpec],
    allergies: &[AllergyTag],
    lookup: &dyn NutritionLookup,
    cache: &Cache,
    max_pages: u32,
    rng: &mut R,
) -> AppResult<Vec<SlotPlan>> {
    let mut available: Vec<PlannedFood> = catalog
        .into_iter()
        .filter(|food| allowed(food, allergies))
        .map(PlannedFood::Existing)
        .collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut plans = Vec::with_capacity(slots.len());

    for (i, slot) in slots.iter().enumerate() {
        if available.len() < SLOT_FOOD_TARGET {
            let fetched = cached_search(lookup, cache, &slot.query, max_pages).await;
            let known: HashSet<String> = available
                .iter()
                .map(|f| f.external_id().to_string())
                .collect();
            for candidate in fetched {
                if !allowed(&candidate, allergies)
                    || used.contains(&candidate.external_id)
                    || known.contains(&candidate.external_id)
                {
                    continue;
                }
                available.push(PlannedFood::Fetched(candidate));
            }
        }

        if available.is_empty() {
            warn!(slot = %slot.name, "no eligible foods left for slot");
            return Err(AppError::NoEligibleFood);
        }

        let slots_after = slots.len() - i - 1;
        let take = available
            .len()
            .saturating_sub(slots_after)
            .max(1)
            .min(SLOT_FOOD_TARGET);

        let mut indices = rand::seq::index::sample(rng, available.len(), take).into_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let chosen: Vec<PlannedFood> = indices
            .into_iter()
            .map(|idx| available.swap_remove(idx))
            .collect();

        used.extend(chosen.iter().map(|f| f.external_id().to_string()));
        debug!(slot = %slot.name, query = %slot.query, foods = chosen.len(), "slot planned");
        plans.push(SlotPlan {
            name: slot.name.clone(),
            foods: chosen,
        });
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    struct StaticLookup {
        candidates: Vec<FoodCandidate>,
        calls: AtomicUsize,
    }

    impl StaticLookup {
        fn new(candidates: Vec<FoodCandidate>) -> Self {
            Self {
                candidates,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NutritionLookup for StaticLookup {
        async fn search(&self, _query: &str, max_results: usize, _max_pages: u32) -> Vec<FoodCandidate> {
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

    fn candidate(id: &str, gluten: bool, nuts: bool) -> FoodCandidate {
        FoodCandidate {
            external_id: id.to_string(),
            name: format!("food {id}"),
            calories: 100.0,
            protein: 5.0,
            carbs: 20.0,
            fat: 2.0,
            contains_nuts: nuts,
            contains_gluten: gluten,
            contains_dairy: false,
            categories: vec![],
            ingredient_tags: vec![],
            labels: vec![],
        }
    }

    fn food(id: &str, nuts: bool) -> Food {
        Food {
            id: Uuid::new_v4(),
            external_id: id.to_string(),
            name: format!("food {id}"),
            calories: 100.0,
            protein: 5.0,
            carbs: 20.0,
            fat: 2.0,
            contains_nuts: nuts,
            contains_gluten: false,
            contains_dairy: false,
            categories: sqlx::types::Json(vec![]),
            ingredient_tags: sqlx::types::Json(vec![]),
            labels: sqlx::types::Json(vec![]),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn cache() -> Cache {
        Cache::new(64, Duration::from_secs(600))
    }

    fn slots() -> Vec<SlotSpec> {
        let queries = vec!["organic".to_string()];
        slot_specs(0, &queries, &mut StdRng::seed_from_u64(7))
    }

    #[tokio::test]
    async fn no_food_repeats_across_the_batch() {
        let catalog: Vec<Food> = (0..12).map(|i| food(&format!("f{i}"), false)).collect();
        let lookup = StaticLookup::new(vec![]);
        let mut rng = StdRng::seed_from_u64(42);

        let plans = plan_slots(catalog, &slots(), &[], &lookup, &cache(), 1, &mut rng)
            .await
            .expect("batch plans");

        assert_eq!(plans.len(), 3);
        let mut seen = HashSet::new();
        for plan in &plans {
            assert!(!plan.foods.is_empty());
            assert!(plan.foods.len() <= SLOT_FOOD_TARGET);
            for food in &plan.foods {
                assert!(seen.insert(food.external_id().to_string()), "food assigned twice");
            }
        }
        // Catalog was plentiful, so every slot reached the target.
        assert_eq!(seen.len(), 9);
    }

    #[tokio::test]
    async fn allergic_users_never_get_flagged_foods_from_either_source() {
        let catalog = vec![food("db-nutty", true), food("db-clean", false)];
        let lookup = StaticLookup::new(vec![
            candidate("api-nutty", false, true),
            candidate("api-clean-1", false, false),
            candidate("api-clean-2", false, false),
            candidate("api-clean-3", false, false),
        ]);
        let mut rng = StdRng::seed_from_u64(3);

        let plans = plan_slots(
            catalog,
            &slots(),
            &[AllergyTag::Nuts],
            &lookup,
            &cache(),
            1,
            &mut rng,
        )
        .await
        .expect("batch plans");

        for plan in &plans {
            for food in &plan.foods {
                assert!(!food.external_id().contains("nutty"), "nut-flagged food selected");
            }
        }
    }

    #[tokio::test]
    async fn empty_catalog_is_filled_from_search_and_spread_over_all_slots() {
        // Five gluten-free candidates, gluten-allergic user, empty catalog:
        // three diets come back, no food twice, nothing flagged.
        let lookup = StaticLookup::new(vec![
            candidate("a", false, false),
            candidate("b", false, false),
            candidate("c", false, false),
            candidate("d", false, false),
            candidate("e", false, false),
        ]);
        let mut rng = StdRng::seed_from_u64(11);

        let plans = plan_slots(
            vec![],
            &slots(),
            &[AllergyTag::Gluten],
            &lookup,
            &cache(),
            1,
            &mut rng,
        )
        .await
        .expect("batch plans");

        assert_eq!(plans.len(), 3);
        let mut seen = HashSet::new();
        for plan in &plans {
            assert!(!plan.foods.is_empty());
            assert!(plan.foods.len() <= SLOT_FOOD_TARGET);
            for food in &plan.foods {
                assert!(seen.insert(food.external_id().to_string()));
            }
        }
        assert!(seen.len() <= 5);
    }

    #[tokio::test]
    async fn gluten_flagged_candidates_are_dropped_before_assignment() {
        let lookup = StaticLookup::new(vec![
            candidate("gf-1", false, false),
            candidate("wheat", true, false),
            candidate("gf-2", false, false),
            candidate("gf-3", false, false),
        ]);
        let mut rng = StdRng::seed_from_u64(5);

        let plans = plan_slots(
            vec![],
            &slots(),
            &[AllergyTag::Gluten],
            &lookup,
            &cache(),
            1,
            &mut rng,
        )
        .await
        .expect("batch plans");

        for plan in &plans {
            for food in &plan.foods {
                assert_ne!(food.external_id(), "wheat");
            }
        }
    }

    #[tokio::test]
    async fn batch_fails_when_nothing_is_eligible() {
        // Everything the API offers is flagged for this user.
        let lookup = StaticLookup::new(vec![candidate("wheat", true, false)]);
        let mut rng = StdRng::seed_from_u64(2);

        let result = plan_slots(
            vec![],
            &slots(),
            &[AllergyTag::Gluten],
            &lookup,
            &cache(),
            1,
            &mut rng,
        )
        .await;

        assert!(matches!(result, Err(AppError::NoEligibleFood)));
    }

    #[tokio::test]
    async fn repeated_queries_within_ttl_hit_the_cache() {
        let lookup = StaticLookup::new(vec![
            candidate("a", false, false),
            candidate("b", false, false),
            candidate("c", false, false),
        ]);
        let cache = cache();
        let mut rng = StdRng::seed_from_u64(9);

        // Three slots, same query, short supply: every slot tops up, but the
        // external API is asked once.
        let plans = plan_slots(vec![], &slots(), &[], &lookup, &cache, 1, &mut rng)
            .await
            .expect("batch plans");

        assert_eq!(plans.len(), 3);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn extra_diets_are_numbered_after_the_defaults() {
        let queries = vec!["vegan".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        let defaults = slot_specs(0, &queries, &mut rng);
        assert_eq!(
            defaults.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["breakfast diet", "lunch diet", "dinner diet"]
        );
        assert!(defaults.iter().all(|s| s.query == "vegan"));

        let extras = slot_specs(3, &queries, &mut rng);
        assert_eq!(
            extras.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["extra diet 1", "extra diet 2", "extra diet 3"]
        );

        let later = slot_specs(6, &queries, &mut rng);
        assert_eq!(later[0].name, "extra diet 4");
    }
}
