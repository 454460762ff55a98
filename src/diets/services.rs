use rand::Rng;
use time::Date;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::diets::dto::{
    AddFoodsRequest, DietDetails, DietItemResponse, RemovedFood, UpdatePortionsRequest,
    UpdatedPortion,
};
use crate::diets::engine::{self, PlannedFood};
use crate::diets::repo;
use crate::errors::{AppError, AppResult};
use crate::foods::repo as foods_repo;
use crate::foods::services as foods_services;
use crate::state::AppState;
use crate::tags::search_queries;
use crate::users::repo_types::{Profile, User};

pub const DEFAULT_PORTION_SIZE: f64 = 100.0;

fn diet_cache_key(user_id: Uuid, diet_id: Uuid) -> String {
    format!("diet_totals:{user_id}:{diet_id}")
}

/// Advisory lock key for one user's diet generation. The first eight bytes
/// of the uuid are stable and unique enough to keep two batches for the same
/// user from interleaving.
fn user_lock_key(user_id: Uuid) -> i64 {
    let bytes: [u8; 8] = user_id.as_bytes()[..8].try_into().expect("uuid has 16 bytes");
    i64::from_le_bytes(bytes)
}

/// Generate the default breakfast/lunch/dinner batch for a user.
///
/// Everything runs in one transaction behind a per-user advisory lock:
/// concurrent batches for the same user serialize, and a batch that cannot
/// fill every slot rolls back whole — no empty diet is ever left behind.
#[instrument(skip(state, rng))]
pub async fn generate_default_diets<R: Rng + ?Sized>(
    state: &AppState,
    user_id: Uuid,
    rng: &mut R,
) -> AppResult<Vec<DietDetails>> {
    let mut tx = state.db.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_lock_key(user_id))
        .execute(&mut *tx)
        .await?;

    if User::find_by_id(&mut *tx, user_id).await?.is_none() {
        return Err(AppError::not_found(format!("user {user_id}")));
    }
    let profile = Profile::get_or_create(&mut *tx, user_id).await?;
    let existing = repo::count_by_user(&mut *tx, user_id).await?;
    let catalog = foods_repo::list_all(&mut *tx).await?;

    let queries = search_queries(&profile.preferences.0);
    let slots = engine::slot_specs(existing, &queries, rng);
    let plans = engine::plan_slots(
        catalog,
        &slots,
        &profile.allergies.0,
        state.lookup.as_ref(),
        &state.cache,
        state.config.lookup.max_pages,
        rng,
    )
    .await?;

    let mut created = Vec::with_capacity(plans.len());
    for plan in plans {
        let diet = repo::create(&mut *tx, user_id, &plan.name).await?;
        for planned in plan.foods {
            let food = match planned {
                PlannedFood::Existing(food) => food,
                PlannedFood::Fetched(candidate) => foods_repo::upsert(&mut *tx, &candidate).await?,
            };
            let scaled = food.per_100().scaled(DEFAULT_PORTION_SIZE);
            repo::upsert_item(&mut *tx, diet.id, food.id, DEFAULT_PORTION_SIZE, scaled).await?;
        }
        let items = repo::list_items(&mut *tx, diet.id).await?;
        created.push(DietDetails::build(diet, &items));
    }

    tx.commit().await?;

    for details in &created {
        let key = diet_cache_key(user_id, details.id);
        if let Err(e) = state.cache.set(&key, details, state.cache.default_ttl()).await {
            tracing::debug!(%key, error = %e, "diet cache write failed");
        }
    }

    info!(%user_id, diets = created.len(), "default diet batch generated");
    Ok(created)
}

#[instrument(skip(state))]
pub async fn list_diets(
    state: &AppState,
    user_id: Uuid,
    date: Option<Date>,
) -> AppResult<Vec<DietDetails>> {
    let diets = repo::list_by_user(&state.db, user_id, date).await?;
    let mut out = Vec::with_capacity(diets.len());
    for diet in diets {
        let items = repo::list_items(&state.db, diet.id).await?;
        out.push(DietDetails::build(diet, &items));
    }
    Ok(out)
}

/// Diet detail with recomputed totals, served from the TTL cache when the
/// diet has not been written since the entry was primed.
#[instrument(skip(state))]
pub async fn get_diet(state: &AppState, user_id: Uuid, diet_id: Uuid) -> AppResult<DietDetails> {
    let key = diet_cache_key(user_id, diet_id);
    if let Some(hit) = state.cache.get::<DietDetails>(&key).await {
        return Ok(hit);
    }

    let diet = repo::get_for_user(&state.db, user_id, diet_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("diet {diet_id}")))?;
    let items = repo::list_items(&state.db, diet.id).await?;
    let details = DietDetails::build(diet, &items);

    if let Err(e) = state.cache.set(&key, &details, state.cache.default_ttl()).await {
        tracing::debug!(%key, error = %e, "diet cache write failed");
    }
    Ok(details)
}

#[instrument(skip(state))]
pub async fn delete_diet(state: &AppState, user_id: Uuid, diet_id: Uuid) -> AppResult<Uuid> {
    let deleted = repo::delete(&state.db, user_id, diet_id).await?;
    if !deleted {
        return Err(AppError::not_found(format!("diet {diet_id}")));
    }
    state.cache.remove(&diet_cache_key(user_id, diet_id)).await;
    Ok(diet_id)
}

/// Add foods to a diet by external id, resolving unknown ids through the
/// lookup service. Re-adding a food is not an error: its portion is merged
/// or overwritten and the cached macros rewritten with it.
#[instrument(skip(state, req))]
pub async fn add_foods(
    state: &AppState,
    user_id: Uuid,
    diet_id: Uuid,
    req: AddFoodsRequest,
) -> AppResult<Vec<DietItemResponse>> {
    if req.external_ids.is_empty() {
        return Err(AppError::Validation("external_ids must not be empty".into()));
    }
    if req.portion_size <= 0.0 {
        return Err(AppError::InvalidPortionSize(req.portion_size));
    }
    let diet = repo::get_for_user(&state.db, user_id, diet_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("diet {diet_id}")))?;

    let mut tx = state.db.begin().await?;
    let mut added = Vec::with_capacity(req.external_ids.len());
    for external_id in &req.external_ids {
        let food =
            foods_services::resolve_by_external_id(&mut *tx, state.lookup.as_ref(), external_id)
                .await?;
        let portion = match repo::get_item(&mut *tx, diet.id, food.id).await? {
            Some(existing) if req.merge_quantity => existing.portion_size + req.portion_size,
            _ => req.portion_size,
        };
        let scaled = food.per_100().scaled(portion);
        let item = repo::upsert_item(&mut *tx, diet.id, food.id, portion, scaled).await?;
        added.push(DietItemResponse {
            external_id: food.external_id.clone(),
            name: food.name.clone(),
            portion_size: item.portion_size,
            calories: item.calories,
            protein: item.protein,
            carbs: item.carbs,
            fat: item.fat,
        });
    }
    tx.commit().await?;

    state.cache.remove(&diet_cache_key(user_id, diet_id)).await;
    Ok(added)
}

#[instrument(skip(state))]
pub async fn remove_foods(
    state: &AppState,
    user_id: Uuid,
    diet_id: Uuid,
    external_ids: &[String],
) -> AppResult<Vec<RemovedFood>> {
    if external_ids.is_empty() {
        return Err(AppError::Validation("external_ids must not be empty".into()));
    }
    let diet = repo::get_for_user(&state.db, user_id, diet_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("diet {diet_id}")))?;

    let mut tx = state.db.begin().await?;
    let mut removed = Vec::with_capacity(external_ids.len());
    for external_id in external_ids {
        let food = foods_repo::find_by_external_id(&mut *tx, external_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("food {external_id}")))?;
        if !repo::delete_item(&mut *tx, diet.id, food.id).await? {
            return Err(AppError::not_found(format!(
                "food {external_id} in diet {diet_id}"
            )));
        }
        removed.push(RemovedFood {
            external_id: food.external_id,
            name: food.name,
        });
    }
    tx.commit().await?;

    state.cache.remove(&diet_cache_key(user_id, diet_id)).await;
    Ok(removed)
}

fn validate_portion(portion_size: f64) -> AppResult<()> {
    if portion_size <= 0.0 {
        return Err(AppError::InvalidPortionSize(portion_size));
    }
    Ok(())
}

/// Rewrite portion sizes, uniformly and/or per food. Every requested portion
/// is validated before any row is touched; ids that are not in the catalog
/// or not in the diet are skipped, and a request that matches nothing fails.
#[instrument(skip(state, req))]
pub async fn update_portions(
    state: &AppState,
    user_id: Uuid,
    diet_id: Uuid,
    req: UpdatePortionsRequest,
) -> AppResult<Vec<UpdatedPortion>> {
    if req.external_ids.is_empty() && req.updates.is_empty() {
        return Err(AppError::Validation(
            "external_ids or updates must be provided".into(),
        ));
    }

    let uniform = if req.external_ids.is_empty() {
        None
    } else {
        let portion_size = req.portion_size.ok_or_else(|| {
            AppError::Validation("portion_size is required with external_ids".into())
        })?;
        validate_portion(portion_size)?;
        Some(portion_size)
    };
    for update in &req.updates {
        validate_portion(update.portion_size)?;
    }

    let diet = repo::get_for_user(&state.db, user_id, diet_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("diet {diet_id}")))?;

    let uniform_updates = req
        .external_ids
        .iter()
        .filter_map(|id| uniform.map(|p| (id.clone(), p)));
    let all_updates: Vec<(String, f64)> = uniform_updates
        .chain(req.updates.iter().map(|u| (u.external_id.clone(), u.portion_size)))
        .collect();

    let mut tx = state.db.begin().await?;
    let mut updated = Vec::new();
    for (external_id, portion_size) in all_updates {
        let Some(food) = foods_repo::find_by_external_id(&mut *tx, &external_id).await? else {
            continue;
        };
        let scaled = food.per_100().scaled(portion_size);
        let Some(item) =
            repo::update_item_portion(&mut *tx, diet.id, food.id, portion_size, scaled).await?
        else {
            continue;
        };
        updated.push(UpdatedPortion {
            external_id,
            portion_size: item.portion_size,
        });
    }

    if updated.is_empty() {
        return Err(AppError::not_found(format!(
            "matching foods in diet {diet_id}"
        )));
    }
    tx.commit().await?;

    state.cache.remove(&diet_cache_key(user_id, diet_id)).await;
    Ok(updated)
}
