use sqlx::postgres::PgConnection;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::foods::repo_types::Food;
use crate::lookup::FoodCandidate;

const FOOD_COLUMNS: &str = "id, external_id, name, calories, protein, carbs, fat, \
     contains_nuts, contains_gluten, contains_dairy, categories, ingredient_tags, labels, \
     created_at";

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<Food>> {
    sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_by_external_id<'e>(
    db: impl PgExecutor<'e>,
    external_id: &str,
) -> sqlx::Result<Option<Food>> {
    sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(db)
    .await
}

pub async fn list_all<'e>(db: impl PgExecutor<'e>) -> sqlx::Result<Vec<Food>> {
    sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods ORDER BY created_at"
    ))
    .fetch_all(db)
    .await
}

/// Get-or-create a single catalog row.
///
/// `ON CONFLICT DO NOTHING` keeps the first writer's data; the second writer
/// gets no row back and falls through to a read. Existing nutrition is never
/// clobbered by a re-fetch.
pub async fn upsert(conn: &mut PgConnection, candidate: &FoodCandidate) -> sqlx::Result<Food> {
    let inserted = sqlx::query_as::<_, Food>(&format!(
        r#"
        INSERT INTO foods
            (external_id, name, calories, protein, carbs, fat,
             contains_nuts, contains_gluten, contains_dairy,
             categories, ingredient_tags, labels)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (external_id) DO NOTHING
        RETURNING {FOOD_COLUMNS}
        "#
    ))
    .bind(&candidate.external_id)
    .bind(&candidate.name)
    .bind(candidate.calories)
    .bind(candidate.protein)
    .bind(candidate.carbs)
    .bind(candidate.fat)
    .bind(candidate.contains_nuts)
    .bind(candidate.contains_gluten)
    .bind(candidate.contains_dairy)
    .bind(sqlx::types::Json(&candidate.categories))
    .bind(sqlx::types::Json(&candidate.ingredient_tags))
    .bind(sqlx::types::Json(&candidate.labels))
    .fetch_optional(&mut *conn)
    .await?;

    match inserted {
        Some(food) => Ok(food),
        None => {
            // Lost the race (or the row predates us): read the winner.
            find_by_external_id(&mut *conn, &candidate.external_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)
        }
    }
}

/// Get-or-create for a batch of candidates, in input order.
pub async fn upsert_many(
    conn: &mut PgConnection,
    candidates: &[FoodCandidate],
) -> sqlx::Result<Vec<Food>> {
    let mut foods = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        foods.push(upsert(conn, candidate).await?);
    }
    Ok(foods)
}
