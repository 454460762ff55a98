use sqlx::postgres::PgConnection;
use sqlx::PgExecutor;
use time::Date;
use uuid::Uuid;

use crate::diets::repo_types::{Diet, DietItem, DietItemDetail};
use crate::nutrition::Macros;

const DIET_COLUMNS: &str = "id, user_id, name, image_url, date, created_at";
const ITEM_COLUMNS: &str =
    "id, diet_id, food_id, portion_size, calories, protein, carbs, fat, created_at, updated_at";

pub async fn create<'e>(db: impl PgExecutor<'e>, user_id: Uuid, name: &str) -> sqlx::Result<Diet> {
    sqlx::query_as::<_, Diet>(&format!(
        "INSERT INTO diets (user_id, name) VALUES ($1, $2) RETURNING {DIET_COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(db)
    .await
}

pub async fn list_by_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    date: Option<Date>,
) -> sqlx::Result<Vec<Diet>> {
    sqlx::query_as::<_, Diet>(&format!(
        r#"
        SELECT {DIET_COLUMNS}
        FROM diets
        WHERE user_id = $1 AND ($2::date IS NULL OR date = $2)
        ORDER BY created_at
        "#
    ))
    .bind(user_id)
    .bind(date)
    .fetch_all(db)
    .await
}

/// Scoped to the owner: another user's diet id reads as absent.
pub async fn get_for_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    diet_id: Uuid,
) -> sqlx::Result<Option<Diet>> {
    sqlx::query_as::<_, Diet>(&format!(
        "SELECT {DIET_COLUMNS} FROM diets WHERE id = $1 AND user_id = $2"
    ))
    .bind(diet_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn count_by_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM diets WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await
}

/// Cascade removes the diet's items. Returns false when the diet does not
/// exist for this user.
pub async fn delete<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    diet_id: Uuid,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM diets WHERE id = $1 AND user_id = $2")
        .bind(diet_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_items<'e>(
    db: impl PgExecutor<'e>,
    diet_id: Uuid,
) -> sqlx::Result<Vec<DietItemDetail>> {
    sqlx::query_as::<_, DietItemDetail>(
        r#"
        SELECT di.id, di.food_id, f.external_id, f.name,
               di.portion_size, di.calories, di.protein, di.carbs, di.fat,
               f.calories AS food_calories, f.protein AS food_protein,
               f.carbs AS food_carbs, f.fat AS food_fat
        FROM diet_items di
        JOIN foods f ON f.id = di.food_id
        WHERE di.diet_id = $1
        ORDER BY di.created_at
        "#,
    )
    .bind(diet_id)
    .fetch_all(db)
    .await
}

pub async fn get_item<'e>(
    db: impl PgExecutor<'e>,
    diet_id: Uuid,
    food_id: Uuid,
) -> sqlx::Result<Option<DietItem>> {
    sqlx::query_as::<_, DietItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM diet_items WHERE diet_id = $1 AND food_id = $2"
    ))
    .bind(diet_id)
    .bind(food_id)
    .fetch_optional(db)
    .await
}

/// Insert or update the (diet, food) association in one statement. The
/// unique constraint turns a duplicate add into a portion rewrite, and the
/// scaled macro columns always travel with the portion.
pub async fn upsert_item(
    conn: &mut PgConnection,
    diet_id: Uuid,
    food_id: Uuid,
    portion_size: f64,
    scaled: Macros,
) -> sqlx::Result<DietItem> {
    sqlx::query_as::<_, DietItem>(&format!(
        r#"
        INSERT INTO diet_items (diet_id, food_id, portion_size, calories, protein, carbs, fat)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (diet_id, food_id) DO UPDATE
        SET portion_size = EXCLUDED.portion_size,
            calories     = EXCLUDED.calories,
            protein      = EXCLUDED.protein,
            carbs        = EXCLUDED.carbs,
            fat          = EXCLUDED.fat,
            updated_at   = now()
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(diet_id)
    .bind(food_id)
    .bind(portion_size)
    .bind(scaled.calories)
    .bind(scaled.protein)
    .bind(scaled.carbs)
    .bind(scaled.fat)
    .fetch_one(conn)
    .await
}

/// Rewrite an existing item's portion and cached macros. Returns `None` when
/// the food is not part of the diet.
pub async fn update_item_portion(
    conn: &mut PgConnection,
    diet_id: Uuid,
    food_id: Uuid,
    portion_size: f64,
    scaled: Macros,
) -> sqlx::Result<Option<DietItem>> {
    sqlx::query_as::<_, DietItem>(&format!(
        r#"
        UPDATE diet_items
        SET portion_size = $3, calories = $4, protein = $5, carbs = $6, fat = $7,
            updated_at = now()
        WHERE diet_id = $1 AND food_id = $2
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(diet_id)
    .bind(food_id)
    .bind(portion_size)
    .bind(scaled.calories)
    .bind(scaled.protein)
    .bind(scaled.carbs)
    .bind(scaled.fat)
    .fetch_optional(conn)
    .await
}

pub async fn delete_item(
    conn: &mut PgConnection,
    diet_id: Uuid,
    food_id: Uuid,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM diet_items WHERE diet_id = $1 AND food_id = $2")
        .bind(diet_id)
        .bind(food_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
