use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::nutrition::Macros;

/// A named meal grouping owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Diet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub date: Date,
    pub created_at: OffsetDateTime,
}

/// Diet↔Food association. At most one row per (diet, food); the macro
/// columns cache the portion-scaled values and are rewritten together with
/// every portion change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DietItem {
    pub id: Uuid,
    pub diet_id: Uuid,
    pub food_id: Uuid,
    pub portion_size: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Diet item joined with its food, as read for diet detail responses.
/// Carries both the scaled item macros and the food's per-100 g values so
/// totals can be recomputed rather than trusted from the cache columns.
#[derive(Debug, Clone, FromRow)]
pub struct DietItemDetail {
    pub id: Uuid,
    pub food_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub portion_size: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub food_calories: f64,
    pub food_protein: f64,
    pub food_carbs: f64,
    pub food_fat: f64,
}

impl DietItemDetail {
    pub fn per_100(&self) -> Macros {
        Macros {
            calories: self.food_calories,
            protein: self.food_protein,
            carbs: self.food_carbs,
            fat: self.food_fat,
        }
    }
}
