use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::Macros;

/// Canonical catalog entry, keyed by the external food database identifier.
/// Created on first lookup, shared across diets, never overwritten by a
/// re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Food {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub contains_nuts: bool,
    pub contains_gluten: bool,
    pub contains_dairy: bool,
    pub categories: sqlx::types::Json<Vec<String>>,
    pub ingredient_tags: sqlx::types::Json<Vec<String>>,
    pub labels: sqlx::types::Json<Vec<String>>,
    pub created_at: OffsetDateTime,
}

impl Food {
    /// Nutrition per 100 g.
    pub fn per_100(&self) -> Macros {
        Macros {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}
