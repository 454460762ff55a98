use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::diets::repo_types::{Diet, DietItemDetail};
use crate::nutrition::{diet_totals, Macros};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietItemResponse {
    pub external_id: String,
    pub name: String,
    pub portion_size: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl From<&DietItemDetail> for DietItemResponse {
    fn from(item: &DietItemDetail) -> Self {
        Self {
            external_id: item.external_id.clone(),
            name: item.name.clone(),
            portion_size: item.portion_size,
            calories: item.calories,
            protein: item.protein,
            carbs: item.carbs,
            fat: item.fat,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietDetails {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub date: Date,
    pub created_at: OffsetDateTime,
    pub items: Vec<DietItemResponse>,
    pub totals: Macros,
}

impl DietDetails {
    /// Build the response shape, recomputing totals from the per-100 g food
    /// values rather than summing the cached item columns.
    pub fn build(diet: Diet, items: &[DietItemDetail]) -> Self {
        let per_100s: Vec<(Macros, f64)> = items
            .iter()
            .map(|item| (item.per_100(), item.portion_size))
            .collect();
        let totals = diet_totals(per_100s.iter().map(|(m, p)| (m, *p)));
        Self {
            id: diet.id,
            name: diet.name,
            image_url: diet.image_url,
            date: diet.date,
            created_at: diet.created_at,
            items: items.iter().map(DietItemResponse::from).collect(),
            totals,
        }
    }
}

fn default_portion() -> f64 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddFoodsRequest {
    pub external_ids: Vec<String>,
    #[serde(default = "default_portion")]
    pub portion_size: f64,
    /// Add to the existing portion instead of overwriting it when the food
    /// is already in the diet.
    #[serde(default)]
    pub merge_quantity: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortionUpdate {
    pub external_id: String,
    pub portion_size: f64,
}

/// Portion rewrite request: either the same portion for a list of foods,
/// individual per-food portions, or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePortionsRequest {
    #[serde(default)]
    pub external_ids: Vec<String>,
    #[serde(default)]
    pub portion_size: Option<f64>,
    #[serde(default)]
    pub updates: Vec<PortionUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedPortion {
    pub external_id: String,
    pub portion_size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedFood {
    pub external_id: String,
    pub name: String,
}
