use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::config::LookupConfig;

/// A food record extracted from an external search result, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodCandidate {
    pub external_id: String,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub contains_nuts: bool,
    pub contains_gluten: bool,
    pub contains_dairy: bool,
    pub categories: Vec<String>,
    pub ingredient_tags: Vec<String>,
    pub labels: Vec<String>,
}

/// Outbound port to the external food database.
///
/// Both operations absorb transport failures: `search` returns whatever was
/// accumulated before the failure, `fetch_by_id` returns `None`. Diet
/// generation must not hard-fail because a third party is down.
#[async_trait]
pub trait NutritionLookup: Send + Sync {
    async fn search(&self, query: &str, max_results: usize, max_pages: u32) -> Vec<FoodCandidate>;

    async fn fetch_by_id(&self, external_id: &str) -> Option<FoodCandidate>;
}

// --- OpenFoodFacts wire format ---

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    status: i64,
    product: Option<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProduct {
    code: Option<String>,
    product_name: Option<String>,
    nutriments: Option<Nutriments>,
    #[serde(default)]
    ingredients_tags: Vec<String>,
    #[serde(default)]
    categories_tags: Vec<String>,
    #[serde(default)]
    allergens_tags: Vec<String>,
    #[serde(default)]
    traces_tags: Vec<String>,
    #[serde(default)]
    labels_tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Nutriments {
    #[serde(rename = "energy-kcal", default, deserialize_with = "lenient_f64")]
    energy_kcal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    proteins: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    carbohydrates: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fat: Option<f64>,
}

/// The API serves nutrient values as numbers or numeric strings depending on
/// the product; anything else reads as absent.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

impl RawProduct {
    fn has_tag(&self, tag: &str) -> bool {
        self.ingredients_tags.iter().any(|t| t == tag)
            || self.categories_tags.iter().any(|t| t == tag)
            || self.allergens_tags.iter().any(|t| t == tag)
            || self.traces_tags.iter().any(|t| t == tag)
    }

    /// Normalize into a candidate. Products without a nutriments section or a
    /// product name carry no usable data and are discarded.
    fn into_candidate(self) -> Option<FoodCandidate> {
        let external_id = self.code.as_deref()?.trim();
        if external_id.is_empty() {
            return None;
        }
        let name = self.product_name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        let nutriments = self.nutriments.as_ref()?;

        Some(FoodCandidate {
            external_id: external_id.to_string(),
            name: name.to_string(),
            calories: nutriments.energy_kcal.unwrap_or(0.0).max(0.0),
            protein: nutriments.proteins.unwrap_or(0.0).max(0.0),
            carbs: nutriments.carbohydrates.unwrap_or(0.0).max(0.0),
            fat: nutriments.fat.unwrap_or(0.0).max(0.0),
            contains_nuts: self.has_tag("en:nuts"),
            contains_gluten: self.has_tag("en:gluten"),
            contains_dairy: self.has_tag("en:dairy"),
            categories: self.categories_tags,
            ingredient_tags: self.ingredients_tags,
            labels: self.labels_tags,
        })
    }
}

/// Production lookup against the OpenFoodFacts HTTP API.
pub struct OpenFoodFactsClient {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl OpenFoodFactsClient {
    pub fn new(config: &LookupConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    async fn fetch_page(&self, query: &str, page: u32) -> anyhow::Result<SearchPage> {
        let url = format!("{}/cgi/search.pl", self.base_url);
        let page_size = self.page_size.to_string();
        let page_str = page.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
                ("page", page_str.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<SearchPage>().await?)
    }
}

#[async_trait]
impl NutritionLookup for OpenFoodFactsClient {
    async fn search(&self, query: &str, max_results: usize, max_pages: u32) -> Vec<FoodCandidate> {
        let mut found = Vec::new();

        for page in 1..=max_pages {
            let raw = match self.fetch_page(query, page).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(query, page, error = %e, "food search failed, returning partial results");
                    break;
                }
            };

            if raw.products.is_empty() {
                break;
            }

            let before = found.len();
            for product in raw.products {
                if let Some(candidate) = product.into_candidate() {
                    found.push(candidate);
                    if found.len() >= max_results {
                        debug!(query, count = found.len(), "food search complete");
                        return found;
                    }
                }
            }
            // A page of nothing but invalid products means the tail of the
            // result set; stop paging.
            if found.len() == before {
                break;
            }
        }

        debug!(query, count = found.len(), "food search complete");
        found
    }

    async fn fetch_by_id(&self, external_id: &str) -> Option<FoodCandidate> {
        let url = format!("{}/api/v0/product/{}.json", self.base_url, external_id);
        let page = match self.http.get(&url).send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => match response.json::<ProductPage>().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(external_id, error = %e, "product payload undecodable");
                    return None;
                }
            },
            Err(e) => {
                warn!(external_id, error = %e, "product fetch failed");
                return None;
            }
        };

        if page.status != 1 {
            return None;
        }
        page.product.and_then(RawProduct::into_candidate)
    }
}
