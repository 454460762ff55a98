use serde::{Deserialize, Serialize};

/// The four tracked macros. Values are per 100 g on a `Food` and absolute
/// (already scaled) on a diet item or a diet total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    /// Scale per-100 g values to a portion size in grams.
    pub fn scaled(&self, portion_size: f64) -> Macros {
        let factor = portion_size / 100.0;
        Macros {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    pub fn add(&mut self, other: &Macros) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
    }
}

/// Aggregate nutrition for a diet, recomputed from the per-100 g food values
/// at every call. The cached per-item columns exist for fast item reads and
/// are refreshed on portion writes, but totals never trust them.
pub fn diet_totals<'a, I>(items: I) -> Macros
where
    I: IntoIterator<Item = (&'a Macros, f64)>,
{
    let mut totals = Macros::default();
    for (per_100, portion_size) in items {
        totals.add(&per_100.scaled(portion_size));
    }
    totals
}
