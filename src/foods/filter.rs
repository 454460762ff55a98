use crate::foods::repo_types::Food;
use crate::lookup::FoodCandidate;
use crate::tags::AllergyTag;

/// Anything carrying the three allergen flags, whether persisted or freshly
/// fetched.
pub trait AllergenFlags {
    fn contains(&self, allergy: AllergyTag) -> bool;
}

impl AllergenFlags for Food {
    fn contains(&self, allergy: AllergyTag) -> bool {
        match allergy {
            AllergyTag::Nuts => self.contains_nuts,
            AllergyTag::Gluten => self.contains_gluten,
            AllergyTag::Dairy => self.contains_dairy,
        }
    }
}

impl AllergenFlags for FoodCandidate {
    fn contains(&self, allergy: AllergyTag) -> bool {
        match allergy {
            AllergyTag::Nuts => self.contains_nuts,
            AllergyTag::Gluten => self.contains_gluten,
            AllergyTag::Dairy => self.contains_dairy,
        }
    }
}

/// Hard exclusion: a food is allowed only if none of the declared allergies
/// has its flag set. Applied to every candidate regardless of source.
pub fn allowed<F: AllergenFlags>(food: &F, allergies: &[AllergyTag]) -> bool {
    allergies.iter().all(|a| !food.contains(*a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(nuts: bool, gluten: bool, dairy: bool) -> FoodCandidate {
        FoodCandidate {
            external_id: "x".into(),
            name: "x".into(),
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            contains_nuts: nuts,
            contains_gluten: gluten,
            contains_dairy: dairy,
            categories: vec![],
            ingredient_tags: vec![],
            labels: vec![],
        }
    }

    #[test]
    fn no_allergies_allows_everything() {
        assert!(allowed(&candidate(true, true, true), &[]));
    }

    #[test]
    fn any_matching_flag_excludes() {
        let nutty = candidate(true, false, false);
        assert!(!allowed(&nutty, &[AllergyTag::Nuts]));
        assert!(!allowed(&nutty, &[AllergyTag::Dairy, AllergyTag::Nuts]));
        assert!(allowed(&nutty, &[AllergyTag::Gluten, AllergyTag::Dairy]));
    }

    #[test]
    fn clean_food_passes_every_allergy() {
        let clean = candidate(false, false, false);
        assert!(allowed(
            &clean,
            &[AllergyTag::Nuts, AllergyTag::Gluten, AllergyTag::Dairy]
        ));
    }
}
