use serde::{Deserialize, Serialize};

/// Declared allergy. Anything outside this vocabulary is rejected when a
/// profile payload is deserialized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AllergyTag {
    Dairy,
    Gluten,
    Nuts,
}

/// Dietary preference. Preferences steer which external search query is
/// issued; they never exclude candidates the way allergies do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PreferenceTag {
    Vegetarian,
    Vegan,
    LowSalt,
    HighProtein,
}

impl PreferenceTag {
    /// Search keyword sent to the external food database for this preference.
    pub fn search_keyword(self) -> &'static str {
        match self {
            PreferenceTag::Vegetarian => "vegetarian",
            PreferenceTag::Vegan => "vegan",
            PreferenceTag::LowSalt => "low salt",
            PreferenceTag::HighProtein => "high protein",
        }
    }
}

/// Fallback queries used when a profile declares no preference.
pub const DEFAULT_QUERIES: &[&str] = &["organic", "green dot", "nutriscore"];

/// Search queries for a profile: one keyword per declared preference, or the
/// rotating default list when there are none.
pub fn search_queries(preferences: &[PreferenceTag]) -> Vec<String> {
    if preferences.is_empty() {
        DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        preferences
            .iter()
            .map(|p| p.search_keyword().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_roundtrips_through_serde() {
        let allergies: Vec<AllergyTag> =
            serde_json::from_str(r#"["nuts", "gluten", "dairy"]"#).expect("valid vocab");
        assert_eq!(
            allergies,
            vec![AllergyTag::Nuts, AllergyTag::Gluten, AllergyTag::Dairy]
        );

        let prefs: Vec<PreferenceTag> =
            serde_json::from_str(r#"["vegan", "low-salt", "high-protein"]"#).expect("valid vocab");
        assert_eq!(
            serde_json::to_string(&prefs).unwrap(),
            r#"["vegan","low-salt","high-protein"]"#
        );
    }

    #[test]
    fn out_of_vocabulary_values_are_rejected() {
        assert!(serde_json::from_str::<Vec<AllergyTag>>(r#"["shellfish"]"#).is_err());
        assert!(serde_json::from_str::<Vec<PreferenceTag>>(r#"["keto"]"#).is_err());
    }

    #[test]
    fn queries_follow_preferences_or_defaults() {
        let queries = search_queries(&[PreferenceTag::Vegan, PreferenceTag::HighProtein]);
        assert_eq!(queries, vec!["vegan", "high protein"]);

        let defaults = search_queries(&[]);
        assert_eq!(defaults, vec!["organic", "green dot", "nutriscore"]);
    }
}
