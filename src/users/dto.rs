use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{
    timestamp, DietPreferences, DietType, IngredientEntry, MealPlans, NutritionEntry,
};

/// A user's record as shown to its owner: everything except credentials.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "timestamp::serialize")]
    pub last_login: OffsetDateTime,
    pub ingredients: Vec<IngredientEntry>,
    pub nutrition_log: Vec<NutritionEntry>,
    pub meal_plans: MealPlans,
    pub diet_preferences: DietPreferences,
    pub statistics: ProfileStatistics,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ProfileStatistics {
    pub ingredient_count: usize,
    pub nutrition_entries: usize,
    pub meal_plans_count: usize,
    pub account_age_days: i64,
}

/// Partial update of diet preferences; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub diet_type: Option<DietType>,
    pub calorie_target: Option<f64>,
    pub allergies: Option<BTreeSet<String>>,
}
