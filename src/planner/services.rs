use serde::Serialize;
use time::OffsetDateTime;

use super::week::{current_week_key, day_index_of, today_day_index};
use crate::users::repo_types::{DietPreferences, MealEntry, UserRecord};

pub const DEFAULT_PROTEIN_TARGET: f64 = 100.0;
pub const DEFAULT_CARB_TARGET: f64 = 300.0;
pub const DEFAULT_FAT_TARGET: f64 = 67.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl NutrientTotals {
    fn add(&mut self, meal: &MealEntry) {
        self.calories += meal.calories;
        self.protein += meal.protein;
        self.carbs += meal.carbs;
        self.fat += meal.fat;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientTargets {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl NutrientTargets {
    pub fn for_preferences(prefs: &DietPreferences) -> Self {
        Self {
            calories: prefs.calorie_target,
            protein: DEFAULT_PROTEIN_TARGET,
            carbs: DEFAULT_CARB_TARGET,
            fat: DEFAULT_FAT_TARGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutritionSummary {
    pub totals: NutrientTotals,
    pub percentages: NutrientTotals,
    pub targets: NutrientTargets,
}

/// Sums the nutrients of every meal planned for today in this week's plan.
///
/// No plan for the week, keys without a day prefix and meals for other days
/// all contribute nothing.
pub fn todays_totals(record: &UserRecord, now: OffsetDateTime) -> NutrientTotals {
    let mut totals = NutrientTotals::default();
    let Some(plan) = record.meal_plans.get(&current_week_key(now)) else {
        return totals;
    };
    let today = today_day_index(now);

    plan.iter()
        .filter(|(key, _)| day_index_of(key) == Some(today))
        .for_each(|(_, meal)| totals.add(meal));
    totals
}

/// Share of each target reached, in percent, capped at 100.
pub fn progress_percentages(totals: &NutrientTotals, targets: &NutrientTargets) -> NutrientTotals {
    NutrientTotals {
        calories: percent_of(totals.calories, targets.calories),
        protein: percent_of(totals.protein, targets.protein),
        carbs: percent_of(totals.carbs, targets.carbs),
        fat: percent_of(totals.fat, targets.fat),
    }
}

fn percent_of(total: f64, target: f64) -> f64 {
    if target > 0.0 {
        (100.0 * total / target).min(100.0)
    } else {
        0.0
    }
}

pub fn nutrition_summary(record: &UserRecord, now: OffsetDateTime) -> NutritionSummary {
    let totals = todays_totals(record, now);
    let targets = NutrientTargets::for_preferences(&record.diet_preferences);
    NutritionSummary {
        totals,
        percentages: progress_percentages(&totals, &targets),
        targets,
    }
}
