use serde::Serialize;

use crate::planner::services::{NutrientTargets, NutrientTotals};
use crate::users::repo_types::NutritionEntry;

/// The log plus today's progress computed from the meal planner.
#[derive(Debug, Serialize)]
pub struct NutritionOverview {
    pub log: Vec<NutritionEntry>,
    pub totals: NutrientTotals,
    pub percentages: NutrientTotals,
    pub targets: NutrientTargets,
}

#[derive(Debug, Serialize)]
pub struct CreatedEntryResponse {
    pub success: bool,
    pub entry: NutritionEntry,
}
