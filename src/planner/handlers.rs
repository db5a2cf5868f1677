use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::{
    dto::{SaveMealPlanRequest, SavedMealPlanResponse},
    week::canonical_week_key,
};
use crate::{
    auth::services::AuthUser,
    state::AppState,
    users::{
        repo_types::{MealEntry, MealPlans, WeeklyPlan},
        services::{current_user, update_current_user},
    },
};

pub fn meal_plan_routes() -> Router<AppState> {
    Router::new()
        .route("/meal-plans", get(list_meal_plans).post(save_meal_plan))
        .route("/meal-plans/:week_key", get(get_meal_plan))
}

fn invalid_data() -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, "Invalid data".into())
}

#[instrument(skip(state))]
pub async fn list_meal_plans(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<MealPlans>, (StatusCode, String)> {
    let record = current_user(&state, &username).await?;
    Ok(Json(record.meal_plans))
}

/// Replaces the plan for one week. The week key may be any date in that
/// week; it is stored under the week's Monday.
#[instrument(skip(state, payload))]
pub async fn save_meal_plan(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Json(payload): Json<SaveMealPlanRequest>,
) -> Result<Json<SavedMealPlanResponse>, (StatusCode, String)> {
    let (Some(raw_key), Some(slots)) = (payload.week_key, payload.plan) else {
        warn!(%username, "meal plan without weekKey or plan");
        return Err(invalid_data());
    };
    let plan = decode_plan(slots).map_err(|slot| {
        warn!(%username, %slot, "meal plan slot is not a meal");
        invalid_data()
    })?;
    if plan.is_empty() {
        warn!(%username, "empty meal plan");
        return Err(invalid_data());
    }
    let Some(week_key) = canonical_week_key(&raw_key) else {
        warn!(%username, week_key = %raw_key, "week key is not a date");
        return Err(invalid_data());
    };
    if let Some((slot, _)) = plan.iter().find(|(_, meal)| meal.has_negative_nutrient()) {
        warn!(%username, %slot, "negative nutrient in meal plan");
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Nutrient values must not be negative ({slot})"),
        ));
    }

    let meals = plan.len();
    update_current_user(&state, &username, |record| {
        record.meal_plans.insert(week_key.clone(), plan);
    })
    .await?;

    info!(%username, %week_key, meals, "meal plan saved");
    Ok(Json(SavedMealPlanResponse {
        success: true,
        message: "Meal plan saved",
        week_key,
    }))
}

/// Decodes every slot of a submitted plan. `null` slots are cleared meals and
/// are dropped; any other slot that is not a meal yields its key.
fn decode_plan(slots: Map<String, Value>) -> Result<WeeklyPlan, String> {
    let mut plan = WeeklyPlan::new();
    for (slot, value) in slots {
        if value.is_null() {
            continue;
        }
        if !value.is_object() {
            return Err(slot);
        }
        match serde_json::from_value::<MealEntry>(value) {
            Ok(meal) => {
                plan.insert(slot, meal);
            }
            Err(_) => return Err(slot),
        }
    }
    Ok(plan)
}

/// Plan for one week, or `{}` when nothing is planned.
#[instrument(skip(state))]
pub async fn get_meal_plan(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(week_key): Path<String>,
) -> Result<Json<WeeklyPlan>, (StatusCode, String)> {
    let mut record = current_user(&state, &username).await?;

    let plan = record
        .meal_plans
        .remove(&week_key)
        .or_else(|| {
            canonical_week_key(&week_key).and_then(|key| record.meal_plans.remove(&key))
        })
        .unwrap_or_default();
    Ok(Json(plan))
}
