use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{ProfileResponse, ProfileStatistics, UpdatePreferencesRequest},
    repo_types::DietPreferences,
    services::{account_age_days, current_user, update_current_user},
};
use crate::{auth::services::AuthUser, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile))
        .route("/user/preferences", put(update_preferences))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let record = current_user(&state, &username).await?;

    let statistics = ProfileStatistics {
        ingredient_count: record.ingredients.len(),
        nutrition_entries: record.nutrition_log.len(),
        meal_plans_count: record.meal_plans.len(),
        account_age_days: account_age_days(record.created_at, state.now()),
    };

    Ok(Json(ProfileResponse {
        username,
        created_at: record.created_at,
        last_login: record.last_login,
        ingredients: record.ingredients,
        nutrition_log: record.nutrition_log,
        meal_plans: record.meal_plans,
        diet_preferences: record.diet_preferences,
        statistics,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> Result<Json<DietPreferences>, (StatusCode, String)> {
    if let Some(target) = payload.calorie_target {
        if !target.is_finite() || target <= 0.0 {
            warn!(%username, target, "rejected calorie target");
            return Err((
                StatusCode::BAD_REQUEST,
                "calorie_target must be a positive number".into(),
            ));
        }
    }

    let prefs = update_current_user(&state, &username, |record| {
        let prefs = &mut record.diet_preferences;
        if let Some(diet_type) = payload.diet_type {
            prefs.diet_type = diet_type;
        }
        if let Some(target) = payload.calorie_target {
            prefs.calorie_target = target;
        }
        if let Some(allergies) = payload.allergies {
            prefs.allergies = allergies
                .into_iter()
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect();
        }
        prefs.clone()
    })
    .await?;

    info!(%username, diet_type = ?prefs.diet_type, calorie_target = prefs.calorie_target, "diet preferences updated");
    Ok(Json(prefs))
}
