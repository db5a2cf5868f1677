use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::dto::{CreatedEntryResponse, NutritionOverview};
use crate::{
    auth::services::AuthUser,
    dto::SuccessResponse,
    planner::services::nutrition_summary,
    state::AppState,
    users::{
        repo_types::NutritionEntry,
        services::{current_user, update_current_user},
    },
};

pub fn nutrition_routes() -> Router<AppState> {
    Router::new()
        .route("/nutrition", get(get_nutrition).post(add_entry))
        .route("/nutrition/:id", delete(delete_entry))
}

#[instrument(skip(state))]
pub async fn get_nutrition(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<NutritionOverview>, (StatusCode, String)> {
    let record = current_user(&state, &username).await?;
    let summary = nutrition_summary(&record, state.now());

    Ok(Json(NutritionOverview {
        log: record.nutrition_log,
        totals: summary.totals,
        percentages: summary.percentages,
        targets: summary.targets,
    }))
}

#[instrument(skip(state, fields))]
pub async fn add_entry(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Json(mut fields): Json<Map<String, Value>>,
) -> Result<Json<CreatedEntryResponse>, (StatusCode, String)> {
    // server-assigned
    fields.remove("id");
    fields.remove("timestamp");

    let now = state.now();
    let entry = update_current_user(&state, &username, |record| {
        let entry = NutritionEntry {
            id: record.id_counters.next_nutrition(),
            timestamp: now,
            fields,
        };
        record.nutrition_log.push(entry.clone());
        entry
    })
    .await?;

    info!(%username, entry_id = entry.id, "nutrition entry added");
    Ok(Json(CreatedEntryResponse {
        success: true,
        entry,
    }))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<SuccessResponse>, (StatusCode, String)> {
    let removed = update_current_user(&state, &username, |record| {
        let before = record.nutrition_log.len();
        record.nutrition_log.retain(|e| e.id != id);
        before != record.nutrition_log.len()
    })
    .await?;

    if !removed {
        warn!(%username, entry_id = id, "nutrition entry not found");
        return Err((StatusCode::NOT_FOUND, "Entry not found".into()));
    }
    info!(%username, entry_id = id, "nutrition entry deleted");
    Ok(Json(SuccessResponse::ok()))
}
