use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::services::AuthUser,
    dto::SuccessResponse,
    state::AppState,
    users::{
        repo_types::IngredientEntry,
        services::{current_user, update_current_user},
    },
};

#[derive(Debug, Serialize)]
pub struct CreatedIngredientResponse {
    pub success: bool,
    pub ingredient: IngredientEntry,
}

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(add_ingredient))
        .route("/ingredients/:id", delete(delete_ingredient))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<Vec<IngredientEntry>>, (StatusCode, String)> {
    let record = current_user(&state, &username).await?;
    Ok(Json(record.ingredients))
}

#[instrument(skip(state, fields))]
pub async fn add_ingredient(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Json(mut fields): Json<Map<String, Value>>,
) -> Result<Json<CreatedIngredientResponse>, (StatusCode, String)> {
    fields.remove("id");
    fields.remove("added");

    let now = state.now();
    let ingredient = update_current_user(&state, &username, |record| {
        let ingredient = IngredientEntry {
            id: record.id_counters.next_ingredient(),
            added: now,
            fields,
        };
        record.ingredients.push(ingredient.clone());
        ingredient
    })
    .await?;

    info!(%username, ingredient_id = ingredient.id, "ingredient added");
    Ok(Json(CreatedIngredientResponse {
        success: true,
        ingredient,
    }))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<SuccessResponse>, (StatusCode, String)> {
    let removed = update_current_user(&state, &username, |record| {
        let before = record.ingredients.len();
        record.ingredients.retain(|i| i.id != id);
        before != record.ingredients.len()
    })
    .await?;

    if !removed {
        warn!(%username, ingredient_id = id, "ingredient not found");
        return Err((StatusCode::NOT_FOUND, "Ingredient not found".into()));
    }
    info!(%username, ingredient_id = id, "ingredient deleted");
    Ok(Json(SuccessResponse::ok()))
}
