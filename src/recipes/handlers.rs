use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument, warn};

use super::{dto::RecipeQuery, repo::RecipeFilter, repo_types::Recipe};
use crate::state::AppState;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipe/:id", get(get_recipe))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<Recipe>>, (StatusCode, String)> {
    let filter = RecipeFilter::try_from(query).map_err(|msg| {
        warn!(%msg, "invalid recipe filter");
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let recipes: Vec<Recipe> = state.recipes.filter(&filter).cloned().collect();
    debug!(matched = recipes.len(), "recipes filtered");
    Ok(Json(recipes))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, (StatusCode, String)> {
    state
        .recipes
        .find(id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".into()))
}
