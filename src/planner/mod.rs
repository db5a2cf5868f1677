use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod services;
pub mod week;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::meal_plan_routes())
}
