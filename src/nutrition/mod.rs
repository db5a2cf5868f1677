use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::nutrition_routes())
}
