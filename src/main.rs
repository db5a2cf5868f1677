mod app;
mod auth;
mod config;
mod dto;
mod ingredients;
mod nutrition;
mod planner;
mod recipes;
mod state;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutriplan=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;
    tracing::info!(
        users = state.store.len().await,
        recipes = state.recipes.len(),
        users_file = %state.config.users_file.display(),
        "data loaded"
    );

    let host = state.config.host.clone();
    let port = state.config.port;
    let app = app::build_app(state);
    app::serve(app, &host, port).await
}
