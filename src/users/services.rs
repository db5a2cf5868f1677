use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::error;

use super::repo::StoreError;
use super::repo_types::UserRecord;
use crate::state::AppState;

/// Loads the caller's record. A token for a user that no longer exists is
/// treated as unauthenticated.
pub(crate) async fn current_user(
    state: &AppState,
    username: &str,
) -> Result<UserRecord, (StatusCode, String)> {
    state.store.get(username).await.ok_or_else(user_not_found)
}

/// Runs `f` against the caller's record and persists it.
pub(crate) async fn update_current_user<T>(
    state: &AppState,
    username: &str,
    f: impl FnOnce(&mut UserRecord) -> T,
) -> Result<T, (StatusCode, String)> {
    state
        .store
        .update(username, f)
        .await
        .map_err(|e| {
            error!(error = %e, %username, "user store update failed");
            internal(e)
        })?
        .ok_or_else(user_not_found)
}

pub(crate) fn user_not_found() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "User not found".into())
}

pub(crate) fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub(crate) fn store_error(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::Conflict(_) => (StatusCode::CONFLICT, "Username already exists".into()),
        other => internal(other),
    }
}

/// Whole days since `created_at`; never negative.
pub fn account_age_days(created_at: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - created_at).whole_days().max(0)
}
