use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest, PublicUser, RefreshRequest},
        services::{
            check_credentials, hash_password, validate_password, validate_username,
            CredentialCheck, JwtKeys, TokenKind,
        },
    },
    state::AppState,
    users::{
        repo_types::UserRecord,
        services::{store_error, update_current_user},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn issue_tokens(state: &AppState, username: String) -> Result<AuthResponse, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let sign = |kind| {
        keys.sign(&username, kind).map_err(|e| {
            error!(error = %e, "token signing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue tokens".to_string())
        })
    };
    let access_token = sign(TokenKind::Access)?;
    let refresh_token = sign(TokenKind::Refresh)?;
    Ok(AuthResponse {
        success: true,
        access_token,
        refresh_token,
        user: PublicUser { username },
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let username = payload.username.trim().to_owned();

    if let Err(msg) = validate_username(&username) {
        warn!(%username, "invalid username");
        return Err((StatusCode::BAD_REQUEST, msg.into()));
    }
    if let Err(msg) = validate_password(&payload.password) {
        warn!(%username, "password too short");
        return Err((StatusCode::BAD_REQUEST, msg.into()));
    }
    if state.store.contains(&username).await {
        warn!(%username, "username already exists");
        return Err((StatusCode::CONFLICT, "Username already exists".into()));
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let record = UserRecord::new(hash, state.now());
    if let Err(e) = state.store.insert(&username, record).await {
        error!(error = %e, %username, "create user failed");
        return Err(store_error(e));
    }

    info!(%username, "user signed up");
    Ok(Json(issue_tokens(&state, username)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let username = payload.username.trim().to_owned();

    let Some(record) = state.store.get(&username).await else {
        warn!(%username, "login unknown username");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    };

    let check = check_credentials(&payload.password, &record.password_hash);
    if check == CredentialCheck::Invalid {
        warn!(%username, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let rehashed = match check {
        CredentialCheck::ValidLegacy => Some(hash_password(&payload.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?),
        _ => None,
    };

    let now = state.now();
    update_current_user(&state, &username, |record| {
        record.last_login = now;
        if let Some(hash) = rehashed {
            record.password_hash = hash;
            info!(%username, "upgraded legacy plaintext password");
        }
    })
    .await?;

    info!(%username, "user logged in");
    Ok(Json(issue_tokens(&state, username)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "rejected refresh token");
            (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
        })?;

    if !state.store.contains(&claims.sub).await {
        warn!(username = %claims.sub, "refresh for unknown user");
        return Err((StatusCode::UNAUTHORIZED, "User not found".into()));
    }

    info!(username = %claims.sub, "tokens refreshed");
    Ok(Json(issue_tokens(&state, claims.sub)?))
}
