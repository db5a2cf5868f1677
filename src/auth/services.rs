pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::config::JwtConfig;
use crate::state::AppState;
use anyhow::Context;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Checks a signup username, returning the message to show on rejection.
pub(crate) fn validate_username(username: &str) -> Result<(), &'static str> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,64}$").unwrap();
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err("Username must be at least 3 characters");
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username may only contain letters, digits, '.', '_' or '-' (max 64)");
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    /// Matched a plaintext password from an old store; the caller should rehash it.
    ValidLegacy,
    Invalid,
}

pub fn check_credentials(plain: &str, stored: &str) -> CredentialCheck {
    if PasswordHash::new(stored).is_err() {
        return if !stored.is_empty() && plain == stored {
            CredentialCheck::ValidLegacy
        } else {
            CredentialCheck::Invalid
        };
    }
    match verify_password(plain, stored) {
        Ok(true) => CredentialCheck::Valid,
        _ => CredentialCheck::Invalid,
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: TimeDuration::minutes(config.ttl_minutes.max(0)),
            refresh_ttl: TimeDuration::minutes(config.refresh_ttl_minutes.max(0)),
        }
    }

    fn ttl(&self, kind: TokenKind) -> TimeDuration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Issues a `kind` token for `username`.
    pub fn sign(&self, username: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: username.to_owned(),
            kind,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl(kind)).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .with_context(|| format!("sign {kind:?} token for {username}"))?;
        debug!(%username, ?kind, "token issued");
        Ok(token)
    }

    /// Decodes `token` and checks that it was issued as a `kind` token.
    pub fn verify(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.kind != kind {
            anyhow::bail!("expected {kind:?} token, got {:?}", claims.kind);
        }
        Ok(claims)
    }
}

/// Username of the caller, taken from a valid access token.
#[derive(Debug)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let claims = keys.verify(token, TokenKind::Access).map_err(|e| {
            warn!(error = %e, "rejected access token");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
            )
        })?;

        Ok(AuthUser(claims.sub))
    }
}
