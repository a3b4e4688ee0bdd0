use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, User},
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// The payload signed into every bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id. Resolved against the identity store on every request.
    pub sub: Uuid,
    /// The role at issue time. Informational; the stored role is authoritative.
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the *actor* handed
/// explicitly to every policy decision and lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        AuthUser {
            id: user.id,
            role: user.role,
        }
    }
}

/// issue_token
///
/// Signs a fresh HS256 token for `user`, valid for the configured lifetime.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let exp = usize::try_from(config.token_ttl.as_secs())
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or_else(|| AppError::Internal("token lifetime overflows the expiry claim".to_string()))?;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now,
        exp,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| AppError::Internal(e.to_string()))
}

/// decode_claims
///
/// Verifies signature and expiry. Every failure kind collapses into
/// `Unauthenticated`; the kind is only logged.
pub fn decode_claims(token: &str, config: &AppConfig) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                ErrorKind::InvalidSignature => tracing::warn!("rejected token with invalid signature"),
                other => tracing::debug!("rejected malformed token: {:?}", other),
            }
            Err(AppError::Unauthenticated)
        }
    }
}

/// resolve_token
///
/// Turns a bearer token into an actor. The user must still exist, so the
/// outstanding tokens of a deleted account stop working immediately. The role
/// is taken from the store, not from the claims.
pub async fn resolve_token(
    token: &str,
    repo: &dyn Repository,
    config: &AppConfig,
) -> Result<AuthUser, AppError> {
    let claims = decode_claims(token, config)?;
    let user = repo
        .get_user(claims.sub)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(AuthUser::from(&user))
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The process:
/// 1. Dependency Resolution: Repository and AppConfig from the application state.
/// 2. Local Bypass: in `Env::Local` only, an `x-user-id` header naming an existing user.
/// 3. Token Validation: `Authorization: Bearer <jwt>` through [`resolve_token`].
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                // The id must still map to a real account so roles load correctly.
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        resolve_token(token, repo.as_ref(), &config).await
    }
}
