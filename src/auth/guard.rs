use tracing::warn;

use crate::auth::{repo::User, token};
use crate::error::ApiError;
use crate::request::{field, FlatRequest};
use crate::state::AppState;

/// Resolves the request's `token` field to a user; any failure is `Forbidden`.
pub async fn require_user(state: &AppState, req: &FlatRequest) -> Result<User, ApiError> {
    let key = field(req, "token").ok_or(ApiError::Forbidden)?;
    match token::resolve(&state.db, key).await? {
        Some(user) => Ok(user),
        None => {
            warn!("token missing from store or expired");
            Err(ApiError::Forbidden)
        }
    }
}

/// Token resolution followed by the allow-list check, always in that order.
/// Both failures produce the same `Forbidden` outcome.
pub async fn require_privileged(state: &AppState, req: &FlatRequest) -> Result<User, ApiError> {
    let user = require_user(state, req).await?;
    if !state.config.is_privileged(&user.email) {
        warn!(user_id = user.id, "user not in the allow-list");
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}
