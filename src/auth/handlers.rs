use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{is_valid_email, PublicUser, LOGIN_FIELDS, MIN_PASSWORD_LEN, REGISTER_FIELDS},
    password::{hash_password, verify_password},
    repo::User,
    token,
};
use crate::error::ApiError;
use crate::request::{field, require, FlatRequest};
use crate::response::{respond, ApiResponse, Verb};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[instrument(skip(state, req))]
async fn register(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, REGISTER_FIELDS)?;

        let email = field(&req, "email").unwrap_or_default().trim().to_lowercase();
        let full_name = field(&req, "full_name").unwrap_or_default().trim().to_string();
        let password = field(&req, "password").unwrap_or_default();

        if !is_valid_email(&email) || full_name.is_empty() {
            warn!(%email, "register rejected: bad email or empty name");
            return Err(ApiError::BadRequest);
        }
        if password.len() < MIN_PASSWORD_LEN {
            warn!("register rejected: password too short");
            return Err(ApiError::BadRequest);
        }

        // Busy-email pre-check; the unique index on users.email is the
        // authoritative guard under concurrent registrations.
        if User::find_by_email(&state.db, &email).await?.is_some() {
            warn!(%email, "register rejected: email already taken");
            return Err(ApiError::Conflict);
        }

        let hash = hash_password(password)?;
        let user = User::create(&state.db, &full_name, &email, &hash).await?;
        let token = token::issue(&state.db, user.id, state.config.token_ttl_hours).await?;

        info!(user_id = user.id, "user registered");
        Ok(ApiResponse::success(Verb::Post)
            .with("user", &PublicUser::from(&user))
            .with("token", &token))
    })
    .await
}

#[instrument(skip(state, req))]
async fn login(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, LOGIN_FIELDS)?;

        let email = field(&req, "email").unwrap_or_default().trim().to_lowercase();
        let password = field(&req, "password").unwrap_or_default();

        // Unknown email and wrong password collapse into the same outcome.
        let Some(user) = User::find_by_email(&state.db, &email).await? else {
            warn!(%email, "login with unknown email");
            return Err(ApiError::Forbidden);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "login with wrong password");
            return Err(ApiError::Forbidden);
        }

        let token = token::issue(&state.db, user.id, state.config.token_ttl_hours).await?;

        info!(user_id = user.id, "user logged in");
        Ok(ApiResponse::success(Verb::Post)
            .with("user", &PublicUser::from(&user))
            .with("token", &token))
    })
    .await
}
