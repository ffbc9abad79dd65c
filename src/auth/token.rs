use rand::Rng;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::repo::{Token, User};
use crate::error::ApiError;

pub const TOKEN_KEY_LEN: usize = 64;

/// Alphabet for token keys; alphabetic draws are independently upper- or
/// lowercased, so the effective symbol space is 62 characters.
const KEY_SYMBOLS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn random_key<R: Rng>(rng: &mut R) -> String {
    (0..TOKEN_KEY_LEN)
        .map(|_| {
            let symbol = KEY_SYMBOLS[rng.gen_range(0..KEY_SYMBOLS.len())] as char;
            if rng.gen_bool(0.5) {
                symbol.to_ascii_uppercase()
            } else {
                symbol
            }
        })
        .collect()
}

/// Issues a bearer token for the user, reusing the most recently created
/// still-valid one instead of minting a duplicate.
///
/// The pre-insert key lookup is an optimization; under concurrent issuers the
/// primary key on tokens.key is the authoritative guard and a collision
/// surfaces as `Conflict`. A missing user id is a programming error on the
/// caller's side and comes back as a foreign-key `Server` failure.
pub async fn issue(db: &PgPool, user_id: i32, ttl_hours: i64) -> Result<Token, ApiError> {
    let now = OffsetDateTime::now_utc();
    if let Some(token) = Token::latest_active(db, user_id, now).await? {
        debug!(user_id, "reusing active token");
        return Ok(token);
    }

    let key = loop {
        let candidate = {
            let mut rng = rand::thread_rng();
            random_key(&mut rng)
        };
        if !Token::key_exists(db, &candidate).await? {
            break candidate;
        }
    };

    let expiration_date = now + Duration::hours(ttl_hours);
    let token = Token::insert(db, &key, user_id, expiration_date).await?;
    debug!(user_id, "issued new token");
    Ok(token)
}

/// Resolves a raw token key to its user.
///
/// Returns `None` for an unknown key and for an expired one alike; the caller
/// cannot tell the two apart.
pub async fn resolve(db: &PgPool, key: &str) -> Result<Option<User>, ApiError> {
    let Some(token) = Token::find(db, key).await? else {
        return Ok(None);
    };
    if !token.is_active(OffsetDateTime::now_utc()) {
        return Ok(None);
    }
    User::find_by_id(db, token.user_id).await
}
