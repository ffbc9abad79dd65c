use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::ApiError;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
}

/// Bearer token record. Immutable once created; renewal issues a new row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Token {
    pub key: String,
    #[serde(skip_serializing)]
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_date: OffsetDateTime,
}

impl Token {
    /// A token is valid strictly before its expiration instant; at the
    /// boundary it is already dead.
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        now < self.expiration_date
    }
}

impl User {
    pub async fn create(
        db: &PgPool,
        full_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, full_name, email, password_hash
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

impl Token {
    pub async fn find(db: &PgPool, key: &str) -> Result<Option<Token>, ApiError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            SELECT key, user_id, expiration_date
            FROM tokens
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(db)
        .await?;
        Ok(token)
    }

    /// The newest still-valid token for a user. Expiration is issuance time
    /// plus a fixed TTL, so ordering by expiration orders by creation.
    pub async fn latest_active(
        db: &PgPool,
        user_id: i32,
        now: OffsetDateTime,
    ) -> Result<Option<Token>, ApiError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            SELECT key, user_id, expiration_date
            FROM tokens
            WHERE user_id = $1 AND expiration_date > $2
            ORDER BY expiration_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(db)
        .await?;
        Ok(token)
    }

    pub async fn key_exists(db: &PgPool, key: &str) -> Result<bool, ApiError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM tokens WHERE key = $1)"#,
        )
        .bind(key)
        .fetch_one(db)
        .await?;
        Ok(exists)
    }

    pub async fn insert(
        db: &PgPool,
        key: &str,
        user_id: i32,
        expiration_date: OffsetDateTime,
    ) -> Result<Token, ApiError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            INSERT INTO tokens (key, user_id, expiration_date)
            VALUES ($1, $2, $3)
            RETURNING key, user_id, expiration_date
            "#,
        )
        .bind(key)
        .bind(user_id)
        .bind(expiration_date)
        .fetch_one(db)
        .await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn token_expiring_at(expiration_date: OffsetDateTime) -> Token {
        Token {
            key: "k".repeat(64),
            user_id: 1,
            expiration_date,
        }
    }

    #[test]
    fn token_active_strictly_before_expiration() {
        let token = token_expiring_at(datetime!(2024-05-01 12:00 UTC));
        assert!(token.is_active(datetime!(2024-05-01 11:59:59 UTC)));
    }

    #[test]
    fn token_dead_at_the_boundary_instant() {
        let token = token_expiring_at(datetime!(2024-05-01 12:00 UTC));
        assert!(!token.is_active(datetime!(2024-05-01 12:00 UTC)));
        assert!(!token.is_active(datetime!(2024-05-01 12:00:01 UTC)));
    }

    #[test]
    fn token_serialization_hides_user_id() {
        let token = token_expiring_at(datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(&token).unwrap();
        assert!(json.get("key").is_some());
        assert!(json.get("expiration_date").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            full_name: "Test User".into(),
            email: "test@example.com".into(),
            password_hash: "secret".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("test@example.com"));
    }
}
