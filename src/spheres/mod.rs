//! Many-to-many sphere links between a parent entity and free-text tags.
//!
//! Sphere names are not normalized: case and spelling variants of "the same"
//! tag may coexist as distinct links. Uniqueness holds per
//! (parent_id, sphere_name) pair, guarded by the composite primary key.

use sqlx::PgPool;
use tracing::debug;

use crate::error::ApiError;

/// Parent side of an association, carrying its table and column names as
/// data so one set of queries serves both entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Profession,
    Event,
}

impl ParentKind {
    fn table(self) -> &'static str {
        match self {
            ParentKind::Profession => "profession_spheres",
            ParentKind::Event => "event_spheres",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            ParentKind::Profession => "profession_id",
            ParentKind::Event => "event_id",
        }
    }
}

/// Inserts one association row. An already-linked pair is a `Conflict`, both
/// when caught by the pre-check and when a concurrent writer wins the race
/// and the composite primary key rejects the insert.
pub async fn add(
    db: &PgPool,
    kind: ParentKind,
    parent_id: i32,
    sphere_name: &str,
) -> Result<(), ApiError> {
    let already_linked = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1 AND sphere_name = $2)",
        kind.table(),
        kind.parent_column(),
    ))
    .bind(parent_id)
    .bind(sphere_name)
    .fetch_one(db)
    .await?;
    if already_linked {
        return Err(ApiError::Conflict);
    }

    sqlx::query(&format!(
        "INSERT INTO {} ({}, sphere_name) VALUES ($1, $2)",
        kind.table(),
        kind.parent_column(),
    ))
    .bind(parent_id)
    .bind(sphere_name)
    .execute(db)
    .await?;

    debug!(?kind, parent_id, sphere_name, "sphere linked");
    Ok(())
}

/// Deletes the single matching row; succeeds as a no-op when it is absent.
pub async fn remove_one(
    db: &PgPool,
    kind: ParentKind,
    parent_id: i32,
    sphere_name: &str,
) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1 AND sphere_name = $2",
        kind.table(),
        kind.parent_column(),
    ))
    .bind(parent_id)
    .bind(sphere_name)
    .execute(db)
    .await?;
    Ok(())
}

/// Deletes every association for the parent. Must run before the parent row
/// itself is deleted; the storage layer enforces no cascade.
pub async fn remove_all(db: &PgPool, kind: ParentKind, parent_id: i32) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        kind.table(),
        kind.parent_column(),
    ))
    .bind(parent_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn list_for(
    db: &PgPool,
    kind: ParentKind,
    parent_id: i32,
) -> Result<Vec<String>, ApiError> {
    let names = sqlx::query_scalar::<_, String>(&format!(
        "SELECT sphere_name FROM {} WHERE {} = $1 ORDER BY sphere_name",
        kind.table(),
        kind.parent_column(),
    ))
    .bind(parent_id)
    .fetch_all(db)
    .await?;
    Ok(names)
}

/// Bulk add in the order supplied. The first failure aborts the remaining
/// inserts and the error propagates; rows already inserted stay in place.
/// Callers report the surrounding creation as failed without rolling back
/// the parent entity.
pub async fn add_all(
    db: &PgPool,
    kind: ParentKind,
    parent_id: i32,
    sphere_names: &[String],
) -> Result<(), ApiError> {
    for name in sphere_names {
        add(db, kind, parent_id, name).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::professions::repo::{self as professions, NewProfession};

    #[test]
    fn parent_kinds_map_to_their_tables() {
        assert_eq!(ParentKind::Profession.table(), "profession_spheres");
        assert_eq!(ParentKind::Profession.parent_column(), "profession_id");
        assert_eq!(ParentKind::Event.table(), "event_spheres");
        assert_eq!(ParentKind::Event.parent_column(), "event_id");
    }

    async fn some_profession(db: &PgPool) -> i32 {
        professions::create(
            db,
            &NewProfession {
                name: "Engineer".into(),
                article: "About the work".into(),
                short_article: None,
                icon_link: None,
            },
        )
        .await
        .expect("create profession")
        .id
    }

    #[sqlx::test]
    async fn linking_twice_yields_conflict_and_remove_clears_the_row(db: PgPool) {
        let id = some_profession(&db).await;

        add(&db, ParentKind::Profession, id, "IT").await.unwrap();
        let err = add(&db, ParentKind::Profession, id, "IT").await.unwrap_err();
        assert_eq!(err.code(), 409);

        remove_one(&db, ParentKind::Profession, id, "IT").await.unwrap();
        assert!(list_for(&db, ParentKind::Profession, id)
            .await
            .unwrap()
            .is_empty());

        // removing an absent link is a no-op, not an error
        remove_one(&db, ParentKind::Profession, id, "IT").await.unwrap();
    }

    #[sqlx::test]
    async fn bulk_add_aborts_at_first_duplicate_keeping_partial_state(db: PgPool) {
        let id = some_profession(&db).await;
        let names = vec!["A".to_string(), "B".into(), "A".into()];

        let err = add_all(&db, ParentKind::Profession, id, &names)
            .await
            .unwrap_err();
        assert_eq!(err.code(), 409);

        // the parent row and the links made before the failure stay in place
        assert!(professions::find(&db, id).await.unwrap().is_some());
        assert_eq!(
            list_for(&db, ParentKind::Profession, id).await.unwrap(),
            vec!["A".to_string(), "B".into()]
        );
    }
}
