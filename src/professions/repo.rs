use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;
use crate::request::page_window;
use crate::spheres::{self, ParentKind};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profession {
    pub id: i32,
    pub name: String,
    pub article: String,
    pub short_article: Option<String>,
    pub icon_link: Option<String>,
}

#[derive(Debug)]
pub struct NewProfession {
    pub name: String,
    pub article: String,
    pub short_article: Option<String>,
    pub icon_link: Option<String>,
}

const COLUMNS: &str = "id, name, article, short_article, icon_link";

pub async fn create(db: &PgPool, new: &NewProfession) -> Result<Profession, ApiError> {
    let profession = sqlx::query_as::<_, Profession>(&format!(
        r#"
        INSERT INTO professions (name, article, short_article, icon_link)
        VALUES ($1, $2, $3, $4)
        RETURNING {COLUMNS}
        "#,
    ))
    .bind(&new.name)
    .bind(&new.article)
    .bind(&new.short_article)
    .bind(&new.icon_link)
    .fetch_one(db)
    .await?;
    Ok(profession)
}

/// Deletes the row, returning it when it existed. Sphere links must already
/// have been removed by the caller.
pub async fn delete(db: &PgPool, id: i32) -> Result<Option<Profession>, ApiError> {
    let profession = sqlx::query_as::<_, Profession>(&format!(
        r#"DELETE FROM professions WHERE id = $1 RETURNING {COLUMNS}"#,
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(profession)
}

pub async fn find(db: &PgPool, id: i32) -> Result<Option<Profession>, ApiError> {
    let profession =
        sqlx::query_as::<_, Profession>(&format!(r#"SELECT {COLUMNS} FROM professions WHERE id = $1"#))
            .bind(id)
            .fetch_optional(db)
            .await?;
    Ok(profession)
}

/// Page of professions ordered by name descending; optional case-insensitive
/// substring filter applied first, then offset and limit.
pub async fn list(
    db: &PgPool,
    limit: i64,
    offset: i64,
    query: Option<&str>,
) -> Result<Vec<Profession>, ApiError> {
    let (limit, offset) = page_window(limit, offset);
    let rows = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            sqlx::query_as::<_, Profession>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM professions
                WHERE name ILIKE $1
                ORDER BY name DESC
                LIMIT $2 OFFSET $3
                "#,
            ))
            .bind(format!("%{}%", q))
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Profession>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM professions
                ORDER BY name DESC
                LIMIT $1 OFFSET $2
                "#,
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?
        }
    };
    Ok(rows)
}

/// Profession together with its sphere links and photo links. A profession
/// without either still comes back as `Some` with empty lists.
pub async fn detail(
    db: &PgPool,
    id: i32,
) -> Result<Option<(Profession, Vec<String>, Vec<String>)>, ApiError> {
    let Some(profession) = find(db, id).await? else {
        return Ok(None);
    };
    let sphere_names = spheres::list_for(db, ParentKind::Profession, id).await?;
    let photos = list_photos(db, id).await?;
    Ok(Some((profession, sphere_names, photos)))
}

/// Attaches a photo link. A link already attached to the profession is a
/// `Conflict`, caught by the pre-check or by the composite primary key when
/// a concurrent writer wins the race.
pub async fn add_photo(db: &PgPool, id: i32, link: &str) -> Result<(), ApiError> {
    let already_attached = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS (SELECT 1 FROM profession_photos WHERE profession_id = $1 AND link = $2)"#,
    )
    .bind(id)
    .bind(link)
    .fetch_one(db)
    .await?;
    if already_attached {
        return Err(ApiError::Conflict);
    }

    sqlx::query(r#"INSERT INTO profession_photos (profession_id, link) VALUES ($1, $2)"#)
        .bind(id)
        .bind(link)
        .execute(db)
        .await?;
    Ok(())
}

/// Detaches a photo link; `false` when there was nothing to detach.
pub async fn remove_photo(db: &PgPool, id: i32, link: &str) -> Result<bool, ApiError> {
    let result =
        sqlx::query(r#"DELETE FROM profession_photos WHERE profession_id = $1 AND link = $2"#)
            .bind(id)
            .bind(link)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Drops every photo link for the profession; used before the row delete.
pub async fn remove_all_photos(db: &PgPool, id: i32) -> Result<(), ApiError> {
    sqlx::query(r#"DELETE FROM profession_photos WHERE profession_id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn list_photos(db: &PgPool, id: i32) -> Result<Vec<String>, ApiError> {
    let links = sqlx::query_scalar::<_, String>(
        r#"SELECT link FROM profession_photos WHERE profession_id = $1 ORDER BY link"#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spheres::{self, ParentKind};

    fn new_profession(name: &str) -> NewProfession {
        NewProfession {
            name: name.into(),
            article: "About the work".into(),
            short_article: None,
            icon_link: None,
        }
    }

    #[sqlx::test]
    async fn delete_clears_links_and_empties_the_detail(db: PgPool) {
        let profession = create(&db, &new_profession("Engineer")).await.unwrap();
        spheres::add(&db, ParentKind::Profession, profession.id, "IT")
            .await
            .unwrap();
        spheres::add(&db, ParentKind::Profession, profession.id, "Science")
            .await
            .unwrap();

        // same order the delete handler uses: dependent rows first
        spheres::remove_all(&db, ParentKind::Profession, profession.id)
            .await
            .unwrap();
        remove_all_photos(&db, profession.id).await.unwrap();
        let deleted = delete(&db, profession.id).await.unwrap();
        assert_eq!(deleted.map(|p| p.id), Some(profession.id));

        assert!(detail(&db, profession.id).await.unwrap().is_none());
        assert!(spheres::list_for(&db, ParentKind::Profession, profession.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[sqlx::test]
    async fn photo_links_attach_once_and_detach(db: PgPool) {
        let profession = create(&db, &new_profession("Designer")).await.unwrap();

        add_photo(&db, profession.id, "https://img.example/1.png")
            .await
            .unwrap();
        let err = add_photo(&db, profession.id, "https://img.example/1.png")
            .await
            .unwrap_err();
        assert_eq!(err.code(), 409);

        let (_, _, photos) = detail(&db, profession.id).await.unwrap().unwrap();
        assert_eq!(photos, vec!["https://img.example/1.png".to_string()]);

        assert!(remove_photo(&db, profession.id, "https://img.example/1.png")
            .await
            .unwrap());
        assert!(!remove_photo(&db, profession.id, "https://img.example/1.png")
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn listing_clamps_negative_page_values(db: PgPool) {
        create(&db, &new_profession("Engineer")).await.unwrap();
        // negative values reach Postgres as LIMIT 0 OFFSET 0, not as an error
        let page = list(&db, -1, -3, None).await.unwrap();
        assert!(page.is_empty());
    }
}
