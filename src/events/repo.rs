use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::request::page_window;
use crate::spheres::{self, ParentKind};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: i32,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_of_the_event: OffsetDateTime,
    pub description: String,
    pub short_description: Option<String>,
    pub place: String,
    pub form_of_the_event: String,
    pub duration_in_hours: Option<f64>,
    pub speaker_id: Option<i32>,
    pub icon_link: Option<String>,
}

#[derive(Debug)]
pub struct NewEvent {
    pub name: String,
    pub date_of_the_event: OffsetDateTime,
    pub description: String,
    pub short_description: Option<String>,
    pub place: String,
    pub form_of_the_event: String,
    pub duration_in_hours: Option<f64>,
    pub speaker_id: Option<i32>,
    pub icon_link: Option<String>,
}

const COLUMNS: &str = "id, name, date_of_the_event, description, short_description, \
                       place, form_of_the_event, duration_in_hours, speaker_id, icon_link";

pub async fn create(db: &PgPool, new: &NewEvent) -> Result<Event, ApiError> {
    let event = sqlx::query_as::<_, Event>(&format!(
        r#"
        INSERT INTO events
            (name, date_of_the_event, description, short_description,
             place, form_of_the_event, duration_in_hours, speaker_id, icon_link)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COLUMNS}
        "#,
    ))
    .bind(&new.name)
    .bind(new.date_of_the_event)
    .bind(&new.description)
    .bind(&new.short_description)
    .bind(&new.place)
    .bind(&new.form_of_the_event)
    .bind(new.duration_in_hours)
    .bind(new.speaker_id)
    .bind(&new.icon_link)
    .fetch_one(db)
    .await?;
    Ok(event)
}

/// Deletes the row, returning it when it existed. Sphere links and
/// registrations must already have been removed by the caller.
pub async fn delete(db: &PgPool, id: i32) -> Result<Option<Event>, ApiError> {
    let event = sqlx::query_as::<_, Event>(&format!(
        r#"DELETE FROM events WHERE id = $1 RETURNING {COLUMNS}"#,
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(event)
}

pub async fn find(db: &PgPool, id: i32) -> Result<Option<Event>, ApiError> {
    let event = sqlx::query_as::<_, Event>(&format!(r#"SELECT {COLUMNS} FROM events WHERE id = $1"#))
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(event)
}

/// Page of events dated within `[from, to]` inclusive, ordered by date
/// descending; optional case-insensitive substring filter on name applied
/// before the page window.
pub async fn list(
    db: &PgPool,
    limit: i64,
    offset: i64,
    from: OffsetDateTime,
    to: OffsetDateTime,
    query: Option<&str>,
) -> Result<Vec<Event>, ApiError> {
    let (limit, offset) = page_window(limit, offset);
    let rows = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            sqlx::query_as::<_, Event>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM events
                WHERE date_of_the_event >= $1 AND date_of_the_event <= $2
                  AND name ILIKE $3
                ORDER BY date_of_the_event DESC
                LIMIT $4 OFFSET $5
                "#,
            ))
            .bind(from)
            .bind(to)
            .bind(format!("%{}%", q))
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Event>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM events
                WHERE date_of_the_event >= $1 AND date_of_the_event <= $2
                ORDER BY date_of_the_event DESC
                LIMIT $3 OFFSET $4
                "#,
            ))
            .bind(from)
            .bind(to)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?
        }
    };
    Ok(rows)
}

/// Event together with its sphere links; an event without links still comes
/// back as `Some` with an empty list.
pub async fn detail(db: &PgPool, id: i32) -> Result<Option<(Event, Vec<String>)>, ApiError> {
    let Some(event) = find(db, id).await? else {
        return Ok(None);
    };
    let sphere_names = spheres::list_for(db, ParentKind::Event, id).await?;
    Ok(Some((event, sphere_names)))
}

/// Signs a user up for an event. A repeated registration hits the composite
/// primary key and surfaces as `Conflict`.
pub async fn register(db: &PgPool, event_id: i32, user_id: i32) -> Result<(), ApiError> {
    sqlx::query(r#"INSERT INTO event_registrations (event_id, user_id) VALUES ($1, $2)"#)
        .bind(event_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Removes a registration; `false` when there was nothing to remove.
pub async fn unregister(db: &PgPool, event_id: i32, user_id: i32) -> Result<bool, ApiError> {
    let result =
        sqlx::query(r#"DELETE FROM event_registrations WHERE event_id = $1 AND user_id = $2"#)
            .bind(event_id)
            .bind(user_id)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Drops every registration for the event; used before the event delete.
pub async fn remove_registrations(db: &PgPool, event_id: i32) -> Result<(), ApiError> {
    sqlx::query(r#"DELETE FROM event_registrations WHERE event_id = $1"#)
        .bind(event_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Events the user is registered for, soonest last.
pub async fn registered_for_user(db: &PgPool, user_id: i32) -> Result<Vec<Event>, ApiError> {
    let rows = sqlx::query_as::<_, Event>(
        r#"
        SELECT e.id, e.name, e.date_of_the_event, e.description, e.short_description,
               e.place, e.form_of_the_event, e.duration_in_hours, e.speaker_id, e.icon_link
        FROM event_registrations r
        JOIN events e ON e.id = r.event_id
        WHERE r.user_id = $1
        ORDER BY e.date_of_the_event DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count_registered(db: &PgPool, event_id: i32) -> Result<i64, ApiError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM event_registrations WHERE event_id = $1"#,
    )
    .bind(event_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn event_dated(name: &str, date: OffsetDateTime) -> NewEvent {
        NewEvent {
            name: name.into(),
            date_of_the_event: date,
            description: "An evening about the field".into(),
            short_description: None,
            place: "Hall 1".into(),
            form_of_the_event: "lecture".into(),
            duration_in_hours: None,
            speaker_id: None,
            icon_link: None,
        }
    }

    #[sqlx::test]
    async fn window_keeps_inclusive_bounds_and_orders_newest_first(db: PgPool) {
        for (name, date) in [
            ("Old meetup", datetime!(2019-12-01 00:00 UTC)),
            ("Summer talk", datetime!(2020-06-01 00:00 UTC)),
            ("New year lecture", datetime!(2021-01-01 00:00 UTC)),
        ] {
            create(&db, &event_dated(name, date)).await.unwrap();
        }

        let page = list(
            &db,
            10,
            0,
            datetime!(2020-01-01 00:00 UTC),
            datetime!(2021-12-31 00:00 UTC),
            None,
        )
        .await
        .unwrap();

        let names: Vec<&str> = page.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["New year lecture", "Summer talk"]);
    }

    #[sqlx::test]
    async fn registration_is_unique_per_user_and_event(db: PgPool) {
        let event = create(&db, &event_dated("Open day", datetime!(2025-03-01 10:00 UTC)))
            .await
            .unwrap();
        let user = crate::auth::repo::User::create(&db, "Visitor", "visitor@example.com", "hash")
            .await
            .unwrap();

        register(&db, event.id, user.id).await.unwrap();
        let err = register(&db, event.id, user.id).await.unwrap_err();
        assert_eq!(err.code(), 409);

        assert_eq!(count_registered(&db, event.id).await.unwrap(), 1);
        assert!(unregister(&db, event.id, user.id).await.unwrap());
        assert!(!unregister(&db, event.id, user.id).await.unwrap());
    }
}
