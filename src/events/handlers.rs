use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::auth::guard::{require_privileged, require_user};
use crate::auth::token;
use crate::error::ApiError;
use crate::request::{
    field, parse_date, parse_date_time, parse_id, require, split_spheres, FlatRequest,
};
use crate::response::{fail, respond, ApiResponse, Verb};
use crate::spheres::{self, ParentKind};
use crate::state::AppState;

use super::dto::{
    archive_epoch, archive_window, calendar_window, open_end, EventListParams, PageParams,
    TokenParam, ADD_FIELDS, DELETE_FIELDS, MAX_NAME_LEN, REGISTER_FIELDS, SPHERE_ADD_FIELDS,
    SPHERE_DELETE_FIELDS,
};
use super::repo::{self, Event, NewEvent};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/archive", get(list_archive))
        .route("/events/calendar", get(list_calendar))
        .route("/event/:id", get(get_event))
        .route("/me/events", get(my_events))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/event", post(create_event).delete(delete_event))
        .route("/event/sphere", post(add_sphere).delete(remove_sphere))
        .route("/event/register", post(register_on_event).delete(unregister_from_event))
}

#[instrument(skip(state))]
async fn list_events(
    State(state): State<AppState>,
    Query(p): Query<EventListParams>,
) -> Result<Json<Vec<Event>>, ApiResponse> {
    let from = match p.from_date.as_deref() {
        Some(raw) => parse_date(raw).map_err(fail)?,
        None => archive_epoch(),
    };
    let to = match p.to_date.as_deref() {
        Some(raw) => parse_date(raw).map_err(fail)?,
        None => open_end(),
    };
    let items = repo::list(&state.db, p.limit, p.offset, from, to, p.query.as_deref())
        .await
        .map_err(fail)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
async fn list_archive(
    State(state): State<AppState>,
    Query(p): Query<PageParams>,
) -> Result<Json<Vec<Event>>, ApiResponse> {
    let (from, to) = archive_window(OffsetDateTime::now_utc());
    let items = repo::list(&state.db, p.limit, p.offset, from, to, p.query.as_deref())
        .await
        .map_err(fail)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
async fn list_calendar(
    State(state): State<AppState>,
    Query(p): Query<PageParams>,
) -> Result<Json<Vec<Event>>, ApiResponse> {
    let (from, to) = calendar_window(OffsetDateTime::now_utc());
    let items = repo::list(&state.db, p.limit, p.offset, from, to, p.query.as_deref())
        .await
        .map_err(fail)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
async fn get_event(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResponse {
    respond(None::<Verb>, async move {
        match repo::detail(&state.db, id).await? {
            Some((event, sphere_names)) => {
                let registered = repo::count_registered(&state.db, id).await?;
                Ok(ApiResponse::success(None::<Verb>)
                    .with("event", &event)
                    .with("spheres", &sphere_names)
                    .with("registered", &registered))
            }
            None => Err(ApiError::NotFound),
        }
    })
    .await
}

#[instrument(skip(state, p))]
async fn my_events(
    State(state): State<AppState>,
    Query(p): Query<TokenParam>,
) -> Result<Json<Vec<Event>>, ApiResponse> {
    let user = token::resolve(&state.db, &p.token)
        .await
        .map_err(fail)?
        .ok_or_else(|| fail(ApiError::Forbidden))?;
    let items = repo::registered_for_user(&state.db, user.id)
        .await
        .map_err(fail)?;
    Ok(Json(items))
}

#[instrument(skip(state, req))]
async fn create_event(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, ADD_FIELDS)?;
        let name = field(&req, "name").unwrap_or_default().trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::BadRequest);
        }
        let date_of_the_event = parse_date_time(field(&req, "date_of_the_event").unwrap_or_default())?;
        let duration_in_hours = match field(&req, "duration_in_hours") {
            Some(raw) => Some(raw.trim().parse::<f64>().map_err(|_| ApiError::BadRequest)?),
            None => None,
        };
        let speaker_id = match field(&req, "speaker_id") {
            Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| ApiError::BadRequest)?),
            None => None,
        };

        require_privileged(&state, &req).await?;

        let new = NewEvent {
            name,
            date_of_the_event,
            description: field(&req, "description").unwrap_or_default().to_string(),
            short_description: req.get("short_description").cloned(),
            place: field(&req, "place").unwrap_or_default().to_string(),
            form_of_the_event: field(&req, "form_of_the_event").unwrap_or_default().to_string(),
            duration_in_hours,
            speaker_id,
            icon_link: req.get("icon_link").cloned(),
        };
        let event = repo::create(&state.db, &new).await?;

        // Sphere links follow as separate inserts. A failure here aborts the
        // rest and fails the whole request, but the event row and the links
        // already made stay in place.
        let sphere_names = field(&req, "spheres").map(split_spheres).unwrap_or_default();
        spheres::add_all(&state.db, ParentKind::Event, event.id, &sphere_names).await?;

        info!(event_id = event.id, "event created");
        Ok(ApiResponse::success(Verb::Post)
            .with("event", &event)
            .with("spheres", &sphere_names))
    })
    .await
}

#[instrument(skip(state, req))]
async fn delete_event(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, DELETE_FIELDS)?;
        let id = parse_id(&req, "id")?;
        require_privileged(&state, &req).await?;

        // Dependent rows go first: the storage layer has no cascade for them.
        spheres::remove_all(&state.db, ParentKind::Event, id).await?;
        repo::remove_registrations(&state.db, id).await?;
        match repo::delete(&state.db, id).await? {
            Some(event) => {
                info!(event_id = id, "event deleted");
                Ok(ApiResponse::success(Verb::Delete).with("event", &event))
            }
            None => Err(ApiError::NotFound),
        }
    })
    .await
}

#[instrument(skip(state, req))]
async fn add_sphere(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, SPHERE_ADD_FIELDS)?;
        let id = parse_id(&req, "id")?;
        let sphere = field(&req, "sphere").unwrap_or_default().trim().to_string();
        if sphere.is_empty() {
            return Err(ApiError::BadRequest);
        }

        require_privileged(&state, &req).await?;

        let event = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        spheres::add(&state.db, ParentKind::Event, id, &sphere).await?;
        Ok(ApiResponse::success(Verb::Post).with("event", &event))
    })
    .await
}

#[instrument(skip(state, req))]
async fn remove_sphere(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, SPHERE_DELETE_FIELDS)?;
        let id = parse_id(&req, "id")?;
        require_privileged(&state, &req).await?;

        let event = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        match field(&req, "sphere").map(str::trim) {
            None | Some("") | Some("*") => {
                spheres::remove_all(&state.db, ParentKind::Event, id).await?
            }
            Some(name) => spheres::remove_one(&state.db, ParentKind::Event, id, name).await?,
        }
        Ok(ApiResponse::success(Verb::Delete).with("event", &event))
    })
    .await
}

#[instrument(skip(state, req))]
async fn register_on_event(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, REGISTER_FIELDS)?;
        let id = parse_id(&req, "id")?;

        // Any signed-in user may register; the allow-list is not consulted.
        let user = require_user(&state, &req).await?;

        let event = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        repo::register(&state.db, id, user.id).await?;
        info!(event_id = id, user_id = user.id, "registered on event");
        Ok(ApiResponse::success(Verb::Post).with("event", &event))
    })
    .await
}

#[instrument(skip(state, req))]
async fn unregister_from_event(
    State(state): State<AppState>,
    Json(req): Json<FlatRequest>,
) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, REGISTER_FIELDS)?;
        let id = parse_id(&req, "id")?;
        let user = require_user(&state, &req).await?;

        let event = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        if !repo::unregister(&state.db, id, user.id).await? {
            return Err(ApiError::NotFound);
        }
        info!(event_id = id, user_id = user.id, "registration removed");
        Ok(ApiResponse::success(Verb::Delete).with("event", &event))
    })
    .await
}
