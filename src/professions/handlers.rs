use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::guard::require_privileged;
use crate::error::ApiError;
use crate::request::{field, parse_id, require, split_spheres, FlatRequest};
use crate::response::{fail, respond, ApiResponse, Verb};
use crate::spheres::{self, ParentKind};
use crate::state::AppState;

use super::dto::{
    ListParams, ADD_FIELDS, DELETE_FIELDS, MAX_NAME_LEN, PHOTO_ADD_FIELDS, PHOTO_DELETE_FIELDS,
    SPHERE_ADD_FIELDS, SPHERE_DELETE_FIELDS,
};
use super::repo::{self, NewProfession, Profession};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/professions", get(list_professions))
        .route("/profession/:id", get(get_profession))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/profession", post(create_profession).delete(delete_profession))
        .route("/profession/sphere", post(add_sphere).delete(remove_sphere))
        .route("/profession/photo", post(add_photo).delete(remove_photo))
}

#[instrument(skip(state))]
async fn list_professions(
    State(state): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<Vec<Profession>>, ApiResponse> {
    let items = repo::list(&state.db, p.limit, p.offset, p.query.as_deref())
        .await
        .map_err(fail)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
async fn get_profession(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResponse {
    respond(None::<Verb>, async move {
        match repo::detail(&state.db, id).await? {
            Some((profession, sphere_names, photos)) => Ok(ApiResponse::success(None::<Verb>)
                .with("profession", &profession)
                .with("spheres", &sphere_names)
                .with("photos", &photos)),
            None => Err(ApiError::NotFound),
        }
    })
    .await
}

#[instrument(skip(state, req))]
async fn create_profession(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, ADD_FIELDS)?;
        let name = field(&req, "name").unwrap_or_default().trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::BadRequest);
        }

        require_privileged(&state, &req).await?;

        let new = NewProfession {
            name,
            article: field(&req, "article").unwrap_or_default().to_string(),
            short_article: req.get("short_article").cloned(),
            icon_link: req.get("icon_link").cloned(),
        };
        let profession = repo::create(&state.db, &new).await?;

        // Sphere links follow as separate inserts. A failure here aborts the
        // rest and fails the whole request, but the profession row and the
        // links already made stay in place.
        let sphere_names = field(&req, "spheres").map(split_spheres).unwrap_or_default();
        spheres::add_all(&state.db, ParentKind::Profession, profession.id, &sphere_names).await?;

        info!(profession_id = profession.id, "profession created");
        Ok(ApiResponse::success(Verb::Post)
            .with("profession", &profession)
            .with("spheres", &sphere_names))
    })
    .await
}

#[instrument(skip(state, req))]
async fn delete_profession(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, DELETE_FIELDS)?;
        let id = parse_id(&req, "id")?;
        require_privileged(&state, &req).await?;

        // Dependent rows go first: the storage layer has no cascade for them.
        spheres::remove_all(&state.db, ParentKind::Profession, id).await?;
        repo::remove_all_photos(&state.db, id).await?;
        match repo::delete(&state.db, id).await? {
            Some(profession) => {
                info!(profession_id = id, "profession deleted");
                Ok(ApiResponse::success(Verb::Delete).with("profession", &profession))
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

        // Every link must point at an existing parent.
        let profession = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        spheres::add(&state.db, ParentKind::Profession, id, &sphere).await?;
        Ok(ApiResponse::success(Verb::Post).with("profession", &profession))
    })
    .await
}

#[instrument(skip(state, req))]
async fn add_photo(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Post, async move {
        require(&req, PHOTO_ADD_FIELDS)?;
        let id = parse_id(&req, "id")?;
        let link = field(&req, "link").unwrap_or_default().trim().to_string();
        if link.is_empty() {
            return Err(ApiError::BadRequest);
        }

        require_privileged(&state, &req).await?;

        let profession = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        repo::add_photo(&state.db, id, &link).await?;
        Ok(ApiResponse::success(Verb::Post).with("profession", &profession))
    })
    .await
}

#[instrument(skip(state, req))]
async fn remove_photo(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, PHOTO_DELETE_FIELDS)?;
        let id = parse_id(&req, "id")?;
        let link = field(&req, "link").unwrap_or_default().trim().to_string();
        if link.is_empty() {
            return Err(ApiError::BadRequest);
        }

        require_privileged(&state, &req).await?;

        let profession = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        if !repo::remove_photo(&state.db, id, &link).await? {
            return Err(ApiError::NotFound);
        }
        Ok(ApiResponse::success(Verb::Delete).with("profession", &profession))
    })
    .await
}

#[instrument(skip(state, req))]
async fn remove_sphere(State(state): State<AppState>, Json(req): Json<FlatRequest>) -> ApiResponse {
    respond(Verb::Delete, async move {
        require(&req, SPHERE_DELETE_FIELDS)?;
        let id = parse_id(&req, "id")?;
        require_privileged(&state, &req).await?;

        let profession = repo::find(&state.db, id).await?.ok_or(ApiError::NotFound)?;
        match field(&req, "sphere").map(str::trim) {
            None | Some("") | Some("*") => {
                spheres::remove_all(&state.db, ParentKind::Profession, id).await?
            }
            Some(name) => spheres::remove_one(&state.db, ParentKind::Profession, id, name).await?,
        }
        Ok(ApiResponse::success(Verb::Delete).with("profession", &profession))
    })
    .await
}
