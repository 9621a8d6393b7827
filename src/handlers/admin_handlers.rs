//! Admin handlers under `/api/v1/admin`, gated by [`require_admin`].

use crate::{
    errors::{AppError, CatalogError},
    models::artwork::{
        Artwork, ArtworkListResponse, ArtworkUpdate, CheckTitleQuery, CreateArtworkRequest,
    },
    services::{admin_service::WriteOutcome, naming::ensure_safe_filename, naming::ensure_safe_id},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

const BEARER_PREFIX: &str = "Bearer ";

/// Query of `DELETE /admin/artworks/{id}/images/{filename}`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageQuery {
    pub delete_file: Option<String>,
}

/// Middleware: reject requests without the configured bearer token.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(AppError::internal("ADMIN_TOKEN is not configured"));
    };
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim);
    if presented != Some(expected) {
        return Err(CatalogError::Unauthorized.into());
    }
    Ok(next.run(req).await)
}

/// `GET /admin/artworks`
pub async fn list_artworks(
    State(state): State<AppState>,
) -> Result<Json<ArtworkListResponse>, AppError> {
    let artworks = state.assembler.list_admin().await?;
    Ok(Json(artworks.into()))
}

/// `POST /admin/artworks`
pub async fn create_artwork(
    State(state): State<AppState>,
    payload: Result<Json<CreateArtworkRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("Invalid JSON"))?;
    let outcome = state.admin.create(&payload.title).await?;
    if outcome.overlay_error.is_none() {
        return Ok((StatusCode::CREATED, Json(outcome.artwork)).into_response());
    }
    Ok(outcome_response(outcome, "Failed to create artwork"))
}

/// `GET /admin/artworks/check-title?title=&excludeId=`
pub async fn check_title(
    State(state): State<AppState>,
    Query(query): Query<CheckTitleQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let available = state
        .admin
        .check_title(&query.title, &query.exclude_id)
        .await?;
    Ok(Json(json!({ "available": available })))
}

/// `GET /admin/artworks/{id}`
pub async fn get_artwork(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Artwork>, AppError> {
    Ok(Json(state.assembler.assemble(&id).await?))
}

/// `PUT /admin/artworks/{id}`
pub async fn upsert_artwork(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ArtworkUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    ensure_safe_id(&id)?;
    let Json(update) = payload.map_err(|_| AppError::bad_request("Invalid JSON"))?;
    let outcome = state.admin.upsert(&id, update).await?;
    Ok(outcome_response(outcome, "Failed to save artwork"))
}

/// `POST /admin/artworks/{id}/images` with a multipart `image` field.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Artwork>, AppError> {
    ensure_safe_id(&id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("File too large (max 10MB)"))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("File too large (max 10MB)"))?;

        let artwork = state
            .admin
            .upload_image(&id, &original_name, &content_type, bytes)
            .await?;
        return Ok(Json(artwork));
    }

    Err(AppError::bad_request("No image file provided"))
}

/// `DELETE /admin/artworks/{id}/images/{filename}?deleteFile=true`
pub async fn delete_image(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
    Query(query): Query<DeleteImageQuery>,
) -> Result<Response, AppError> {
    ensure_safe_id(&id)?;
    ensure_safe_filename(&filename)?;
    let delete_file = query.delete_file.as_deref() == Some("true");
    let outcome = state.admin.delete_image(&id, &filename, delete_file).await?;
    Ok(outcome_response(outcome, "Failed to update artwork record"))
}

/// 200 with the artwork, or 500 carrying both the overlay error and the
/// artwork as it now stands.
fn outcome_response(outcome: WriteOutcome, failure: &str) -> Response {
    match outcome.overlay_error {
        None => Json(outcome.artwork).into_response(),
        Some(detail) => {
            tracing::error!(artwork_id = %outcome.artwork.id, error = %detail, "{failure}");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let body = json!({
                "error": failure,
                "status": status.as_u16(),
                "artwork": outcome.artwork,
            });
            (status, Json(body)).into_response()
        }
    }
}
