//! Public catalog handlers: listing, lookup and media serving.
//! Filesystem media is streamed; object-store media is a redirect to the
//! resolved URL.

use crate::{
    errors::{AppError, CatalogError},
    models::artwork::{Artwork, ArtworkListResponse},
    services::{
        backends::AssetRef,
        naming::{content_type_for, ensure_safe_filename, ensure_safe_id},
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// `GET /api/v1/artworks`
pub async fn list_artworks(
    State(state): State<AppState>,
) -> Result<Json<ArtworkListResponse>, AppError> {
    let artworks = state.assembler.list_all().await?;
    Ok(Json(artworks.into()))
}

/// `GET /api/v1/artworks/{id}`
pub async fn get_artwork(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Artwork>, AppError> {
    Ok(Json(state.assembler.assemble(&id).await?))
}

/// `GET /api/v1/artworks/{id}/images/{filename}`
pub async fn serve_image(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    serve_asset(&state, &id, &filename, "Image").await
}

/// `GET /api/v1/artworks/{id}/videos/{filename}`
pub async fn serve_video(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    serve_asset(&state, &id, &filename, "Video").await
}

async fn serve_asset(
    state: &AppState,
    id: &str,
    filename: &str,
    label: &str,
) -> Result<Response, AppError> {
    ensure_safe_id(id)?;
    ensure_safe_filename(filename)?;

    let reference = match state.backend.resolve_ref(id, filename).await {
        Ok(reference) => reference,
        Err(CatalogError::NotFound(_)) => {
            return Err(AppError::not_found(format!("{label} not found")));
        }
        Err(err) => return Err(err.into()),
    };

    match reference {
        AssetRef::Url(url) => Ok(Redirect::temporary(&url).into_response()),
        AssetRef::Path(path) => {
            let file = File::open(&path).await.map_err(CatalogError::from)?;
            let size = file.metadata().await.map_err(CatalogError::from)?.len();
            let body = Body::from_stream(ReaderStream::new(file));

            let mut response = Response::new(body);
            *response.status_mut() = StatusCode::OK;
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(filename)),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            Ok(response)
        }
    }
}
