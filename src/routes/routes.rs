//! Defines routes for the public catalog and the admin surface.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /health`, `GET /readyz`
//!
//! - **Public catalog** (`/api/v1`)
//!   - `GET    /artworks` — artworks with at least one image or video
//!   - `GET    /artworks/{id}` — one artwork, even without media
//!   - `GET    /artworks/{id}/images/{filename}` — stream or redirect
//!   - `GET    /artworks/{id}/videos/{filename}` — stream or redirect
//!
//! - **Admin** (`/api/v1/admin`, bearer token)
//!   - `GET    /artworks` — admin ordering
//!   - `POST   /artworks` — create
//!   - `GET    /artworks/check-title` — `{"available": bool}`
//!   - `GET    /artworks/{id}`, `PUT /artworks/{id}`
//!   - `POST   /artworks/{id}/images` — multipart upload
//!   - `DELETE /artworks/{id}/images/{filename}` — `?deleteFile=true` removes the file

use crate::{
    handlers::{
        admin_handlers, artwork_handlers,
        health_handlers::{health, readyz},
    },
    services::admin_service::MAX_UPLOAD_BYTES,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Room for multipart framing around a maximum-size image.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Build the full application router with `state` attached.
pub fn routes(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/artworks",
            get(admin_handlers::list_artworks).post(admin_handlers::create_artwork),
        )
        .route("/artworks/check-title", get(admin_handlers::check_title))
        .route(
            "/artworks/{id}",
            get(admin_handlers::get_artwork).put(admin_handlers::upsert_artwork),
        )
        .route(
            "/artworks/{id}/images",
            post(admin_handlers::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/artworks/{id}/images/{filename}",
            delete(admin_handlers::delete_image),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_handlers::require_admin,
        ));

    Router::new()
        // health endpoints (mounted at root)
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/api/v1/artworks", get(artwork_handlers::list_artworks))
        .route("/api/v1/artworks/{id}", get(artwork_handlers::get_artwork))
        .route(
            "/api/v1/artworks/{id}/images/{filename}",
            get(artwork_handlers::serve_image),
        )
        .route(
            "/api/v1/artworks/{id}/videos/{filename}",
            get(artwork_handlers::serve_video),
        )
        .nest("/api/v1/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        backends::{
            FilesystemBackend, ObjectStoreBackend,
            object_store::{UrlPolicy, testing::MemoryObjectClient},
        },
        database_overlay::OverlayStore,
        record_assembler::RecordAssembler,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TOKEN: &str = "secret";

    struct TestApp {
        dir: TempDir,
        router: Router,
    }

    async fn test_app(token: Option<&str>) -> TestApp {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FilesystemBackend::new(dir.path()));
        let overlay = OverlayStore::in_memory().await;
        let assembler = RecordAssembler::new(backend, Some(overlay));
        let router = routes(AppState::new(assembler, token.map(str::to_string)));
        TestApp { dir, router }
    }

    impl TestApp {
        fn write(&self, rel: &str, body: &[u8]) {
            let path = self.dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn multipart_upload(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_readiness() {
        let app = test_app(None).await;
        let (status, body) = app.send(get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let (status, body) = app.send(get_req("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["filesystem"]["ok"], json!(true));
        assert_eq!(body["checks"]["database"]["ok"], json!(true));
    }

    #[tokio::test]
    async fn public_listing_hides_empty_artworks() {
        let app = test_app(None).await;
        app.write("sunset/b.png", b"x");
        app.write("sunset/a.jpg", b"x");
        std::fs::create_dir(app.dir.path().join("empty")).unwrap();

        let (status, body) = app.send(get_req("/api/v1/artworks")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["artworks"][0]["images"], json!(["a.jpg", "b.png"]));
        assert_eq!(body["artworks"][0]["primaryImage"], json!("a.jpg"));

        let (status, body) = app.send(get_req("/api/v1/artworks/empty")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"], json!([]));

        let (status, body) = app.send(get_req("/api/v1/artworks/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("Artwork not found"));

        let (status, _) = app.send(get_req("/api/v1/artworks/..%2Fetc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn filesystem_media_is_streamed_with_content_type() {
        let app = test_app(None).await;
        app.write("sunset/a.png", b"png-bytes");

        let response = app
            .router
            .clone()
            .oneshot(get_req("/api/v1/artworks/sunset/images/a.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"png-bytes");

        let (status, body) = app
            .send(get_req("/api/v1/artworks/sunset/videos/missing.mp4"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("Video not found"));

        let (status, _) = app
            .send(get_req("/api/v1/artworks/sunset/images/..%2F..%2Fsecret"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn object_store_media_redirects() {
        let client = Arc::new(MemoryObjectClient::new(10));
        client.insert("sunset/a.jpg", b"x");
        let backend = ObjectStoreBackend::new(
            client,
            UrlPolicy::Public {
                base_url: "https://cdn.example.com".into(),
            },
        );
        let router = routes(AppState::new(
            RecordAssembler::new(Arc::new(backend), None),
            None,
        ));

        let response = router
            .oneshot(get_req("/api/v1/artworks/sunset/images/a.jpg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example.com/sunset/a.jpg"
        );
    }

    #[tokio::test]
    async fn admin_requires_configured_bearer_token() {
        let app = test_app(Some(TOKEN)).await;
        let (status, _) = app.send(get_req("/api/v1/admin/artworks")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = Request::get("/api/v1/admin/artworks")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.send(admin("GET", "/api/v1/admin/artworks", None)).await;
        assert_eq!(status, StatusCode::OK);

        let unconfigured = test_app(None).await;
        let (status, body) = unconfigured
            .send(admin("GET", "/api/v1/admin/artworks", None))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("ADMIN_TOKEN is not configured"));
    }

    #[tokio::test]
    async fn admin_endpoints_reject_unsafe_ids() {
        let app = test_app(Some(TOKEN)).await;
        for id in ["..%2Fetc", "a%2Fb"] {
            let requests = [
                admin("GET", &format!("/api/v1/admin/artworks/{id}"), None),
                admin(
                    "PUT",
                    &format!("/api/v1/admin/artworks/{id}"),
                    Some(json!({ "detalle": "x" })),
                ),
                multipart_upload(
                    &format!("/api/v1/admin/artworks/{id}/images"),
                    "a.png",
                    "image/png",
                    b"x",
                ),
                admin(
                    "DELETE",
                    &format!("/api/v1/admin/artworks/{id}/images/a.png?deleteFile=true"),
                    None,
                ),
            ];
            for req in requests {
                let uri = req.uri().to_string();
                let (status, body) = app.send(req).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
                assert_eq!(body["error"], json!("Invalid artwork id"), "{uri}");
            }
        }
        assert!(!app.dir.path().join("etc").exists());
    }

    #[tokio::test]
    async fn create_reports_the_new_artwork_when_the_record_insert_fails() {
        let dir = TempDir::new().unwrap();
        let overlay = OverlayStore::in_memory().await;
        sqlx::query(
            "CREATE TRIGGER refuse_inserts BEFORE INSERT ON artworks \
             BEGIN SELECT RAISE(ABORT, 'inserts disabled'); END",
        )
        .execute(overlay.db.as_ref())
        .await
        .unwrap();
        let backend = Arc::new(FilesystemBackend::new(dir.path()));
        let assembler = RecordAssembler::new(backend, Some(overlay));
        let app = TestApp {
            router: routes(AppState::new(assembler, Some(TOKEN.to_string()))),
            dir,
        };

        let (status, body) = app
            .send(admin(
                "POST",
                "/api/v1/admin/artworks",
                Some(json!({ "title": "Sunset" })),
            ))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Failed to create artwork"));
        let id = body["artwork"]["id"].as_str().unwrap();
        assert!(app.dir.path().join(id).is_dir());
    }

    #[tokio::test]
    async fn image_delete_route_only_accepts_images() {
        let app = test_app(Some(TOKEN)).await;
        app.write("sunset/a.jpg", b"x");
        app.write("sunset/meta.json", b"{}");

        let (status, _) = app
            .send(admin(
                "DELETE",
                "/api/v1/admin/artworks/sunset/images/meta.json?deleteFile=true",
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.dir.path().join("sunset/meta.json").exists());
    }

    #[tokio::test]
    async fn admin_create_edit_upload_delete_flow() {
        let app = test_app(Some(TOKEN)).await;

        let (status, created) = app
            .send(admin(
                "POST",
                "/api/v1/admin/artworks",
                Some(json!({ "title": "Sunset" })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["title"], json!("Sunset"));

        let (status, _) = app
            .send(admin(
                "POST",
                "/api/v1/admin/artworks",
                Some(json!({ "title": "Sunset" })),
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send(admin(
                "GET",
                "/api/v1/admin/artworks/check-title?title=Sunset",
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "available": false }));
        let (_, body) = app
            .send(admin(
                "GET",
                &format!("/api/v1/admin/artworks/check-title?title=Sunset&excludeId={id}"),
                None,
            ))
            .await;
        assert_eq!(body, json!({ "available": true }));

        let (status, uploaded) = app
            .send(multipart_upload(
                &format!("/api/v1/admin/artworks/{id}/images"),
                "cover.png",
                "image/png",
                b"png",
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let image = uploaded["images"][0].as_str().unwrap().to_string();
        assert!(image.ends_with("_cover.png"));

        let (status, updated) = app
            .send(admin(
                "PUT",
                &format!("/api/v1/admin/artworks/{id}"),
                Some(json!({
                    "title": "Sunset",
                    "startDate": "2024-02-01",
                    "detalle": "x",
                    "bitacora": "",
                    "primaryImage": image,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["detalle"], json!("x"));
        assert_eq!(updated["startDate"], json!("2024-02-01"));
        assert!(updated.get("bitacora").is_none());

        let (status, _) = app
            .send(admin(
                "PUT",
                &format!("/api/v1/admin/artworks/{id}"),
                Some(json!({ "startDate": "yesterday" })),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listed) = app.send(admin("GET", "/api/v1/admin/artworks", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], json!(1));

        let (status, after) = app
            .send(admin(
                "DELETE",
                &format!("/api/v1/admin/artworks/{id}/images/{image}?deleteFile=true"),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after["images"], json!([]));
        assert!(after.get("primaryImage").is_none());
    }

    #[tokio::test]
    async fn upload_rejects_wrong_type_and_missing_field() {
        let app = test_app(Some(TOKEN)).await;
        app.write("sunset/a.jpg", b"x");

        let (status, body) = app
            .send(multipart_upload(
                "/api/v1/admin/artworks/sunset/images",
                "doc.pdf",
                "application/pdf",
                b"%PDF",
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Invalid file type. Allowed: JPEG, PNG, GIF"));

        let body = "--B\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nhello\r\n--B--\r\n";
        let no_image = Request::post("/api/v1/admin/artworks/sunset/images")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(body))
            .unwrap();
        let (status, body) = app.send(no_image).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("No image file provided"));
    }
}
