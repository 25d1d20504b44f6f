use std::sync::Arc;

use axum::{http::StatusCode, middleware::from_fn, routing::get, Router};
use sqlx::PgPool;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::config::{Config, SwaggerConfig};
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::features::admin::{routes as admin_routes, AdminService};
use crate::features::categories::{routes as categories_routes, CategoryService};
use crate::features::items::{routes as items_routes, ItemService};
use crate::modules::storage::MediaStorage;

/// Build the application router: feature routes, media files, ops endpoints
/// and the shared request layers.
pub fn build_router(config: &Config, pool: PgPool, media: Arc<MediaStorage>) -> Router {
    let category_service = Arc::new(CategoryService::new(pool.clone(), Arc::clone(&media)));
    tracing::info!("Category service initialized");

    let item_service = Arc::new(ItemService::new(pool.clone(), Arc::clone(&media)));
    tracing::info!("Item service initialized");

    let admin_service = Arc::new(AdminService::new(
        pool,
        Arc::clone(&media),
        config.media.max_file_size,
    ));
    tracing::info!(
        "Admin service initialized (max upload size: {} bytes)",
        config.media.max_file_size
    );

    // Simple health check endpoint
    async fn health_check() -> StatusCode {
        StatusCode::OK
    }
    let health_route = Router::new().route("/health", get(health_check));

    let media_route =
        Router::new().nest_service(&config.media.url_prefix, ServeDir::new(media.root()));

    Router::new()
        .merge(swagger_router(&config.swagger))
        .merge(categories_routes::routes(category_service))
        .merge(items_routes::routes(item_service))
        .merge(admin_routes::routes(
            admin_service,
            config.app.max_request_body_size,
        ))
        .merge(media_route)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}

fn swagger_router(config: &SwaggerConfig) -> Router {
    let swagger_modifier = SwaggerInfoModifier {
        title: config.title.clone(),
        version: config.version.clone(),
        description: config.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger =
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));

    if let Some(credentials) = config.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        swagger.layer(from_fn(middleware::basic_auth_middleware(Arc::new(
            credentials,
        ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        swagger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AppConfig, DatabaseConfig, MediaConfig};
    use axum::body::Body;
    use axum::http::Request;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use base64::prelude::*;
    use fake::faker::address::en::StreetName;
    use fake::faker::company::en::CompanyName;
    use fake::Fake;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::{Layer, ServiceExt};
    use tower_http::normalize_path::NormalizePathLayer;

    fn test_config(media_root: &Path, swagger_credentials: Option<(&str, &str)>) -> Config {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_allowed_origins: vec!["*".to_string()],
                max_request_body_size: 4 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/direktori_test".to_string(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
                idle_timeout_secs: 60,
                max_lifetime_secs: 60,
            },
            media: MediaConfig {
                root: media_root.to_path_buf(),
                url_prefix: "/media".to_string(),
                max_file_size: 1024 * 1024,
            },
            swagger: SwaggerConfig {
                username: swagger_credentials.map(|(u, _)| u.to_string()),
                password: swagger_credentials.map(|(_, p)| p.to_string()),
                title: "Direktori API".to_string(),
                version: "test".to_string(),
                description: "test".to_string(),
            },
        }
    }

    /// Pool that never connects; enough for routes that do not query
    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/direktori_test")
            .unwrap()
    }

    fn server_with(pool: PgPool, media_dir: &TempDir) -> (TestServer, Arc<MediaStorage>) {
        let media = Arc::new(MediaStorage::new(media_dir.path()));
        let router = build_router(
            &test_config(media_dir.path(), None),
            pool,
            Arc::clone(&media),
        );
        (TestServer::new(router).unwrap(), media)
    }

    fn image(name: &str, bytes: &'static [u8]) -> Part {
        Part::bytes(bytes).file_name(name).mime_type("image/jpeg")
    }

    fn item_form(category_id: i64, name: &str) -> MultipartForm {
        MultipartForm::new()
            .add_text("category", category_id.to_string())
            .add_text("name", name.to_string())
            .add_text("address", "1 Main St")
            .add_text("latitude", "0.0")
            .add_text("longitude", "0.0")
    }

    async fn create_category(server: &TestServer, name: &str) -> i64 {
        let response = server
            .post("/api/categories")
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    fn photos(body: &Value) -> Vec<String> {
        serde_json::from_value(body["photos"].clone()).unwrap()
    }

    /// Row count and highest row id of an item's photos
    async fn photo_rows(pool: &PgPool, item_id: i64) -> (i64, Option<i64>) {
        sqlx::query_as("SELECT COUNT(*), MAX(id) FROM item_photos WHERE item_id = $1")
            .bind(item_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_accepts_trailing_slash() {
        let media_dir = TempDir::new().unwrap();
        let router = build_router(
            &test_config(media_dir.path(), None),
            lazy_pool(),
            Arc::new(MediaStorage::new(media_dir.path())),
        );
        let app = NormalizePathLayer::trim_trailing_slash().layer(router);

        let response = app
            .oneshot(Request::get("/health/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_media_files_are_served() {
        let media_dir = TempDir::new().unwrap();
        let (server, media) = server_with(lazy_pool(), &media_dir);
        media.write("photos/3-a.jpg", b"jpeg bytes").await.unwrap();

        let response = server.get("/media/photos/3-a.jpg").await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"jpeg bytes");

        server
            .get("/media/photos/3-missing.jpg")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_swagger_basic_auth() {
        let media_dir = TempDir::new().unwrap();
        let router = build_router(
            &test_config(media_dir.path(), Some(("admin", "secret"))),
            lazy_pool(),
            Arc::new(MediaStorage::new(media_dir.path())),
        );
        let server = TestServer::new(router).unwrap();

        server
            .get("/api-docs/openapi.json")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/api-docs/openapi.json")
            .add_header(
                "Authorization",
                format!("Basic {}", BASE64_STANDARD.encode("admin:secret")),
            )
            .await;
        response.assert_status_ok();
        assert!(response.json::<Value>()["paths"]["/api/items"].is_object());

        // the API itself is not behind the swagger credentials
        server.get("/health").await.assert_status_ok();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_item_created_with_two_photos(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, media) = server_with(pool, &media_dir);
        let category_id = create_category(&server, "Restaurants").await;

        let form = item_form(category_id, "Cafe X")
            .add_part("photo_uploads", image("a.jpg", b"aaa"))
            .add_part("photo_uploads", image("b.jpg", b"bbb"));
        let response = server.post("/admin/items").multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        let id = body["id"].as_i64().unwrap();
        assert_eq!(body["category"], json!(category_id));
        assert_eq!(body["working_hours"], json!({}));
        assert_eq!(
            photos(&body),
            vec![format!("photos/{}-a.jpg", id), format!("photos/{}-b.jpg", id)]
        );
        assert!(media.exists(&format!("photos/{}-a.jpg", id)).await);
        assert!(media.exists(&format!("photos/{}-b.jpg", id)).await);

        let fetched: Value = server.get(&format!("/api/items/{}", id)).await.json();
        assert_eq!(fetched, body);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_photo_uploads_append_on_edit(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, _media) = server_with(pool.clone(), &media_dir);
        let category_id = create_category(&server, "Cafes").await;
        let name: String = CompanyName().fake();

        let created: Value = server
            .post("/admin/items")
            .multipart(
                item_form(category_id, &name).add_part("photo_uploads", image("a.jpg", b"a")),
            )
            .await
            .json();
        let id = created["id"].as_i64().unwrap();
        let path = format!("/admin/items/{}", id);

        let before = photo_rows(&pool, id).await;

        // no uploads: photos unchanged and no photo rows written
        let edited: Value = server
            .post(&path)
            .multipart(item_form(category_id, &name).add_text("description", "Espresso bar"))
            .await
            .json();
        assert_eq!(edited["description"], "Espresso bar");
        assert_eq!(photos(&edited), photos(&created));
        assert_eq!(photo_rows(&pool, id).await, before);

        let edited: Value = server
            .post(&path)
            .multipart(
                item_form(category_id, &name)
                    .add_part("photo_uploads", image("b.jpg", b"b"))
                    .add_part("photo_uploads", image("c.jpg", b"c")),
            )
            .await
            .json();
        assert_eq!(
            photos(&edited),
            vec![
                format!("photos/{}-a.jpg", id),
                format!("photos/{}-b.jpg", id),
                format!("photos/{}-c.jpg", id),
            ]
        );

        assert_eq!(photo_rows(&pool, id).await.0, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_photo_name_collision_is_conflict(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, media) = server_with(pool, &media_dir);
        let category_id = create_category(&server, "Cafes").await;

        let created: Value = server
            .post("/admin/items")
            .multipart(
                item_form(category_id, "Cafe X")
                    .add_part("photo_uploads", image("a.jpg", b"first")),
            )
            .await
            .json();
        let id = created["id"].as_i64().unwrap();

        let response = server
            .post(&format!("/admin/items/{}", id))
            .multipart(
                item_form(category_id, "Cafe X")
                    .add_part("photo_uploads", image("new.jpg", b"new"))
                    .add_part("photo_uploads", image("a.jpg", b"second")),
            )
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let fetched: Value = server.get(&format!("/api/items/{}", id)).await.json();
        assert_eq!(photos(&fetched), vec![format!("photos/{}-a.jpg", id)]);
        assert!(!media.exists(&format!("photos/{}-new.jpg", id)).await);
        let kept = tokio::fs::read(media_dir.path().join(format!("photos/{}-a.jpg", id)))
            .await
            .unwrap();
        assert_eq!(kept, b"first");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_failed_save_keeps_avatar_bytes(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, _media) = server_with(pool, &media_dir);
        let category_id = create_category(&server, "Cafes").await;

        let created: Value = server
            .post("/admin/items")
            .multipart(
                item_form(category_id, "Cafe X")
                    .add_part("avatar_photo", image("logo.jpg", b"old"))
                    .add_part("photo_uploads", image("a.jpg", b"a")),
            )
            .await
            .json();
        let id = created["id"].as_i64().unwrap();
        let avatar = media_dir.path().join(format!("avatars/{}-logo.jpg", id));
        let path = format!("/admin/items/{}", id);

        // same avatar name, but the photo collides, so nothing may change
        server
            .post(&path)
            .multipart(
                item_form(category_id, "Cafe X")
                    .add_part("avatar_photo", image("logo.jpg", b"new"))
                    .add_part("photo_uploads", image("a.jpg", b"again")),
            )
            .await
            .assert_status(StatusCode::CONFLICT);
        assert_eq!(tokio::fs::read(&avatar).await.unwrap(), b"old");
        assert_eq!(
            std::fs::read_dir(media_dir.path().join("avatars"))
                .unwrap()
                .count(),
            1
        );

        let saved: Value = server
            .post(&path)
            .multipart(
                item_form(category_id, "Cafe X")
                    .add_part("avatar_photo", image("logo.jpg", b"new")),
            )
            .await
            .json();
        assert_eq!(saved["avatar_photo"], json!(format!("avatars/{}-logo.jpg", id)));
        assert_eq!(tokio::fs::read(&avatar).await.unwrap(), b"new");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_category_delete_cascades(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, media) = server_with(pool, &media_dir);
        let category_id = create_category(&server, "Pharmacies").await;

        let item: Value = server
            .post("/admin/items")
            .multipart(
                item_form(category_id, "Apteka 1")
                    .add_part("avatar_photo", image("logo.jpg", b"logo"))
                    .add_part("photo_uploads", image("a.jpg", b"a")),
            )
            .await
            .json();
        let id = item["id"].as_i64().unwrap();
        let avatar = item["avatar_photo"].as_str().unwrap().to_string();
        assert_eq!(avatar, format!("avatars/{}-logo.jpg", id));

        server
            .delete(&format!("/api/categories/{}", category_id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/api/items/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/categories/{}", category_id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        assert!(!media.exists(&avatar).await);
        assert!(!media.exists(&format!("photos/{}-a.jpg", id)).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_category_list_projection(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, _media) = server_with(pool, &media_dir);
        let id = create_category(&server, "Hotels").await;
        create_category(&server, "Banks").await;

        let list: Value = server.get("/api/categories").await.json();
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 2);
        for entry in list {
            let mut keys: Vec<&String> = entry.as_object().unwrap().keys().collect();
            keys.sort();
            assert_eq!(keys, vec!["icon", "id", "name"]);
        }
        assert_eq!(list[0]["id"], json!(id));

        let detail: Value = server.get(&format!("/api/categories/{}", id)).await.json();
        assert_eq!(detail, json!({ "id": id, "name": "Hotels", "icon": null }));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_item_json_crud(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, _media) = server_with(pool, &media_dir);
        let category_id = create_category(&server, "Shops").await;
        let address: String = StreetName().fake();

        let response = server
            .post("/api/items")
            .json(&json!({
                "category": category_id,
                "name": "Corner Shop",
                "address": address,
                "latitude": 41.31,
                "longitude": 69.28,
                "phone_numbers": "+998 71 200-00-00",
                "photos": ["photos/0-forged.jpg"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["working_hours"], json!({}));
        assert_eq!(created["photos"], json!([]));
        assert_eq!(created["avatar_photo"], Value::Null);

        let patched: Value = server
            .patch(&format!("/api/items/{}", id))
            .json(&json!({ "phone_numbers": null, "working_hours": {"mon": "9-18"} }))
            .await
            .json();
        assert_eq!(patched["phone_numbers"], Value::Null);
        assert_eq!(patched["working_hours"], json!({"mon": "9-18"}));
        assert_eq!(patched["address"], json!(address));

        let response = server
            .patch(&format!("/api/items/{}", id))
            .json(&json!({ "name": null }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["errors"]["name"].is_array());

        let replaced: Value = server
            .put(&format!("/api/items/{}", id))
            .json(&json!({
                "category": category_id,
                "name": "Corner Shop 2",
                "address": "2 Main St",
                "latitude": 0.0,
                "longitude": 0.0
            }))
            .await
            .json();
        assert_eq!(replaced["name"], "Corner Shop 2");
        assert_eq!(replaced["working_hours"], json!({}));

        let list: Value = server.get("/api/items").await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);

        server
            .delete(&format!("/api/items/{}", id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/items/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_item_validation_errors(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, _media) = server_with(pool, &media_dir);

        let response = server
            .post("/api/items")
            .json(&json!({
                "name": "No Category",
                "address": "x",
                "latitude": 0.0,
                "longitude": 0.0
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["errors"]["category"].is_array());

        let response = server
            .post("/api/items")
            .json(&json!({
                "category": 999_999,
                "name": "Ghost",
                "address": "x",
                "latitude": 0.0,
                "longitude": 0.0
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert!(body["errors"]["category"][0]
            .as_str()
            .unwrap()
            .contains("999999"));

        let response = server
            .post("/admin/items")
            .multipart(
                MultipartForm::new()
                    .add_text("category", "1")
                    .add_text("name", "x".repeat(101)),
            )
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let errors = &response.json::<Value>()["errors"];
        assert!(errors["address"].is_array());
        assert!(errors["latitude"].is_array());

        server
            .get("/api/items/424242")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_admin_category_icon(pool: PgPool) {
        let media_dir = TempDir::new().unwrap();
        let (server, media) = server_with(pool, &media_dir);

        let response = server
            .post("/admin/categories")
            .multipart(
                MultipartForm::new()
                    .add_text("name", "Restaurants")
                    .add_part(
                        "icon",
                        Part::bytes(b"png".as_slice())
                            .file_name("fork.png")
                            .mime_type("image/png"),
                    ),
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        let id = created["id"].as_i64().unwrap();
        let icon = format!("category_icons/{}-fork.png", id);
        assert_eq!(created["icon"], json!(icon));
        assert!(media.exists(&icon).await);

        let cleared: Value = server
            .post(&format!("/admin/categories/{}", id))
            .multipart(
                MultipartForm::new()
                    .add_text("name", "Restaurants")
                    .add_text("icon-clear", "on"),
            )
            .await
            .json();
        assert_eq!(cleared["icon"], Value::Null);
        assert!(!media.exists(&icon).await);

        server
            .post("/admin/categories/424242")
            .multipart(MultipartForm::new().add_text("name", "Nope"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
