pub mod api;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::Config, docs::ApiDoc, state::AppState, ws::handler::websocket_handler};
use api::create_api_routes;

/// Assemble the full application: REST API, real-time channel and docs
pub fn app_router(state: AppState, config: &Config) -> Router {
    Router::new()
        // Mount API routes
        .nest("/api", create_api_routes())
        // Real-time channel
        .route("/ws", get(websocket_handler))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(config))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = match &config.cors_origins {
        Some(origins) => origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, DocumentSummary};
    use crate::test_support::{broken_state, file_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_create_get_update_list() {
        let (state, _dir) = file_state().await;
        let router = app_router(state, &Config::default());

        let (status, body) = call(
            router.clone(),
            json_request(Method::POST, "/api/documents", serde_json::json!({"title": "Agenda"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let created: Document = parse(&body);
        assert_eq!(created.title, "Agenda");

        let (status, body) = call(
            router.clone(),
            json_request(
                Method::PUT,
                &format!("/api/documents/{}", created.id),
                serde_json::json!({"content": "{\"ops\":[]}"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated: Document = parse(&body);
        assert_eq!(updated.title, "Agenda");
        assert_eq!(updated.content, "{\"ops\":[]}");

        let (status, body) = call(router.clone(), get_request(&format!("/api/documents/{}", created.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Document>(&body), updated);

        let (status, body) = call(router, get_request("/api/documents")).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<DocumentSummary> = parse(&body);
        assert_eq!(listed, vec![updated.summary()]);
    }

    #[tokio::test]
    async fn test_create_without_body_uses_default_title() {
        let (state, _dir) = file_state().await;
        let router = app_router(state, &Config::default());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/documents")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Document>(&body).title, crate::models::DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let (state, _dir) = file_state().await;
        let router = app_router(state, &Config::default());
        let missing = uuid::Uuid::new_v4();

        let (status, _) = call(router.clone(), get_request(&format!("/api/documents/{}", missing))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            router,
            json_request(
                Method::PUT,
                &format!("/api/documents/{}", missing),
                serde_json::json!({"title": "x"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let (state, _dir) = file_state().await;
        let router = app_router(state, &Config::default());
        let (status, _) = call(router, get_request("/api/documents/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_listing_only() {
        let router = app_router(broken_state(), &Config::default());

        let (status, body) = call(router.clone(), get_request("/api/documents")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(parse::<Vec<DocumentSummary>>(&body).is_empty());

        let (status, _) = call(
            router.clone(),
            json_request(Method::POST, "/api/documents", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call(router.clone(), get_request(&format!("/api/documents/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call(router, get_request("/api/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_and_diagnostics() {
        let (state, _dir) = file_state().await;
        let router = app_router(state, &Config::default());

        let (status, _) = call(router.clone(), get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(router, get_request("/api/diagnostics")).await;
        assert_eq!(status, StatusCode::OK);
        let diagnostics: crate::models::DiagnosticsResponse = parse(&body);
        assert_eq!(diagnostics.n_conn, 0);
        assert_eq!(diagnostics.n_rooms, 0);
    }
}
