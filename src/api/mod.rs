//! API layer - HTTP handlers and routing
//!
//! JSON endpoints live under `/api/v1` and answer with the
//! `{ ok, data }` / `{ ok, error, code, details }` envelope. Public pages
//! are rendered server-side by [`pages`]; uploaded images are served from
//! the configured public prefix.

pub mod admin;
pub mod articles;
pub mod auth;
pub mod comments;
pub mod common;
pub mod communities;
pub mod hubs;
pub mod middleware;
pub mod pages;
pub mod products;
pub mod site;
pub mod talents;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin/talents", talents::admin_router())
        .nest("/admin/communities", communities::admin_router())
        .nest("/admin/articles", articles::admin_router())
        .nest("/admin/products", products::admin_router())
        .nest(
            "/admin",
            admin::router()
                .merge(hubs::admin_router())
                .merge(site::admin_router()),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/talents", talents::protected_router())
        .nest("/communities", communities::protected_router())
        .nest("/articles", articles::protected_router())
        .nest("/products", products::protected_router())
        .nest("/me/articles", articles::author_router())
        .nest("/me/products", products::owner_router())
        .nest("/upload", upload::router(state.config.upload.max_file_size))
        .merge(comments::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/talents", talents::public_router())
        .nest("/communities", communities::public_router())
        .nest("/articles", articles::public_router())
        .nest("/products", products::public_router())
        .nest("/site", site::public_router())
        .merge(hubs::public_router())
        .merge(comments::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
        .fallback(api_not_found)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin.trim() == "*" {
        return base.allow_origin(AllowOrigin::any());
    }

    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => base.allow_origin(value).allow_credentials(true),
        Err(e) => {
            tracing::warn!(origin, "Invalid CORS origin, cross-origin requests disabled: {}", e);
            base
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let upload_prefix = state.config.upload.public_prefix.trim_end_matches('/').to_string();
    let uploads = ServeDir::new(&state.config.upload.path);

    let pages = pages::router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::optional_auth,
    ));

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service(&upload_prefix, uploads)
        .merge(pages)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::test_server;
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn test_unknown_api_route_uses_envelope() {
        let (server, _state, _scratch) = test_server().await;
        let response = server.get("/api/v1/tidak-ada").await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_admin_routes_require_login() {
        let (server, _state, _scratch) = test_server().await;
        for path in ["/api/v1/admin/dashboard", "/api/v1/admin/hubs", "/api/v1/admin/talents"] {
            server.get(path).await.assert_status_unauthorized();
        }
    }

    #[test]
    fn test_cors_layer_accepts_any_origin_value() {
        // invalid header values fall back to no CORS instead of panicking
        let _ = cors_layer("https://pemudamagelang.id");
        let _ = cors_layer("*");
        let _ = cors_layer("bad\norigin");
    }
}
