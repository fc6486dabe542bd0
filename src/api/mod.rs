// HTTP surface: route table, middleware and API docs
use crate::ai_handlers;
use crate::handlers::{self, AppState};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Serves the OpenAPI specification YAML file.
///
/// This endpoint reads the `openapi.yml` file from the filesystem and serves it
/// with the appropriate content type. If the file is not found, it returns a 404 error.
///
/// # Returns
///
/// * `impl IntoResponse` - The HTTP response containing the OpenAPI YAML content or an error message.
pub async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, pointed at `/api-docs/openapi.yml`.
pub async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CRM Insights API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Leads
        .route(
            "/leads",
            get(handlers::list_leads).post(handlers::create_lead),
        )
        .route("/leads/statistics", get(handlers::lead_statistics))
        .route(
            "/leads/:id",
            get(handlers::get_lead)
                .put(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        .route("/leads/:id/update-ai", post(handlers::update_lead_ai))
        // Contacts and deals
        .route(
            "/contacts",
            get(handlers::list_contacts).post(handlers::create_contact),
        )
        .route(
            "/contacts/:id",
            get(handlers::get_contact)
                .put(handlers::update_contact)
                .delete(handlers::delete_contact),
        )
        .route(
            "/deals",
            get(handlers::list_deals).post(handlers::create_deal),
        )
        .route(
            "/deals/:id",
            get(handlers::get_deal)
                .put(handlers::update_deal)
                .delete(handlers::delete_deal),
        )
        // AI features
        .route("/ai/score-lead", post(ai_handlers::score_lead))
        .route("/ai/categorize-lead", post(ai_handlers::categorize_lead))
        .route("/ai/update-all", post(ai_handlers::update_all))
        .route(
            "/ai/generate-email",
            post(ai_handlers::generate_email_handler),
        )
        .route(
            "/ai/analyze-sentiment",
            post(ai_handlers::analyze_sentiment_handler),
        )
        // Notes
        .route(
            "/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        // Users
        .route("/users", post(handlers::create_user))
        .route("/users/me", get(handlers::current_user))
}

/// Builds the application router.
///
/// `/health` sits outside the body limit and rate limiter. Rate limiting
/// is skipped entirely when `rate_limit_per_second` is 0.
///
/// # Arguments
///
/// * `state` - Shared application state.
///
/// # Returns
///
/// * `anyhow::Result<Router>` - The router, or an error if the rate limiter config is invalid.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let config = &state.config;

    let mut protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .nest("/api/v1", api_routes());

    if config.rate_limit_per_second > 0 {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(config.rate_limit_per_second)
                .burst_size(config.rate_limit_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
        );
        protected_routes = protected_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let protected_routes =
        protected_routes.layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(
            config.max_body_bytes,
        )));

    // Health check bypasses rate limiting
    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
