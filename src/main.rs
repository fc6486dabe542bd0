use crm_insights_api::{
    api::build_router, auth::hash_token, config::Config, db::Database, db_storage::CrmStorage,
    handlers::AppState,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and migrations.
/// - The bootstrap admin, when configured.
/// - The auth cache.
/// - HTTP routes and middleware (CORS, body limit, rate limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_insights_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    if let Some(token) = &config.bootstrap_admin_token {
        let admin = CrmStorage::new(db.pool.clone())
            .upsert_admin(&config.bootstrap_admin_email, &hash_token(token))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin: {}", e))?;
        tracing::info!("✓ Bootstrap admin ready: {}", admin.email);
    }

    // Resolved API tokens, keyed by digest
    let auth_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.auth_cache_ttl_secs))
        .max_capacity(10_000)
        .build();
    tracing::info!(
        "Auth cache initialized ({}s TTL)",
        config.auth_cache_ttl_secs
    );

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        auth_cache,
    });

    let app = build_router(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
