use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lease_credit_enrichment::config::Config;
use lease_credit_enrichment::enrichment::EnrichmentOrchestrator;
use lease_credit_enrichment::handlers::{self, AppState};
use lease_credit_enrichment::registry::{FilingsRegistryClient, FormationRegistryClient};

/// Main entry point for the enrichment service.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Registry clients and the enrichment orchestrator (which owns the fact cache).
/// - HTTP routes and middleware (CORS, rate limiting, body size limit).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lease_credit_enrichment=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let filings = FilingsRegistryClient::new(
        config.filings_registry_url.clone(),
        &config.filings_user_agent,
        config.registry_timeout,
    )?;
    let formation = FormationRegistryClient::new(
        config.formation_registry_url.clone(),
        config.formation_api_token.clone(),
        config.registry_timeout,
    )?;
    tracing::info!("Registry clients initialized");

    let orchestrator =
        EnrichmentOrchestrator::new(Arc::new(filings), Arc::new(formation), config.settings())?;
    tracing::info!(
        "Enrichment orchestrator ready ({} in-flight lookups, {}s cache TTL)",
        config.max_in_flight,
        config.cache_ttl.as_secs()
    );

    let app_state = Arc::new(AppState {
        orchestrator,
        default_policy: config.discount_policy.clone(),
    });

    // Configure rate limiter: 5 requests/second per IP, burst of 10
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5)
            .burst_size(10)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = handlers::routes(app_state)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
