//! Converge Server binary.

use converge_engine::Cloud;
use converge_server::config::Config;
use converge_server::{app, startup, store, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "converge_server=debug,converge_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Converge Server on {}:{}", config.host, config.port);

    // Build application state
    let cloud = Cloud::new_shared();
    let state = AppState::new(cloud.clone());

    // Reconcile in the background; the server stays up whatever the outcome
    let schema_store = store::connect(config.store.as_ref());
    startup::spawn(
        cloud,
        schema_store,
        config.schema_path.clone(),
        config.sync,
        state.status.clone(),
    );

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
