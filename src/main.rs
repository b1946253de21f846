//! adcraft server
//!
//! Serves the REST API over the sled store at `ADCRAFT_DATA_DIR`.
//!
//! Usage:
//!   cargo run --bin adcraft                              # start server
//!   cargo run --bin plan_admin -- owner@example.com business
//!   # Then drive it with adcraft-cli or curl (see /swagger-ui)

use std::sync::Arc;
use tokio::net::TcpListener;

use adcraft::auth::JwtKeys;
use adcraft::config::Config;
use adcraft::generation::GeminiClient;
use adcraft::logging::init_logging;
use adcraft::orchestrator::Orchestrator;
use adcraft::reconcile::{RetryPolicy, UsageReconciler};
use adcraft::rest::{create_router, AppState};
use adcraft::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real deployments set the environment directly
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;
    let _log_guard = init_logging(config.log_format, config.log_dir.as_deref())?;

    let storage = Storage::open(&config.data_dir.to_string_lossy())?;
    let jwt = Arc::new(JwtKeys::new(config.jwt_secret.as_bytes(), config.token_ttl));
    let generator = GeminiClient::new(
        &config.gemini_api_url,
        &config.gemini_api_key,
        &config.gemini_model,
    )?;

    let (reconciler, reconciler_task) =
        UsageReconciler::spawn(Arc::new(storage.clone()), RetryPolicy::default());
    let orchestrator = Orchestrator::new(jwt.clone(), Arc::new(storage.clone()), Arc::new(generator))
        .with_generation_timeout(config.generation_timeout)
        .with_reconciler(reconciler);

    let app = create_router(AppState::new(storage.clone(), Arc::new(orchestrator), jwt));

    tracing::info!(
        bind = %config.bind,
        data_dir = %config.data_dir.display(),
        model = %config.gemini_model,
        "adcraft listening"
    );
    let listener = TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router (and with it the last reconciler sender) is gone; drain retries
    if let Err(e) = reconciler_task.await {
        tracing::error!(error = %e, "usage reconciler task failed");
    }
    storage.flush().await?;
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down...");
}
