//! Installgate Receiver Binary
//!
//! Runs the lifecycle callback receiver and request gate.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use installgate_platform::PlatformClient;
use installgate_receiver::{create_router, AppState, InstallationStore, MemoryStore, ReceiverConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Configuration
    let config = match ReceiverConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", err);
        return ExitCode::FAILURE;
    }

    // Initialize storage
    let store: Arc<dyn InstallationStore> = match open_store(config.database_url.as_deref()).await {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "Storage initialization failed");
            return ExitCode::FAILURE;
        }
    };

    let platform = match PlatformClient::new(config.platform.clone()) {
        Ok(platform) => platform,
        Err(err) => {
            error!(error = %err, "Platform client initialization failed");
            return ExitCode::FAILURE;
        }
    };

    info!(
        port = config.port,
        durable = config.database_url.is_some(),
        leeway_secs = config.verification.leeway_secs,
        audience = ?config.verification.audience,
        http_timeout = ?config.platform.timeout,
        retry_attempts = config.platform.retry.max_attempts,
        token_cache = ?config.platform.token_cache_ttl,
        "Starting installgate receiver"
    );

    // Create application state
    let state = Arc::new(AppState::new(
        store,
        config.verification.clone(),
        platform,
        config.manhour.clone(),
    ));

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %addr, error = %err, "Failed to bind to address");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %addr, "Installgate receiver listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(feature = "sqlite")]
async fn open_store(
    database_url: Option<&str>,
) -> Result<Arc<dyn InstallationStore>, installgate_receiver::StorageError> {
    match database_url {
        Some(url) => Ok(Arc::new(installgate_receiver::SqliteStore::new(url).await?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(
    database_url: Option<&str>,
) -> Result<Arc<dyn InstallationStore>, installgate_receiver::StorageError> {
    match database_url {
        Some(_) => Err(installgate_receiver::StorageError::Connection(
            "built without the sqlite feature".into(),
        )),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
