use actix_web::{App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuitionsync::config::Config;
use tuitionsync::core::MemoryStore;
use tuitionsync::middleware::RequestId;
use tuitionsync::{app, AppState, Collaborators, Storage};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config.app.log_format);

    tracing::info!("Starting TuitionSync reconciliation engine");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let storage = match config.app.storage_backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Storage::Memory(Arc::new(MemoryStore::new()))
        }
        _ => {
            let pool = config
                .database
                .connect_and_migrate()
                .await
                .context("Failed to prepare database")?;

            tracing::info!(
                max_connections = config.database.max_connections,
                "Database pool initialized and migrated"
            );
            Storage::MySql(pool)
        }
    };

    if config.security.admin_api_key_hash.is_none() {
        tracing::warn!("ADMIN_API_KEY_HASH not set, admin endpoints will reject every request");
    }

    let collaborators =
        Collaborators::from_config(&config).context("Failed to build outbound clients")?;
    let state = AppState::build(&config, storage, collaborators);

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .configure(move |cfg| app::configure(cfg, &state))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("Server terminated with an error")
}

/// Text logs by default, JSON lines when `LOG_FORMAT=json`
fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tuitionsync=info,actix_web=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
