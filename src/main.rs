//! altprod - alternative product information system server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use altprod::{
    auth::TokenAuthority,
    config::{Args, LogFormat, StoreBackend},
    db::{DocumentStore, MemoryStore, MongoStore, TimedStore},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // RUST_LOG wins over LOG_LEVEL
    let json = args.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("altprod={},info", args.log_level).into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  altprod - alternative product server");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen_addr());
    info!("Mode: {}", args.mode);
    info!("Store: {:?} ({})", args.store.backend, args.store.redacted_uri());
    info!("Database: {}", args.store.mongodb_db);
    info!("CORS origins: {}", args.allowed_origins().join(", "));
    info!("======================================");

    let store: Arc<dyn DocumentStore> = match args.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Mongo => {
            match MongoStore::connect(&args.store.connection_uri(), &args.store.mongodb_db).await {
                Ok(store) => {
                    info!("MongoDB connected successfully");
                    Arc::new(store)
                }
                Err(e) => {
                    if args.is_production() {
                        error!("MongoDB connection failed: {}", e);
                        std::process::exit(1);
                    }
                    warn!("MongoDB connection failed (development, using in-memory store): {}", e);
                    Arc::new(MemoryStore::new())
                }
            }
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(TimedStore::new(store, args.store.timeout()));

    let Some(secret) = args.token_secret() else {
        error!("ACCESS_TOKEN_SECRET is required in production mode");
        std::process::exit(1);
    };
    let authority = TokenAuthority::new(secret, args.token_expiry_seconds)?;
    if args.access_token_secret.is_none() {
        warn!("ACCESS_TOKEN_SECRET not set; using the built-in development secret");
    }

    let state = Arc::new(server::AppState::new(args, store, authority));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
