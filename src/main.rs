//! Wriders - serialized book publishing service
//!
//! Entry point: configuration, logging, storage selection, then the HTTP
//! server.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use wriders::{
    config::{Args, StoreKind},
    db::{MemoryStore, MongoStore, Store},
    logging::init_tracing,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Wriders - serialized books");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    info!("Default WPM: {}", args.default_wpm);
    info!("======================================");

    let store: Arc<dyn Store> = match args.store {
        StoreKind::Memory => {
            warn!("Using in-memory store - data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Mongo => match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(store) => {
                info!("MongoDB connected successfully");
                Arc::new(store)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB connection failed (dev mode, using memory store): {}", e);
                    Arc::new(MemoryStore::new())
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        },
    };

    let state = Arc::new(AppState::new(args, store)?);
    server::run(state).await?;

    Ok(())
}
