//! Demo service exposing CRUD endpoints for a `Widget` resource at `/widgets`.
//!
//! Data lives in memory unless the crate is built with `--features postgres`
//! and `DATABASE_URL` is set.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use common_server::auth::TokenAuthority;
use common_server::cache::MemoryCache;
use common_server::demo::{CreateWidget, UpdateWidget, Widget, WidgetResponse};
use common_server::logging::init_tracing;
use common_server::network::{crud_router, AppState, NetworkModule};
use common_server::storage::{MemoryDatabase, MutationObserver, TracingMutationObserver};
use common_server::{AppConfig, Database, RepositoryFactory};
use tracing::{info, warn};

async fn open_database(config: &AppConfig) -> anyhow::Result<Arc<dyn Database>> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let db = common_server::storage::datastores::PostgresDatabase::connect(
                url,
                config.db_pool_size,
            )
            .await
            .context("failed to connect to database")?;
            info!(pool_size = config.db_pool_size, "using postgres store");
            Ok(Arc::new(db))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("DATABASE_URL is set but postgres support is not compiled in; using memory store");
            Ok(Arc::new(MemoryDatabase::new()))
        }
        None => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    init_tracing(&config.log_config());

    if config.uses_default_secret() {
        if config.is_production() {
            anyhow::bail!("JWT_SECRET_KEY must be set in production");
        }
        warn!("JWT_SECRET_KEY is not set; using the development default");
    }

    let database = open_database(&config).await?;
    let factory = RepositoryFactory::new(
        database,
        vec![Arc::new(TracingMutationObserver) as Arc<dyn MutationObserver>],
    );
    factory
        .register::<Widget>()
        .await
        .context("failed to register widgets collection")?;

    let state = AppState {
        factory,
        tokens: Arc::new(TokenAuthority::new(config.token_config()?)),
        cache: Arc::new(MemoryCache::new(config.cache_capacity, config.cache_ttl())),
        cache_ttl: config.cache_ttl(),
        cache_epochs: Arc::default(),
        service_name: Arc::from(config.service_name.as_str()),
        start_time: Instant::now(),
    };

    let mut server = NetworkModule::new(config.network_config(), state).nest(
        "/widgets",
        crud_router::<Widget, CreateWidget, UpdateWidget, WidgetResponse>(),
    );
    let port = server.start().await?;
    info!(service = %config.service_name, port, "server started");

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await
}
