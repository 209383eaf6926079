mod auth;
mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod parsing;
mod pipeline;
mod profile;
mod routes;
mod scoring;
mod state;
mod store;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, S3Config, StoreBackend};
use crate::llm_client::LlmClient;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::files::{MemoryFileStore, S3FileStore};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting analyzer API v{}", env!("CARGO_PKG_VERSION"));

    let llm_timeout = Duration::from_secs(config.llm_timeout_secs);
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        &config.llm_base_url,
        config.llm_model.clone(),
        llm_timeout,
        config.llm_max_retries,
    )
    .context("Failed to build completion client")?;
    info!("LLM client initialized (model: {})", config.llm_model);

    let settings = PipelineSettings {
        parse_max_chars: config.parse_max_chars,
        llm_timeout,
        ..Default::default()
    };

    let pipeline = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let s3_config = config
                .s3
                .as_ref()
                .context("S3 settings are required for the postgres backend")?;
            let store = Arc::new(PgStore::connect(database_url).await?);
            let s3 = build_s3_client(s3_config).await;
            info!("S3 client initialized (bucket: {})", s3_config.bucket);
            Pipeline {
                records: store.clone(),
                profiles: store.clone(),
                ledger: store,
                files: Arc::new(S3FileStore::new(s3, s3_config.bucket.clone())),
                llm: Arc::new(llm),
                settings,
            }
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data will not survive a restart");
            let store = Arc::new(MemoryStore::new());
            Pipeline {
                records: store.clone(),
                profiles: store.clone(),
                ledger: store,
                files: Arc::new(MemoryFileStore::new()),
                llm: Arc::new(llm),
                settings,
            }
        }
    };

    let state = AppState {
        pipeline,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(s3: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &s3.access_key_id,
        &s3.secret_access_key,
        None,
        None,
        "analyzer-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&s3.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
