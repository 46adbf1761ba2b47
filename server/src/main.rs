//! Planbook embedding server entrypoint.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use planbook_catalog::CatalogStore;
use planbook_embeddings::{EmbeddingProvider, EmbeddingStore, OpenAiProvider};
use planbook_search::EmbeddingEngine;
use planbook_server::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;

    tracing::info!(
        addr = %config.socket_addr(),
        data_dir = %config.data_dir.display(),
        "Planbook embedding server starting"
    );

    let mut provider = OpenAiProvider::from_env();
    if let Some(model) = &config.model {
        provider = provider.with_model(model);
    }
    if !provider.is_available() {
        tracing::warn!("No OPENAI_API_KEY configured; embedding generation is disabled");
    }

    let catalog = CatalogStore::new(config.catalog_dir()).await?;
    let store = EmbeddingStore::new(config.embeddings_dir()).await?;
    let engine = Arc::new(EmbeddingEngine::new(Arc::new(provider), store, catalog));

    if config.admin_token.is_none() {
        tracing::warn!("No PLANBOOK_ADMIN_TOKEN configured; generation endpoints are disabled");
    }

    let state = AppState::new(engine, config.admin_token.clone());
    let router = create_router(state);

    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install ctrl-c handler");
    }
    tracing::info!("Shutting down");
}
