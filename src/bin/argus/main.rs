use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use argus::cli::{load_config, setup_tracing, Cli};
use argus::fetch_client::PeerFetchClient;
use argus::pipeline;
use argus::prelude::*;
use argus_core::config::UpstreamConfig;
use argus_http::Facade;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    setup_tracing(&config.logging)?;

    if let Some(parent) = config.storage.path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::from)?;
    }

    let store: Arc<dyn Store> = Arc::new(
        argus_redb::RedbStore::open(&config.storage.path)
            .map_err(StoreError::from)
            .map_err(Error::from)?,
    );

    let mut initial_patterns = std::collections::HashSet::new();
    for raw in &config.patterns {
        initial_patterns.insert(Pattern::parse(raw).map_err(Error::from)?);
    }
    let already_stored: Vec<Pattern> = store.list_patterns().await.map_err(Error::from)?;
    initial_patterns.extend(already_stored);
    store
        .insert_patterns(&initial_patterns.iter().cloned().collect::<Vec<_>>())
        .await
        .map_err(Error::from)?;

    let patterns = PatternRegistry::new(initial_patterns);
    let health = Health::new();

    if let Some(checkpoint) = store.list_checkpoints_desc().await.map_err(Error::from)?.first() {
        health.set_checkpoint(checkpoint.slot());
    }

    let (force_rollback_handle, force_rollback_rx) = forced_rollback::channel(16);

    let fetch_block: Option<Arc<dyn FetchBlockClient>> = match &config.upstream {
        UpstreamConfig::Peer(peer) => Some(Arc::new(PeerFetchClient::new(
            peer.peer_address.clone(),
            peer.network_magic,
        ))),
    };

    let facade = Facade {
        store: store.clone(),
        patterns: patterns.clone(),
        health: health.clone(),
        force_rollback: force_rollback_handle,
        fetch_block,
        stability_window: config.indexer.stability_window,
        permissive_cors: config.serve.permissive_cors,
    };

    let cancel = CancelTokenImpl(CancellationToken::new());

    let server = tokio::spawn(argus_http::serve(
        facade,
        config.serve.listen_address,
        cancel.0.clone(),
    ));

    let pipeline = pipeline::spawn(
        &config.upstream,
        &config.indexer,
        store,
        patterns,
        health,
        force_rollback_rx,
        cancel.clone(),
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        result = pipeline.join() => {
            result?;
        }
    }

    cancel.0.cancel();
    server.abort();

    Ok(())
}
