use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use argus_core::config::{IndexerConfig, UpstreamConfig};

use crate::prelude::*;
use crate::{chainsync, consumer, gardener};

/// The three long-running tasks that make up a running indexer, independent
/// of the HTTP server. Dropping a `Pipeline` does not stop its tasks; use
/// `cancel` and then `join` to shut down cleanly.
pub struct Pipeline {
    pub chainsync: JoinHandle<Result<(), Error>>,
    pub consumer: JoinHandle<Result<(), Error>>,
    pub gardener: JoinHandle<Result<(), Error>>,
}

impl Pipeline {
    pub async fn join(self) -> Result<(), Error> {
        let (chainsync, consumer, gardener) =
            tokio::join!(self.chainsync, self.consumer, self.gardener);

        chainsync.map_err(|e| Error::message(format!("chainsync task panicked: {e}")))??;
        consumer.map_err(|e| Error::message(format!("consumer task panicked: {e}")))??;
        gardener.map_err(|e| Error::message(format!("gardener task panicked: {e}")))??;

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    upstream: &UpstreamConfig,
    indexer: &IndexerConfig,
    store: Arc<dyn Store>,
    patterns: PatternRegistry,
    health: Health,
    force_rollback_rx: mpsc::Receiver<ForceRollbackRequest>,
    cancel: CancelTokenImpl,
) -> Pipeline {
    let (mailbox_tx, mailbox_rx) = mailbox::channel();

    let chainsync = tokio::spawn(chainsync::run(
        upstream.peer_address().to_string(),
        upstream.network_magic(),
        indexer.pull_batch_size,
        indexer.stability_window,
        store.clone(),
        mailbox_tx,
        health.clone(),
        force_rollback_rx,
        cancel.clone(),
    ));

    let consumer = tokio::spawn(consumer::run(
        store.clone(),
        patterns,
        mailbox_rx,
        health.clone(),
        indexer.pull_batch_size,
        indexer.input_management.into(),
        indexer.stability_window,
        cancel.clone(),
    ));

    let gardener = tokio::spawn(gardener::run(
        store,
        health,
        indexer.input_management.into(),
        indexer.stability_window,
        Duration::from_secs(indexer.prune_throttle_delay_secs),
        cancel,
    ));

    Pipeline {
        chainsync,
        consumer,
        gardener,
    }
}
