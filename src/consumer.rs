use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use argus_core::store::InputManagement;

use crate::decode::extract_block_apply;
use crate::prelude::*;

/// Drains the mailbox and applies it to the store: forward batches are
/// decoded against the current pattern snapshot and applied in one
/// transaction, a rollback truncates the store and folds health back to
/// whatever checkpoint remains.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: Arc<dyn Store>,
    patterns: PatternRegistry,
    mailbox_rx: mpsc::Receiver<MailboxItem>,
    health: Health,
    max_batch: usize,
    input_management: InputManagement,
    stability_window: u64,
    cancel: CancelTokenImpl,
) -> Result<(), Error> {
    let mut drainer = MailboxDrainer::new(mailbox_rx);

    loop {
        let drained = tokio::select! {
            biased;
            _ = cancel.0.cancelled() => return Ok(()),
            drained = drainer.drain_batch(max_batch) => drained,
        };

        let Some(drained) = drained else {
            debug!("mailbox closed, consumer stopping");
            return Ok(());
        };

        match drained {
            Drained::Forward(items) => {
                let snapshot = patterns.snapshot();
                let mut blocks = Vec::with_capacity(items.len());

                for (point, raw) in items {
                    let apply = extract_block_apply(&snapshot, &raw, point)?;
                    blocks.push(apply);
                }

                if let Some(last) = blocks.last() {
                    let slot = last.checkpoint.slot();
                    store.apply_blocks(blocks, input_management, stability_window).await?;
                    health.set_checkpoint(slot);
                }
            }
            Drained::Backward(tip, point, reply) => {
                info!(slot = point.slot(), "rolling back");
                // The reply only fires once `rollback_to` has actually
                // applied the rollback, so a forced-rollback caller never
                // observes success before the store reflects it.
                match store.rollback_to(point.slot()).await {
                    Ok(remaining) => {
                        health.set_node_tip(tip.slot());
                        match remaining {
                            Some(slot) => health.set_checkpoint(slot),
                            None => health.set_checkpoint(0),
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(ForceRollbackOutcome::Succeeded);
                        }
                    }
                    Err(err) => {
                        if let Some(reply) = reply {
                            let _ = reply.send(ForceRollbackOutcome::Failed);
                        }
                        return Err(err.into());
                    }
                }
            }
        }
    }
}
