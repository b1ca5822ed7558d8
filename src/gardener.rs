use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::prelude::*;

/// Periodic eventual-deletion GC. Under `MarkSpentInputs` it stays idle
/// forever; under `RemoveSpentInputs` it wakes up on a fixed interval and
/// deletes spends older than the stability window, then sweeps binary data
/// no live input references anymore.
pub async fn run(
    store: Arc<dyn Store>,
    health: Health,
    input_management: InputManagement,
    stability_window: u64,
    throttle: Duration,
    cancel: CancelTokenImpl,
) -> Result<(), Error> {
    if !matches!(input_management, InputManagement::RemoveSpentInputs) {
        debug!("input management keeps spent inputs, gardener idle");
        cancel.cancelled().await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(throttle);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.0.cancelled() => return Ok(()),
            _ = interval.tick() => {
                let tip_slot = health.snapshot().most_recent_node_tip.unwrap_or(0);
                if tip_slot == 0 {
                    continue;
                }

                match store.prune_inputs(stability_window, tip_slot).await {
                    Ok(count) if count > 0 => info!(count, "pruned spent inputs"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to prune spent inputs"),
                }

                match store.prune_binary_data().await {
                    Ok(count) if count > 0 => info!(count, "pruned orphaned binary data"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to prune binary data"),
                }
            }
        }
    }
}
