use tokio::sync::{mpsc, oneshot};

use crate::point::Point;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceRollbackOutcome {
    Succeeded,
    Failed,
}

/// A single-shot request from the HTTP control plane to the chain-sync
/// client: rewind to `target` and let the caller know which of the two
/// outcomes happened. Exactly one of the two fires, never both, never
/// neither.
pub struct ForceRollbackRequest {
    pub target: Point,
    pub reply: oneshot::Sender<ForceRollbackOutcome>,
}

/// Handle held by the HTTP layer to ask the chain-sync client for a forced
/// rollback and await its outcome.
#[derive(Clone)]
pub struct ForceRollbackHandle {
    tx: mpsc::Sender<ForceRollbackRequest>,
}

#[derive(Debug, thiserror::Error)]
pub enum ForceRollbackError {
    #[error("chain-sync client is not accepting forced rollback requests")]
    Unavailable,
}

impl ForceRollbackHandle {
    pub fn new(tx: mpsc::Sender<ForceRollbackRequest>) -> Self {
        Self { tx }
    }

    pub async fn request(&self, target: Point) -> Result<ForceRollbackOutcome, ForceRollbackError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ForceRollbackRequest { target, reply })
            .await
            .map_err(|_| ForceRollbackError::Unavailable)?;
        rx.await.map_err(|_| ForceRollbackError::Unavailable)
    }
}

/// Control-plane side of the channel, polled by the chain-sync client
/// alongside its normal chain-sync loop via `tokio::select!`.
pub fn channel(capacity: usize) -> (ForceRollbackHandle, mpsc::Receiver<ForceRollbackRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ForceRollbackHandle::new(tx), rx)
}
