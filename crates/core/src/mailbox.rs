use tokio::sync::{mpsc, oneshot};

use crate::forced_rollback::ForceRollbackOutcome;
use crate::point::{Point, Tip};

/// Fixed mailbox capacity. Larger trades memory for faster catch-up after a
/// burst; hard-coded rather than configurable, it is part of the memory
/// contract of the pipeline.
pub const MAILBOX_CAPACITY: usize = 100;

/// `RollBackward`'s third field is `Some` only when this rollback was
/// triggered by a forced-rollback request: the consumer replies on it only
/// after `store.rollback_to` has actually applied the rollback, so the HTTP
/// caller's `onSuccess`/`onFailure` reflects the store's real state instead
/// of firing as soon as the item is merely enqueued.
pub enum MailboxItem {
    RollForward(Tip, Vec<u8>),
    RollBackward(Tip, Point, Option<oneshot::Sender<ForceRollbackOutcome>>),
}

impl std::fmt::Debug for MailboxItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailboxItem::RollForward(tip, block) => {
                f.debug_tuple("RollForward").field(tip).field(&block.len()).finish()
            }
            MailboxItem::RollBackward(tip, point, reply) => f
                .debug_tuple("RollBackward")
                .field(tip)
                .field(point)
                .field(&reply.is_some())
                .finish(),
        }
    }
}

pub fn channel() -> (mpsc::Sender<MailboxItem>, mpsc::Receiver<MailboxItem>) {
    mpsc::channel(MAILBOX_CAPACITY)
}

/// One drain: either a non-empty run of coalesced `RollForward` items, or a
/// single `RollBackward`. A rollback never merges with forwards preceding or
/// following it.
pub enum Drained {
    Forward(Vec<(Tip, Vec<u8>)>),
    Backward(Tip, Point, Option<oneshot::Sender<ForceRollbackOutcome>>),
}

impl std::fmt::Debug for Drained {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Drained::Forward(items) => f.debug_tuple("Forward").field(&items.len()).finish(),
            Drained::Backward(tip, point, reply) => f
                .debug_tuple("Backward")
                .field(tip)
                .field(point)
                .field(&reply.is_some())
                .finish(),
        }
    }
}

/// Consumer-side wrapper around the mailbox receiver that implements the
/// batching/coalescing rule: forwards are merged up to `max_batch`, a
/// rollback is always delivered alone and never absorbed into a forward
/// batch (or vice versa). A rollback observed while a batch is being filled
/// is buffered and returned first on the next call.
pub struct MailboxDrainer {
    rx: mpsc::Receiver<MailboxItem>,
    pending: Option<MailboxItem>,
}

impl MailboxDrainer {
    pub fn new(rx: mpsc::Receiver<MailboxItem>) -> Self {
        Self { rx, pending: None }
    }

    pub async fn drain_batch(&mut self, max_batch: usize) -> Option<Drained> {
        let first = match self.pending.take() {
            Some(item) => item,
            None => self.rx.recv().await?,
        };

        match first {
            MailboxItem::RollBackward(tip, point, reply) => Some(Drained::Backward(tip, point, reply)),
            MailboxItem::RollForward(tip, block) => {
                let mut batch = vec![(tip, block)];
                while batch.len() < max_batch {
                    match self.rx.try_recv() {
                        Ok(MailboxItem::RollForward(tip, block)) => batch.push((tip, block)),
                        Ok(backward @ MailboxItem::RollBackward(..)) => {
                            self.pending = Some(backward);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                Some(Drained::Forward(batch))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coalesces_consecutive_forwards() {
        let (tx, rx) = channel();
        for i in 1..=3u64 {
            tx.send(MailboxItem::RollForward(Point::Specific(i, vec![i as u8; 32]), vec![]))
                .await
                .unwrap();
        }
        let mut drainer = MailboxDrainer::new(rx);
        match drainer.drain_batch(10).await.unwrap() {
            Drained::Forward(items) => assert_eq!(items.len(), 3),
            Drained::Backward(..) => panic!("expected forward batch"),
        }
    }

    #[tokio::test]
    async fn rollback_never_joins_a_forward_batch() {
        let (tx, rx) = channel();
        tx.send(MailboxItem::RollForward(Point::Specific(1, vec![1; 32]), vec![]))
            .await
            .unwrap();
        tx.send(MailboxItem::RollBackward(
            Point::Specific(1, vec![1; 32]),
            Point::Origin,
            None,
        ))
        .await
        .unwrap();
        tx.send(MailboxItem::RollForward(Point::Specific(2, vec![2; 32]), vec![]))
            .await
            .unwrap();

        let mut drainer = MailboxDrainer::new(rx);
        match drainer.drain_batch(10).await.unwrap() {
            Drained::Forward(items) => assert_eq!(items.len(), 1),
            Drained::Backward(..) => panic!("expected forward batch first"),
        }
        match drainer.drain_batch(10).await.unwrap() {
            Drained::Backward(..) => {}
            Drained::Forward(..) => panic!("expected buffered rollback"),
        }
        match drainer.drain_batch(10).await.unwrap() {
            Drained::Forward(items) => assert_eq!(items.len(), 1),
            Drained::Backward(..) => panic!("expected the trailing forward"),
        }
    }
}
