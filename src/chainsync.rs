use std::sync::Arc;
use std::time::Duration;

use pallas::network::facades::PeerClient;
use pallas::network::miniprotocols::chainsync::{
    NextResponse, RollbackBuffer, RollbackEffect, Tip as WireTip,
};
use pallas::network::miniprotocols::Point as WirePoint;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::prelude::*;

fn to_wire(point: &Point) -> WirePoint {
    match point {
        Point::Origin => WirePoint::Origin,
        Point::Specific(slot, hash) => WirePoint::Specific(*slot, hash.clone()),
    }
}

fn from_wire(point: &WirePoint) -> Point {
    match point {
        WirePoint::Origin => Point::Origin,
        WirePoint::Specific(slot, hash) => Point::Specific(*slot, hash.clone()),
    }
}

fn tip_from_wire(tip: &WireTip) -> Tip {
    from_wire(&tip.0)
}

/// Exponential back-off between reconnection attempts, capped at `max`.
struct Backoff {
    attempt: u32,
    unit: Duration,
    max: Duration,
}

impl Backoff {
    fn new(unit: Duration, max: Duration) -> Self {
        Self { attempt: 0, unit, max }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt.min(16)).unwrap_or(u32::MAX);
        let delay = self.unit.saturating_mul(factor);
        self.attempt = self.attempt.saturating_add(1);
        delay.min(self.max)
    }
}

/// Where the next intersection should come from: the store's own
/// back-off candidates, or a single point demanded by a forced rollback.
enum Intersect {
    Candidates(Vec<Point>),
    Forced(Point, oneshot::Sender<ForceRollbackOutcome>),
}

enum FollowOutcome {
    Cancelled,
    ForceRollback(ForceRollbackRequest),
}

/// Drives the upstream chain-sync protocol: finds an intersection, pulls
/// block batches, and forwards them to the consumer mailbox. Reconnects with
/// exponential back-off on any protocol or network error, and hands control
/// back to the outer loop whenever a forced rollback request arrives so it
/// can be honored with a fresh connection.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    peer_address: String,
    network_magic: u64,
    pull_batch_size: usize,
    stability_window: u64,
    store: Arc<dyn Store>,
    mailbox_tx: mpsc::Sender<MailboxItem>,
    health: Health,
    mut force_rollback_rx: mpsc::Receiver<ForceRollbackRequest>,
    cancel: CancelTokenImpl,
) -> Result<(), Error> {
    let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
    let mut pending_force: Option<(Point, oneshot::Sender<ForceRollbackOutcome>)> = None;

    loop {
        if cancel.0.is_cancelled() {
            return Ok(());
        }

        let intersect = match pending_force.take() {
            Some((target, reply)) => Intersect::Forced(target, reply),
            None => Intersect::Candidates(store.intersect_candidates(5).await?),
        };

        let outcome = connect_and_follow(
            &peer_address,
            network_magic,
            pull_batch_size,
            intersect,
            &mailbox_tx,
            &health,
            &mut force_rollback_rx,
            &cancel,
        )
        .await;

        match outcome {
            Ok(FollowOutcome::Cancelled) => return Ok(()),
            Ok(FollowOutcome::ForceRollback(request)) => {
                let checkpoint = health.snapshot().most_recent_checkpoint.unwrap_or(0);
                if checkpoint.saturating_sub(request.target.slot()) > stability_window {
                    warn!(target = ?request.target, "forced rollback target outside stability window, refusing");
                    let _ = request.reply.send(ForceRollbackOutcome::Failed);
                    continue;
                }

                pending_force = Some((request.target, request.reply));
                backoff.reset();
            }
            Err(err) => {
                health.set_connected(false);
                let delay = backoff.next_delay();
                warn!(error = %err, delay_secs = delay.as_secs(), "chain-sync connection lost, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.0.cancelled() => return Ok(()),
                }
            }
        }
    }
}

enum PullBatch {
    BlockRange(WirePoint, WirePoint),
    OutOfScopeRollback(WirePoint, Option<WireTip>),
    Empty,
}

#[allow(clippy::too_many_arguments)]
async fn connect_and_follow(
    peer_address: &str,
    network_magic: u64,
    pull_batch_size: usize,
    intersect: Intersect,
    mailbox_tx: &mpsc::Sender<MailboxItem>,
    health: &Health,
    force_rollback_rx: &mut mpsc::Receiver<ForceRollbackRequest>,
    cancel: &CancelTokenImpl,
) -> Result<FollowOutcome, Error> {
    debug!(address = peer_address, magic = network_magic, "connecting to peer");

    let mut peer = PeerClient::connect(peer_address, network_magic)
        .await
        .map_err(Error::client)?;

    info!(address = peer_address, magic = network_magic, "connected to peer");

    match intersect {
        Intersect::Candidates(points) => {
            let wire_candidates = points.iter().map(to_wire).collect::<Vec<_>>();
            let (point, _) = peer
                .chainsync()
                .find_intersect(wire_candidates)
                .await
                .map_err(Error::client)?;
            point.ok_or_else(|| Error::client("couldn't find intersection with any candidate"))?;
        }
        Intersect::Forced(target, reply) => {
            let (point, _) = peer
                .chainsync()
                .find_intersect(vec![to_wire(&target)])
                .await
                .map_err(Error::client)?;

            match point {
                Some(point) => {
                    let found = from_wire(&point);
                    info!(?found, "forced rollback intersection found");
                    // The reply travels with the mailbox item: the consumer
                    // only fires it once `store.rollback_to` has actually
                    // applied this rollback, not as soon as it's enqueued.
                    mailbox_tx
                        .send(MailboxItem::RollBackward(found.clone(), found, Some(reply)))
                        .await
                        .map_err(|_| Error::client("mailbox closed"))?;
                }
                None => {
                    let _ = reply.send(ForceRollbackOutcome::Failed);
                    return Err(Error::client("forced rollback target not found upstream"));
                }
            }
        }
    };

    health.set_connected(true);

    loop {
        if cancel.0.is_cancelled() {
            return Ok(FollowOutcome::Cancelled);
        }

        let has_agency = peer.chainsync().has_agency();

        tokio::select! {
            biased;

            _ = cancel.0.cancelled() => return Ok(FollowOutcome::Cancelled),

            request = force_rollback_rx.recv() => {
                let request = request.ok_or_else(|| Error::client("force-rollback channel closed"))?;
                return Ok(FollowOutcome::ForceRollback(request));
            }

            result = pull_or_await(&mut peer, has_agency, pull_batch_size) => {
                let batch = result?;
                apply_batch(&mut peer, batch, mailbox_tx, health).await?;
            }
        }
    }
}

async fn pull_or_await(
    peer: &mut PeerClient,
    has_agency: bool,
    pull_batch_size: usize,
) -> Result<PullBatch, Error> {
    if has_agency {
        gather_pull_batch(peer, pull_batch_size).await
    } else {
        let next = peer
            .chainsync()
            .recv_while_must_reply()
            .await
            .map_err(Error::client)?;

        match next {
            NextResponse::RollForward(header, _tip) => {
                let header = decode_header(&header)?;
                let point = WirePoint::Specific(header.0, header.1);
                Ok(PullBatch::BlockRange(point.clone(), point))
            }
            NextResponse::RollBackward(point, tip) => Ok(PullBatch::OutOfScopeRollback(point, Some(tip))),
            NextResponse::Await => Ok(PullBatch::Empty),
        }
    }
}

fn decode_header(
    header: &pallas::network::miniprotocols::chainsync::HeaderContent,
) -> Result<(u64, Vec<u8>), Error> {
    use pallas::ledger::traverse::MultiEraHeader;

    let decoded = match header.byron_prefix {
        Some((subtag, _)) => MultiEraHeader::decode(header.variant, Some(subtag), &header.cbor),
        None => MultiEraHeader::decode(header.variant, None, &header.cbor),
    }
    .map_err(Error::decode)?;

    Ok((decoded.slot(), decoded.hash().to_vec()))
}

async fn gather_pull_batch(peer: &mut PeerClient, pull_batch_size: usize) -> Result<PullBatch, Error> {
    let client = peer.chainsync();
    let mut buffer = RollbackBuffer::new();

    while buffer.size() < pull_batch_size {
        let next = client.request_next().await.map_err(Error::client)?;

        match next {
            NextResponse::RollForward(header, _tip) => {
                let (slot, hash) = decode_header(&header)?;
                buffer.roll_forward(WirePoint::Specific(slot, hash));
            }
            NextResponse::RollBackward(point, tip) => match buffer.roll_back(&point) {
                RollbackEffect::OutOfScope => return Ok(PullBatch::OutOfScopeRollback(point, Some(tip))),
                RollbackEffect::Handled => (),
            },
            NextResponse::Await => break,
        }
    }

    match (buffer.oldest(), buffer.latest()) {
        (Some(a), Some(b)) => Ok(PullBatch::BlockRange(a.clone(), b.clone())),
        _ => Ok(PullBatch::Empty),
    }
}

async fn apply_batch(
    peer: &mut PeerClient,
    batch: PullBatch,
    mailbox_tx: &mpsc::Sender<MailboxItem>,
    health: &Health,
) -> Result<(), Error> {
    match batch {
        PullBatch::BlockRange(start, end) => {
            let blocks = peer
                .blockfetch()
                .fetch_range((start, end.clone()))
                .await
                .map_err(Error::client)?;

            let tip = from_wire(&end);
            health.set_node_tip(tip.slot());

            for body in blocks {
                let point = block_point(&body)?;
                mailbox_tx
                    .send(MailboxItem::RollForward(point, body))
                    .await
                    .map_err(|_| Error::client("mailbox closed"))?;
            }
        }
        PullBatch::OutOfScopeRollback(point, tip) => {
            let core_point = from_wire(&point);
            let core_tip = tip.map(|t| tip_from_wire(&t)).unwrap_or_else(|| core_point.clone());
            health.set_node_tip(core_tip.slot());
            mailbox_tx
                .send(MailboxItem::RollBackward(core_tip, core_point, None))
                .await
                .map_err(|_| Error::client("mailbox closed"))?;
        }
        PullBatch::Empty => (),
    }

    Ok(())
}

fn block_point(body: &[u8]) -> Result<Point, Error> {
    use pallas::ledger::traverse::MultiEraBlock;

    let decoded = MultiEraBlock::decode(body).map_err(Error::decode)?;
    Ok(Point::Specific(decoded.slot(), decoded.hash().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn backoff_reset_starts_over() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn wire_point_roundtrips_through_core_point() {
        let point = Point::Specific(42, vec![1, 2, 3]);
        assert_eq!(from_wire(&to_wire(&point)), point);

        assert_eq!(from_wire(&to_wire(&Point::Origin)), Point::Origin);
    }
}
