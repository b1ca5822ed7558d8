use pallas::network::facades::PeerClient;
use pallas::network::miniprotocols::Point as WirePoint;
use tokio::sync::Mutex;

use argus_core::fetch::{FetchBlockClient, FetchBlockError};
use argus_core::point::Point;

fn to_wire(point: &Point) -> WirePoint {
    match point {
        Point::Origin => WirePoint::Origin,
        Point::Specific(slot, hash) => WirePoint::Specific(*slot, hash.clone()),
    }
}

/// Serves `/metadata` lookups over a dedicated peer connection, separate
/// from the chain-sync client's own session so an on-demand fetch never
/// contends with the chainsync/blockfetch protocol state the indexer uses
/// to keep following the tip. Connects lazily on first use and reconnects
/// whenever the held session errors out.
pub struct PeerFetchClient {
    peer_address: String,
    network_magic: u64,
    session: Mutex<Option<PeerClient>>,
}

impl PeerFetchClient {
    pub fn new(peer_address: String, network_magic: u64) -> Self {
        Self {
            peer_address,
            network_magic,
            session: Mutex::new(None),
        }
    }
}

impl FetchBlockClient for PeerFetchClient {
    async fn fetch_block(&self, point: &Point) -> Result<Option<Vec<u8>>, FetchBlockError> {
        let mut guard = self.session.lock().await;

        if guard.is_none() {
            let peer = PeerClient::connect(&self.peer_address, self.network_magic)
                .await
                .map_err(|err| FetchBlockError::Upstream(err.to_string()))?;
            *guard = Some(peer);
        }

        let peer = guard.as_mut().expect("session populated above");

        match peer.blockfetch().fetch_single(to_wire(point)).await {
            Ok(body) => Ok(Some(body)),
            Err(err) => {
                // the session's protocol state is unknown after a failed
                // request; drop it so the next call reconnects clean.
                *guard = None;
                Err(FetchBlockError::Upstream(err.to_string()))
            }
        }
    }
}
