use crate::point::Point;

#[derive(Debug, thiserror::Error)]
pub enum FetchBlockError {
    #[error("no chain-sync client wired to serve block fetches")]
    Unavailable,
    #[error("upstream fetch failed: {0}")]
    Upstream(String),
}

/// Capability to fetch a single block's raw bytes by point, used by the
/// `/metadata` route. Backed by the same chain-producer connection as the
/// chain-sync client, or absent entirely when the server runs without one.
#[trait_variant::make(Send)]
pub trait FetchBlockClient: Send + Sync + 'static {
    async fn fetch_block(&self, point: &Point) -> Result<Option<Vec<u8>>, FetchBlockError>;
}
