pub use argus_core::*;

#[derive(Clone, Default)]
pub struct CancelTokenImpl(pub tokio_util::sync::CancellationToken);

impl CancelTokenImpl {
    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }
}
