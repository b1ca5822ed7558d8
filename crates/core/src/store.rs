use thiserror::Error;

use crate::pattern::Pattern;
use crate::point::{BlockSlot, Point};
use crate::result::{BinaryData, Input, OutputReference, Script};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    All,
    Unspent,
    Spent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// How spent inputs are retired from the store. See the gardener design note
/// on why `RemoveSpentInputs` waits for the stability window before deleting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputManagement {
    MarkSpentInputs,
    RemoveSpentInputs,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("transaction error: {0}")]
    Transaction(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("point not found: {0:?}")]
    PointNotFound(Point),
}

/// Everything needed to apply a single block to the store in one transaction
/// alongside its siblings in the same batch.
#[derive(Debug, Clone)]
pub struct BlockApply {
    pub checkpoint: Point,
    pub new_inputs: Vec<Input>,
    pub spent: Vec<(OutputReference, Point)>,
    pub binary_data: Vec<BinaryData>,
    pub scripts: Vec<Script>,
}

/// The embedded store. A single read-write transaction is allowed at a time;
/// readers may run concurrently with each other (but not with a writer).
#[trait_variant::make(Send)]
pub trait Store: Send + Sync + 'static {
    async fn list_checkpoints_desc(&self) -> Result<Vec<Point>, StoreError>;

    /// Up to `max_items` candidate checkpoints to offer a producer for
    /// intersection, walking history with exponential back-off so a long
    /// disconnection still resolves in a bounded number of round-trips.
    async fn intersect_candidates(&self, max_items: usize) -> Result<Vec<Point>, StoreError>;

    /// Up to `n` checkpoints strictly before `slot`, newest first.
    async fn list_ancestors_desc(
        &self,
        slot: BlockSlot,
        n: usize,
    ) -> Result<Vec<Point>, StoreError>;

    /// Rows matching `pattern` and `status`, in `sort` order. The returned
    /// iterator keeps its backing transaction open until dropped.
    async fn fold_inputs(
        &self,
        pattern: &Pattern,
        status: StatusFlag,
        sort: SortDirection,
    ) -> Result<Box<dyn Iterator<Item = Input> + Send>, StoreError>;

    /// Apply an ordered batch of blocks in a single read-write transaction.
    /// Under `InputManagement::RemoveSpentInputs`, any spend (from this
    /// batch or an earlier one) whose distance behind the batch's new tip
    /// exceeds `stability_window` is deleted outright in the same
    /// transaction instead of merely marked, so a caller never has to wait
    /// on the gardener's poll to see it gone.
    async fn apply_blocks(
        &self,
        blocks: Vec<BlockApply>,
        input_management: InputManagement,
        stability_window: u64,
    ) -> Result<(), StoreError>;

    /// Delete every result created after `slot` and clear `spent_at` for
    /// every result spent after `slot`; delete checkpoints after `slot`.
    /// Returns the slot of the now-latest checkpoint, if any remain.
    async fn rollback_to(&self, slot: BlockSlot) -> Result<Option<BlockSlot>, StoreError>;

    async fn get_binary_data(&self, hash: &[u8]) -> Result<Option<BinaryData>, StoreError>;
    async fn get_script(&self, hash: &[u8]) -> Result<Option<Script>, StoreError>;

    async fn list_patterns(&self) -> Result<Vec<Pattern>, StoreError>;
    async fn insert_patterns(&self, patterns: &[Pattern]) -> Result<(), StoreError>;
    async fn delete_pattern(&self, pattern: &Pattern) -> Result<usize, StoreError>;

    /// Delete every result matching `pattern`, regardless of spent status.
    async fn delete_inputs(&self, pattern: &Pattern) -> Result<usize, StoreError>;

    /// Delete spent inputs whose spend is older than `stability_window`
    /// slots behind `tip_slot`. Only meaningful under `RemoveSpentInputs`.
    async fn prune_inputs(
        &self,
        stability_window: u64,
        tip_slot: BlockSlot,
    ) -> Result<usize, StoreError>;

    /// Delete binary data no longer referenced by any live input.
    async fn prune_binary_data(&self) -> Result<usize, StoreError>;
}
