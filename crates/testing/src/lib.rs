pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use argus_core::{
    pattern::AssetNamePattern, BinaryData, BlockApply, Input, InputManagement, Pattern, Point,
    Script, SortDirection, StatusFlag, Store, StoreError,
};

/// An in-process, in-memory double for [`Store`], used by the HTTP crate's
/// and root pipeline's integration tests. No transactions, no durability:
/// every call takes the lock and mutates state directly.
pub struct InMemoryStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    checkpoints: Vec<Point>,
    inputs: HashMap<(Vec<u8>, u32), Input>,
    binary_data: HashMap<Vec<u8>, BinaryData>,
    scripts: HashMap<Vec<u8>, Script>,
    patterns: HashSet<Pattern>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State::default()),
        }
    }

    /// Not part of `Store`: lets tests assert on checkpoint count without an
    /// async round-trip.
    pub fn checkpoint_count(&self) -> usize {
        self.inner.lock().unwrap().checkpoints.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn input_matches(pattern: &Pattern, input: &Input) -> bool {
    if matches!(pattern, Pattern::Any) {
        return true;
    }
    match pattern {
        Pattern::Address(_) => match pallas::ledger::addresses::Address::from_bytes(&input.address) {
            Ok(address) => pattern.matches_address(&address),
            Err(_) => false,
        },
        Pattern::Asset(asset) => input.value.assets.get(asset.policy()).is_some_and(|names| {
            names.keys().any(|name| match asset.name() {
                AssetNamePattern::Any => true,
                AssetNamePattern::Exact(expected) => expected == name,
            })
        }),
        Pattern::OutputRef(_) => {
            pattern.matches_output_ref(&input.output_reference.tx_id, input.output_reference.index)
        }
        Pattern::TransactionId(_) => pattern.matches_transaction_id(&input.output_reference.tx_id),
        Pattern::Any => true,
    }
}

fn status_matches(status: StatusFlag, input: &Input) -> bool {
    match status {
        StatusFlag::All => true,
        StatusFlag::Unspent => !input.is_spent(),
        StatusFlag::Spent => input.is_spent(),
    }
}

impl Store for InMemoryStore {
    async fn list_checkpoints_desc(&self) -> Result<Vec<Point>, StoreError> {
        let state = self.inner.lock().unwrap();
        let mut points = state.checkpoints.clone();
        points.sort_by(|a, b| b.cmp(a));
        Ok(points)
    }

    async fn intersect_candidates(&self, max_items: usize) -> Result<Vec<Point>, StoreError> {
        let desc = self.list_checkpoints_desc().await?;
        let mut out = Vec::new();
        let mut step = 1usize;
        let mut idx = 0usize;
        while idx < desc.len() && out.len() < max_items {
            out.push(desc[idx].clone());
            idx += step;
            step *= 2;
        }
        Ok(out)
    }

    async fn list_ancestors_desc(&self, slot: u64, n: usize) -> Result<Vec<Point>, StoreError> {
        let desc = self.list_checkpoints_desc().await?;
        Ok(desc.into_iter().filter(|p| p.slot() < slot).take(n).collect())
    }

    async fn fold_inputs(
        &self,
        pattern: &Pattern,
        status: StatusFlag,
        sort: SortDirection,
    ) -> Result<Box<dyn Iterator<Item = Input> + Send>, StoreError> {
        let state = self.inner.lock().unwrap();
        let mut rows: Vec<Input> = state
            .inputs
            .values()
            .filter(|input| input_matches(pattern, input) && status_matches(status, input))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let key_a = (a.created_at.slot(), a.tx_index, a.output_reference.index);
            let key_b = (b.created_at.slot(), b.tx_index, b.output_reference.index);
            match sort {
                SortDirection::Asc => key_a.cmp(&key_b),
                SortDirection::Desc => key_b.cmp(&key_a),
            }
        });

        Ok(Box::new(rows.into_iter()))
    }

    async fn apply_blocks(
        &self,
        blocks: Vec<BlockApply>,
        input_management: InputManagement,
        stability_window: u64,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut tip_slot = None;
        for block in blocks {
            tip_slot = Some(block.checkpoint.slot());
            state.checkpoints.push(block.checkpoint);
            for input in block.new_inputs {
                let key = (input.output_reference.tx_id.clone(), input.output_reference.index);
                state.inputs.insert(key, input);
            }
            for (output_ref, spent_at) in block.spent {
                let key = (output_ref.tx_id.clone(), output_ref.index);
                if let Some(input) = state.inputs.get_mut(&key) {
                    input.spent_at = Some(spent_at);
                }
            }
            for datum in block.binary_data {
                state.binary_data.insert(datum.hash.clone(), datum);
            }
            for script in block.scripts {
                state.scripts.insert(script.hash.clone(), script);
            }
        }

        if input_management == InputManagement::RemoveSpentInputs {
            if let Some(tip_slot) = tip_slot {
                state.inputs.retain(|_, input| match &input.spent_at {
                    Some(spent_at) => tip_slot.saturating_sub(spent_at.slot()) <= stability_window,
                    None => true,
                });
            }
        }

        Ok(())
    }

    async fn rollback_to(&self, slot: u64) -> Result<Option<u64>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.checkpoints.retain(|p| p.slot() <= slot);
        state.inputs.retain(|_, input| input.created_at.slot() <= slot);
        for input in state.inputs.values_mut() {
            if let Some(spent_at) = &input.spent_at {
                if spent_at.slot() > slot {
                    input.spent_at = None;
                }
            }
        }
        Ok(state.checkpoints.iter().map(|p| p.slot()).max())
    }

    async fn get_binary_data(&self, hash: &[u8]) -> Result<Option<BinaryData>, StoreError> {
        Ok(self.inner.lock().unwrap().binary_data.get(hash).cloned())
    }

    async fn get_script(&self, hash: &[u8]) -> Result<Option<Script>, StoreError> {
        Ok(self.inner.lock().unwrap().scripts.get(hash).cloned())
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, StoreError> {
        Ok(self.inner.lock().unwrap().patterns.iter().cloned().collect())
    }

    async fn insert_patterns(&self, patterns: &[Pattern]) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.patterns.extend(patterns.iter().cloned());
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &Pattern) -> Result<usize, StoreError> {
        let mut state = self.inner.lock().unwrap();
        Ok(state.patterns.remove(pattern) as usize)
    }

    async fn delete_inputs(&self, pattern: &Pattern) -> Result<usize, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.inputs.len();
        state.inputs.retain(|_, input| !input_matches(pattern, input));
        Ok(before - state.inputs.len())
    }

    async fn prune_inputs(&self, stability_window: u64, tip_slot: u64) -> Result<usize, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.inputs.len();
        state.inputs.retain(|_, input| match &input.spent_at {
            Some(spent_at) => tip_slot.saturating_sub(spent_at.slot()) <= stability_window,
            None => true,
        });
        Ok(before - state.inputs.len())
    }

    async fn prune_binary_data(&self) -> Result<usize, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let live: HashSet<Vec<u8>> = state.inputs.values().filter_map(|i| i.datum_hash.clone()).collect();
        let before = state.binary_data.len();
        state.binary_data.retain(|hash, _| live.contains(hash));
        Ok(before - state.binary_data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_input, sample_input_with_asset, sample_input_with_tx_index, sample_point};
    use argus_core::OutputReference;

    fn apply_one(store: &InMemoryStore, slot: u64, inputs: Vec<Input>) {
        tokio_test_block_on(store.apply_blocks(
            vec![BlockApply {
                checkpoint: sample_point(slot),
                new_inputs: inputs,
                spent: Vec::new(),
                binary_data: Vec::new(),
                scripts: Vec::new(),
            }],
            InputManagement::MarkSpentInputs,
            0,
        ))
        .unwrap();
    }

    fn tokio_test_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn apply_blocks_registers_checkpoints_and_inputs() {
        let store = InMemoryStore::new();
        let address = vec![1u8; 29];
        apply_one(&store, 10, vec![sample_input(address, 1_000_000, 10, 0)]);

        assert_eq!(store.checkpoint_count(), 1);
        let rows = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)).unwrap();
        assert_eq!(rows.collect::<Vec<_>>().len(), 1);
    }

    #[test]
    fn rollback_to_discards_later_checkpoints_and_inputs() {
        let store = InMemoryStore::new();
        let address = vec![2u8; 29];
        apply_one(&store, 10, vec![sample_input(address.clone(), 100, 10, 0)]);
        apply_one(&store, 20, vec![sample_input(address, 200, 20, 0)]);

        let tip = tokio_test_block_on(store.rollback_to(10)).unwrap();
        assert_eq!(tip, Some(10));

        let rows = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)).unwrap();
        assert_eq!(rows.count(), 1);
    }

    #[test]
    fn fold_inputs_filters_by_asset_pattern() {
        let store = InMemoryStore::new();
        let policy = vec![9u8; 28];
        let matching = sample_input_with_asset(vec![3u8; 29], policy.clone(), b"HOSKY".to_vec(), 1, 5, 0);
        let other = sample_input(vec![4u8; 29], 50, 5, 1);
        apply_one(&store, 5, vec![matching, other]);

        let pattern = Pattern::parse(&format!("{}.*", hex::encode(&policy))).unwrap();
        let rows = tokio_test_block_on(store.fold_inputs(&pattern, StatusFlag::All, SortDirection::Asc)).unwrap();
        assert_eq!(rows.count(), 1);
    }

    #[test]
    fn fold_inputs_breaks_same_slot_same_index_ties_by_tx_position() {
        let store = InMemoryStore::new();
        // Two different transactions in the same block both produce an
        // output at index 0; only tx_index disambiguates their order.
        let second = sample_input_with_tx_index(vec![1u8; 29], 100, 7, 0, 1);
        let first = sample_input_with_tx_index(vec![2u8; 29], 200, 7, 0, 0);
        apply_one(&store, 7, vec![second, first]);

        let rows = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc))
            .unwrap()
            .collect::<Vec<_>>();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tx_index, 0);
        assert_eq!(rows[1].tx_index, 1);
    }

    #[test]
    fn prune_inputs_removes_spends_past_the_stability_window() {
        let store = InMemoryStore::new();
        let address = vec![5u8; 29];
        let mut input = sample_input(address, 10, 1, 0);
        input.spent_at = Some(sample_point(2));
        apply_one(&store, 1, vec![input]);

        let removed = tokio_test_block_on(store.prune_inputs(1, 100)).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn prune_inputs_keeps_spends_still_inside_the_stability_window() {
        let store = InMemoryStore::new();
        let address = vec![6u8; 29];
        let mut input = sample_input(address, 10, 1, 0);
        input.spent_at = Some(sample_point(95));
        apply_one(&store, 1, vec![input]);

        let removed = tokio_test_block_on(store.prune_inputs(10, 100)).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn rollback_to_the_same_point_twice_is_a_no_op_the_second_time() {
        let store = InMemoryStore::new();
        let address = vec![7u8; 29];
        apply_one(&store, 10, vec![sample_input(address.clone(), 100, 10, 0)]);
        apply_one(&store, 20, vec![sample_input(address, 200, 20, 0)]);

        let first = tokio_test_block_on(store.rollback_to(10)).unwrap();
        let checkpoints_after_first = tokio_test_block_on(store.list_checkpoints_desc()).unwrap();
        let rows_after_first = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc))
            .unwrap()
            .collect::<Vec<_>>();

        let second = tokio_test_block_on(store.rollback_to(10)).unwrap();
        let checkpoints_after_second = tokio_test_block_on(store.list_checkpoints_desc()).unwrap();
        let rows_after_second = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc))
            .unwrap()
            .collect::<Vec<_>>();

        assert_eq!(first, second);
        assert_eq!(checkpoints_after_first, checkpoints_after_second);
        assert_eq!(rows_after_first.len(), rows_after_second.len());
    }

    #[test]
    fn applying_a_batch_then_rolling_back_before_it_cancels_out() {
        let store = InMemoryStore::new();
        let address = vec![8u8; 29];
        apply_one(&store, 10, vec![sample_input(address.clone(), 100, 10, 0)]);

        let baseline_checkpoints = tokio_test_block_on(store.list_checkpoints_desc()).unwrap();
        let baseline_rows = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc))
            .unwrap()
            .count();

        apply_one(&store, 20, vec![sample_input(address.clone(), 200, 20, 0)]);
        apply_one(&store, 30, vec![sample_input(address, 300, 30, 0)]);
        tokio_test_block_on(store.rollback_to(10)).unwrap();

        let checkpoints_after = tokio_test_block_on(store.list_checkpoints_desc()).unwrap();
        let rows_after = tokio_test_block_on(store.fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc))
            .unwrap()
            .count();

        assert_eq!(checkpoints_after, baseline_checkpoints);
        assert_eq!(rows_after, baseline_rows);
    }

    #[test]
    fn marking_a_spend_and_physically_pruning_it_agree_on_unspent_queries() {
        let marked = InMemoryStore::new();
        let removed = InMemoryStore::new();
        let address = vec![9u8; 29];

        for store in [&marked, &removed] {
            apply_one(store, 1, vec![sample_input(address.clone(), 10, 1, 0)]);
            tokio_test_block_on(store.apply_blocks(
                vec![BlockApply {
                    checkpoint: sample_point(2),
                    new_inputs: Vec::new(),
                    spent: vec![(
                        OutputReference {
                            tx_id: crate::fixtures::sample_tx_id(1),
                            index: 0,
                        },
                        sample_point(2),
                    )],
                    binary_data: Vec::new(),
                    scripts: Vec::new(),
                }],
                InputManagement::MarkSpentInputs,
                0,
            ))
            .unwrap();
        }

        tokio_test_block_on(removed.prune_inputs(1, 100)).unwrap();

        let unspent_marked =
            tokio_test_block_on(marked.fold_inputs(&Pattern::Any, StatusFlag::Unspent, SortDirection::Asc))
                .unwrap()
                .count();
        let unspent_removed =
            tokio_test_block_on(removed.fold_inputs(&Pattern::Any, StatusFlag::Unspent, SortDirection::Asc))
                .unwrap()
                .count();

        assert_eq!(unspent_marked, unspent_removed);
        assert_eq!(unspent_marked, 0);
    }
}
