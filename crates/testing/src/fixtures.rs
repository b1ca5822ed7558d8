use std::collections::HashMap;

use argus_core::{Input, OutputReference, Point, Value};

/// A deterministic point for slot `slot`, hashing the slot number itself so
/// distinct slots never collide.
pub fn sample_point(slot: u64) -> Point {
    Point::Specific(slot, vec![slot as u8; 32])
}

pub fn sample_tx_id(seed: u8) -> Vec<u8> {
    vec![seed; 32]
}

/// An unspent input paying `coins` lovelace to `address`, created at `slot`.
pub fn sample_input(address: Vec<u8>, coins: u64, slot: u64, index: u32) -> Input {
    Input {
        output_reference: OutputReference {
            tx_id: sample_tx_id(slot as u8),
            index,
        },
        address,
        value: Value {
            coins,
            assets: HashMap::new(),
        },
        datum_hash: None,
        script_hash: None,
        created_at: sample_point(slot),
        spent_at: None,
        tx_index: 0,
    }
}

/// Same as [`sample_input`] but with an explicit `tx_index`, for exercising
/// the `fold_inputs` tie-break between outputs that share a slot and output
/// index but come from different transactions.
pub fn sample_input_with_tx_index(address: Vec<u8>, coins: u64, slot: u64, index: u32, tx_index: u32) -> Input {
    let mut input = sample_input(address, coins, slot, index);
    input.output_reference.tx_id = {
        let mut tx_id = sample_tx_id(slot as u8);
        tx_id[0] = tx_index as u8;
        tx_id
    };
    input.tx_index = tx_index;
    input
}

/// Same as [`sample_input`] but carrying a single asset under `policy_id`/`asset_name`.
pub fn sample_input_with_asset(
    address: Vec<u8>,
    policy_id: Vec<u8>,
    asset_name: Vec<u8>,
    quantity: u64,
    slot: u64,
    index: u32,
) -> Input {
    let mut input = sample_input(address, 0, slot, index);
    let mut names = HashMap::new();
    names.insert(asset_name, quantity);
    input.value.assets.insert(policy_id, names);
    input
}
