use std::collections::{HashMap, HashSet};

use pallas::codec::minicbor;
use pallas::ledger::primitives::conway::{DatumOption, ScriptRef};
use pallas::ledger::traverse::{ComputeHash, MultiEraBlock, MultiEraOutput, OriginalHash};

use argus_core::{
    BinaryData, BlockApply, Input, OutputReference, Pattern, Point, Script, ScriptLanguage, Value,
};

use crate::prelude::*;

fn output_value(output: &MultiEraOutput<'_>) -> Value {
    let mut assets = HashMap::new();
    for policy in output.value().assets() {
        let mut names = HashMap::new();
        for asset in policy.assets() {
            names.insert(asset.name().to_vec(), asset.output_coin().unwrap_or_default());
        }
        assets.insert(policy.policy().to_vec(), names);
    }

    Value {
        coins: output.value().coin(),
        assets,
    }
}

fn output_datum_hash(output: &MultiEraOutput<'_>) -> Option<Vec<u8>> {
    match output.datum() {
        None => None,
        Some(DatumOption::Hash(hash)) => Some(hash.to_vec()),
        Some(DatumOption::Data(data)) => Some(data.original_hash().to_vec()),
    }
}

fn output_script_hash(output: &MultiEraOutput<'_>) -> Option<Vec<u8>> {
    output.script_ref().map(|script_ref| match script_ref {
        ScriptRef::NativeScript(script) => script.original_hash().to_vec(),
        ScriptRef::PlutusV1Script(script) => script.compute_hash().to_vec(),
        ScriptRef::PlutusV2Script(script) => script.compute_hash().to_vec(),
        ScriptRef::PlutusV3Script(script) => script.compute_hash().to_vec(),
    })
}

fn output_script(output: &MultiEraOutput<'_>) -> Option<Script> {
    let script_ref = output.script_ref()?;
    let (hash, language, bytes) = match script_ref {
        ScriptRef::NativeScript(script) => {
            (script.original_hash().to_vec(), ScriptLanguage::Native, script.raw_cbor().to_vec())
        }
        ScriptRef::PlutusV1Script(script) => {
            (script.compute_hash().to_vec(), ScriptLanguage::PlutusV1, script.as_ref().to_vec())
        }
        ScriptRef::PlutusV2Script(script) => {
            (script.compute_hash().to_vec(), ScriptLanguage::PlutusV2, script.as_ref().to_vec())
        }
        ScriptRef::PlutusV3Script(script) => {
            (script.compute_hash().to_vec(), ScriptLanguage::PlutusV3, script.as_ref().to_vec())
        }
    };

    Some(Script { hash, language, bytes })
}

fn matches_any(patterns: &HashSet<Pattern>, address: &[u8], value: &Value, tx_id: &[u8], index: u32) -> bool {
    let decoded_address = pallas::ledger::addresses::Address::from_bytes(address);

    patterns.iter().any(|pattern| {
        if matches!(pattern, Pattern::Any) {
            return true;
        }
        if let Ok(decoded) = &decoded_address {
            if pattern.matches_address(decoded) {
                return true;
            }
        }
        if value
            .assets
            .iter()
            .any(|(policy, names)| names.keys().any(|name| pattern.matches_asset(policy, name)))
        {
            return true;
        }
        if pattern.matches_output_ref(tx_id, index) {
            return true;
        }
        pattern.matches_transaction_id(tx_id)
    })
}

/// Decode a raw block into the inputs/spends/data it would contribute to the
/// store, keeping only outputs matched by a pattern in `patterns`. Spent
/// entries are recorded unconditionally: applying them against a row that was
/// never indexed is a no-op at the store layer.
pub fn extract_block_apply(
    patterns: &HashSet<Pattern>,
    raw: &[u8],
    checkpoint: Point,
) -> Result<BlockApply, Error> {
    let block = MultiEraBlock::decode(raw).map_err(Error::decode)?;

    let mut new_inputs = Vec::new();
    let mut spent = Vec::new();
    let mut binary_data = Vec::new();
    let mut scripts = Vec::new();

    for (tx_index, tx) in block.txs().into_iter().enumerate() {
        let tx_id = tx.hash().to_vec();
        let tx_index = tx_index as u32;

        for input in tx.inputs() {
            spent.push((
                OutputReference {
                    tx_id: input.hash().to_vec(),
                    index: input.index() as u32,
                },
                checkpoint.clone(),
            ));
        }

        for (index, output) in tx.produces() {
            let address = output
                .address()
                .map(|addr| addr.to_vec())
                .map_err(Error::decode)?;
            let value = output_value(&output);

            if !matches_any(patterns, &address, &value, &tx_id, index as u32) {
                continue;
            }

            new_inputs.push(Input {
                output_reference: OutputReference {
                    tx_id: tx_id.clone(),
                    index: index as u32,
                },
                address,
                value,
                datum_hash: output_datum_hash(&output),
                script_hash: output_script_hash(&output),
                created_at: checkpoint.clone(),
                spent_at: None,
                tx_index,
            });

            if let Some(Script { hash, language, bytes }) = output_script(&output) {
                scripts.push(Script { hash, language, bytes });
            }
            if let Some(DatumOption::Data(data)) = output.datum() {
                if let Ok(raw) = minicbor::to_vec(&data.0) {
                    binary_data.push(BinaryData {
                        hash: data.original_hash().to_vec(),
                        bytes: raw,
                    });
                }
            }
        }

        for datum in tx.plutus_data() {
            binary_data.push(BinaryData {
                hash: datum.original_hash().to_vec(),
                bytes: datum.raw_cbor().to_vec(),
            });
        }
    }

    Ok(BlockApply {
        checkpoint,
        new_inputs,
        spent,
        binary_data,
        scripts,
    })
}
