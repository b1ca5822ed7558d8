use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::point::Point;

/// A reference to a transaction output: `(tx_id, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputReference {
    pub tx_id: Vec<u8>,
    pub index: u32,
}

/// Lovelace plus multi-asset bundle carried by an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub coins: u64,
    /// policy id -> (asset name -> quantity)
    pub assets: HashMap<Vec<u8>, HashMap<Vec<u8>, u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptLanguage {
    Native,
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

/// An indexed UTxO output: the unit of data the store persists and the HTTP
/// surface serves under `/matches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub output_reference: OutputReference,
    pub address: Vec<u8>,
    pub value: Value,
    pub datum_hash: Option<Vec<u8>>,
    pub script_hash: Option<Vec<u8>>,
    pub created_at: Point,
    pub spent_at: Option<Point>,
    /// Position of the creating transaction within its block. Used only to
    /// break `fold_inputs` ties between outputs that share a slot and output
    /// index across different transactions.
    pub tx_index: u32,
}

impl Input {
    pub fn is_spent(&self) -> bool {
        self.spent_at.is_some()
    }
}

/// Content-addressed datum bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryData {
    pub hash: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// Content-addressed script bytes, tagged with the language needed to run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub hash: Vec<u8>,
    pub language: ScriptLanguage,
    pub bytes: Vec<u8>,
}
