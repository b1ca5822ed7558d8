use std::collections::HashMap;

use argus_core::{BinaryData, ConnectionStatus, HealthSnapshot, Input, Point, Script, ScriptLanguage};
use pallas::ledger::addresses::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct BadRequest {
    pub hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Datum {
    pub datum: String,
}

impl From<BinaryData> for Datum {
    fn from(value: BinaryData) -> Self {
        Self {
            datum: hex::encode(value.bytes),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguageDto {
    Native,
    #[serde(rename = "plutus:v1")]
    PlutusV1,
    #[serde(rename = "plutus:v2")]
    PlutusV2,
    #[serde(rename = "plutus:v3")]
    PlutusV3,
}

impl From<ScriptLanguage> for ScriptLanguageDto {
    fn from(value: ScriptLanguage) -> Self {
        match value {
            ScriptLanguage::Native => ScriptLanguageDto::Native,
            ScriptLanguage::PlutusV1 => ScriptLanguageDto::PlutusV1,
            ScriptLanguage::PlutusV2 => ScriptLanguageDto::PlutusV2,
            ScriptLanguage::PlutusV3 => ScriptLanguageDto::PlutusV3,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScriptDto {
    pub language: ScriptLanguageDto,
    pub script: String,
}

impl From<Script> for ScriptDto {
    fn from(value: Script) -> Self {
        Self {
            language: value.language.into(),
            script: hex::encode(value.bytes),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Metadatum {
    Int(MetadatumInt),
    String(MetadatumString),
    Bytes(MetadatumBytes),
    List(MetadatumList),
    Map(MetadatumMap),
}

#[derive(Debug, Serialize)]
pub struct MetadatumInt {
    pub int: i64,
}

#[derive(Debug, Serialize)]
pub struct MetadatumString {
    pub string: String,
}

#[derive(Debug, Serialize)]
pub struct MetadatumBytes {
    pub bytes: String,
}

#[derive(Debug, Serialize)]
pub struct MetadatumList {
    pub list: Vec<Metadatum>,
}

#[derive(Debug, Serialize)]
pub struct MetadatumMap {
    pub map: Vec<MetadatumMapEntry>,
}

#[derive(Debug, Serialize)]
pub struct MetadatumMapEntry {
    pub k: Metadatum,
    pub v: Metadatum,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub hash: String,
    pub raw: String,
    pub schema: HashMap<String, Metadatum>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub connection_status: ConnectionStatus,
    pub most_recent_checkpoint: Option<u64>,
    pub most_recent_node_tip: Option<u64>,
    pub seconds_since_last_block: Option<i64>,
    pub network_synchronization: Option<f64>,
    pub version: String,
}

impl Health {
    pub fn from_snapshot(snapshot: HealthSnapshot) -> Self {
        Self {
            connection_status: snapshot.connection_status,
            most_recent_checkpoint: snapshot.most_recent_checkpoint,
            most_recent_node_tip: snapshot.most_recent_node_tip,
            seconds_since_last_block: snapshot.seconds_since_last_block,
            network_synchronization: snapshot.network_synchronization,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_prometheus(&self) -> String {
        let connected = matches!(self.connection_status, ConnectionStatus::Connected) as u8;
        let mut out = String::new();
        out.push_str("# TYPE argus_connection_status gauge\n");
        out.push_str(&format!("argus_connection_status {connected}\n"));
        out.push_str("# TYPE argus_most_recent_checkpoint gauge\n");
        out.push_str(&format!(
            "argus_most_recent_checkpoint {}\n",
            string_or_nan(self.most_recent_checkpoint)
        ));
        out.push_str("# TYPE argus_most_recent_node_tip gauge\n");
        out.push_str(&format!(
            "argus_most_recent_node_tip {}\n",
            string_or_nan(self.most_recent_node_tip)
        ));
        out.push_str("# TYPE argus_network_synchronization gauge\n");
        out.push_str(&format!(
            "argus_network_synchronization {}\n",
            self.network_synchronization
                .map(|v| v.to_string())
                .unwrap_or_else(|| "NaN".to_string())
        ));
        out.push_str("# TYPE argus_seconds_since_last_block gauge\n");
        out.push_str(&format!(
            "argus_seconds_since_last_block {}\n",
            string_or_nan(self.seconds_since_last_block)
        ));
        out
    }
}

fn string_or_nan<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NaN".to_string())
}

#[derive(Debug, Serialize)]
pub struct PointDto {
    pub slot_no: u64,
    pub header_hash: Option<String>,
}

impl From<&Point> for PointDto {
    fn from(value: &Point) -> Self {
        Self {
            slot_no: value.slot(),
            header_hash: value.hash().map(hex::encode),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValueDto {
    pub coins: u64,
    pub assets: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct MatchDto {
    pub transaction_id: String,
    pub output_index: u32,
    pub address: String,
    pub value: ValueDto,
    pub datum_hash: Option<String>,
    pub script_hash: Option<String>,
    pub created_at: PointDto,
    pub spent_at: Option<PointDto>,
}

impl From<Input> for MatchDto {
    fn from(value: Input) -> Self {
        let mut assets = HashMap::new();
        for (policy, names) in value.value.assets {
            let policy_hex = hex::encode(&policy);
            for (name, quantity) in names {
                let name_hex = hex::encode(&name);
                let unit = if name_hex.is_empty() {
                    policy_hex.clone()
                } else {
                    format!("{policy_hex}.{name_hex}")
                };
                assets.insert(unit, quantity);
            }
        }

        let address = Address::from_bytes(&value.address)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| hex::encode(&value.address));

        Self {
            transaction_id: hex::encode(&value.output_reference.tx_id),
            output_index: value.output_reference.index,
            address,
            value: ValueDto {
                coins: value.value.coins,
                assets,
            },
            datum_hash: value.datum_hash.as_deref().map(hex::encode),
            script_hash: value.script_hash.as_deref().map(hex::encode),
            created_at: PointDto::from(&value.created_at),
            spent_at: value.spent_at.as_ref().map(PointDto::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: usize,
}
