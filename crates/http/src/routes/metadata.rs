use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use argus_core::FetchBlockError;
use pallas::{
    codec::minicbor,
    crypto::hash::Hasher,
    ledger::{primitives::alonzo, traverse::MultiEraBlock},
};
use serde::Deserialize;

use crate::{
    bad_request, checkpoint_header,
    types::{Metadata, Metadatum, MetadatumBytes, MetadatumInt, MetadatumList, MetadatumMap, MetadatumMapEntry, MetadatumString},
    Facade,
};

#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuery {
    transaction_id: Option<String>,
}

pub async fn by_slot(
    State(facade): State<Facade>,
    Path(slot_no): Path<u64>,
    Query(query): Query<MetadataQuery>,
) -> Response {
    let transaction_id = match query.transaction_id {
        Some(value) if value.len() == 64 => match hex::decode(&value) {
            Ok(bytes) => Some(bytes),
            Err(_) => return bad_request("'transaction_id' must be base16"),
        },
        Some(_) => return bad_request("'transaction_id' must be 64 hex characters"),
        None => None,
    };

    let Some(fetch_block) = facade.fetch_block.as_ref() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let ancestors = match facade.store.list_ancestors_desc(slot_no.saturating_add(1), 1).await {
        Ok(ancestors) => ancestors,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    let Some(ancestor) = ancestors.into_iter().next() else {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({"hint": "no_ancestor"}))).into_response();
    };

    let raw_block = match fetch_block.fetch_block(&ancestor).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(FetchBlockError::Unavailable) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Err(FetchBlockError::Upstream(_)) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let block = match MultiEraBlock::decode(&raw_block) {
        Ok(block) => block,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let header_hash = block.header().hash().to_string();
    let mut out = Vec::new();

    for tx in block.txs() {
        if let Some(filter) = transaction_id.as_ref() {
            if tx.hash().as_ref() != filter.as_slice() {
                continue;
            }
        }

        let meta = tx.metadata();
        let Some(meta_map) = meta.as_alonzo() else {
            continue;
        };
        if meta_map.is_empty() {
            continue;
        }

        let schema = match build_schema(meta_map) {
            Ok(schema) => schema,
            Err(resp) => return resp,
        };
        let raw = match metadata_to_cbor(meta_map) {
            Ok(raw) => raw,
            Err(resp) => return resp,
        };

        let hash = Hasher::<256>::hash(raw.as_slice()).to_string();
        out.push(Metadata {
            hash,
            raw: hex::encode(raw),
            schema,
        });
    }

    let mut headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
    if let Ok(value) = HeaderValue::from_str(&header_hash) {
        headers.insert(HeaderName::from_static("x-block-header-hash"), value);
    }

    (StatusCode::OK, headers, Json(out)).into_response()
}

fn build_schema(metadata: &alonzo::Metadata) -> Result<HashMap<String, Metadatum>, Response> {
    let mut schema = HashMap::new();
    for (label, datum) in metadata.iter() {
        let value = metadatum_to_model(datum).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;
        schema.insert(label.to_string(), value);
    }
    Ok(schema)
}

fn metadata_to_cbor(metadata: &alonzo::Metadata) -> Result<Vec<u8>, Response> {
    let wrapped = alonzo::AuxiliaryData::ShelleyMa(alonzo::ShelleyMaAuxiliaryData {
        transaction_metadata: metadata.clone(),
        auxiliary_scripts: None,
    });

    minicbor::to_vec(wrapped).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn metadatum_to_model(datum: &alonzo::Metadatum) -> Result<Metadatum, ()> {
    match datum {
        alonzo::Metadatum::Int(value) => {
            let value: i128 = (*value).into();
            let value = i64::try_from(value).map_err(|_| ())?;
            Ok(Metadatum::Int(MetadatumInt { int: value }))
        }
        alonzo::Metadatum::Bytes(bytes) => Ok(Metadatum::Bytes(MetadatumBytes {
            bytes: hex::encode(bytes.as_slice()),
        })),
        alonzo::Metadatum::Text(value) => Ok(Metadatum::String(MetadatumString {
            string: value.clone(),
        })),
        alonzo::Metadatum::Array(items) => {
            let list = items.iter().map(metadatum_to_model).collect::<Result<Vec<_>, _>>()?;
            Ok(Metadatum::List(MetadatumList { list }))
        }
        alonzo::Metadatum::Map(entries) => {
            let mut map = Vec::new();
            for (key, value) in entries.iter() {
                let key = metadatum_to_model(key)?;
                let value = metadatum_to_model(value)?;
                map.push(MetadatumMapEntry { k: key, v: value });
            }
            Ok(Metadatum::Map(MetadatumMap { map }))
        }
    }
}
