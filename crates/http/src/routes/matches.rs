use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use argus_core::{Pattern, SortDirection, StatusFlag};
use serde::Deserialize;

use crate::{bad_request, checkpoint_header, types::{Deleted, MatchDto}, Facade};

#[derive(Debug, Default, Deserialize)]
pub struct MatchesQuery {
    spent: Option<String>,
    unspent: Option<String>,
    policy_id: Option<String>,
    asset_id: Option<String>,
    transaction_id: Option<String>,
    output_reference: Option<String>,
    order: Option<String>,
}

enum FilterBy {
    None,
    Policy(Vec<u8>),
    Asset(Vec<u8>, Vec<u8>),
    TransactionId(Vec<u8>),
    OutputReference(Vec<u8>, u32),
}

struct ParsedQuery {
    status: StatusFlag,
    order: SortDirection,
    filter: FilterBy,
}

fn parse_query(query: MatchesQuery) -> Result<ParsedQuery, String> {
    if query.spent.is_some() && query.unspent.is_some() {
        return Err("'spent' and 'unspent' are mutually exclusive".to_string());
    }
    let status = if query.spent.is_some() {
        StatusFlag::Spent
    } else if query.unspent.is_some() {
        StatusFlag::Unspent
    } else {
        StatusFlag::All
    };

    let order = match query.order.as_deref() {
        None | Some("most_recent_first") => SortDirection::Desc,
        Some("oldest_first") => SortDirection::Asc,
        Some(_) => return Err("invalid 'order', expected 'most_recent_first' or 'oldest_first'".to_string()),
    };

    let specified = [
        query.policy_id.is_some(),
        query.asset_id.is_some(),
        query.transaction_id.is_some(),
        query.output_reference.is_some(),
    ]
    .iter()
    .filter(|x| **x)
    .count();
    if specified > 1 {
        return Err("at most one of 'policy_id', 'asset_id', 'transaction_id', 'output_reference' may be given".to_string());
    }

    let filter = if let Some(value) = query.asset_id {
        let (policy, name) = value
            .split_once('.')
            .ok_or_else(|| "'asset_id' must be '<policy-hex>.<name-hex>'".to_string())?;
        let policy = hex::decode(policy).map_err(|_| "invalid 'asset_id' policy hex".to_string())?;
        let name = hex::decode(name).map_err(|_| "invalid 'asset_id' name hex".to_string())?;
        FilterBy::Asset(policy, name)
    } else if let Some(value) = query.policy_id {
        let policy = hex::decode(&value).map_err(|_| "invalid 'policy_id' hex".to_string())?;
        FilterBy::Policy(policy)
    } else if let Some(value) = query.transaction_id {
        let tx_id = hex::decode(&value).map_err(|_| "invalid 'transaction_id' hex".to_string())?;
        FilterBy::TransactionId(tx_id)
    } else if let Some(value) = query.output_reference {
        let (tx_id, index) = value
            .split_once('#')
            .ok_or_else(|| "'output_reference' must be '<tx-id-hex>#<index>'".to_string())?;
        let tx_id = hex::decode(tx_id).map_err(|_| "invalid 'output_reference' tx id hex".to_string())?;
        let index = index
            .parse::<u32>()
            .map_err(|_| "invalid 'output_reference' index".to_string())?;
        FilterBy::OutputReference(tx_id, index)
    } else {
        FilterBy::None
    };

    Ok(ParsedQuery { status, order, filter })
}

fn apply_filter(matches: Vec<MatchDto>, filter: &FilterBy) -> Vec<MatchDto> {
    match filter {
        FilterBy::None => matches,
        FilterBy::Policy(policy) => {
            let prefix = hex::encode(policy);
            matches
                .into_iter()
                .filter(|m| {
                    m.value
                        .assets
                        .keys()
                        .any(|unit| unit == &prefix || unit.starts_with(&format!("{prefix}.")))
                })
                .collect()
        }
        FilterBy::Asset(policy, name) => {
            let unit = if name.is_empty() {
                hex::encode(policy)
            } else {
                format!("{}.{}", hex::encode(policy), hex::encode(name))
            };
            matches
                .into_iter()
                .filter(|m| m.value.assets.contains_key(&unit))
                .collect()
        }
        FilterBy::TransactionId(tx_id) => {
            let hex = hex::encode(tx_id);
            matches.into_iter().filter(|m| m.transaction_id == hex).collect()
        }
        FilterBy::OutputReference(tx_id, index) => {
            let hex = hex::encode(tx_id);
            matches
                .into_iter()
                .filter(|m| m.transaction_id == hex && m.output_index == *index)
                .collect()
        }
    }
}

async fn respond(facade: &Facade, pattern: Pattern, query: MatchesQuery) -> Response {
    let parsed = match parse_query(query) {
        Ok(parsed) => parsed,
        Err(hint) => return bad_request(hint),
    };

    let rows = match facade.store.fold_inputs(&pattern, parsed.status, parsed.order).await {
        Ok(rows) => rows,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let most_recent = facade.health.snapshot().most_recent_checkpoint;
    let matches: Vec<MatchDto> = rows.map(MatchDto::from).collect();
    let matches = apply_filter(matches, &parsed.filter);

    (StatusCode::OK, checkpoint_header(most_recent), Json(matches)).into_response()
}

pub async fn wildcard(State(facade): State<Facade>, Query(query): Query<MatchesQuery>) -> Response {
    respond(&facade, Pattern::Any, query).await
}

pub async fn by_pattern(
    State(facade): State<Facade>,
    Path(pattern): Path<String>,
    Query(query): Query<MatchesQuery>,
) -> Response {
    let parsed = match Pattern::parse(&pattern) {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(err.to_string()),
    };

    respond(&facade, parsed, query).await
}

pub async fn delete_by_pattern(State(facade): State<Facade>, Path(pattern): Path<String>) -> Response {
    let parsed = match Pattern::parse(&pattern) {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(err.to_string()),
    };

    delete(&facade, parsed).await
}

pub async fn delete_wildcard(State(facade): State<Facade>) -> Response {
    delete(&facade, Pattern::Any).await
}

async fn delete(facade: &Facade, pattern: Pattern) -> Response {
    if facade.patterns.overlaps(&pattern) {
        return bad_request("pattern is still covered by an active pattern");
    }

    match facade.store.delete_inputs(&pattern).await {
        Ok(deleted) => Json(Deleted { deleted }).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
