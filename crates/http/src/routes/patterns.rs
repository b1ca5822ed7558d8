use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use argus_core::{ForceRollbackOutcome, Pattern, Point};
use serde::Deserialize;

use crate::{bad_request, checkpoint_header, types::Deleted, Facade};

pub async fn list(State(facade): State<Facade>) -> Response {
    let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
    let texts: Vec<String> = facade.patterns.snapshot().iter().map(Pattern::to_text).collect();
    (StatusCode::OK, headers, Json(texts)).into_response()
}

pub async fn list_one(State(facade): State<Facade>, Path(pattern): Path<String>) -> Response {
    let parsed = match Pattern::parse(&pattern) {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(err.to_string()),
    };

    let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
    let snapshot = facade.patterns.snapshot();
    let texts: Vec<String> = snapshot
        .iter()
        .filter(|p| **p == parsed)
        .map(Pattern::to_text)
        .collect();
    (StatusCode::OK, headers, Json(texts)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RollbackTarget {
    Slot(u64),
    Point { slot: u64, hash: String },
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum Limit {
    #[default]
    WithinSafeZone,
    Any,
}

#[derive(Debug, Deserialize)]
struct PutPatternsBody {
    rollback_to: RollbackTarget,
    #[serde(default)]
    limit: Limit,
    #[serde(default)]
    patterns: Vec<String>,
}

async fn resolve_rollback_target(facade: &Facade, target: RollbackTarget) -> Result<Point, Response> {
    match target {
        RollbackTarget::Slot(slot) => {
            let ancestors = facade
                .store
                .list_ancestors_desc(slot.saturating_add(1), 1)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;
            match ancestors.into_iter().next() {
                Some(point) if point.slot() == slot => Ok(point),
                _ => Err(bad_request("no checkpoint exists at exactly that slot")),
            }
        }
        RollbackTarget::Point { slot, hash } => {
            let hash_bytes = hex::decode(&hash).map_err(|_| bad_request("malformed_point"))?;
            let ancestors = facade
                .store
                .list_ancestors_desc(slot.saturating_add(1), 1)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;
            match ancestors.into_iter().next() {
                Some(point) if point.slot() == slot => {
                    if point.hash() == Some(hash_bytes.as_slice()) {
                        Ok(point)
                    } else {
                        Err(bad_request("malformed_point"))
                    }
                }
                // no checkpoint at that slot at all: optimistic accept
                _ => Ok(Point::Specific(slot, hash_bytes)),
            }
        }
    }
}

async fn put_patterns(facade: &Facade, body: PutPatternsBody, path_pattern: Option<Pattern>) -> Response {
    let mut parsed_patterns = Vec::new();
    if let Some(pattern) = path_pattern {
        parsed_patterns.push(pattern);
    }
    for text in &body.patterns {
        match Pattern::parse(text) {
            Ok(pattern) => parsed_patterns.push(pattern),
            Err(err) => return bad_request(err.to_string()),
        }
    }

    let target = match resolve_rollback_target(facade, body.rollback_to).await {
        Ok(target) => target,
        Err(resp) => return resp,
    };

    if body.limit == Limit::WithinSafeZone {
        let snapshot = facade.health.snapshot();
        if let Some(tip) = snapshot.most_recent_node_tip {
            let distance = tip.saturating_sub(target.slot());
            if distance > facade.stability_window {
                return bad_request("rollback target is beyond the safe zone");
            }
        }
    }

    match facade.force_rollback.request(target).await {
        Ok(ForceRollbackOutcome::Succeeded) => {
            if facade.store.insert_patterns(&parsed_patterns).await.is_err() {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            facade.patterns.insert_many(parsed_patterns);
            let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
            let texts: Vec<String> = facade.patterns.snapshot().iter().map(Pattern::to_text).collect();
            (StatusCode::OK, headers, Json(texts)).into_response()
        }
        Ok(ForceRollbackOutcome::Failed) | Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub async fn put_all(State(facade): State<Facade>, Json(body): Json<PutPatternsBody>) -> Response {
    put_patterns(&facade, body, None).await
}

pub async fn put_one(
    State(facade): State<Facade>,
    Path(pattern): Path<String>,
    Json(body): Json<PutPatternsBody>,
) -> Response {
    let parsed = match Pattern::parse(&pattern) {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(err.to_string()),
    };
    put_patterns(&facade, body, Some(parsed)).await
}

pub async fn delete_one(State(facade): State<Facade>, Path(pattern): Path<String>) -> Response {
    let parsed = match Pattern::parse(&pattern) {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(err.to_string()),
    };

    match facade.store.delete_pattern(&parsed).await {
        Ok(deleted) => {
            facade.patterns.remove(&parsed);
            let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
            (StatusCode::OK, headers, Json(Deleted { deleted })).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
