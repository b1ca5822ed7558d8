use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{bad_request, checkpoint_header, types::PointDto, Facade};

pub async fn list(State(facade): State<Facade>) -> Response {
    match facade.store.list_checkpoints_desc().await {
        Ok(points) => {
            let most_recent = points.first().map(|p| p.slot());
            let body: Vec<PointDto> = points.iter().map(PointDto::from).collect();
            (StatusCode::OK, checkpoint_header(most_recent), Json(body)).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckpointQuery {
    strict: Option<bool>,
}

pub async fn by_slot(
    State(facade): State<Facade>,
    Path(slot_no): Path<u64>,
    Query(query): Query<CheckpointQuery>,
) -> Response {
    let strict = query.strict.unwrap_or(false);

    let ancestors = match facade.store.list_ancestors_desc(slot_no.saturating_add(1), 1).await {
        Ok(ancestors) => ancestors,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let Some(nearest) = ancestors.into_iter().next() else {
        return (StatusCode::OK, checkpoint_header(None), Json(None::<PointDto>)).into_response();
    };

    if strict && nearest.slot() != slot_no {
        return bad_request("no checkpoint exists at exactly that slot");
    }

    (
        StatusCode::OK,
        checkpoint_header(Some(nearest.slot())),
        Json(Some(PointDto::from(&nearest))),
    )
        .into_response()
}
