use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{bad_request, checkpoint_header, types::ScriptDto, Facade};

pub async fn by_hash(State(facade): State<Facade>, Path(script_hash): Path<String>) -> Response {
    let bytes = match parse_hash(&script_hash, 56) {
        Ok(bytes) => bytes,
        Err(_) => return bad_request("invalid script hash; must be 56 lowercase hex characters"),
    };

    let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
    match facade.store.get_script(&bytes).await {
        Ok(Some(script)) => (StatusCode::OK, headers, Json(Some(ScriptDto::from(script)))).into_response(),
        Ok(None) => (StatusCode::OK, headers, Json(None::<ScriptDto>)).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn parse_hash(value: &str, len: usize) -> Result<Vec<u8>, hex::FromHexError> {
    if value.len() != len {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    hex::decode(value)
}
