use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{bad_request, checkpoint_header, types::Datum, Facade};

pub async fn by_hash(State(facade): State<Facade>, Path(datum_hash): Path<String>) -> Response {
    let bytes = match parse_hash(&datum_hash, 64) {
        Ok(bytes) => bytes,
        Err(_) => return bad_request("invalid datum hash; must be 64 lowercase hex characters"),
    };

    let headers = checkpoint_header(facade.health.snapshot().most_recent_checkpoint);
    match facade.store.get_binary_data(&bytes).await {
        Ok(Some(data)) => (StatusCode::OK, headers, Json(Some(Datum::from(data)))).into_response(),
        Ok(None) => (StatusCode::OK, headers, Json(None::<Datum>)).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn parse_hash(value: &str, len: usize) -> Result<Vec<u8>, hex::FromHexError> {
    if value.len() != len {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    hex::decode(value)
}
