use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{checkpoint_header, types, Facade};

enum Accept {
    Json,
    Prometheus,
    NotAcceptable,
}

fn negotiate(headers: &HeaderMap) -> Accept {
    let Some(value) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Accept::Json;
    };

    if value.contains("text/plain") || value.contains("*/*") {
        Accept::Prometheus
    } else if value.contains("application/json") {
        Accept::Json
    } else {
        Accept::NotAcceptable
    }
}

pub async fn health(State(facade): State<Facade>, headers: HeaderMap) -> Response {
    let snapshot = facade.health.snapshot();
    let mut response_headers = checkpoint_header(snapshot.most_recent_checkpoint);
    let body = types::Health::from_snapshot(snapshot);

    match negotiate(&headers) {
        Accept::Prometheus => {
            response_headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain;charset=utf-8"),
            );
            (StatusCode::OK, response_headers, body.to_prometheus()).into_response()
        }
        Accept::Json => (StatusCode::OK, response_headers, Json(body)).into_response(),
        Accept::NotAcceptable => (
            StatusCode::NOT_ACCEPTABLE,
            Json(serde_json::json!({
                "acceptable": ["application/json", "text/plain"],
            })),
        )
            .into_response(),
    }
}
