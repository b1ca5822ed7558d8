pub mod routes;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router, ServiceExt,
};
use tower_http::{cors::CorsLayer, normalize_path::NormalizePathLayer, trace};
use tracing::Level;

use argus_core::{FetchBlockClient, ForceRollbackHandle, Health, PatternRegistry, Store};

use crate::types::BadRequest;

/// Everything a route handler needs, cloned cheaply (every field is an `Arc`
/// or `Arc`-backed handle already).
#[derive(Clone)]
pub struct Facade {
    pub store: Arc<dyn Store>,
    pub patterns: PatternRegistry,
    pub health: Health,
    pub force_rollback: ForceRollbackHandle,
    pub fetch_block: Option<Arc<dyn FetchBlockClient>>,
    pub stability_window: u64,
    pub permissive_cors: bool,
}

/// `X-Most-Recent-Checkpoint` header attached to every non-error response.
pub(crate) fn checkpoint_header(slot: Option<u64>) -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    let name = axum::http::HeaderName::from_static("x-most-recent-checkpoint");
    if let Ok(value) = axum::http::HeaderValue::from_str(&slot.unwrap_or(0).to_string()) {
        headers.insert(name, value);
    }
    headers
}

pub(crate) fn bad_request(hint: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(BadRequest {
            hint: Some(hint.into()),
        }),
    )
        .into_response()
}

pub fn build_router(facade: Facade) -> Router {
    let permissive_cors = facade.permissive_cors;

    let routed = Router::new()
        .route("/health", get(routes::health::health))
        .route("/checkpoints", get(routes::checkpoints::list))
        .route("/checkpoints/{slot_no}", get(routes::checkpoints::by_slot))
        .route(
            "/matches",
            get(routes::matches::wildcard).delete(routes::matches::delete_wildcard),
        )
        .route(
            "/matches/{*pattern}",
            get(routes::matches::by_pattern).delete(routes::matches::delete_by_pattern),
        )
        .route("/datums/{datum_hash}", get(routes::datums::by_hash))
        .route("/scripts/{script_hash}", get(routes::scripts::by_hash))
        .route("/metadata/{slot_no}", get(routes::metadata::by_slot))
        .route(
            "/patterns",
            get(routes::patterns::list).put(routes::patterns::put_all),
        )
        .route(
            "/patterns/{*pattern}",
            get(routes::patterns::list_one)
                .put(routes::patterns::put_one)
                .delete(routes::patterns::delete_one),
        );

    let app = Router::new()
        .nest("/v1", routed.clone())
        .merge(routed)
        .with_state(facade)
        .layer(
            trace::TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(if permissive_cors {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        });

    app.layer(NormalizePathLayer::trim_trailing_slash())
}

/// Serve `facade` on `listen_address` until `cancel` fires. `NormalizePathLayer`
/// wraps the router into a bare `Service`, hence `ServiceExt::into_make_service`
/// rather than the inherent `Router::into_make_service`.
pub async fn serve(
    facade: Facade,
    listen_address: std::net::SocketAddr,
    cancel: tokio_util::sync::CancellationToken,
) -> std::io::Result<()> {
    let app = build_router(facade);
    let listener = tokio::net::TcpListener::bind(listen_address).await?;

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
