use std::sync::Arc;

use argus_core::{forced_rollback, Health, PatternRegistry, Store};
use argus_http::{build_router, Facade};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use argus_testing::InMemoryStore;

/// Wraps an in-process router over an [`InMemoryStore`] for end-to-end HTTP
/// tests. The forced-rollback channel is drained by a background task that
/// applies the rollback to the store directly and reports success, standing
/// in for the chain-sync client and consumer that aren't running here.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryStore>,
    pub health: Health,
    pub patterns: PatternRegistry,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let health = Health::new();
        let patterns = PatternRegistry::default();
        let (force_rollback, mut force_rollback_rx) = forced_rollback::channel(16);

        let rollback_store = store.clone();
        let rollback_health = health.clone();
        tokio::spawn(async move {
            while let Some(request) = force_rollback_rx.recv().await {
                let outcome = match rollback_store.rollback_to(request.target.slot()).await {
                    Ok(remaining) => {
                        rollback_health.set_checkpoint(remaining.unwrap_or(0));
                        argus_core::ForceRollbackOutcome::Succeeded
                    }
                    Err(_) => argus_core::ForceRollbackOutcome::Failed,
                };
                let _ = request.reply.send(outcome);
            }
        });

        let facade = Facade {
            store: store.clone(),
            patterns: patterns.clone(),
            health: health.clone(),
            force_rollback,
            fetch_block: None,
            stability_window: 10,
            permissive_cors: false,
        };

        Self {
            router: build_router(facade),
            store,
            health,
            patterns,
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Vec<u8>) {
        self.request(Method::GET, path, Body::empty()).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Vec<u8>) {
        self.request(Method::DELETE, path, Body::empty()).await
    }

    pub async fn put_json(&self, path: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
        let body = Body::from(serde_json::to_vec(&body).expect("body serializes"));
        self.request_with_content_type(Method::PUT, path, body, "application/json").await
    }

    /// Like [`Self::get`] but also returns the response's
    /// `X-Most-Recent-Checkpoint` header value, for asserting P9.
    pub async fn get_with_checkpoint_header(&self, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        self.request_with_headers(Method::GET, path, Body::empty(), "application/json")
            .await
    }

    async fn request(&self, method: Method, path: &str, body: Body) -> (StatusCode, Vec<u8>) {
        let (status, _, bytes) = self.request_with_headers(method, path, body, "application/json").await;
        (status, bytes)
    }

    async fn request_with_content_type(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: &str,
    ) -> (StatusCode, Vec<u8>) {
        let (status, _, bytes) = self.request_with_headers(method, path, body, content_type).await;
        (status, bytes)
    }

    async fn request_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: &str,
    ) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", content_type)
            .body(body)
            .expect("failed to build request");

        let response = self.router.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let checkpoint_header = response
            .headers()
            .get("x-most-recent-checkpoint")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();
        (status, checkpoint_header, bytes.to_vec())
    }
}

pub fn json_body(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).expect("response body is valid json")
}
