mod support;

use argus_core::{BlockApply, InputManagement, Store};
use argus_testing::fixtures::{sample_input, sample_point};
use support::{json_body, TestApp};

async fn apply(app: &TestApp, slot: u64, address: Vec<u8>) {
    app.store
        .apply_blocks(vec![BlockApply {
            checkpoint: sample_point(slot),
            new_inputs: vec![sample_input(address, 1_000_000, slot, 0)],
            spent: Vec::new(),
            binary_data: Vec::new(),
            scripts: Vec::new(),
        }], InputManagement::MarkSpentInputs, 10)
        .await
        .expect("apply_blocks");
    app.health.set_checkpoint(slot);
    app.health.set_node_tip(slot);
}

#[tokio::test]
async fn forced_rollback_discards_checkpoints_past_the_target() {
    let app = TestApp::new();
    apply(&app, 10, vec![1u8; 29]).await;
    apply(&app, 20, vec![2u8; 29]).await;
    assert_eq!(app.store.checkpoint_count(), 2);

    let (status, body) = app
        .put_json(
            "/patterns",
            serde_json::json!({
                "rollback_to": 10,
                "patterns": ["*"],
            }),
        )
        .await;

    assert_eq!(status, 200);
    let body = json_body(&body);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(app.store.checkpoint_count(), 1);
    assert!(app.store.list_checkpoints_desc().await.unwrap()[0].slot() <= 10);
    assert!(app.patterns.contains(&argus_core::Pattern::Any));
}

#[tokio::test]
async fn rollback_to_a_slot_with_no_checkpoint_is_rejected() {
    let app = TestApp::new();
    apply(&app, 10, vec![3u8; 29]).await;

    let (status, body) = app
        .put_json(
            "/patterns",
            serde_json::json!({
                "rollback_to": 15,
            }),
        )
        .await;

    assert_eq!(status, 400);
    let body = json_body(&body);
    assert!(body["hint"].as_str().unwrap().contains("no checkpoint exists"));
}

#[tokio::test]
async fn checkpoint_by_slot_returns_nearest_ancestor() {
    let app = TestApp::new();
    apply(&app, 10, vec![4u8; 29]).await;
    apply(&app, 20, vec![5u8; 29]).await;

    let (status, body) = app.get("/checkpoints/15").await;

    assert_eq!(status, 200);
    let body = json_body(&body);
    assert_eq!(body["slot_no"], 10);
}

#[tokio::test]
async fn checkpoint_by_slot_strict_rejects_non_exact_match() {
    let app = TestApp::new();
    apply(&app, 10, vec![6u8; 29]).await;

    let (status, _) = app.get("/checkpoints/15?strict=true").await;

    assert_eq!(status, 400);
}
