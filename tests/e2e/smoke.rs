mod support;

use argus_core::{BlockApply, InputManagement, Store};
use argus_testing::fixtures::{sample_input, sample_point};
use support::{json_body, TestApp};

#[tokio::test]
async fn health_reports_disconnected_with_no_checkpoint() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;

    assert_eq!(status, 200);
    let body = json_body(&body);
    assert_eq!(body["connection_status"], "disconnected");
    assert!(body["most_recent_checkpoint"].is_null());
}

#[tokio::test]
async fn applied_block_shows_up_in_checkpoints_and_matches() {
    let app = TestApp::new();
    let address = vec![7u8; 29];

    app.store
        .apply_blocks(vec![BlockApply {
            checkpoint: sample_point(10),
            new_inputs: vec![sample_input(address, 5_000_000, 10, 0)],
            spent: Vec::new(),
            binary_data: Vec::new(),
            scripts: Vec::new(),
        }], InputManagement::MarkSpentInputs, 10)
        .await
        .expect("apply_blocks");
    app.health.set_checkpoint(10);
    app.health.set_node_tip(10);

    let (status, body) = app.get("/checkpoints").await;
    assert_eq!(status, 200);
    let checkpoints = json_body(&body);
    assert_eq!(checkpoints.as_array().unwrap().len(), 1);
    assert_eq!(checkpoints[0]["slot_no"], 10);

    let (status, body) = app.get("/matches").await;
    assert_eq!(status, 200);
    let matches = json_body(&body);
    assert_eq!(matches.as_array().unwrap().len(), 1);
    assert_eq!(matches[0]["value"]["coins"], 5_000_000);

    let (status, body) = app.get("/matches?unspent=true").await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    let (status, body) = app.get("/matches?spent=true").await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn matches_rejects_conflicting_status_filters() {
    let app = TestApp::new();

    let (status, body) = app.get("/matches?spent=true&unspent=true").await;

    assert_eq!(status, 400);
    let body = json_body(&body);
    assert!(body["hint"].as_str().unwrap().contains("mutually exclusive"));
}

#[tokio::test]
async fn unknown_pattern_syntax_is_a_bad_request() {
    let app = TestApp::new();

    let (status, _) = app.get("/matches/not-a-valid-pattern!!").await;

    assert_eq!(status, 400);
}

#[tokio::test]
async fn every_response_carries_the_most_recent_checkpoint_header() {
    let app = TestApp::new();

    let (status, header, _) = app.get_with_checkpoint_header("/checkpoints").await;
    assert_eq!(status, 200);
    assert_eq!(header.as_deref(), Some("0"));

    app.store
        .apply_blocks(vec![BlockApply {
            checkpoint: sample_point(42),
            new_inputs: Vec::new(),
            spent: Vec::new(),
            binary_data: Vec::new(),
            scripts: Vec::new(),
        }], InputManagement::MarkSpentInputs, 10)
        .await
        .expect("apply_blocks");
    app.health.set_checkpoint(42);

    let (status, header, _) = app.get_with_checkpoint_header("/checkpoints").await;
    assert_eq!(status, 200);
    assert_eq!(header.as_deref(), Some("42"));
}

#[tokio::test]
async fn fold_inputs_status_flag_all_includes_spent() {
    let app = TestApp::new();
    let address = vec![8u8; 29];
    let mut input = sample_input(address, 1_000, 1, 0);
    input.spent_at = Some(sample_point(2));

    app.store
        .apply_blocks(vec![BlockApply {
            checkpoint: sample_point(1),
            new_inputs: vec![input],
            spent: Vec::new(),
            binary_data: Vec::new(),
            scripts: Vec::new(),
        }], InputManagement::MarkSpentInputs, 10)
        .await
        .expect("apply_blocks");

    let (status, body) = app.get("/matches").await;
    assert_eq!(status, 200);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);
}
