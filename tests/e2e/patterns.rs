mod support;

use argus_core::{BlockApply, InputManagement, Pattern, Store};
use argus_testing::fixtures::{sample_input, sample_point};
use support::{json_body, TestApp};

#[tokio::test]
async fn starts_with_no_patterns() {
    let app = TestApp::new();

    let (status, body) = app.get("/patterns").await;

    assert_eq!(status, 200);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn put_all_registers_patterns_and_they_show_up_in_the_registry() {
    let app = TestApp::new();

    let (status, body) = app
        .put_json(
            "/patterns",
            serde_json::json!({
                "rollback_to": 0,
                "patterns": ["*"],
            }),
        )
        .await;

    assert_eq!(status, 200);
    let patterns = json_body(&body);
    assert_eq!(patterns.as_array().unwrap().len(), 1);
    assert!(app.patterns.contains(&Pattern::Any));
}

#[tokio::test]
async fn put_one_accepts_the_path_pattern_without_a_body_list() {
    let app = TestApp::new();
    let policy = hex::encode([9u8; 28]);
    let path = format!("/patterns/{policy}.%2A");

    let (status, body) = app
        .put_json(&path, serde_json::json!({ "rollback_to": 0 }))
        .await;

    assert_eq!(status, 200);
    let patterns = json_body(&body);
    assert_eq!(patterns.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_rejects_patterns_still_covered_by_an_active_pattern() {
    let app = TestApp::new();
    app.patterns.insert_many([Pattern::Any]);

    let (status, body) = app.delete("/matches/00000000000000000000000000000000000000000000000000000000000000ab").await;

    assert_eq!(status, 400);
    let body = json_body(&body);
    assert!(body["hint"].as_str().unwrap().contains("still covered"));
}

#[tokio::test]
async fn delete_one_pattern_removes_it_from_the_registry() {
    let app = TestApp::new();
    app.patterns.insert_many([Pattern::Any]);

    let (status, body) = app.delete("/patterns/*").await;

    assert_eq!(status, 200);
    assert_eq!(json_body(&body)["deleted"], 1);
    assert!(!app.patterns.contains(&Pattern::Any));
}

#[tokio::test]
async fn delete_wildcard_is_not_blocked_by_a_narrow_registered_pattern() {
    let app = TestApp::new();
    app.patterns.insert_many([Pattern::parse(
        "a0028f350aaabe0545fdcb56b039bfb08e4bb4d8c4d7c3c7d481c235.*",
    )
    .unwrap()]);

    let (status, _) = app.delete("/matches").await;

    assert_eq!(status, 200);
}

#[tokio::test]
async fn delete_wildcard_is_blocked_when_a_wildcard_is_registered() {
    let app = TestApp::new();
    app.patterns.insert_many([Pattern::Any]);

    let (status, body) = app.delete("/matches").await;

    assert_eq!(status, 400);
    let body = json_body(&body);
    assert!(body["hint"].as_str().unwrap().contains("still covered"));
}

#[tokio::test]
async fn delete_matches_removes_unspent_inputs_no_longer_covered() {
    let app = TestApp::new();
    let address = vec![11u8; 29];
    app.store
        .apply_blocks(vec![BlockApply {
            checkpoint: sample_point(1),
            new_inputs: vec![sample_input(address, 100, 1, 0)],
            spent: Vec::new(),
            binary_data: Vec::new(),
            scripts: Vec::new(),
        }], InputManagement::MarkSpentInputs, 10)
        .await
        .expect("apply_blocks");

    let (status, body) = app.delete("/matches").await;

    assert_eq!(status, 200);
    assert_eq!(json_body(&body)["deleted"], 1);
}
