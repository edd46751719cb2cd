//! Session flows: welcome burst, user registration, scene round trip (S1).

use serde_json::json;

use crate::common::{messages, spawn_hub, Client};

#[tokio::test(flavor = "multi_thread")]
async fn welcome_burst_shows_main_screen() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    let evt = client.wait_event("ShowMainScreen").await;
    assert_eq!(evt["data"]["what"], "ScenesList");
}

#[tokio::test(flavor = "multi_thread")]
async fn register_user_duplicate_rejected_until_stale() {
    let hub = spawn_hub().await;
    let mut a = Client::connect(&hub.url).await;
    a.register("operator").await;

    let mut b = Client::connect(&hub.url).await;
    let resp = b
        .rpc("RegisterUser", json!({"userName": "operator"}))
        .await;
    assert_eq!(resp["result"], false);
    assert!(messages(&resp)[0].contains("already exists"));

    // a goes away; the stale entry must be evicted on the next attempt
    drop(a);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    b.rpc_ok("RegisterUser", json!({"userName": "operator"}))
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_user_name_rejected() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    let resp = client.rpc("RegisterUser", json!({"userName": ""})).await;
    assert_eq!(resp["result"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn new_scene_round_trip() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    client
        .rpc_ok("NewScene", json!({"name": "s", "description": "d"}))
        .await;
    let open = client.wait_event("OpenScene").await;
    let scene_id = open["data"]["scene"]["id"].as_str().unwrap().to_string();
    assert_eq!(open["data"]["scene"]["name"], "s");
    assert_eq!(open["data"]["scene"]["description"], "d");
    let state = client.wait_event("SceneState").await;
    assert_eq!(state["data"]["state"], "Stopped");

    client.rpc_ok("SaveScene", serde_json::Value::Null).await;
    client.wait_event("SceneSaved").await;

    client.rpc_ok("CloseScene", json!({})).await;
    client.wait_event("SceneClosed").await;
    let screen = client.wait_event("ShowMainScreen").await;
    assert_eq!(screen["data"]["what"], "ScenesList");
    assert_eq!(screen["data"]["highlight"], scene_id.as_str());

    let listed = client.rpc_ok("ListScenes", serde_json::Value::Null).await;
    let items = listed.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], scene_id.as_str());
}

#[tokio::test(flavor = "multi_thread")]
async fn close_scene_with_changes_needs_force() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    client
        .rpc_ok("NewScene", json!({"name": "s", "description": ""}))
        .await;
    let resp = client.rpc("CloseScene", json!({})).await;
    assert_eq!(resp["result"], false);
    assert!(messages(&resp)[0].contains("unsaved"));

    client.rpc_ok("CloseScene", json!({"force": true})).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dry_run_leaves_no_trace() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    client
        .rpc_dry("NewScene", json!({"name": "phantom", "description": ""}))
        .await;
    // nothing was opened: a real NewScene with the same name still works
    client
        .rpc_ok("NewScene", json!({"name": "phantom", "description": ""}))
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frame_with_id_gets_failed_response() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    use futures_util::SinkExt;
    client
        .write
        .send(tokio_tungstenite::tungstenite::Message::Text(
            r#"{"request": "OpenScene", "id": 9, "args": 42}"#.to_string(),
        ))
        .await
        .unwrap();
    // args of the wrong shape are answered, not dropped
    loop {
        use futures_util::StreamExt;
        let msg = client.read.next().await.unwrap().unwrap();
        if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value.get("response").is_some() {
                assert_eq!(value["id"], 9);
                assert_eq!(value["result"], false);
                break;
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn system_info_lists_rpcs() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    let data = client.rpc_ok("SystemInfo", serde_json::Value::Null).await;
    let rpcs = data["supportedRpcRequests"].as_array().unwrap();
    assert!(rpcs.iter().any(|r| r == "NewScene"));
    assert!(rpcs.iter().any(|r| r == "RunPackage"));
}
