//! Scene runtime flows: start/stop blocks edits, robot movement (S3).

use serde_json::json;

use crate::common::{messages, spawn_hub, Client};

async fn scene_with_robot(client: &mut Client) -> String {
    client
        .rpc_ok("NewScene", json!({"name": "s", "description": ""}))
        .await;
    client
        .rpc_ok(
            "AddObjectToScene",
            json!({
                "name": "bot_1",
                "type": "VirtualBot",
                "pose": {"position": {"x": 0.0, "y": 0.0, "z": 0.0},
                         "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}},
            }),
        )
        .await;
    let evt = client.wait_event("SceneObjectChanged").await;
    evt["data"]["id"].as_str().unwrap().to_string()
}

async fn wait_scene_state(client: &mut Client, state: &str) {
    loop {
        let evt = client.wait_event("SceneState").await;
        if evt["data"]["state"] == state {
            return;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn start_scene_blocks_edits_until_stop() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let robot_id = scene_with_robot(&mut client).await;

    client.rpc_ok("StartScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Starting").await;
    wait_scene_state(&mut client, "Started").await;

    let refused = client
        .rpc(
            "AddObjectToScene",
            json!({
                "name": "late_box",
                "type": "VirtualBox",
                "pose": {"position": {"x": 0.0, "y": 0.0, "z": 0.0},
                         "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}},
            }),
        )
        .await;
    assert_eq!(refused["result"], false);
    assert_eq!(
        messages(&refused)[0],
        "Modifications can be only done offline."
    );

    client
        .rpc_ok(
            "MoveToPose",
            json!({
                "robotId": robot_id,
                "endEffectorId": "default",
                "speed": 1.0,
                "position": {"x": 0.1, "y": 0.2, "z": 0.3},
                "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
            }),
        )
        .await;
    let start = client.wait_event("RobotMoveToPose").await;
    assert_eq!(start["data"]["moveEventType"], "start");
    let end = client.wait_event("RobotMoveToPose").await;
    assert_eq!(end["data"]["moveEventType"], "end");

    let pose = client
        .rpc_ok(
            "GetEndEffectorPose",
            json!({"robotId": robot_id, "endEffectorId": "default"}),
        )
        .await;
    assert_eq!(pose["position"]["x"], 0.1);

    client.rpc_ok("StopScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Stopping").await;
    wait_scene_state(&mut client, "Stopped").await;

    // editing works again
    client
        .rpc_ok(
            "AddObjectToScene",
            json!({
                "name": "late_box",
                "type": "VirtualBox",
                "pose": {"position": {"x": 0.0, "y": 0.0, "z": 0.0},
                         "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}},
            }),
        )
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn start_scene_refused_while_user_holds_lock() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let robot_id = scene_with_robot(&mut client).await;

    client.rpc_ok("WriteLock", json!({"objectId": robot_id})).await;
    let refused = client.rpc("StartScene", serde_json::Value::Null).await;
    assert_eq!(refused["result"], false);
    assert_eq!(messages(&refused)[0], "Something is locked.");

    client
        .rpc_ok("WriteUnlock", json!({"objectId": robot_id}))
        .await;
    client.rpc_ok("StartScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Started").await;
    client.rpc_ok("StopScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Stopped").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn runtime_rpcs_require_started_scene() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let robot_id = scene_with_robot(&mut client).await;

    let refused = client
        .rpc("GetRobotJoints", json!({"robotId": robot_id}))
        .await;
    assert_eq!(refused["result"], false);
    assert_eq!(messages(&refused)[0], "Scene offline.");
}

#[tokio::test(flavor = "multi_thread")]
async fn hand_teaching_broadcasts_event() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let robot_id = scene_with_robot(&mut client).await;

    client.rpc_ok("StartScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Started").await;

    client
        .rpc_ok(
            "HandTeachingMode",
            json!({"robotId": robot_id, "enable": true}),
        )
        .await;
    let evt = client.wait_event("HandTeachingMode").await;
    assert_eq!(evt["data"]["enabled"], true);

    client.rpc_ok("StopScene", serde_json::Value::Null).await;
    wait_scene_state(&mut client, "Stopped").await;
}
