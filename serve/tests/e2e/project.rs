//! Project editing flows: action points, actions, links (S6), logic.

use serde_json::json;

use crate::common::{messages, spawn_hub, Client, Hub};

struct Fixture {
    object_id: String,
    ap_id: String,
}

async fn open_project(hub: &Hub, client: &mut Client) -> Fixture {
    client
        .rpc_ok("NewScene", json!({"name": "s", "description": ""}))
        .await;
    client
        .rpc_ok(
            "AddObjectToScene",
            json!({
                "name": "box_1",
                "type": "VirtualBox",
                "pose": {"position": {"x": 0.0, "y": 0.0, "z": 0.0},
                         "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}},
            }),
        )
        .await;
    let evt = client.wait_event("SceneObjectChanged").await;
    let object_id = evt["data"]["id"].as_str().unwrap().to_string();
    client.rpc_ok("SaveScene", serde_json::Value::Null).await;
    let scene_id = hub
        .storage
        .scenes
        .lock()
        .await
        .keys()
        .next()
        .unwrap()
        .clone();
    client
        .rpc_ok(
            "NewProject",
            json!({"sceneId": scene_id, "name": "p", "hasLogic": true}),
        )
        .await;
    client
        .rpc_ok(
            "AddActionPoint",
            json!({"name": "ap_one", "position": {"x": 0.1, "y": 0.2, "z": 0.3}}),
        )
        .await;
    let ap = client.wait_event("ActionPointChanged").await;
    let ap_id = ap["data"]["id"].as_str().unwrap().to_string();
    Fixture { object_id, ap_id }
}

async fn add_action(
    client: &mut Client,
    fixture: &Fixture,
    name: &str,
    parameters: serde_json::Value,
    flows: serde_json::Value,
) -> serde_json::Value {
    client
        .rpc_ok("WriteLock", json!({"objectId": fixture.ap_id}))
        .await;
    let resp = client
        .rpc(
            "AddAction",
            json!({
                "actionPointId": fixture.ap_id,
                "name": name,
                "type": format!("{}/pick", fixture.object_id),
                "parameters": parameters,
                "flows": flows,
            }),
        )
        .await;
    client
        .rpc_ok("WriteUnlock", json!({"objectId": fixture.ap_id}))
        .await;
    resp
}

#[tokio::test(flavor = "multi_thread")]
async fn link_type_mismatch_is_rejected() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let fixture = open_project(&hub, &mut client).await;

    // producer with one string output
    let resp = add_action(
        &mut client,
        &fixture,
        "producer",
        json!([{"name": "speed", "type": "double", "value": "0.5"}]),
        json!([{"type": "default", "outputs": ["out_res"]}]),
    )
    .await;
    assert_eq!(resp["result"], true, "{resp}");
    let action = client.wait_event("ActionChanged").await;
    let producer_id = action["data"]["id"].as_str().unwrap().to_string();

    // consumer claims integer but links the string output
    let refused = add_action(
        &mut client,
        &fixture,
        "consumer",
        json!([{"name": "x", "type": "integer",
                "value": format!("{producer_id}/default/0"), "kind": "link"}]),
        json!([{"type": "default"}]),
    )
    .await;
    assert_eq!(refused["result"], false);
    assert_eq!(
        messages(&refused)[0],
        "Param type does not match action output type."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_flow_output_rejected() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let fixture = open_project(&hub, &mut client).await;

    let resp = add_action(
        &mut client,
        &fixture,
        "first",
        json!([{"name": "speed", "type": "double", "value": "0.5"}]),
        json!([{"type": "default", "outputs": ["shared_out"]}]),
    )
    .await;
    assert_eq!(resp["result"], true);

    let refused = add_action(
        &mut client,
        &fixture,
        "second",
        json!([{"name": "speed", "type": "double", "value": "0.5"}]),
        json!([{"type": "default", "outputs": ["shared_out"]}]),
    )
    .await;
    assert_eq!(refused["result"], false);
    assert!(messages(&refused)[0].contains("not unique"));
}

#[tokio::test(flavor = "multi_thread")]
async fn moving_ap_invalidates_joints_and_notifies() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let fixture = open_project(&hub, &mut client).await;

    // a joints snapshot needs a started scene and a robot
    client
        .rpc_ok("CloseProject", json!({"force": true}))
        .await;
    client
        .rpc_ok("NewScene", json!({"name": "s2", "description": ""}))
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
    let robot_id = evt["data"]["id"].as_str().unwrap().to_string();
    client.rpc_ok("SaveScene", serde_json::Value::Null).await;
    let scene_id = {
        let scenes = hub.storage.scenes.lock().await;
        scenes
            .values()
            .find(|s| s.name == "s2")
            .unwrap()
            .id
            .clone()
    };
    client
        .rpc_ok(
            "NewProject",
            json!({"sceneId": scene_id, "name": "p2", "hasLogic": true}),
        )
        .await;
    client
        .rpc_ok(
            "AddActionPoint",
            json!({"name": "ap_bot", "position": {"x": 0.0, "y": 0.0, "z": 0.0}}),
        )
        .await;
    let ap = client.wait_event("ActionPointChanged").await;
    let ap_id = ap["data"]["id"].as_str().unwrap().to_string();

    client.rpc_ok("StartScene", serde_json::Value::Null).await;
    loop {
        let state = client.wait_event("SceneState").await;
        if state["data"]["state"] == "Started" {
            break;
        }
    }
    client.rpc_ok("WriteLock", json!({"objectId": ap_id})).await;
    client
        .rpc_ok(
            "AddActionPointJoints",
            json!({"actionPointId": ap_id, "robotId": robot_id, "name": "captured"}),
        )
        .await;
    let joints = client.wait_event("JointsChanged").await;
    assert_eq!(joints["data"]["isValid"], true);

    client.rpc_ok("StopScene", serde_json::Value::Null).await;
    loop {
        let state = client.wait_event("SceneState").await;
        if state["data"]["state"] == "Stopped" {
            break;
        }
    }

    client
        .rpc_ok(
            "UpdateActionPointPose",
            json!({"actionPointId": ap_id, "newPosition": {"x": 0.5, "y": 0.0, "z": 0.0}}),
        )
        .await;
    // the move invalidates the snapshot and reports it
    let updated = client.wait_event("JointsChanged").await;
    assert_eq!(updated["data"]["isValid"], false);
    let _ = fixture;
}

#[tokio::test(flavor = "multi_thread")]
async fn logic_requires_single_start() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let fixture = open_project(&hub, &mut client).await;

    let resp = add_action(
        &mut client,
        &fixture,
        "only",
        json!([{"name": "speed", "type": "double", "value": "0.5"}]),
        json!([{"type": "default"}]),
    )
    .await;
    assert_eq!(resp["result"], true);
    let action = client.wait_event("ActionChanged").await;
    let action_id = action["data"]["id"].as_str().unwrap().to_string();

    client
        .rpc_ok("AddLogicItem", json!({"start": "START", "end": action_id}))
        .await;
    let refused = client
        .rpc("AddLogicItem", json!({"start": "START", "end": "END"}))
        .await;
    assert_eq!(refused["result"], false);
    assert!(messages(&refused)[0].contains("Duplicate start"));

    client
        .rpc_ok("AddLogicItem", json!({"start": action_id, "end": "END"}))
        .await;

    // the project is now valid and executable
    client.rpc_ok("SaveProject", serde_json::Value::Null).await;
    let listed = client.rpc_ok("ListProjects", serde_json::Value::Null).await;
    let entry = &listed.as_array().unwrap()[0];
    assert_eq!(entry["valid"], true, "{entry}");
    assert_eq!(entry["executable"], true, "{entry}");
}

#[tokio::test(flavor = "multi_thread")]
async fn save_project_round_trips_relative_positions() {
    let hub = spawn_hub().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;
    let fixture = open_project(&hub, &mut client).await;

    // child AP parented to the object at x=0; absolute position kept in memory
    client
        .rpc_ok(
            "AddActionPoint",
            json!({"name": "ap_child", "position": {"x": 0.5, "y": 0.0, "z": 0.0},
                   "parent": fixture.ap_id}),
        )
        .await;
    client.rpc_ok("SaveProject", serde_json::Value::Null).await;
    client.wait_event("ProjectSaved").await;

    let stored = hub.storage.projects.lock().await;
    let project = stored.values().next().unwrap();
    let child = project
        .action_points
        .iter()
        .find(|ap| ap.name == "ap_child")
        .unwrap();
    // stored relative to ap_one at (0.1, 0.2, 0.3)
    assert!((child.position.x - 0.4).abs() < 1e-9, "{:?}", child.position);
    assert!((child.position.y + 0.2).abs() < 1e-9);
}
