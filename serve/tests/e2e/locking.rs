//! Locking flows: conflicting edits (S2) and subtree expansion (S4).

use serde_json::json;

use crate::common::{messages, spawn_hub, Client};

async fn scene_with_object(client: &mut Client) -> String {
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
    evt["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn write_lock_blocks_other_users_edit() {
    let hub = spawn_hub().await;
    let mut a = Client::connect(&hub.url).await;
    let mut b = Client::connect(&hub.url).await;
    a.register("a").await;
    b.register("b").await;

    let object_id = scene_with_object(&mut a).await;

    a.rpc_ok("WriteLock", json!({"objectId": object_id})).await;
    let locked = b.wait_event("ObjectsLocked").await;
    assert_eq!(locked["data"]["owner"], "a");
    assert_eq!(locked["data"]["objectIds"][0], object_id.as_str());

    let pose = json!({"position": {"x": 1.0, "y": 0.0, "z": 0.0},
                      "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}});
    let refused = b
        .rpc(
            "UpdateObjectPose",
            json!({"objectId": object_id, "pose": pose}),
        )
        .await;
    assert_eq!(refused["result"], false);
    assert_eq!(
        messages(&refused)[0],
        format!("Object is not write locked <{object_id}>")
    );

    a.rpc_ok(
        "UpdateObjectPose",
        json!({"objectId": object_id, "pose": pose}),
    )
    .await;
    let changed = b.wait_event("SceneObjectChanged").await;
    assert_eq!(changed["changeType"], "update");
    assert_eq!(changed["data"]["pose"]["position"]["x"], 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unlock_requires_the_owner() {
    let hub = spawn_hub().await;
    let mut a = Client::connect(&hub.url).await;
    let mut b = Client::connect(&hub.url).await;
    a.register("a").await;
    b.register("b").await;
    let object_id = scene_with_object(&mut a).await;

    a.rpc_ok("WriteLock", json!({"objectId": object_id})).await;
    let refused = b.rpc("WriteUnlock", json!({"objectId": object_id})).await;
    assert_eq!(refused["result"], false);
    a.rpc_ok("WriteUnlock", json!({"objectId": object_id})).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_releases_locks() {
    let hub = spawn_hub().await;
    let mut a = Client::connect(&hub.url).await;
    let mut b = Client::connect(&hub.url).await;
    a.register("a").await;
    b.register("b").await;
    let object_id = scene_with_object(&mut a).await;

    a.rpc_ok("WriteLock", json!({"objectId": object_id})).await;
    b.wait_event("ObjectsLocked").await;
    drop(a);

    let unlocked = b.wait_event("ObjectsUnlocked").await;
    assert_eq!(unlocked["data"]["owner"], "a");
    b.rpc_ok("WriteLock", json!({"objectId": object_id})).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn subtree_lock_covers_descendants() {
    let hub = spawn_hub().await;
    let mut a = Client::connect(&hub.url).await;
    let mut b = Client::connect(&hub.url).await;
    a.register("a").await;
    b.register("b").await;

    let object_id = scene_with_object(&mut a).await;
    a.rpc_ok("SaveScene", serde_json::Value::Null).await;
    let scene_id = hub
        .storage
        .scenes
        .lock()
        .await
        .keys()
        .next()
        .unwrap()
        .clone();
    a.rpc_ok(
        "NewProject",
        json!({"sceneId": scene_id, "name": "p", "hasLogic": true}),
    )
    .await;

    a.rpc_ok(
        "AddActionPoint",
        json!({"name": "ap_one", "position": {"x": 0.0, "y": 0.0, "z": 0.0}, "parent": object_id}),
    )
    .await;
    let ap = a.wait_event("ActionPointChanged").await;
    let ap_id = ap["data"]["id"].as_str().unwrap().to_string();

    a.rpc_ok("WriteLock", json!({"objectId": ap_id})).await;
    b.wait_event("ObjectsLocked").await;
    a.rpc_ok(
        "AddAction",
        json!({
            "actionPointId": ap_id,
            "name": "pick_it",
            "type": format!("{object_id}/pick"),
            "parameters": [{"name": "speed", "type": "double", "value": "0.5"}],
            "flows": [{"type": "default"}],
        }),
    )
    .await;
    let action = a.wait_event("ActionChanged").await;
    let action_id = action["data"]["id"].as_str().unwrap().to_string();
    a.rpc_ok("WriteUnlock", json!({"objectId": ap_id})).await;
    b.wait_event("ObjectsUnlocked").await;

    // lock the whole subtree rooted at the scene object
    a.rpc_ok("WriteLock", json!({"objectId": object_id, "lockTree": true}))
        .await;
    let locked = b.wait_event("ObjectsLocked").await;
    let mut ids: Vec<String> = locked["data"]["objectIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    let mut expected = vec![object_id.clone(), ap_id.clone(), action_id.clone()];
    expected.sort();
    assert_eq!(ids, expected);

    // another user cannot lock a node inside the subtree
    let refused = b.rpc("WriteLock", json!({"objectId": ap_id})).await;
    assert_eq!(refused["result"], false);
    assert!(messages(&refused)[0].contains("Locking failed"));
}
