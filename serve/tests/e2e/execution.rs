//! Execution bridge flows: pass-through RPCs and the temporary package
//! workflow (S5) against a mock execution runtime.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{spawn_hub_with_execution, Client, Hub};

/// Requests the mock runtime received, in order.
type Seen = Arc<Mutex<Vec<String>>>;

/// Minimal execution runtime: answers every request with success and plays
/// the package lifecycle for `RunPackage`.
async fn mock_execution_runtime(listener: TcpListener, seen: Seen) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let seen = seen.clone();
        tokio::spawn(async move {
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();
            while let Some(Ok(msg)) = read.next().await {
                let Message::Text(text) = msg else { continue };
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                let request = frame["request"].as_str().unwrap().to_string();
                let id = frame["id"].as_u64().unwrap();
                seen.lock().await.push(request.clone());

                let data = match request.as_str() {
                    "ListPackages" => json!([{"id": "pkg_existing", "name": "demo"}]),
                    _ => serde_json::Value::Null,
                };
                let mut response = json!({"response": request, "id": id, "result": true});
                if !data.is_null() {
                    response["data"] = data;
                }
                let _ = write.send(Message::Text(response.to_string())).await;

                if request == "RunPackage" {
                    let package_id = frame["args"]["id"].as_str().unwrap().to_string();
                    let running = json!({
                        "event": "PackageState",
                        "data": {"state": "running", "packageId": package_id},
                    });
                    let _ = write.send(Message::Text(running.to_string())).await;
                    let stopped = json!({
                        "event": "PackageState",
                        "data": {"state": "stopped", "packageId": package_id},
                    });
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    let _ = write.send(Message::Text(stopped.to_string())).await;
                }
            }
        });
    }
}

async fn hub_with_runtime() -> (Hub, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(mock_execution_runtime(listener, seen.clone()));
    let hub = spawn_hub_with_execution(&url).await;
    (hub, seen)
}

#[tokio::test(flavor = "multi_thread")]
async fn pass_through_rpc_reaches_runtime() {
    let (hub, seen) = hub_with_runtime().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    let data = client.rpc_ok("ListPackages", serde_json::Value::Null).await;
    assert_eq!(data[0]["id"], "pkg_existing");
    assert!(seen.lock().await.contains(&"ListPackages".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn temporary_package_restores_project() {
    let (hub, seen) = hub_with_runtime().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    // a saved project to run
    client
        .rpc_ok("NewScene", json!({"name": "s", "description": ""}))
        .await;
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
    client.rpc_ok("SaveProject", serde_json::Value::Null).await;

    client
        .rpc_ok("TemporaryPackage", serde_json::Value::Null)
        .await;

    // the package lifecycle is mirrored to the UI
    loop {
        let evt = client.wait_event("PackageState").await;
        if evt["data"]["state"] == "stopped" {
            break;
        }
    }
    // and the original project comes back
    let reopened = client.wait_event("OpenProject").await;
    assert_eq!(reopened["data"]["project"]["name"], "p");

    let seen = seen.lock().await;
    let upload = seen.iter().position(|r| r == "UploadPackage").unwrap();
    let run = seen.iter().position(|r| r == "RunPackage").unwrap();
    let delete = seen.iter().position(|r| r == "DeletePackage").unwrap();
    assert!(upload < run && run < delete);
}

#[tokio::test(flavor = "multi_thread")]
async fn temporary_package_requires_saved_project() {
    let (hub, _seen) = hub_with_runtime().await;
    let mut client = Client::connect(&hub.url).await;
    client.register("u").await;

    client
        .rpc_ok("NewScene", json!({"name": "s", "description": ""}))
        .await;
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
    client.rpc_ok("SaveProject", serde_json::Value::Null).await;
    // an unsaved change blocks the run
    client
        .rpc_ok(
            "AddActionPoint",
            json!({"name": "ap_late", "position": {"x": 0.0, "y": 0.0, "z": 0.0}}),
        )
        .await;
    let refused = client
        .rpc("TemporaryPackage", serde_json::Value::Null)
        .await;
    assert_eq!(refused["result"], false);
    assert!(crate::common::messages(&refused)[0].contains("unsaved"));
}
