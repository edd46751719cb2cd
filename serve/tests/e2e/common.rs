//! Shared harness: in-memory collaborators, hub spawning, a tiny client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use arhub::error::{HubError, Result};
use arhub::runtime::VirtualFactory;
use arhub::services::{
    BuildService, DescriptorIntrospector, ObjectTypeRecord, ProjectStorage, SceneService,
};
use arhub::{Collaborators, Ctx};
use arhub_data::common::{IdDesc, Project, Scene};
use arhub_data::math::Pose;
use arhub_data::object_type::CollisionModel;
use env_config::Settings;

// ----------------------------------------------------------------------
// in-memory collaborators

#[derive(Default)]
pub struct MemStorage {
    pub scenes: Mutex<HashMap<String, Scene>>,
    pub projects: Mutex<HashMap<String, Project>>,
    pub object_types: Mutex<HashMap<String, ObjectTypeRecord>>,
}

fn not_found() -> HubError {
    HubError::external("Project service", "Not found.")
}

#[async_trait]
impl ProjectStorage for MemStorage {
    async fn list_scenes(&self) -> Result<Vec<IdDesc>> {
        Ok(self
            .scenes
            .lock()
            .await
            .values()
            .map(|s| IdDesc {
                id: s.id.clone(),
                name: s.name.clone(),
                description: s.description.clone(),
                modified: s.modified,
                valid: None,
                executable: None,
                problems: vec![],
            })
            .collect())
    }

    async fn get_scene(&self, id: &str) -> Result<Scene> {
        self.scenes.lock().await.get(id).cloned().ok_or_else(not_found)
    }

    async fn put_scene(&self, scene: &Scene) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let stamp = chrono::Utc::now();
        let mut stored = scene.clone();
        stored.modified = Some(stamp);
        self.scenes.lock().await.insert(scene.id.clone(), stored);
        Ok(Some(stamp))
    }

    async fn delete_scene(&self, id: &str) -> Result<()> {
        self.scenes.lock().await.remove(id).map(|_| ()).ok_or_else(not_found)
    }

    async fn list_projects(&self) -> Result<Vec<IdDesc>> {
        Ok(self
            .projects
            .lock()
            .await
            .values()
            .map(|p| IdDesc {
                id: p.id.clone(),
                name: p.name.clone(),
                description: p.description.clone(),
                modified: p.modified,
                valid: None,
                executable: None,
                problems: vec![],
            })
            .collect())
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        self.projects.lock().await.get(id).cloned().ok_or_else(not_found)
    }

    async fn put_project(
        &self,
        project: &Project,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let stamp = chrono::Utc::now();
        let mut stored = project.clone();
        stored.modified = Some(stamp);
        self.projects.lock().await.insert(project.id.clone(), stored);
        Ok(Some(stamp))
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.projects.lock().await.remove(id).map(|_| ()).ok_or_else(not_found)
    }

    async fn list_object_types(&self) -> Result<Vec<ObjectTypeRecord>> {
        Ok(self.object_types.lock().await.values().cloned().collect())
    }

    async fn put_object_type(&self, record: &ObjectTypeRecord) -> Result<()> {
        self.object_types
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_object_type(&self, id: &str) -> Result<()> {
        self.object_types.lock().await.remove(id).map(|_| ()).ok_or_else(not_found)
    }
}

#[derive(Default)]
pub struct MockSceneService {
    pub started: AtomicBool,
}

#[async_trait]
impl SceneService for MockSceneService {
    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn started(&self) -> Result<bool> {
        Ok(self.started.load(Ordering::SeqCst))
    }

    async fn upsert_collision(
        &self,
        _model: &CollisionModel,
        _id: &str,
        _pose: &Pose,
    ) -> Result<()> {
        Ok(())
    }

    async fn delete_collision(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn focus(&self, _id: &str, pose: &Pose) -> Result<Pose> {
        Ok(*pose)
    }
}

pub struct MockBuild;

#[async_trait]
impl BuildService for MockBuild {
    async fn publish(&self, _project_id: &str, _package_name: &str) -> Result<Vec<u8>> {
        Ok(b"PK\x03\x04".to_vec())
    }
}

/// Descriptor document for a poseless/posed generic and a virtual robot.
pub fn descriptor(object_type: &str, base: &str, returns: &[&str]) -> ObjectTypeRecord {
    let has_pose = base != "Generic";
    let source = serde_json::json!({
        "meta": {
            "type": object_type,
            "base": base,
            "hasPose": has_pose,
            "objectModel": if base == "CollisionObject" {
                serde_json::json!({"type": "box", "sizeX": 0.1, "sizeY": 0.1, "sizeZ": 0.1})
            } else {
                serde_json::Value::Null
            },
        },
        "actions": [{
            "name": "pick",
            "parameters": [
                {"name": "speed", "type": "double"}
            ],
            "returns": returns,
            "meta": {"blocking": true},
        }],
        "robotFeatures": if base == "Robot" {
            serde_json::json!({
                "moveToPose": true,
                "moveToJoints": true,
                "stop": true,
                "handTeaching": true,
            })
        } else {
            serde_json::Value::Null
        },
    });
    ObjectTypeRecord {
        id: object_type.to_string(),
        source: source.to_string(),
        model: None,
        modified: Some(chrono::Utc::now()),
    }
}

// ----------------------------------------------------------------------
// hub + client

pub struct Hub {
    pub url: String,
    pub ctx: Arc<Ctx>,
    pub storage: Arc<MemStorage>,
}

pub async fn spawn_hub() -> Hub {
    spawn_hub_with_execution("ws://127.0.0.1:1").await
}

/// Execution URL `ws://127.0.0.1:1` is unroutable: the bridge retries in the
/// background and everything else works without it.
pub async fn spawn_hub_with_execution(execution_url: &str) -> Hub {
    let storage = Arc::new(MemStorage::default());
    for record in [
        descriptor("VirtualBox", "CollisionObject", &["string"]),
        descriptor("VirtualBot", "Robot", &["string"]),
    ] {
        storage.object_types.lock().await.insert(record.id.clone(), record);
    }

    let settings = Settings {
        execution_url: execution_url.to_string(),
        ..Settings::default()
    };
    let collaborators = Collaborators {
        storage: storage.clone(),
        scene_service: Arc::new(MockSceneService::default()),
        build_service: Arc::new(MockBuild),
        calibration: None,
        introspector: Arc::new(DescriptorIntrospector),
        factory: Arc::new(VirtualFactory),
    };
    let (ctx, background) = Ctx::new(settings, collaborators);
    arhub::context::spawn_background(ctx.clone(), background);
    ctx.object_types
        .refresh(ctx.storage.as_ref(), ctx.introspector.as_ref())
        .await
        .expect("refresh");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let server_ctx = ctx.clone();
    tokio::spawn(async move {
        let _ = serve::run_serve_on_listener(listener, server_ctx).await;
    });
    Hub { url, ctx, storage }
}

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct Client {
    pub write: futures_util::stream::SplitSink<WsStream, Message>,
    pub read: futures_util::stream::SplitStream<WsStream>,
    next_id: u64,
}

impl Client {
    pub async fn connect(url: &str) -> Self {
        let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
        let (write, read) = stream.split();
        Self {
            write,
            read,
            next_id: 1,
        }
    }

    async fn next_frame(&mut self) -> serde_json::Value {
        loop {
            let msg = timeout(Duration::from_secs(10), self.read.next())
                .await
                .expect("timeout waiting for frame")
                .expect("stream ended")
                .expect("ws error");
            if let Message::Text(text) = msg {
                eprintln!("[e2e] received: {text}");
                return serde_json::from_str(&text).expect("json frame");
            }
        }
    }

    /// Sends a request and returns its response frame, queuing nothing:
    /// events received while waiting are discarded.
    pub async fn rpc(&mut self, request: &str, args: serde_json::Value) -> serde_json::Value {
        self.rpc_frame(request, args, false).await
    }

    pub async fn rpc_dry(&mut self, request: &str, args: serde_json::Value) -> serde_json::Value {
        self.rpc_frame(request, args, true).await
    }

    async fn rpc_frame(
        &mut self,
        request: &str,
        args: serde_json::Value,
        dry_run: bool,
    ) -> serde_json::Value {
        let id = self.next_id;
        self.next_id += 1;
        let mut frame = serde_json::json!({"request": request, "id": id});
        if !args.is_null() {
            frame["args"] = args;
        }
        if dry_run {
            frame["dryRun"] = serde_json::Value::Bool(true);
        }
        self.write
            .send(Message::Text(frame.to_string()))
            .await
            .expect("send");
        loop {
            let received = self.next_frame().await;
            if received.get("response").map(|r| r == request).unwrap_or(false)
                && received.get("id").and_then(|i| i.as_u64()) == Some(id)
            {
                return received;
            }
        }
    }

    /// Sends a request expecting success and returns `data`.
    pub async fn rpc_ok(&mut self, request: &str, args: serde_json::Value) -> serde_json::Value {
        let resp = self.rpc(request, args).await;
        assert_eq!(
            resp["result"],
            serde_json::Value::Bool(true),
            "{request} failed: {resp}"
        );
        resp.get("data").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Reads frames until the named event arrives.
    pub async fn wait_event(&mut self, event: &str) -> serde_json::Value {
        loop {
            let received = self.next_frame().await;
            if received.get("event").map(|e| e == event).unwrap_or(false) {
                return received;
            }
        }
    }

    pub async fn register(&mut self, user_name: &str) {
        self.rpc_ok("RegisterUser", serde_json::json!({"userName": user_name}))
            .await;
    }
}

/// Messages of a failed response.
pub fn messages(resp: &serde_json::Value) -> Vec<String> {
    resp.get("messages")
        .and_then(|m| m.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
