//! Execution bridge: the hub's persistent client of the execution runtime.
//!
//! Outgoing requests go through one FIFO; responses are demultiplexed back
//! to per-request single-slot channels keyed by request id. Connection loss
//! triggers reconnection after one second and queued requests are re-sent in
//! order. Runtime-originated events are re-broadcast to every UI client and
//! the latest package/action snapshots are cached for the welcome burst.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use arhub_data::events::{Event, EventData, MainScreen, ShowMainScreenData};
use arhub_data::frame::{RequestFrame, ResponseFrame};
use arhub_data::package::{
    ActionStateAfterData, ActionStateBeforeData, PackageInfoData, PackageState, PackageStateData,
};

use crate::context::Ctx;
use crate::error::{HubError, Result};

/// Reconnect delay after the runtime connection drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Snapshots {
    package_state: PackageStateData,
    package_info: Option<PackageInfoData>,
    action_state_before: Option<ActionStateBeforeData>,
    action_state_after: Option<ActionStateAfterData>,
}

pub struct ExecutionBridge {
    outbox: mpsc::UnboundedSender<String>,
    pending: std::sync::Mutex<HashMap<u64, oneshot::Sender<ResponseFrame>>>,
    next_id: AtomicU64,
    snapshots: std::sync::Mutex<Snapshots>,
    package_running: watch::Sender<bool>,
    temporary_package: AtomicBool,
}

impl ExecutionBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (package_running, _) = watch::channel(false);
        (
            Self {
                outbox,
                pending: std::sync::Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                snapshots: std::sync::Mutex::new(Snapshots::default()),
                package_running,
                temporary_package: AtomicBool::new(false),
            },
            outbox_rx,
        )
    }

    pub fn package_state(&self) -> PackageStateData {
        self.snapshots
            .lock()
            .expect("snapshots mutex")
            .package_state
            .clone()
    }

    pub fn package_running(&self) -> bool {
        matches!(
            self.package_state().state,
            PackageState::Running | PackageState::Paused | PackageState::Pausing
                | PackageState::Resuming | PackageState::Stopping
        )
    }

    pub fn temporary_package(&self) -> bool {
        self.temporary_package.load(Ordering::SeqCst)
    }

    /// Snapshots replayed (in this order) to a freshly connected client
    /// while a package is running.
    pub fn replay_snapshots(&self) -> Option<Vec<Event>> {
        let snapshots = self.snapshots.lock().expect("snapshots mutex");
        let info = snapshots.package_info.as_ref()?;
        let mut events = vec![
            Event::new(EventData::PackageState(snapshots.package_state.clone())),
            Event::new(EventData::PackageInfo(info.clone())),
        ];
        if let Some(before) = &snapshots.action_state_before {
            events.push(Event::new(EventData::ActionStateBefore(before.clone())));
        }
        if let Some(after) = &snapshots.action_state_after {
            events.push(Event::new(EventData::ActionStateAfter(after.clone())));
        }
        Some(events)
    }

    /// Sends one RPC to the execution runtime and waits for its response.
    /// The hub assigns its own ids; callers forwarding a client frame keep
    /// the client id out of here and re-attach it to the reply.
    pub async fn request(
        &self,
        request: &str,
        args: serde_json::Value,
    ) -> Result<ResponseFrame> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = RequestFrame::new(request, id, args);
        let text = serde_json::to_string(&frame).map_err(HubError::internal)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("pending mutex").insert(id, tx);
        if self.outbox.send(text).is_err() {
            self.pending.lock().expect("pending mutex").remove(&id);
            return Err(HubError::external("Execution unit", "Bridge is shut down."));
        }
        rx.await
            .map_err(|_| HubError::external("Execution unit", "Connection lost."))
    }

    /// Like [`Self::request`], failing on `result == false`.
    pub async fn request_ok(
        &self,
        request: &str,
        args: serde_json::Value,
    ) -> Result<ResponseFrame> {
        let resp = self.request(request, args).await?;
        if !resp.result {
            let message = if resp.messages.is_empty() {
                format!("{request} failed.")
            } else {
                resp.messages.join("\n")
            };
            return Err(HubError::external("Execution unit", message));
        }
        Ok(resp)
    }

    /// Blocks until the package-running flag reaches `running`.
    pub async fn wait_package(&self, running: bool) -> Result<()> {
        let mut rx = self.package_running.subscribe();
        rx.wait_for(|v| *v == running)
            .await
            .map_err(|_| HubError::external("Execution unit", "Bridge is shut down."))?;
        Ok(())
    }

    fn route_response(&self, frame: ResponseFrame) {
        let tx = self
            .pending
            .lock()
            .expect("pending mutex")
            .remove(&frame.id);
        match tx {
            Some(tx) => {
                let _ = tx.send(frame);
            }
            None => tracing::warn!(id = frame.id, "response with no pending request"),
        }
    }
}

/// Handles one frame arriving from the execution runtime.
fn handle_incoming(ctx: &Arc<Ctx>, text: &str) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("invalid frame from execution unit: {e}");
            return;
        }
    };

    if value.get("response").is_some() {
        match serde_json::from_value::<ResponseFrame>(value) {
            Ok(frame) => ctx.exec.route_response(frame),
            Err(e) => tracing::error!("invalid response from execution unit: {e}"),
        }
        return;
    }

    if value.get("event").is_some() {
        // UIs get the runtime's frame verbatim
        ctx.clients.broadcast_raw(text, None);

        let event: Event = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("unhandled event from execution unit: {e}");
                return;
            }
        };
        track_event(ctx, &event);
    }
}

/// Updates the cached snapshots and the started/stopped signals.
fn track_event(ctx: &Arc<Ctx>, event: &Event) {
    let bridge = &ctx.exec;
    match &event.data {
        EventData::PackageInfo(info) => {
            bridge
                .snapshots
                .lock()
                .expect("snapshots mutex")
                .package_info = Some(info.clone());
        }
        EventData::ActionStateBefore(data) => {
            bridge
                .snapshots
                .lock()
                .expect("snapshots mutex")
                .action_state_before = Some(data.clone());
        }
        EventData::ActionStateAfter(data) => {
            bridge
                .snapshots
                .lock()
                .expect("snapshots mutex")
                .action_state_after = Some(data.clone());
        }
        EventData::PackageState(data) => {
            let package_id = data.package_id.clone();
            {
                let mut snapshots = bridge.snapshots.lock().expect("snapshots mutex");
                snapshots.package_state = data.clone();
                if data.state == PackageState::Stopped {
                    snapshots.package_info = None;
                    snapshots.action_state_before = None;
                    snapshots.action_state_after = None;
                }
            }
            match data.state {
                PackageState::Stopped => {
                    if !bridge.temporary_package() {
                        // land newly connected clients on the packages list
                        ctx.set_main_screen(MainScreen::PackagesList, package_id.clone());
                        ctx.broadcast(Event::new(EventData::ShowMainScreen(
                            ShowMainScreenData {
                                what: MainScreen::PackagesList,
                                highlight: package_id,
                            },
                        )));
                    }
                    let _ = bridge.package_running.send(false);
                }
                _ => {
                    let _ = bridge.package_running.send(true);
                }
            }
        }
        _ => {}
    }
}

/// Connection loop: connect, pump the outbox and the incoming stream,
/// reconnect with a delay on any failure. A frame whose send failed is
/// carried over and re-sent first after reconnecting.
pub async fn run_bridge(ctx: Arc<Ctx>, mut outbox_rx: mpsc::UnboundedReceiver<String>) {
    let url = ctx.settings.execution_url.clone();
    let mut shutdown = ctx.shutdown.subscribe();
    let mut carry: Option<String> = None;

    loop {
        if *shutdown.borrow() {
            return;
        }
        tracing::info!("connecting to the execution unit at {url}");
        match connect_async(&url).await {
            Ok((stream, _)) => {
                tracing::info!("connected to the execution unit");
                let (mut write, mut read) = stream.split();

                if let Some(text) = carry.take() {
                    if let Err(e) = write.send(Message::Text(text.clone())).await {
                        tracing::warn!("re-send failed: {e}");
                        carry = Some(text);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                }

                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                        queued = outbox_rx.recv() => {
                            match queued {
                                Some(text) => {
                                    if let Err(e) = write.send(Message::Text(text.clone())).await {
                                        tracing::warn!("send to execution unit failed: {e}");
                                        carry = Some(text);
                                        break;
                                    }
                                }
                                None => return,
                            }
                        }
                        incoming = read.next() => {
                            match incoming {
                                Some(Ok(Message::Text(text))) => handle_incoming(&ctx, &text),
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::error!("connection to the execution unit closed: {e}");
                                    break;
                                }
                                None => {
                                    tracing::error!("connection to the execution unit closed");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!("execution unit unreachable: {e}");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

// ----------------------------------------------------------------------
// package workflows

/// Builds the project and uploads the archive to the execution unit.
/// Returns the generated package id.
pub async fn build_and_upload_package(
    ctx: &Arc<Ctx>,
    project_id: &str,
    package_name: &str,
) -> Result<String> {
    let package_id = arhub_data::common::uid("pkg");
    let archive = ctx.build_service.publish(project_id, package_name).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(archive);
    ctx.exec
        .request_ok(
            "UploadPackage",
            serde_json::json!({ "id": package_id, "data": encoded }),
        )
        .await?;
    Ok(package_id)
}

/// The temporary-package workflow: close the project, run the freshly built
/// package without cleanup, wait for it to finish, delete it, and restore
/// the project on both success and failure.
pub async fn run_temporary_package(
    ctx: Arc<Ctx>,
    package_id: String,
    start_paused: bool,
    breakpoints: Option<std::collections::BTreeSet<String>>,
) {
    let project_id = {
        let editing = ctx.editing.lock().await;
        match editing.project.as_ref() {
            Some(p) => p.id.clone(),
            None => return,
        }
    };
    ctx.exec.temporary_package.store(true, Ordering::SeqCst);

    if let Ok(closed_id) = ctx.close_project(true).await {
        ctx.broadcast(Event::new(EventData::ProjectClosed));
        debug_assert_eq!(closed_id, project_id);
    }

    let run = ctx
        .exec
        .request_ok(
            "RunPackage",
            serde_json::json!({
                "id": package_id,
                "cleanupAfterRun": false,
                "startPaused": start_paused,
                "breakpoints": breakpoints,
            }),
        )
        .await;

    match run {
        Ok(_) => {
            let _ = ctx.exec.wait_package(true).await;
            let _ = ctx.exec.wait_package(false).await;
            tracing::info!("temporary package stopped, removing it and reopening the project");
        }
        Err(e) => {
            tracing::warn!("execution of temporary package failed: {e}");
        }
    }

    ctx.exec.temporary_package.store(false, Ordering::SeqCst);

    if let Err(e) = ctx
        .exec
        .request_ok("DeletePackage", serde_json::json!({ "id": package_id }))
        .await
    {
        tracing::warn!("failed to delete temporary package: {e}");
    }

    match ctx.open_project(&project_id).await {
        Ok((scene, project)) => {
            ctx.broadcast(Event::new(EventData::OpenProject(
                arhub_data::events::OpenProjectData { scene, project },
            )));
        }
        Err(e) => {
            tracing::error!("failed to reopen project after temporary package: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_correlates_response_by_id() {
        let (bridge, mut outbox) = ExecutionBridge::new();
        let bridge = Arc::new(bridge);

        let requester = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge.request("ListPackages", serde_json::Value::Null).await
            })
        };

        // what the writer task would send over the wire
        let sent = outbox.recv().await.unwrap();
        let frame: RequestFrame = serde_json::from_str(&sent).unwrap();
        assert_eq!(frame.request, "ListPackages");

        // fabricate the runtime's reply for exactly that id
        bridge.route_response(ResponseFrame::ok("ListPackages", frame.id, serde_json::Value::Null));

        let resp = requester.await.unwrap().unwrap();
        assert_eq!(resp.id, frame.id);
        assert!(resp.result);
    }

    #[tokio::test]
    async fn requests_queue_in_fifo_order() {
        let (bridge, mut outbox) = ExecutionBridge::new();
        let bridge = Arc::new(bridge);
        for name in ["First", "Second", "Third"] {
            let bridge = bridge.clone();
            let name = name.to_string();
            let spawned_name = name.clone();
            tokio::spawn(async move {
                let _ = bridge.request(&spawned_name, serde_json::Value::Null).await;
            });
            // wait until this request hit the queue before issuing the next
            let sent = outbox.recv().await.unwrap();
            let frame: RequestFrame = serde_json::from_str(&sent).unwrap();
            assert_eq!(frame.request, name);
        }
    }

    #[tokio::test]
    async fn failed_runtime_response_surfaces_messages() {
        let (bridge, mut outbox) = ExecutionBridge::new();
        let bridge = Arc::new(bridge);
        let requester = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge.request_ok("RunPackage", serde_json::Value::Null).await
            })
        };
        let sent = outbox.recv().await.unwrap();
        let frame: RequestFrame = serde_json::from_str(&sent).unwrap();
        bridge.route_response(ResponseFrame::error(
            "RunPackage",
            frame.id,
            vec!["No such package.".into()],
        ));
        let err = requester.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("No such package."));
        assert!(err.to_string().starts_with("Execution unit"));
    }

    #[test]
    fn replay_requires_package_info() {
        let (bridge, _outbox) = ExecutionBridge::new();
        assert!(bridge.replay_snapshots().is_none());
        bridge.snapshots.lock().unwrap().package_info = Some(PackageInfoData {
            package_id: "pkg_1".into(),
            package_name: "test".into(),
            scene: serde_json::Value::Null,
            project: serde_json::Value::Null,
        });
        let events = bridge.replay_snapshots().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].data, EventData::PackageState(_)));
        assert!(matches!(events[1].data, EventData::PackageInfo(_)));
    }
}
