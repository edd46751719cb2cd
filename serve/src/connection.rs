//! WebSocket connection lifecycle: registration, welcome burst, writer task,
//! recv loop and request dispatch.
//!
//! Responses and events share one bounded per-client queue, so the response
//! to a request is always written before any event the handler emitted.
//! Handlers run as their own tasks: one slow request does not serialise the
//! channel's other requests (responses are matched back by id).

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use arhub::notifications::Outgoing;
use arhub::Ctx;
use arhub_data::frame::{RequestFrame, ResponseFrame};

use super::dispatch::dispatch;

pub(crate) async fn handle_socket(socket: WebSocket, ctx: Arc<Ctx>) {
    let client = Uuid::new_v4();
    tracing::info!(%client, "client connected");

    let (mut write, mut read) = socket.split();
    let mut outgoing = ctx.clients.add(client);

    // writer: drains the bounded queue; dropped by the registry on overflow
    let writer = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let out = match msg {
                Outgoing::Text(text) => Message::Text(text),
                Outgoing::Ping => Message::Ping(Vec::new()),
            };
            if write.send(out).await.is_err() {
                break;
            }
        }
    });

    ctx.welcome(client).await;

    while let Some(res) = read.next().await {
        let msg = match res {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%client, "read error (client closed?): {e}");
                break;
            }
        };
        let text = match msg {
            Message::Text(t) => t,
            Message::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        handle_frame(&ctx, client, text);
    }

    writer.abort();
    ctx.disconnect(client).await;
    tracing::info!(%client, "client disconnected");
}

/// Parses one inbound frame and spawns its handler. A malformed frame whose
/// id can be recovered gets a failed response; otherwise it is logged and
/// dropped.
fn handle_frame(ctx: &Arc<Ctx>, client: Uuid, text: String) {
    let frame: RequestFrame = match serde_json::from_str(&text) {
        Ok(f) => f,
        Err(e) => {
            if let Some((request, id)) = recover_request_id(&text) {
                let resp =
                    ResponseFrame::error(&request, id, vec![format!("Invalid request: {e}.")]);
                if let Ok(json) = serde_json::to_string(&resp) {
                    ctx.clients.send_raw(client, json);
                }
            } else {
                tracing::warn!(%client, "dropping malformed frame: {e}");
            }
            return;
        }
    };

    let ctx = ctx.clone();
    tokio::spawn(async move {
        let (response, emits) = dispatch(&ctx, client, frame).await;
        match serde_json::to_string(&response) {
            Ok(json) => {
                // response first, then the handler's events
                ctx.clients.send_raw(client, json);
            }
            Err(e) => tracing::error!("response serialization failed: {e}"),
        }
        for emit in emits {
            emit.publish(&ctx, client);
        }
    });
}

fn recover_request_id(text: &str) -> Option<(String, u64)> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let request = value.get("request")?.as_str()?.to_string();
    let id = value.get("id")?.as_u64()?;
    Some((request, id))
}
