//! Axum app: router and WebSocket upgrade handler.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use arhub::Ctx;

use super::connection::handle_socket;

pub(crate) fn router(ctx: Arc<Ctx>) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(ctx)
}

async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<Arc<Ctx>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}
