//! WebSocket server for the hub (axum + ws).
//!
//! One duplex JSON channel per client: requests in, responses and events
//! out. The dispatcher in [`dispatch`] routes request names to the handlers
//! under [`rpc`], enforcing preconditions and converting errors to failed
//! response frames without closing the channel.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod connection;
pub mod dispatch;
pub mod rpc;

use std::sync::Arc;

use arhub::Ctx;
use tokio::net::TcpListener;
use tracing::info;

use app::router;

/// Runs the server on an existing listener. Tests bind to `127.0.0.1:0`
/// first and pass the listener in.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    ctx: Arc<Ctx>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("listening on ws://{}", addr);
    let app = router(ctx);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds the configured port and serves until the process exits.
pub async fn run_serve(ctx: Arc<Ctx>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(("0.0.0.0", ctx.settings.port)).await?;
    run_serve_on_listener(listener, ctx).await
}
