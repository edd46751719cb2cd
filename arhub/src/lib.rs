//! # arhub
//!
//! Core of the orchestration hub for the robotic-programming platform:
//! cooperative locks, user sessions, the cached scene/project editing state,
//! the object-type registry, the scene-runtime engine, the execution bridge
//! and the notification bus. The `serve` crate puts the WebSocket surface
//! and the RPC dispatcher on top of the [`context::Ctx`] defined here.
//!
//! ## Main modules
//!
//! - [`context`]: the hub context passed to every handler ([`Ctx`]), scene
//!   and project lifecycle orchestration, background task wiring.
//! - [`lock`]: advisory read/write locks with retries, subtree support and
//!   lock events ([`lock::LockManager`]).
//! - [`state`]: indexed copies of the open scene/project
//!   ([`state::CachedScene`], [`state::CachedProject`]) and project
//!   validation.
//! - [`objtypes`]: object-type capability descriptors
//!   ([`objtypes::ObjectTypeRegistry`]).
//! - [`runtime`]: the scene-runtime state machine and live instances
//!   ([`runtime::SceneRuntime`], [`runtime::LiveObject`]).
//! - [`exec`]: persistent client of the execution runtime
//!   ([`exec::ExecutionBridge`]) and the package workflows.
//! - [`services`]: adapters to the store / scene / build / calibration
//!   collaborators.
//! - [`notifications`] and [`users`]: client registry, per-client send
//!   queues, user names.
//! - [`robot`]: movement orchestration and the periodic event streamers.

pub mod context;
pub mod error;
pub mod exec;
pub mod lock;
pub mod notifications;
pub mod objtypes;
pub mod robot;
pub mod runtime;
pub mod services;
pub mod state;
pub mod users;

pub use context::{Background, Collaborators, Ctx};
pub use error::{HubError, Result};

/// Hub version reported by `SystemInfo` and `--version`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Protocol version reported by `SystemInfo` and `--api-version`.
pub fn api_version() -> &'static str {
    "1.0.0"
}
