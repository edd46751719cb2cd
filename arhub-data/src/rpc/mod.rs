//! Typed RPC arguments and payloads, grouped by domain.
//!
//! The dispatcher decodes `RequestFrame.args` into these structs and encodes
//! handler results back into `ResponseFrame.data`. Request names are the
//! PascalCase strings listed in the per-module docs.

pub mod camera;
pub mod common;
pub mod execution;
pub mod lock;
pub mod objects;
pub mod project;
pub mod robot;
pub mod scene;

use serde::{Deserialize, Serialize};

/// Shared `{id}` argument.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdArgs {
    pub id: String,
}

/// Robot selector: a robot scene object and (optionally) one end effector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotArg {
    pub robot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_effector: Option<String>,
}
