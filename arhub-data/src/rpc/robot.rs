//! Robot RPCs: `GetRobotMeta`, `GetRobotJoints`, `GetEndEffectors`,
//! `GetEndEffectorPose`, `GetGrippers`, `GetSuctions`, `MoveToPose`,
//! `MoveToJoints`, `MoveToActionPoint`, `StopRobot`, `InverseKinematics`,
//! `ForwardKinematics`, `CalibrateRobot`, `HandTeachingMode`,
//! `RegisterForRobotEvent`.

use serde::{Deserialize, Serialize};

use crate::common::Joint;
use crate::math::{Orientation, Pose, Position};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotIdArgs {
    pub robot_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndEffectorArgs {
    pub robot_id: String,
    pub end_effector_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToPoseArgs {
    pub robot_id: String,
    pub end_effector_id: String,
    pub speed: f64,
    pub position: Position,
    pub orientation: Orientation,
    #[serde(default = "default_true")]
    pub safe: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToJointsArgs {
    pub robot_id: String,
    pub joints: Vec<Joint>,
    pub speed: f64,
    #[serde(default = "default_true")]
    pub safe: bool,
}

/// Exactly one of `orientation_id` / `joints_id` must be set; moving to an
/// orientation additionally needs `end_effector_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToActionPointArgs {
    pub robot_id: String,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_effector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joints_id: Option<String>,
    #[serde(default = "default_true")]
    pub safe: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverseKinematicsArgs {
    pub robot_id: String,
    pub end_effector_id: String,
    pub pose: Pose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_joints: Option<Vec<Joint>>,
    #[serde(default = "default_true")]
    pub avoid_collisions: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardKinematicsArgs {
    pub robot_id: String,
    pub end_effector_id: String,
    pub joints: Vec<Joint>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrateRobotArgs {
    pub robot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub move_to_calibration_pose: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandTeachingModeArgs {
    pub robot_id: String,
    pub enable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotEventKind {
    Joints,
    EefPose,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForRobotEventArgs {
    pub robot_id: String,
    pub what: RobotEventKind,
    /// `true` subscribes this client, `false` unsubscribes it.
    pub send: bool,
}
