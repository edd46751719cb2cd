//! Scene RPCs: lifecycle (`NewScene`, `OpenScene`, `CloseScene`, `SaveScene`,
//! `ListScenes`, `DeleteScene`, `RenameScene`, `CopyScene`,
//! `UpdateSceneDescription`, `ProjectsWithScene`, `StartScene`, `StopScene`),
//! object editing (`AddObjectToScene`, `UpdateObjectParameters`,
//! `UpdateObjectPose`, `UpdateObjectPoseUsingRobot`, `RenameObject`,
//! `RemoveFromScene`, `SceneObjectUsage`) and aiming
//! (`ObjectAimingStart/AddPoint/Done/Cancel`).

use serde::{Deserialize, Serialize};

use super::RobotArg;
use crate::common::Parameter;
use crate::math::Pose;
use crate::object_type::Pivot;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSceneArgs {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSceneArgs {
    /// Close even with unsaved changes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameArgs {
    pub id: String,
    pub new_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopySceneArgs {
    pub source_id: String,
    pub target_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSceneDescriptionArgs {
    pub scene_id: String,
    pub new_description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddObjectToSceneArgs {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Pose>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectPoseArgs {
    pub object_id: String,
    pub pose: Pose,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectParametersArgs {
    pub id: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectPoseUsingRobotArgs {
    pub id: String,
    pub robot: RobotArg,
    pub pivot: Pivot,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromSceneArgs {
    pub id: String,
    /// Remove even when projects use the object (their actions are dropped).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAimingStartArgs {
    pub object_id: String,
    pub robot: RobotArg,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAimingAddPointArgs {
    pub point_idx: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAimingPointData {
    pub finished_indexes: Vec<usize>,
}
