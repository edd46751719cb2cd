//! Project RPCs: lifecycle (`NewProject`, `OpenProject`, `CloseProject`,
//! `SaveProject`, `ListProjects`, `DeleteProject`, `RenameProject`,
//! `CopyProject`, `UpdateProjectDescription`, `UpdateProjectHasLogic`),
//! action points (`AddActionPoint`, `AddApUsingRobot`, `RenameActionPoint`,
//! `UpdateActionPointPose`, `UpdateActionPointParent`, `RemoveActionPoint`),
//! orientations and joints, actions, logic items, constants, overrides, and
//! editor-run actions (`ExecuteAction`, `CancelAction`).

use serde::{Deserialize, Serialize};

use crate::common::{ActionParameter, Flow, LogicCondition, Parameter};
use crate::math::{Orientation, Position};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProjectArgs {
    pub scene_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub has_logic: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseProjectArgs {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectDescriptionArgs {
    pub project_id: String,
    pub new_description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectHasLogicArgs {
    pub project_id: String,
    pub new_has_logic: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProjectArgs {
    pub source_id: String,
    pub target_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActionPointArgs {
    pub name: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddApUsingRobotArgs {
    pub robot_id: String,
    pub end_effector_id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameActionPointArgs {
    pub action_point_id: String,
    pub new_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionPointPoseArgs {
    pub action_point_id: String,
    pub new_position: Position,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionPointParentArgs {
    pub action_point_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActionPointOrientationArgs {
    pub action_point_id: String,
    pub orientation: Orientation,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionPointOrientationArgs {
    pub orientation_id: String,
    pub orientation: Orientation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveActionPointOrientationArgs {
    pub orientation_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActionPointJointsArgs {
    pub action_point_id: String,
    pub robot_id: String,
    #[serde(default = "default_joints_name")]
    pub name: String,
}

fn default_joints_name() -> String {
    "default".to_string()
}

/// Re-captures the snapshot from the robot it was recorded with.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionPointJointsArgs {
    pub joints_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveActionPointJointsArgs {
    pub joints_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActionArgs {
    pub action_point_id: String,
    pub name: String,
    /// `<scene-object-id>/<type-action-name>`.
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionArgs {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ActionParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<Vec<Flow>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameActionArgs {
    pub action_id: String,
    pub new_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLogicItemArgs {
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<LogicCondition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLogicItemArgs {
    pub logic_item_id: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<LogicCondition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLogicItemArgs {
    pub logic_item_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConstantArgs {
    pub name: String,
    #[serde(rename = "type")]
    pub const_type: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConstantArgs {
    pub constant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveConstantArgs {
    pub constant_id: String,
}

/// Add/update/delete one override parameter of a scene object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideArgs {
    pub id: String,
    #[serde(rename = "override")]
    pub override_parameter: Parameter,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionArgs {
    pub action_id: String,
}
