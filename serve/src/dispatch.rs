//! RPC dispatcher: request name → handler, precondition enforcement, error
//! conversion. Handlers return the response payload plus the events to
//! publish after the response frame is written.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use arhub::error::{HubError, Result};
use arhub::Ctx;
use arhub_data::events::Event;
use arhub_data::frame::{RequestFrame, ResponseFrame};
use arhub_data::rpc::execution::PASS_THROUGH_RPCS;

use crate::rpc;

/// Who receives an event emitted by a handler.
pub enum Scope {
    All,
    /// Everybody but the originating client (it already saw the response).
    ExceptCaller,
    Caller,
}

pub struct Emit {
    pub event: Event,
    pub scope: Scope,
}

impl Emit {
    pub fn all(event: Event) -> Self {
        Self {
            event,
            scope: Scope::All,
        }
    }

    pub fn except_caller(event: Event) -> Self {
        Self {
            event,
            scope: Scope::ExceptCaller,
        }
    }

    pub fn publish(self, ctx: &Ctx, caller: Uuid) {
        match self.scope {
            Scope::All => ctx.clients.broadcast_event(&self.event, None),
            Scope::ExceptCaller => ctx.clients.broadcast_event(&self.event, Some(caller)),
            Scope::Caller => ctx.clients.event(caller, &self.event),
        }
    }
}

/// Handler output: response `data` plus events published after the response.
pub struct Out {
    pub data: Value,
    pub events: Vec<Emit>,
}

impl Out {
    pub fn empty() -> Self {
        Self {
            data: Value::Null,
            events: Vec::new(),
        }
    }

    pub fn data(data: Value) -> Self {
        Self {
            data,
            events: Vec::new(),
        }
    }

    pub fn events(events: Vec<Emit>) -> Self {
        Self {
            data: Value::Null,
            events,
        }
    }

    pub fn broadcast(event: Event) -> Self {
        Self::events(vec![Emit::all(event)])
    }
}

/// Everything a handler gets: the hub, the caller and the dry-run flag.
pub struct Call<'a> {
    pub ctx: &'a Arc<Ctx>,
    pub client: Uuid,
    pub dry_run: bool,
}

impl Call<'_> {
    pub fn user_name(&self) -> Result<String> {
        self.ctx.user_name(self.client)
    }
}

/// Decodes a handler's typed arguments from the frame `args`. A missing
/// `args` decodes like `{}` so argument-less requests stay bare on the wire.
pub fn args<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    let value = if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value
    };
    serde_json::from_value(value).map_err(HubError::from)
}

pub async fn dispatch(
    ctx: &Arc<Ctx>,
    client: Uuid,
    frame: RequestFrame,
) -> (ResponseFrame, Vec<Emit>) {
    let request = frame.request;
    let call = Call {
        ctx,
        client,
        dry_run: frame.dry_run,
    };
    match route(&call, &request, frame.args).await {
        Ok(out) => (
            ResponseFrame::ok(&request, frame.id, out.data),
            out.events,
        ),
        Err(e) => {
            if let HubError::Internal(source) = &e {
                tracing::error!(request = %request, "internal error: {source}");
            }
            (
                ResponseFrame::error(&request, frame.id, e.messages()),
                Vec::new(),
            )
        }
    }
}

async fn route(call: &Call<'_>, request: &str, a: Value) -> Result<Out> {
    match request {
        // session
        "SystemInfo" => rpc::common::system_info(call).await,
        "Version" => rpc::common::version(call).await,
        "RegisterUser" => rpc::common::register_user(call, args(a)?).await,
        // locks
        "ReadLock" => rpc::lock::read_lock(call, args(a)?).await,
        "WriteLock" => rpc::lock::write_lock(call, args(a)?).await,
        "ReadUnlock" => rpc::lock::read_unlock(call, args(a)?).await,
        "WriteUnlock" => rpc::lock::write_unlock(call, args(a)?).await,
        // object types
        "GetObjectTypes" => rpc::objects::get_object_types(call).await,
        "GetActions" => rpc::objects::get_actions(call, args(a)?).await,
        "NewObjectType" => rpc::objects::new_object_type(call, args(a)?).await,
        "UpdateObjectModel" => rpc::objects::update_object_model(call, args(a)?).await,
        "DeleteObjectTypes" => rpc::objects::delete_object_types(call, args(a)?).await,
        "ObjectTypeUsage" => rpc::objects::object_type_usage(call, args(a)?).await,
        "GetRobotMeta" => rpc::objects::get_robot_meta(call).await,
        // scene
        "NewScene" => rpc::scene::new_scene(call, args(a)?).await,
        "OpenScene" => rpc::scene::open_scene(call, args(a)?).await,
        "CloseScene" => rpc::scene::close_scene(call, args(a)?).await,
        "SaveScene" => rpc::scene::save_scene(call).await,
        "ListScenes" => rpc::scene::list_scenes(call).await,
        "DeleteScene" => rpc::scene::delete_scene(call, args(a)?).await,
        "RenameScene" => rpc::scene::rename_scene(call, args(a)?).await,
        "CopyScene" => rpc::scene::copy_scene(call, args(a)?).await,
        "UpdateSceneDescription" => rpc::scene::update_scene_description(call, args(a)?).await,
        "ProjectsWithScene" => rpc::scene::projects_with_scene(call, args(a)?).await,
        "AddObjectToScene" => rpc::scene::add_object_to_scene(call, args(a)?).await,
        "UpdateObjectParameters" => rpc::scene::update_object_parameters(call, args(a)?).await,
        "UpdateObjectPose" => rpc::scene::update_object_pose(call, args(a)?).await,
        "UpdateObjectPoseUsingRobot" => {
            rpc::scene::update_object_pose_using_robot(call, args(a)?).await
        }
        "RenameObject" => rpc::scene::rename_object(call, args(a)?).await,
        "RemoveFromScene" => rpc::scene::remove_from_scene(call, args(a)?).await,
        "SceneObjectUsage" => rpc::scene::scene_object_usage(call, args(a)?).await,
        "StartScene" => rpc::scene::start_scene(call).await,
        "StopScene" => rpc::scene::stop_scene(call).await,
        "ObjectAimingStart" => rpc::scene::object_aiming_start(call, args(a)?).await,
        "ObjectAimingAddPoint" => rpc::scene::object_aiming_add_point(call, args(a)?).await,
        "ObjectAimingDone" => rpc::scene::object_aiming_done(call).await,
        "ObjectAimingCancel" => rpc::scene::object_aiming_cancel(call).await,
        // project
        "NewProject" => rpc::project::new_project(call, args(a)?).await,
        "OpenProject" => rpc::project::open_project(call, args(a)?).await,
        "CloseProject" => rpc::project::close_project(call, args(a)?).await,
        "SaveProject" => rpc::project::save_project(call).await,
        "ListProjects" => rpc::project::list_projects(call).await,
        "DeleteProject" => rpc::project::delete_project(call, args(a)?).await,
        "RenameProject" => rpc::project::rename_project(call, args(a)?).await,
        "CopyProject" => rpc::project::copy_project(call, args(a)?).await,
        "UpdateProjectDescription" => {
            rpc::project::update_project_description(call, args(a)?).await
        }
        "UpdateProjectHasLogic" => rpc::project::update_project_has_logic(call, args(a)?).await,
        "AddActionPoint" => rpc::project::add_action_point(call, args(a)?).await,
        "AddApUsingRobot" => rpc::project::add_ap_using_robot(call, args(a)?).await,
        "RenameActionPoint" => rpc::project::rename_action_point(call, args(a)?).await,
        "UpdateActionPointPose" => rpc::project::update_action_point_pose(call, args(a)?).await,
        "UpdateActionPointParent" => {
            rpc::project::update_action_point_parent(call, args(a)?).await
        }
        "RemoveActionPoint" => rpc::project::remove_action_point(call, args(a)?).await,
        "AddActionPointOrientation" => {
            rpc::project::add_action_point_orientation(call, args(a)?).await
        }
        "UpdateActionPointOrientation" => {
            rpc::project::update_action_point_orientation(call, args(a)?).await
        }
        "RemoveActionPointOrientation" => {
            rpc::project::remove_action_point_orientation(call, args(a)?).await
        }
        "AddActionPointJoints" => rpc::project::add_action_point_joints(call, args(a)?).await,
        "UpdateActionPointJoints" => {
            rpc::project::update_action_point_joints(call, args(a)?).await
        }
        "RemoveActionPointJoints" => {
            rpc::project::remove_action_point_joints(call, args(a)?).await
        }
        "AddAction" => rpc::project::add_action(call, args(a)?).await,
        "UpdateAction" => rpc::project::update_action(call, args(a)?).await,
        "RenameAction" => rpc::project::rename_action(call, args(a)?).await,
        "RemoveAction" => rpc::project::remove_action(call, args(a)?).await,
        "AddLogicItem" => rpc::project::add_logic_item(call, args(a)?).await,
        "UpdateLogicItem" => rpc::project::update_logic_item(call, args(a)?).await,
        "RemoveLogicItem" => rpc::project::remove_logic_item(call, args(a)?).await,
        "AddConstant" => rpc::project::add_constant(call, args(a)?).await,
        "UpdateConstant" => rpc::project::update_constant(call, args(a)?).await,
        "RemoveConstant" => rpc::project::remove_constant(call, args(a)?).await,
        "AddOverride" => rpc::project::add_override(call, args(a)?).await,
        "UpdateOverride" => rpc::project::update_override(call, args(a)?).await,
        "DeleteOverride" => rpc::project::delete_override(call, args(a)?).await,
        "ExecuteAction" => rpc::project::execute_action(call, args(a)?).await,
        "CancelAction" => rpc::project::cancel_action(call).await,
        // robot
        "GetRobotJoints" => rpc::robot::get_robot_joints(call, args(a)?).await,
        "GetEndEffectors" => rpc::robot::get_end_effectors(call, args(a)?).await,
        "GetEndEffectorPose" => rpc::robot::get_end_effector_pose(call, args(a)?).await,
        "GetGrippers" => rpc::robot::get_grippers(call, args(a)?).await,
        "GetSuctions" => rpc::robot::get_suctions(call, args(a)?).await,
        "MoveToPose" => rpc::robot::move_to_pose(call, args(a)?).await,
        "MoveToJoints" => rpc::robot::move_to_joints(call, args(a)?).await,
        "MoveToActionPoint" => rpc::robot::move_to_action_point(call, args(a)?).await,
        "StopRobot" => rpc::robot::stop_robot(call, args(a)?).await,
        "InverseKinematics" => rpc::robot::inverse_kinematics(call, args(a)?).await,
        "ForwardKinematics" => rpc::robot::forward_kinematics(call, args(a)?).await,
        "CalibrateRobot" => rpc::robot::calibrate_robot(call, args(a)?).await,
        "HandTeachingMode" => rpc::robot::hand_teaching_mode(call, args(a)?).await,
        "RegisterForRobotEvent" => rpc::robot::register_for_robot_event(call, args(a)?).await,
        // camera
        "CameraColorImage" => rpc::camera::camera_color_image(call, args(a)?).await,
        "CameraColorParameters" => rpc::camera::camera_color_parameters(call, args(a)?).await,
        "CalibrateCamera" => rpc::camera::calibrate_camera(call, args(a)?).await,
        "GetCameraPose" => rpc::camera::get_camera_pose(call, args(a)?).await,
        "MarkersCorners" => rpc::camera::markers_corners(call, args(a)?).await,
        // execution
        "BuildProject" => rpc::execution::build_project(call, args(a)?).await,
        "TemporaryPackage" => rpc::execution::temporary_package(call, args(a)?).await,
        _ if PASS_THROUGH_RPCS.contains(&request) => {
            rpc::execution::pass_through(call, request, a).await
        }
        _ => Err(HubError::precondition(format!(
            "Unknown request {request}."
        ))),
    }
}

/// Every request name the dispatcher knows; reported by `SystemInfo` and
/// the `--openapi` dump.
pub fn supported_rpc_requests() -> Vec<String> {
    let mut names: Vec<String> = [
        "SystemInfo",
        "Version",
        "RegisterUser",
        "ReadLock",
        "WriteLock",
        "ReadUnlock",
        "WriteUnlock",
        "GetObjectTypes",
        "GetActions",
        "NewObjectType",
        "UpdateObjectModel",
        "DeleteObjectTypes",
        "ObjectTypeUsage",
        "GetRobotMeta",
        "NewScene",
        "OpenScene",
        "CloseScene",
        "SaveScene",
        "ListScenes",
        "DeleteScene",
        "RenameScene",
        "CopyScene",
        "UpdateSceneDescription",
        "ProjectsWithScene",
        "AddObjectToScene",
        "UpdateObjectParameters",
        "UpdateObjectPose",
        "UpdateObjectPoseUsingRobot",
        "RenameObject",
        "RemoveFromScene",
        "SceneObjectUsage",
        "StartScene",
        "StopScene",
        "ObjectAimingStart",
        "ObjectAimingAddPoint",
        "ObjectAimingDone",
        "ObjectAimingCancel",
        "NewProject",
        "OpenProject",
        "CloseProject",
        "SaveProject",
        "ListProjects",
        "DeleteProject",
        "RenameProject",
        "CopyProject",
        "UpdateProjectDescription",
        "UpdateProjectHasLogic",
        "AddActionPoint",
        "AddApUsingRobot",
        "RenameActionPoint",
        "UpdateActionPointPose",
        "UpdateActionPointParent",
        "RemoveActionPoint",
        "AddActionPointOrientation",
        "UpdateActionPointOrientation",
        "RemoveActionPointOrientation",
        "AddActionPointJoints",
        "UpdateActionPointJoints",
        "RemoveActionPointJoints",
        "AddAction",
        "UpdateAction",
        "RenameAction",
        "RemoveAction",
        "AddLogicItem",
        "UpdateLogicItem",
        "RemoveLogicItem",
        "AddConstant",
        "UpdateConstant",
        "RemoveConstant",
        "AddOverride",
        "UpdateOverride",
        "DeleteOverride",
        "ExecuteAction",
        "CancelAction",
        "GetRobotJoints",
        "GetEndEffectors",
        "GetEndEffectorPose",
        "GetGrippers",
        "GetSuctions",
        "MoveToPose",
        "MoveToJoints",
        "MoveToActionPoint",
        "StopRobot",
        "InverseKinematics",
        "ForwardKinematics",
        "CalibrateRobot",
        "HandTeachingMode",
        "RegisterForRobotEvent",
        "CameraColorImage",
        "CameraColorParameters",
        "CalibrateCamera",
        "GetCameraPose",
        "MarkersCorners",
        "BuildProject",
        "TemporaryPackage",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    names.extend(PASS_THROUGH_RPCS.into_iter().map(String::from));
    names
}

// ----------------------------------------------------------------------
// precondition helpers shared by the handlers

pub async fn scene_needed(ctx: &Ctx) -> Result<()> {
    let editing = ctx.editing.lock().await;
    editing.scene().map(|_| ())
}

pub async fn no_scene(ctx: &Ctx) -> Result<()> {
    let editing = ctx.editing.lock().await;
    if editing.scene.is_some() {
        return Err(HubError::precondition("Scene has to be closed first."));
    }
    Ok(())
}

pub async fn project_needed(ctx: &Ctx) -> Result<()> {
    let editing = ctx.editing.lock().await;
    editing.project().map(|_| ())
}

pub async fn no_project(ctx: &Ctx) -> Result<()> {
    let editing = ctx.editing.lock().await;
    if editing.project.is_some() {
        return Err(HubError::precondition("Not available during project editing."));
    }
    Ok(())
}

pub fn scene_started(ctx: &Ctx) -> Result<()> {
    ctx.runtime.ensure_started()
}

pub fn scene_stopped(ctx: &Ctx) -> Result<()> {
    ctx.runtime.can_modify()
}
