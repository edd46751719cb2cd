//! Scene RPCs: lifecycle, object editing, runtime start/stop, aiming.

use serde_json::json;

use arhub::context::AimingSession;
use arhub::error::{HubError, Result};
use arhub::state::CachedScene;
use arhub_data::common::{uid, Scene, SceneObject};
use arhub_data::events::{ChangeType, Event, EventData, OpenSceneData, ShowMainScreenData};
use arhub_data::math::{Pose, Position};
use arhub_data::object_type::{CollisionModel, Pivot};
use arhub_data::rpc::scene::*;
use arhub_data::rpc::IdArgs;

use crate::dispatch::{no_project, scene_needed, scene_stopped, Call, Emit, Out};

fn open_scene_events(scene: Scene, state: arhub_data::events::SceneStateData) -> Vec<Emit> {
    vec![
        Emit::all(Event::new(EventData::OpenScene(OpenSceneData { scene }))),
        Emit::all(Event::new(EventData::SceneState(state))),
    ]
}

async fn stored_scene_names(call: &Call<'_>) -> Result<Vec<String>> {
    Ok(call
        .ctx
        .storage
        .list_scenes()
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect())
}

pub async fn new_scene(call: &Call<'_>, args: NewSceneArgs) -> Result<Out> {
    let ctx = call.ctx;
    crate::dispatch::no_scene(ctx).await?;
    scene_stopped(ctx)?;
    let names = stored_scene_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.name, names.iter().map(String::as_str))?;
    if call.dry_run {
        return Ok(Out::empty());
    }

    let mut cached = CachedScene::new(Scene {
        id: uid("scn"),
        name: args.name,
        description: args.description,
        ..Scene::default()
    })?;
    // never persisted yet, so it counts as changed
    cached.update_modified();
    let scene = cached.scene();
    ctx.editing.lock().await.scene = Some(cached);
    Ok(Out::events(open_scene_events(scene, ctx.runtime.state())))
}

pub async fn open_scene(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    crate::dispatch::no_scene(ctx).await?;
    scene_stopped(ctx)?;
    let scene = ctx.open_scene(&args.id).await?;
    Ok(Out::events(open_scene_events(scene, ctx.runtime.state())))
}

pub async fn close_scene(call: &Call<'_>, args: CloseSceneArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    no_project(ctx).await?;
    scene_stopped(ctx)?;
    {
        let editing = ctx.editing.lock().await;
        let scene = editing.scene()?;
        if !args.force && scene.has_changes() {
            return Err(HubError::precondition("Scene has unsaved changes."));
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let scene_id = ctx.close_scene(args.force).await?;
    Ok(Out::events(vec![
        Emit::all(Event::new(EventData::SceneClosed)),
        Emit::all(Event::new(EventData::ShowMainScreen(ShowMainScreenData {
            what: arhub_data::events::MainScreen::ScenesList,
            highlight: Some(scene_id),
        }))),
    ]))
}

pub async fn save_scene(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.save_scene().await?;
    Ok(Out::broadcast(Event::new(EventData::SceneSaved)))
}

pub async fn list_scenes(call: &Call<'_>) -> Result<Out> {
    let scenes = call.ctx.storage.list_scenes().await?;
    Ok(Out::data(serde_json::to_value(scenes)?))
}

pub async fn delete_scene(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    {
        let editing = ctx.editing.lock().await;
        if editing.scene.as_ref().map(|s| s.id == args.id).unwrap_or(false) {
            return Err(HubError::precondition("Scene has to be closed first."));
        }
    }
    let dependants = projects_using_scene(call, &args.id).await?;
    if !dependants.is_empty() {
        return Err(HubError::precondition(format!(
            "Scene is used by projects: {}.",
            dependants.join(", ")
        )));
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let scene = ctx.storage.get_scene(&args.id).await?;
    ctx.storage.delete_scene(&args.id).await?;
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneChanged(Scene {
            objects: Vec::new(),
            ..scene
        }),
        ChangeType::Remove,
    )))
}

pub async fn rename_scene(call: &Call<'_>, args: RenameArgs) -> Result<Out> {
    let ctx = call.ctx;
    let owner = call.user_name()?;
    let names = stored_scene_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.new_name, names.iter().map(String::as_str))?;

    let ids = vec![args.id.clone()];
    ctx.lock
        .with_write_lock(&ids, &owner, true, call.dry_run, || async {
            if call.dry_run {
                return Ok(Out::empty());
            }
            // the open scene is renamed in memory, a closed one in the store
            {
                let mut editing = ctx.editing.lock().await;
                if let Some(scene) = editing.scene.as_mut() {
                    if scene.id == args.id {
                        scene.name = args.new_name.clone();
                        scene.update_modified();
                        let bare = Scene {
                            objects: Vec::new(),
                            ..scene.scene()
                        };
                        return Ok(Out::broadcast(Event::with_change(
                            EventData::SceneChanged(bare),
                            ChangeType::Update,
                        )));
                    }
                }
            }
            let mut scene = ctx.storage.get_scene(&args.id).await?;
            scene.name = args.new_name.clone();
            ctx.storage.put_scene(&scene).await?;
            scene.objects.clear();
            Ok(Out::broadcast(Event::with_change(
                EventData::SceneChanged(scene),
                ChangeType::Update,
            )))
        })
        .await
}

pub async fn copy_scene(call: &Call<'_>, args: CopySceneArgs) -> Result<Out> {
    let ctx = call.ctx;
    let names = stored_scene_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.target_name, names.iter().map(String::as_str))?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    let mut scene = ctx.storage.get_scene(&args.source_id).await?;
    scene.id = uid("scn");
    scene.name = args.target_name;
    scene.modified = None;
    scene.int_modified = None;
    for obj in &mut scene.objects {
        obj.id = uid("obj");
    }
    ctx.storage.put_scene(&scene).await?;
    let new_id = scene.id.clone();
    scene.objects.clear();
    let mut out = Out::broadcast(Event::with_change(
        EventData::SceneChanged(scene),
        ChangeType::Add,
    ));
    out.data = json!({ "id": new_id });
    Ok(out)
}

pub async fn update_scene_description(
    call: &Call<'_>,
    args: UpdateSceneDescriptionArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    let owner = call.user_name()?;
    let ids = vec![args.scene_id.clone()];
    ctx.lock
        .with_write_lock(&ids, &owner, true, call.dry_run, || async {
            if call.dry_run {
                return Ok(Out::empty());
            }
            {
                let mut editing = ctx.editing.lock().await;
                if let Some(scene) = editing.scene.as_mut() {
                    if scene.id == args.scene_id {
                        scene.description = args.new_description.clone();
                        scene.update_modified();
                        let bare = Scene {
                            objects: Vec::new(),
                            ..scene.scene()
                        };
                        return Ok(Out::broadcast(Event::with_change(
                            EventData::SceneChanged(bare),
                            ChangeType::Update,
                        )));
                    }
                }
            }
            let mut scene = ctx.storage.get_scene(&args.scene_id).await?;
            scene.description = args.new_description.clone();
            ctx.storage.put_scene(&scene).await?;
            scene.objects.clear();
            Ok(Out::broadcast(Event::with_change(
                EventData::SceneChanged(scene),
                ChangeType::Update,
            )))
        })
        .await
}

async fn projects_using_scene(call: &Call<'_>, scene_id: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for desc in call.ctx.storage.list_projects().await? {
        if let Ok(project) = call.ctx.storage.get_project(&desc.id).await {
            if project.scene_id == scene_id {
                out.push(project.id);
            }
        }
    }
    Ok(out)
}

pub async fn projects_with_scene(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let projects = projects_using_scene(call, &args.id).await?;
    Ok(Out::data(serde_json::to_value(projects)?))
}

pub async fn add_object_to_scene(call: &Call<'_>, args: AddObjectToSceneArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;

    let obj = SceneObject {
        id: uid("obj"),
        name: args.name,
        object_type: args.object_type,
        pose: args.pose,
        parameters: args.parameters,
    };

    let mut editing = ctx.editing.lock().await;
    {
        let scene = editing.scene()?;
        ctx.check_object(scene, &obj, true).await?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.scene_mut()?.upsert_object(obj.clone());
    tracing::debug!("object {} ({}) added to the scene", obj.id, obj.object_type);
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(obj),
        ChangeType::Add,
    )))
}

pub async fn update_object_parameters(
    call: &Call<'_>,
    args: UpdateObjectParametersArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let updated = {
        let scene = editing.scene()?;
        let mut obj = scene.object(&args.id)?.clone();
        obj.parameters = args.parameters;
        ctx.check_object(scene, &obj, false).await?;
        obj
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.scene_mut()?.upsert_object(updated.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(updated),
        ChangeType::Update,
    )))
}

pub async fn update_object_pose(call: &Call<'_>, args: UpdateObjectPoseArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.object_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let updated = {
        let scene = editing.scene()?;
        let obj = scene.object(&args.object_id)?;
        if obj.pose.is_none() {
            return Err(HubError::validation("Object do not have pose."));
        }
        let mut obj = obj.clone();
        obj.pose = Some(args.pose);
        obj
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.scene_mut()?.upsert_object(updated.clone());
    editing
        .objects_with_updated_pose
        .insert(updated.id.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(updated),
        ChangeType::Update,
    )))
}

/// Offset from the end effector to the object origin for the given pivot.
fn pivot_delta(model: &CollisionModel, pivot: Pivot) -> Result<Position> {
    let half = match model {
        CollisionModel::Box { size_z, .. } => size_z / 2.0,
        CollisionModel::Cylinder { height, .. } => height / 2.0,
        CollisionModel::Sphere { radius } => radius / 2.0,
        CollisionModel::Mesh { .. } => {
            if pivot != Pivot::Middle {
                return Err(HubError::validation(
                    "Only middle pivot is supported for meshes.",
                ));
            }
            return Ok(Position::default());
        }
    };
    Ok(match pivot {
        Pivot::Top => Position::new(0.0, 0.0, half),
        Pivot::Middle => Position::default(),
        Pivot::Bottom => Position::new(0.0, 0.0, -half),
    })
}

pub async fn update_object_pose_using_robot(
    call: &Call<'_>,
    args: UpdateObjectPoseUsingRobotArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;
    if args.id == args.robot.robot_id {
        return Err(HubError::validation(
            "Robot cannot update its own pose.",
        ));
    }
    let owner = call.user_name()?;

    let robot_ids = vec![args.robot.robot_id.clone()];
    let out = ctx
        .lock
        .with_read_lock(&robot_ids, &owner, || async {
            let end_effector = args
                .robot
                .end_effector
                .clone()
                .ok_or_else(|| HubError::validation("End effector has to be set."))?;
            let instance = ctx.runtime.robot(&args.robot.robot_id)?;
            let robot = instance.as_robot().expect("checked robot");
            let eef_pose = robot.end_effector_pose(&end_effector).await?;

            let (model, mut obj) = {
                let editing = ctx.editing.lock().await;
                let scene = editing.scene()?;
                let obj = scene.object(&args.id)?.clone();
                let data = ctx.object_types.get(&obj.object_type).await?;
                let model = data
                    .meta
                    .object_model
                    .clone()
                    .ok_or_else(|| HubError::validation("Object has no collision model."))?;
                (model, obj)
            };
            if obj.pose.is_none() {
                return Err(HubError::validation("Object do not have pose."));
            }

            let delta = pivot_delta(&model, args.pivot)?;
            let rotated = eef_pose.orientation.rotate_vector(&delta);
            // tool-flip convention of the supported robots: 180° about X
            let flip = arhub_data::math::Orientation::new(1.0, 0.0, 0.0, 0.0);
            let pose = Pose::new(
                eef_pose.position - rotated,
                eef_pose.orientation.multiplied(&flip).normalized()?,
            );
            obj.pose = Some(pose);

            if call.dry_run {
                return Ok(Out::empty());
            }
            {
                let mut editing = ctx.editing.lock().await;
                editing.scene_mut()?.upsert_object(obj.clone());
                editing.objects_with_updated_pose.insert(obj.id.clone());
            }
            if let Ok(live) = ctx.runtime.instance(&obj.id) {
                live.set_pose(pose).await?;
            }
            Ok(Out::broadcast(Event::with_change(
                EventData::SceneObjectChanged(obj),
                ChangeType::Update,
            )))
        })
        .await?;
    Ok(out)
}

pub async fn rename_object(call: &Call<'_>, args: RenameArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.new_name)?;

    let mut editing = ctx.editing.lock().await;
    let updated = {
        let scene = editing.scene()?;
        arhub_data::helpers::check_unique_name(&args.new_name, scene.object_names())?;
        let mut obj = scene.object(&args.id)?.clone();
        obj.name = args.new_name.clone();
        obj
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.scene_mut()?.upsert_object(updated.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(updated),
        ChangeType::Update,
    )))
}

pub async fn remove_from_scene(call: &Call<'_>, args: RemoveFromSceneArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;

    if !args.force {
        let usage = object_usage_in_projects(call, &args.id).await?;
        if !usage.is_empty() {
            return Err(HubError::precondition(format!(
                "Object is used by projects: {}.",
                usage.join(", ")
            )));
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }

    let removed = {
        let mut editing = ctx.editing.lock().await;
        let removed = editing.scene_mut()?.delete_object(&args.id)?;
        editing.objects_with_updated_pose.remove(&args.id);
        removed
    };
    let owner = call.user_name()?;
    let _ = ctx.lock.write_unlock(&[args.id], &owner).await;
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(removed),
        ChangeType::Remove,
    )))
}

async fn object_usage_in_projects(call: &Call<'_>, object_id: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for desc in call.ctx.storage.list_projects().await? {
        let Ok(project) = call.ctx.storage.get_project(&desc.id).await else {
            continue;
        };
        let uses = project.object_overrides.iter().any(|o| o.id == object_id)
            || project.action_points.iter().any(|ap| {
                ap.parent.as_deref() == Some(object_id)
                    || ap.actions.iter().any(|action| {
                        action
                            .parse_type()
                            .map(|(obj, _)| obj == object_id)
                            .unwrap_or(false)
                    })
            });
        if uses {
            out.push(project.id);
        }
    }
    Ok(out)
}

pub async fn scene_object_usage(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    scene_needed(call.ctx).await?;
    {
        let editing = call.ctx.editing.lock().await;
        editing.scene()?.object(&args.id)?;
    }
    let projects = object_usage_in_projects(call, &args.id).await?;
    Ok(Out::data(serde_json::to_value(
        arhub_data::rpc::objects::UsageData {
            scenes: Vec::new(),
            projects,
        },
    )?))
}

pub async fn start_scene(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    if !ctx.runtime.stopped() {
        return Err(HubError::precondition("Scene in a wrong state."));
    }
    if ctx.exec.package_running() {
        return Err(HubError::precondition(
            "Cannot start the scene while a package runs.",
        ));
    }
    {
        let editing = ctx.editing.lock().await;
        if editing.running_action.is_some() {
            return Err(HubError::precondition("Action is running."));
        }
    }
    if ctx.lock.user_write_locks().await > 0 {
        return Err(HubError::locking("Something is locked."));
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    tokio::spawn(ctx.clone().start_scene_task());
    Ok(Out::empty())
}

pub async fn stop_scene(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    {
        let editing = ctx.editing.lock().await;
        if editing.running_action.is_some() {
            return Err(HubError::precondition("Action is running."));
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    tokio::spawn(ctx.clone().stop_scene_task());
    Ok(Out::empty())
}

// ----------------------------------------------------------------------
// aiming

pub async fn object_aiming_start(call: &Call<'_>, args: ObjectAimingStartArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    ctx.ensure_locked(&args.object_id, call.client).await?;
    let owner = call.user_name()?;

    let point_count = {
        let editing = ctx.editing.lock().await;
        let scene = editing.scene()?;
        let obj = scene.object(&args.object_id)?;
        let data = ctx.object_types.get(&obj.object_type).await?;
        match &data.meta.object_model {
            Some(CollisionModel::Mesh { focus_points, .. }) if !focus_points.is_empty() => {
                focus_points.len()
            }
            Some(CollisionModel::Mesh { .. }) => {
                return Err(HubError::validation("Mesh has no focus points."))
            }
            _ => return Err(HubError::validation("Only meshes can be aimed.")),
        }
    };
    let end_effector = args
        .robot
        .end_effector
        .clone()
        .ok_or_else(|| HubError::validation("End effector has to be set."))?;
    ctx.runtime.robot(&args.robot.robot_id)?;

    let mut aiming = ctx.aiming.lock().await;
    if aiming.is_some() {
        return Err(HubError::precondition("Aiming already in progress."));
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    *aiming = Some(AimingSession {
        object_id: args.object_id,
        robot_id: args.robot.robot_id,
        end_effector,
        owner,
        poses: Default::default(),
        point_count,
    });
    Ok(Out::empty())
}

pub async fn object_aiming_add_point(
    call: &Call<'_>,
    args: ObjectAimingAddPointArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    crate::dispatch::scene_started(ctx)?;
    let owner = call.user_name()?;

    let mut aiming = ctx.aiming.lock().await;
    let session = aiming
        .as_mut()
        .ok_or_else(|| HubError::precondition("Aiming has not started."))?;
    if session.owner != owner {
        return Err(HubError::precondition("Aiming owned by another user."));
    }
    if args.point_idx >= session.point_count {
        return Err(HubError::validation("Invalid point index."));
    }
    let instance = ctx.runtime.robot(&session.robot_id)?;
    let robot = instance.as_robot().expect("checked robot");
    let pose = robot.end_effector_pose(&session.end_effector).await?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    session.poses.insert(args.point_idx, pose);
    let mut finished: Vec<usize> = session.poses.keys().copied().collect();
    finished.sort_unstable();
    Ok(Out::data(serde_json::to_value(ObjectAimingPointData {
        finished_indexes: finished,
    })?))
}

pub async fn object_aiming_done(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    crate::dispatch::scene_started(ctx)?;
    let owner = call.user_name()?;

    let session = {
        let mut aiming = ctx.aiming.lock().await;
        let session = aiming
            .as_ref()
            .ok_or_else(|| HubError::precondition("Aiming has not started."))?;
        if session.owner != owner {
            return Err(HubError::precondition("Aiming owned by another user."));
        }
        if session.poses.len() < session.point_count {
            return Err(HubError::precondition("Not all points were aimed."));
        }
        if call.dry_run {
            return Ok(Out::empty());
        }
        aiming.take().expect("session checked")
    };

    let current_pose = {
        let editing = ctx.editing.lock().await;
        editing
            .scene()?
            .object(&session.object_id)?
            .pose
            .ok_or_else(|| HubError::validation("Object do not have pose."))?
    };
    let new_pose = ctx
        .scene_service
        .focus(&session.object_id, &current_pose)
        .await?;

    let updated = {
        let mut editing = ctx.editing.lock().await;
        let mut obj = editing.scene()?.object(&session.object_id)?.clone();
        obj.pose = Some(new_pose);
        editing.scene_mut()?.upsert_object(obj.clone());
        editing.objects_with_updated_pose.insert(obj.id.clone());
        obj
    };
    let _ = ctx
        .lock
        .write_unlock(&[session.object_id.clone()], &owner)
        .await;
    Ok(Out::broadcast(Event::with_change(
        EventData::SceneObjectChanged(updated),
        ChangeType::Update,
    )))
}

pub async fn object_aiming_cancel(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    let owner = call.user_name()?;
    let mut aiming = ctx.aiming.lock().await;
    match aiming.as_ref() {
        Some(session) if session.owner == owner => {
            if !call.dry_run {
                *aiming = None;
            }
            Ok(Out::empty())
        }
        Some(_) => Err(HubError::precondition("Aiming owned by another user.")),
        None => Err(HubError::precondition("Aiming has not started.")),
    }
}
