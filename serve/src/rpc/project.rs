//! Project RPCs: lifecycle, action points, orientations, joints, actions,
//! logic items, constants, overrides, and editor-run actions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use arhub::error::{HubError, Result};
use arhub::objtypes::ObjectTypeData;
use arhub::state::{executable_problems, link_output_type, project_problems, CachedProject};
use arhub_data::common::{
    uid, Action, ActionParameter, ActionParameterKind, LogicItem, NamedOrientation, Project,
    ProjectConstant, ProjectRobotJoints, LOGIC_END, LOGIC_START,
};
use arhub_data::events::{
    ActionExecutionData, ActionResultData, ChangeType, Event, EventData, OpenProjectData,
    ShowMainScreenData,
};
use arhub_data::rpc::project::*;
use arhub_data::rpc::scene::RenameArgs;
use arhub_data::rpc::IdArgs;

use crate::dispatch::{project_needed, scene_stopped, Call, Emit, Out};

async fn stored_project_names(call: &Call<'_>) -> Result<Vec<String>> {
    Ok(call
        .ctx
        .storage
        .list_projects()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect())
}

fn open_project_events(
    scene: arhub_data::common::Scene,
    project: Project,
    state: arhub_data::events::SceneStateData,
) -> Vec<Emit> {
    vec![
        Emit::all(Event::new(EventData::OpenProject(OpenProjectData {
            scene,
            project,
        }))),
        Emit::all(Event::new(EventData::SceneState(state))),
    ]
}

/// Validates an action's type, flows and parameters against the open scene,
/// the open project and the type catalogue.
fn check_action(
    scene: &arhub::state::CachedScene,
    project: &CachedProject,
    catalog: &HashMap<String, Arc<ObjectTypeData>>,
    action: &Action,
) -> Result<()> {
    let (obj_id, action_name) = action.parse_type()?;
    let obj = scene.object(&obj_id)?;
    let data = catalog
        .get(&obj.object_type)
        .ok_or_else(|| HubError::precondition("Unknown object type."))?;
    if data.meta.disabled {
        return Err(HubError::precondition("Object type disabled."));
    }
    let signature = data
        .actions
        .iter()
        .find(|a| a.name == action_name)
        .ok_or_else(|| HubError::precondition(format!("Unknown action {action_name}.")))?;
    if signature.disabled {
        return Err(HubError::precondition("Action is disabled."));
    }

    for flow in &action.flows {
        flow.check()?;
        for output in &flow.outputs {
            arhub_data::helpers::check_snake_case(output)?;
            let taken = project
                .actions()
                .filter(|a| a.id != action.id)
                .flat_map(|a| a.flows.iter())
                .flat_map(|f| f.outputs.iter())
                .any(|existing| existing == output);
            if taken {
                return Err(HubError::validation(format!(
                    "Output {output} is not unique."
                )));
            }
        }
    }

    for param in &action.parameters {
        match param.kind {
            ActionParameterKind::Value => {
                let meta = signature
                    .parameters
                    .iter()
                    .find(|p| p.name == param.name)
                    .ok_or_else(|| {
                        HubError::validation(format!("Unknown parameter {}.", param.name))
                    })?;
                if meta.param_type != param.param_type {
                    return Err(HubError::validation(format!(
                        "Type mismatch for parameter {}.",
                        param.name
                    )));
                }
                serde_json::from_str::<serde_json::Value>(&param.value).map_err(|_| {
                    HubError::validation(format!("Parameter {} is not valid JSON.", param.name))
                })?;
            }
            ActionParameterKind::Constant => {
                let constant = project.constant(&param.value)?;
                if constant.const_type != param.param_type {
                    return Err(HubError::validation(
                        "Param type does not match constant type.",
                    ));
                }
            }
            ActionParameterKind::Link => {
                let output_type = link_output_type(scene, project, catalog, &param.value)
                    .map_err(HubError::validation)?;
                if output_type != param.param_type {
                    return Err(HubError::validation(
                        "Param type does not match action output type.",
                    ));
                }
            }
        }
    }
    Ok(())
}

pub async fn new_project(call: &Call<'_>, args: NewProjectArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_stopped(ctx)?;
    crate::dispatch::no_project(ctx).await?;
    let names = stored_project_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.name, names.iter().map(String::as_str))?;

    // an open scene must be the project's scene; otherwise open it
    let open_scene_id = {
        let editing = ctx.editing.lock().await;
        editing.scene.as_ref().map(|s| s.id.clone())
    };
    match &open_scene_id {
        Some(id) if *id != args.scene_id => {
            return Err(HubError::precondition(
                "Project has to be opened with its scene.",
            ))
        }
        Some(_) => {}
        None => {
            if call.dry_run {
                // existence check only
                ctx.storage.get_scene(&args.scene_id).await?;
            } else {
                ctx.open_scene(&args.scene_id).await?;
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }

    let mut cached = CachedProject::new(Project {
        id: uid("prj"),
        name: args.name,
        scene_id: args.scene_id,
        description: args.description,
        has_logic: args.has_logic,
        ..Project::default()
    })?;
    // never persisted yet, so it counts as changed
    cached.update_modified();
    let project = cached.project();
    let scene = {
        let mut editing = ctx.editing.lock().await;
        let scene = editing.scene()?.scene();
        editing.project = Some(cached);
        scene
    };
    Ok(Out::events(open_project_events(
        scene,
        project,
        ctx.runtime.state(),
    )))
}

pub async fn open_project(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    crate::dispatch::no_scene(ctx).await?;
    scene_stopped(ctx)?;
    let (scene, project) = ctx.open_project(&args.id).await?;
    Ok(Out::events(open_project_events(
        scene,
        project,
        ctx.runtime.state(),
    )))
}

pub async fn close_project(call: &Call<'_>, args: CloseProjectArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    {
        let editing = ctx.editing.lock().await;
        let project = editing.project()?;
        if !args.force && project.has_changes() {
            return Err(HubError::precondition("Project has unsaved changes."));
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project_id = ctx.close_project(args.force).await?;
    Ok(Out::events(vec![
        Emit::all(Event::new(EventData::ProjectClosed)),
        Emit::all(Event::new(EventData::ShowMainScreen(ShowMainScreenData {
            what: arhub_data::events::MainScreen::ProjectsList,
            highlight: Some(project_id),
        }))),
    ]))
}

pub async fn save_project(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.save_project().await?;
    Ok(Out::broadcast(Event::new(EventData::ProjectSaved)))
}

pub async fn list_projects(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    let catalog = ctx.type_catalog().await;
    let mut scenes: HashMap<String, arhub::state::CachedScene> = HashMap::new();
    let mut listed = ctx.storage.list_projects().await?;

    for desc in &mut listed {
        let Ok(project) = ctx.storage.get_project(&desc.id).await else {
            desc.valid = Some(false);
            desc.problems = vec!["Project cannot be loaded.".to_string()];
            continue;
        };
        let scene_id = project.scene_id.clone();
        if !scenes.contains_key(&scene_id) {
            match ctx.storage.get_scene(&scene_id).await {
                Ok(scene) => match arhub::state::CachedScene::new(scene) {
                    Ok(cached) => {
                        scenes.insert(scene_id.clone(), cached);
                    }
                    Err(e) => {
                        desc.valid = Some(false);
                        desc.problems = vec![e.to_string()];
                        continue;
                    }
                },
                Err(_) => {
                    desc.valid = Some(false);
                    desc.problems = vec!["Scene does not exist.".to_string()];
                    continue;
                }
            }
        }
        let scene = scenes.get(&scene_id).expect("just inserted");
        match CachedProject::new(project) {
            Ok(cached) => {
                let mut problems = project_problems(scene, &cached, &catalog);
                let valid = problems.is_empty();
                let exec_problems = executable_problems(&cached);
                desc.valid = Some(valid);
                desc.executable = Some(valid && exec_problems.is_empty());
                problems.extend(exec_problems);
                desc.problems = problems;
            }
            Err(e) => {
                desc.valid = Some(false);
                desc.problems = vec![e.to_string()];
            }
        }
    }
    Ok(Out::data(serde_json::to_value(listed)?))
}

pub async fn delete_project(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    {
        let editing = ctx.editing.lock().await;
        if editing
            .project
            .as_ref()
            .map(|p| p.id == args.id)
            .unwrap_or(false)
        {
            return Err(HubError::precondition("Project has to be closed first."));
        }
    }
    if call.dry_run {
        ctx.storage.get_project(&args.id).await?;
        return Ok(Out::empty());
    }
    let mut project = ctx.storage.get_project(&args.id).await?;
    ctx.storage.delete_project(&args.id).await?;
    project.action_points.clear();
    project.logic.clear();
    Ok(Out::broadcast(Event::with_change(
        EventData::ProjectChanged(project),
        ChangeType::Remove,
    )))
}

/// Shared shape of rename/description/has-logic updates: the open project is
/// touched in memory, a closed one in the store.
async fn update_project_meta<F>(call: &Call<'_>, project_id: &str, apply: F) -> Result<Out>
where
    F: Fn(&mut Project) + Copy,
{
    let ctx = call.ctx;
    let owner = call.user_name()?;
    let ids = vec![project_id.to_string()];
    ctx.lock
        .with_write_lock(&ids, &owner, true, call.dry_run, || async {
            if call.dry_run {
                return Ok(Out::empty());
            }
            {
                let mut editing = ctx.editing.lock().await;
                if let Some(cached) = editing.project.as_mut() {
                    if cached.id == project_id {
                        let mut project = cached.project();
                        apply(&mut project);
                        let mut updated = CachedProject::new(project.clone())?;
                        updated.update_modified();
                        *cached = updated;
                        project.action_points.clear();
                        project.logic.clear();
                        return Ok(Out::broadcast(Event::with_change(
                            EventData::ProjectChanged(project),
                            ChangeType::Update,
                        )));
                    }
                }
            }
            let mut project = ctx.storage.get_project(project_id).await?;
            apply(&mut project);
            ctx.storage.put_project(&project).await?;
            project.action_points.clear();
            project.logic.clear();
            Ok(Out::broadcast(Event::with_change(
                EventData::ProjectChanged(project),
                ChangeType::Update,
            )))
        })
        .await
}

pub async fn rename_project(call: &Call<'_>, args: RenameArgs) -> Result<Out> {
    let names = stored_project_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.new_name, names.iter().map(String::as_str))?;
    let new_name = args.new_name.clone();
    update_project_meta(call, &args.id, |p| p.name = new_name.clone()).await
}

pub async fn copy_project(call: &Call<'_>, args: CopyProjectArgs) -> Result<Out> {
    let ctx = call.ctx;
    let names = stored_project_names(call).await?;
    arhub_data::helpers::check_unique_name(&args.target_name, names.iter().map(String::as_str))?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    let mut project = ctx.storage.get_project(&args.source_id).await?;
    project.id = uid("prj");
    project.name = args.target_name;
    project.modified = None;
    project.int_modified = None;

    // remap ids, fixing actions, links and logic that reference them
    let mut id_map: HashMap<String, String> = HashMap::new();
    for ap in &mut project.action_points {
        id_map.insert(ap.id.clone(), uid("acp"));
        for action in &ap.actions {
            id_map.insert(action.id.clone(), uid("act"));
        }
        for ori in &ap.orientations {
            id_map.insert(ori.id.clone(), uid("ori"));
        }
        for joints in &ap.robot_joints {
            id_map.insert(joints.id.clone(), uid("jnt"));
        }
    }
    let remap = |id: &str| id_map.get(id).cloned().unwrap_or_else(|| id.to_string());
    for ap in &mut project.action_points {
        ap.id = remap(&ap.id);
        if let Some(parent) = &ap.parent {
            ap.parent = Some(remap(parent));
        }
        for action in &mut ap.actions {
            action.id = remap(&action.id);
            for param in &mut action.parameters {
                if param.kind == ActionParameterKind::Link {
                    if let Ok(link) = arhub_data::common::parse_link(&param.value) {
                        param.value = format!(
                            "{}/{}/{}",
                            remap(&link.action_id),
                            link.flow_type,
                            link.output_index
                        );
                    }
                }
            }
        }
        for ori in &mut ap.orientations {
            ori.id = remap(&ori.id);
        }
        for joints in &mut ap.robot_joints {
            joints.id = remap(&joints.id);
        }
    }
    for item in &mut project.logic {
        item.id = uid("lgi");
        let (start_id, flow) = item.parse_start();
        if start_id != LOGIC_START {
            item.start = format!("{}/{}", remap(&start_id), flow);
        }
        if item.end != LOGIC_END {
            item.end = remap(&item.end);
        }
        if let Some(condition) = &mut item.condition {
            if let Ok(link) = arhub_data::common::parse_link(&condition.what) {
                condition.what = format!(
                    "{}/{}/{}",
                    remap(&link.action_id),
                    link.flow_type,
                    link.output_index
                );
            }
        }
    }

    ctx.storage.put_project(&project).await?;
    let new_id = project.id.clone();
    project.action_points.clear();
    project.logic.clear();
    let mut out = Out::broadcast(Event::with_change(
        EventData::ProjectChanged(project),
        ChangeType::Add,
    ));
    out.data = json!({ "id": new_id });
    Ok(out)
}

pub async fn update_project_description(
    call: &Call<'_>,
    args: UpdateProjectDescriptionArgs,
) -> Result<Out> {
    let description = args.new_description.clone();
    update_project_meta(call, &args.project_id, |p| {
        p.description = description.clone()
    })
    .await
}

pub async fn update_project_has_logic(
    call: &Call<'_>,
    args: UpdateProjectHasLogicArgs,
) -> Result<Out> {
    update_project_meta(call, &args.project_id, |p| {
        p.has_logic = args.new_has_logic;
        if !args.new_has_logic {
            p.logic.clear();
        }
    })
    .await
}

// ----------------------------------------------------------------------
// action points

pub async fn add_action_point(call: &Call<'_>, args: AddActionPointArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    arhub_data::helpers::check_snake_case(&args.name)?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        arhub_data::helpers::check_unique_name(&args.name, project.action_point_names())?;
        if let Some(parent) = &args.parent {
            let parent_known = project.bare_action_point(parent).is_ok()
                || editing.scene()?.contains(parent);
            if !parent_known {
                return Err(HubError::precondition("Unknown parent."));
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let ap = editing.project_mut()?.upsert_action_point(
        &uid("acp"),
        args.name,
        args.position,
        args.parent,
    );
    Ok(Out::broadcast(Event::with_change(
        EventData::ActionPointChanged(ap),
        ChangeType::Add,
    )))
}

pub async fn add_ap_using_robot(call: &Call<'_>, args: AddApUsingRobotArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    arhub_data::helpers::check_snake_case(&args.name)?;

    let instance = ctx.runtime.robot(&args.robot_id)?;
    let robot = instance.as_robot().expect("checked robot");
    let eef_pose = robot.end_effector_pose(&args.end_effector_id).await?;
    let joints = robot.robot_joints().await?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        arhub_data::helpers::check_unique_name(&args.name, project.action_point_names())?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project = editing.project_mut()?;
    let ap = project.upsert_action_point(&uid("acp"), args.name, eef_pose.position, None);
    let orientation = NamedOrientation {
        id: uid("ori"),
        name: "default".to_string(),
        orientation: eef_pose.orientation,
    };
    project.upsert_orientation(&ap.id, orientation.clone())?;
    let robot_joints = ProjectRobotJoints {
        id: uid("jnt"),
        name: "default".to_string(),
        robot_id: args.robot_id,
        joints,
        is_valid: true,
    };
    project.upsert_joints(&ap.id, robot_joints.clone())?;

    Ok(Out::events(vec![
        Emit::all(Event::with_change(
            EventData::ActionPointChanged(ap.clone()),
            ChangeType::Add,
        )),
        Emit::all(Event::with_parent(
            EventData::OrientationChanged(orientation),
            ChangeType::Add,
            ap.id.clone(),
        )),
        Emit::all(Event::with_parent(
            EventData::JointsChanged(robot_joints),
            ChangeType::Add,
            ap.id,
        )),
    ]))
}

pub async fn rename_action_point(call: &Call<'_>, args: RenameActionPointArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.new_name)?;

    let mut editing = ctx.editing.lock().await;
    let updated = {
        let project = editing.project()?;
        arhub_data::helpers::check_unique_name(&args.new_name, project.action_point_names())?;
        project.bare_action_point(&args.action_point_id)?.clone()
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project = editing.project_mut()?;
    let ap = project.upsert_action_point(
        &updated.id,
        args.new_name,
        updated.position,
        updated.parent,
    );
    Ok(Out::broadcast(Event::with_change(
        EventData::ActionPointChanged(ap),
        ChangeType::Update,
    )))
}

pub async fn update_action_point_pose(
    call: &Call<'_>,
    args: UpdateActionPointPoseArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    editing.project()?.bare_action_point(&args.action_point_id)?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project = editing.project_mut()?;
    project.update_ap_position(&args.action_point_id, args.new_position)?;
    let ap = project.bare_action_point(&args.action_point_id)?.clone();
    let mut events = vec![Emit::all(Event::with_change(
        EventData::ActionPointChanged(ap),
        ChangeType::Update,
    ))];
    for joints in project.ap_joints(&args.action_point_id) {
        events.push(Emit::all(Event::with_parent(
            EventData::JointsChanged(joints.clone()),
            ChangeType::Update,
            args.action_point_id.clone(),
        )));
    }
    Ok(Out::events(events))
}

pub async fn update_action_point_parent(
    call: &Call<'_>,
    args: UpdateActionPointParentArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        project.bare_action_point(&args.action_point_id)?;
        if let Some(new_parent) = &args.new_parent_id {
            if *new_parent == args.action_point_id {
                return Err(HubError::validation("AP cannot be its own parent."));
            }
            let known = project.bare_action_point(new_parent).is_ok()
                || editing.scene()?.contains(new_parent);
            if !known {
                return Err(HubError::precondition("Unknown parent."));
            }
            // the new parent must not be a descendant of this AP
            if project.ap_ancestry_contains(new_parent, &args.action_point_id) {
                return Err(HubError::validation("Parent chain contains a cycle."));
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project = editing.project_mut()?;
    let bare = project.bare_action_point(&args.action_point_id)?.clone();
    let ap = project.upsert_action_point(
        &bare.id,
        bare.name,
        bare.position,
        args.new_parent_id,
    );
    Ok(Out::broadcast(Event::with_change(
        EventData::ActionPointChanged(ap),
        ChangeType::Update,
    )))
}

pub async fn remove_action_point(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        project.bare_action_point(&args.id)?;
        // children APs keep the removed AP as parent otherwise
        let has_children = project
            .action_points()
            .any(|ap| ap.parent.as_deref() == Some(&args.id));
        if has_children {
            return Err(HubError::precondition("Action point has child APs."));
        }
        for action in project.ap_actions(&args.id) {
            check_action_unused(project, &action.id)?;
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing.project_mut()?.remove_action_point(&args.id)?;
    let owner = call.user_name()?;
    let _ = ctx.lock.write_unlock(&[args.id], &owner).await;
    Ok(Out::broadcast(Event::with_change(
        EventData::ActionPointChanged(removed),
        ChangeType::Remove,
    )))
}

// ----------------------------------------------------------------------
// orientations

pub async fn add_action_point_orientation(
    call: &Call<'_>,
    args: AddActionPointOrientationArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.name)?;
    let orientation = args.orientation.normalized()?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        project.bare_action_point(&args.action_point_id)?;
        let names: Vec<String> = project
            .ap_orientations(&args.action_point_id)
            .into_iter()
            .map(|o| o.name.clone())
            .collect();
        arhub_data::helpers::check_unique_name(&args.name, names.iter().map(String::as_str))?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let named = NamedOrientation {
        id: uid("ori"),
        name: args.name,
        orientation,
    };
    editing
        .project_mut()?
        .upsert_orientation(&args.action_point_id, named.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::OrientationChanged(named),
        ChangeType::Add,
        args.action_point_id,
    )))
}

pub async fn update_action_point_orientation(
    call: &Call<'_>,
    args: UpdateActionPointOrientationArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.orientation_id, call.client).await?;
    let orientation = args.orientation.normalized()?;

    let mut editing = ctx.editing.lock().await;
    let (mut named, parent_id) = {
        let project = editing.project()?;
        let named = project.orientation(&args.orientation_id)?.clone();
        let parent = project.orientation_parent(&args.orientation_id)?.id.clone();
        (named, parent)
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    named.orientation = orientation;
    editing.project_mut()?.update_orientation(named.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::OrientationChanged(named),
        ChangeType::Update,
        parent_id,
    )))
}

/// An orientation referenced by some action parameter cannot go away.
fn check_orientation_unused(project: &CachedProject, orientation_id: &str) -> Result<()> {
    let as_value = serde_json::to_string(orientation_id).unwrap_or_default();
    for action in project.actions() {
        for param in &action.parameters {
            if param.kind == ActionParameterKind::Value
                && param.param_type == "pose"
                && param.value == as_value
            {
                return Err(HubError::precondition(format!(
                    "Orientation used by action {}.",
                    action.name
                )));
            }
        }
    }
    Ok(())
}

pub async fn remove_action_point_orientation(
    call: &Call<'_>,
    args: RemoveActionPointOrientationArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.orientation_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let parent_id = {
        let project = editing.project()?;
        project.orientation(&args.orientation_id)?;
        check_orientation_unused(project, &args.orientation_id)?;
        project.orientation_parent(&args.orientation_id)?.id.clone()
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing
        .project_mut()?
        .remove_orientation(&args.orientation_id)?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::OrientationChanged(removed),
        ChangeType::Remove,
        parent_id,
    )))
}

// ----------------------------------------------------------------------
// joints

pub async fn add_action_point_joints(
    call: &Call<'_>,
    args: AddActionPointJointsArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.name)?;

    let instance = ctx.runtime.robot(&args.robot_id)?;
    let robot = instance.as_robot().expect("checked robot");
    let joints = robot.robot_joints().await?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        project.bare_action_point(&args.action_point_id)?;
        let names: Vec<String> = project
            .ap_joints(&args.action_point_id)
            .into_iter()
            .map(|j| j.name.clone())
            .collect();
        arhub_data::helpers::check_unique_name(&args.name, names.iter().map(String::as_str))?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let snapshot = ProjectRobotJoints {
        id: uid("jnt"),
        name: args.name,
        robot_id: args.robot_id,
        joints,
        is_valid: true,
    };
    editing
        .project_mut()?
        .upsert_joints(&args.action_point_id, snapshot.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::JointsChanged(snapshot),
        ChangeType::Add,
        args.action_point_id,
    )))
}

pub async fn update_action_point_joints(
    call: &Call<'_>,
    args: UpdateActionPointJointsArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;
    ctx.ensure_locked(&args.joints_id, call.client).await?;

    let (mut snapshot, parent_id) = {
        let editing = ctx.editing.lock().await;
        let project = editing.project()?;
        let snapshot = project.joints(&args.joints_id)?.clone();
        let parent = project.joints_parent(&args.joints_id)?.id.clone();
        (snapshot, parent)
    };
    let instance = ctx.runtime.robot(&snapshot.robot_id)?;
    let robot = instance.as_robot().expect("checked robot");
    let joints = robot.robot_joints().await?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    snapshot.joints = joints;
    snapshot.is_valid = true;
    let mut editing = ctx.editing.lock().await;
    editing.project_mut()?.update_joints(snapshot.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::JointsChanged(snapshot),
        ChangeType::Update,
        parent_id,
    )))
}

fn check_joints_unused(project: &CachedProject, joints_id: &str) -> Result<()> {
    let as_value = serde_json::to_string(joints_id).unwrap_or_default();
    for action in project.actions() {
        for param in &action.parameters {
            if param.kind == ActionParameterKind::Value
                && param.param_type == "joints"
                && param.value == as_value
            {
                return Err(HubError::precondition(format!(
                    "Joints used by action {}.",
                    action.name
                )));
            }
        }
    }
    Ok(())
}

pub async fn remove_action_point_joints(
    call: &Call<'_>,
    args: RemoveActionPointJointsArgs,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.joints_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let parent_id = {
        let project = editing.project()?;
        project.joints(&args.joints_id)?;
        check_joints_unused(project, &args.joints_id)?;
        project.joints_parent(&args.joints_id)?.id.clone()
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing.project_mut()?.remove_joints(&args.joints_id)?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::JointsChanged(removed),
        ChangeType::Remove,
        parent_id,
    )))
}

// ----------------------------------------------------------------------
// actions

pub async fn add_action(call: &Call<'_>, args: AddActionArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_point_id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.name)?;

    let catalog = ctx.type_catalog().await;
    let mut editing = ctx.editing.lock().await;
    let action = Action {
        id: uid("act"),
        name: args.name,
        action_type: args.action_type,
        parameters: args.parameters,
        flows: args.flows,
    };
    {
        let scene = editing.scene()?;
        let project = editing.project()?;
        project.bare_action_point(&args.action_point_id)?;
        arhub_data::helpers::check_unique_name(&action.name, project.action_names())?;
        check_action(scene, project, &catalog, &action)?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing
        .project_mut()?
        .upsert_action(&args.action_point_id, action.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::ActionChanged(action),
        ChangeType::Add,
        args.action_point_id,
    )))
}

pub async fn update_action(call: &Call<'_>, args: UpdateActionArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_id, call.client).await?;

    let catalog = ctx.type_catalog().await;
    let mut editing = ctx.editing.lock().await;
    let (updated, parent_id) = {
        let scene = editing.scene()?;
        let project = editing.project()?;
        let mut action = project.action(&args.action_id)?.clone();
        if let Some(parameters) = args.parameters {
            action.parameters = parameters;
        }
        if let Some(flows) = args.flows {
            action.flows = flows;
        }
        check_action(scene, project, &catalog, &action)?;
        let parent = project.action_parent(&args.action_id)?.id.clone();
        (action, parent)
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing
        .project_mut()?
        .upsert_action(&parent_id, updated.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::ActionChanged(updated),
        ChangeType::Update,
        parent_id,
    )))
}

pub async fn rename_action(call: &Call<'_>, args: RenameActionArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.action_id, call.client).await?;
    arhub_data::helpers::check_snake_case(&args.new_name)?;

    let mut editing = ctx.editing.lock().await;
    let (mut action, parent_id) = {
        let project = editing.project()?;
        arhub_data::helpers::check_unique_name(&args.new_name, project.action_names())?;
        let action = project.action(&args.action_id)?.clone();
        let parent = project.action_parent(&args.action_id)?.id.clone();
        (action, parent)
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    action.name = args.new_name;
    editing
        .project_mut()?
        .upsert_action(&parent_id, action.clone())?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::ActionChanged(action),
        ChangeType::Update,
        parent_id,
    )))
}

/// An action wired into logic or consumed through links cannot go away.
fn check_action_unused(project: &CachedProject, action_id: &str) -> Result<()> {
    for item in project.logic_items() {
        let (start_id, _) = item.parse_start();
        if start_id == action_id || item.end == action_id {
            return Err(HubError::precondition("Action is used by logic."));
        }
    }
    for action in project.actions() {
        if action.id == action_id {
            continue;
        }
        for param in &action.parameters {
            if param.kind == ActionParameterKind::Link {
                if let Ok(link) = param.parse_link() {
                    if link.action_id == action_id {
                        return Err(HubError::precondition(format!(
                            "Action output is consumed by {}.",
                            action.name
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

pub async fn remove_action(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let parent_id = {
        let project = editing.project()?;
        project.action(&args.id)?;
        check_action_unused(project, &args.id)?;
        project.action_parent(&args.id)?.id.clone()
    };
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing.project_mut()?.remove_action(&args.id)?;
    Ok(Out::broadcast(Event::with_parent(
        EventData::ActionChanged(removed),
        ChangeType::Remove,
        parent_id,
    )))
}

// ----------------------------------------------------------------------
// logic items

fn check_logic_item(
    scene: &arhub::state::CachedScene,
    project: &CachedProject,
    catalog: &HashMap<String, Arc<ObjectTypeData>>,
    item: &LogicItem,
) -> Result<()> {
    if item.start == item.end {
        return Err(HubError::validation("Start and end cannot be the same."));
    }
    let (start_id, flow) = item.parse_start();
    if start_id != LOGIC_START {
        let action = project.action(&start_id)?;
        if action.flow(&flow).is_none() {
            return Err(HubError::validation(format!("Unknown flow {flow}.")));
        }
    } else if item.condition.is_some() {
        return Err(HubError::validation("START cannot be conditional."));
    }
    if item.end != LOGIC_END {
        project.action(&item.end)?;
    }
    if let Some(condition) = &item.condition {
        let what_type = link_output_type(scene, project, catalog, &condition.what)
            .map_err(HubError::validation)?;
        if what_type != "boolean" {
            return Err(HubError::validation(
                "Only boolean conditions are supported.",
            ));
        }
        serde_json::from_str::<bool>(&condition.value)
            .map_err(|_| HubError::validation("Condition value has to be boolean."))?;
    }

    // one START edge; one unconditional edge per flow output
    for existing in project.logic_items() {
        if existing.id == item.id {
            continue;
        }
        if item.start == LOGIC_START && existing.start == LOGIC_START {
            return Err(HubError::validation("Duplicate start."));
        }
        let (existing_start, existing_flow) = existing.parse_start();
        if existing_start == start_id && existing_flow == flow && start_id != LOGIC_START {
            if existing.condition.is_none() || item.condition.is_none() {
                return Err(HubError::validation(
                    "Output is already connected.",
                ));
            }
        }
    }
    Ok(())
}

pub async fn add_logic_item(call: &Call<'_>, args: AddLogicItemArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;

    let catalog = ctx.type_catalog().await;
    let mut editing = ctx.editing.lock().await;
    let item = LogicItem {
        id: uid("lgi"),
        start: args.start,
        end: args.end,
        condition: args.condition,
    };
    {
        let scene = editing.scene()?;
        let project = editing.project()?;
        if !project.has_logic {
            return Err(HubError::precondition("Project has no logic."));
        }
        check_logic_item(scene, project, &catalog, &item)?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.project_mut()?.upsert_logic_item(item.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::LogicItemChanged(item),
        ChangeType::Add,
    )))
}

pub async fn update_logic_item(call: &Call<'_>, args: UpdateLogicItemArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;

    let catalog = ctx.type_catalog().await;
    let mut editing = ctx.editing.lock().await;
    let item = LogicItem {
        id: args.logic_item_id,
        start: args.start,
        end: args.end,
        condition: args.condition,
    };
    {
        let scene = editing.scene()?;
        let project = editing.project()?;
        project.logic_item(&item.id)?;
        check_logic_item(scene, project, &catalog, &item)?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.project_mut()?.upsert_logic_item(item.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::LogicItemChanged(item),
        ChangeType::Update,
    )))
}

pub async fn remove_logic_item(call: &Call<'_>, args: RemoveLogicItemArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;

    let mut editing = ctx.editing.lock().await;
    editing.project()?.logic_item(&args.logic_item_id)?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing
        .project_mut()?
        .remove_logic_item(&args.logic_item_id)?;
    Ok(Out::broadcast(Event::with_change(
        EventData::LogicItemChanged(removed),
        ChangeType::Remove,
    )))
}

// ----------------------------------------------------------------------
// constants

pub async fn add_constant(call: &Call<'_>, args: AddConstantArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    arhub_data::helpers::check_snake_case(&args.name)?;
    serde_json::from_str::<serde_json::Value>(&args.value)
        .map_err(|_| HubError::validation("Value is not valid JSON."))?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        let names: Vec<String> = project.constants().map(|c| c.name.clone()).collect();
        arhub_data::helpers::check_unique_name(&args.name, names.iter().map(String::as_str))?;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let constant = ProjectConstant {
        id: uid("cst"),
        name: args.name,
        const_type: args.const_type,
        value: args.value,
    };
    editing.project_mut()?.upsert_constant(constant.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::ProjectConstantChanged(constant),
        ChangeType::Add,
    )))
}

pub async fn update_constant(call: &Call<'_>, args: UpdateConstantArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.constant_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    let mut constant = editing.project()?.constant(&args.constant_id)?.clone();
    if let Some(name) = args.name {
        arhub_data::helpers::check_snake_case(&name)?;
        let names: Vec<String> = editing
            .project()?
            .constants()
            .filter(|c| c.id != constant.id)
            .map(|c| c.name.clone())
            .collect();
        arhub_data::helpers::check_unique_name(&name, names.iter().map(String::as_str))?;
        constant.name = name;
    }
    if let Some(value) = args.value {
        serde_json::from_str::<serde_json::Value>(&value)
            .map_err(|_| HubError::validation("Value is not valid JSON."))?;
        constant.value = value;
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    editing.project_mut()?.upsert_constant(constant.clone());
    Ok(Out::broadcast(Event::with_change(
        EventData::ProjectConstantChanged(constant),
        ChangeType::Update,
    )))
}

pub async fn remove_constant(call: &Call<'_>, args: RemoveConstantArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.constant_id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    {
        let project = editing.project()?;
        project.constant(&args.constant_id)?;
        for action in project.actions() {
            for param in &action.parameters {
                if param.kind == ActionParameterKind::Constant
                    && param.value == args.constant_id
                {
                    return Err(HubError::precondition(format!(
                        "Constant used by action {}.",
                        action.name
                    )));
                }
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let removed = editing.project_mut()?.remove_constant(&args.constant_id)?;
    Ok(Out::broadcast(Event::with_change(
        EventData::ProjectConstantChanged(removed),
        ChangeType::Remove,
    )))
}

// ----------------------------------------------------------------------
// overrides

async fn set_override(
    call: &Call<'_>,
    args: OverrideArgs,
    expect_present: Option<bool>,
    remove: bool,
) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    scene_stopped(ctx)?;
    ctx.ensure_locked(&args.id, call.client).await?;

    let mut editing = ctx.editing.lock().await;
    {
        let scene = editing.scene()?;
        let project = editing.project()?;
        let obj = scene.object(&args.id)?;
        let data = ctx.object_types.get(&obj.object_type).await?;
        match data.meta.setting(&args.override_parameter.name) {
            Some(setting) if setting.param_type == args.override_parameter.param_type => {}
            Some(_) => return Err(HubError::validation("Override has mismatched type.")),
            None => {
                return Err(HubError::validation(format!(
                    "Parameter {} does not exist on the type.",
                    args.override_parameter.name
                )))
            }
        }
        let present = project
            .overrides()
            .get(&args.id)
            .map(|params| {
                params
                    .iter()
                    .any(|p| p.name == args.override_parameter.name)
            })
            .unwrap_or(false);
        if let Some(expected) = expect_present {
            if expected && !present {
                return Err(HubError::precondition("Override not found."));
            }
            if !expected && present {
                return Err(HubError::validation("Override already exists."));
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let project = editing.project_mut()?;
    let mut params = project.overrides().get(&args.id).cloned().unwrap_or_default();
    params.retain(|p| p.name != args.override_parameter.name);
    if !remove {
        params.push(args.override_parameter);
    }
    project.set_override(&args.id, params);
    let mut bare = project.project();
    bare.action_points.clear();
    bare.logic.clear();
    Ok(Out::broadcast(Event::with_change(
        EventData::ProjectChanged(bare),
        ChangeType::Update,
    )))
}

pub async fn add_override(call: &Call<'_>, args: OverrideArgs) -> Result<Out> {
    set_override(call, args, Some(false), false).await
}

pub async fn update_override(call: &Call<'_>, args: OverrideArgs) -> Result<Out> {
    set_override(call, args, Some(true), false).await
}

pub async fn delete_override(call: &Call<'_>, args: OverrideArgs) -> Result<Out> {
    set_override(call, args, Some(true), true).await
}

// ----------------------------------------------------------------------
// editor-run actions

pub async fn execute_action(call: &Call<'_>, args: ExecuteActionArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    crate::dispatch::scene_started(ctx)?;

    let (object_id, action_name, params) = {
        let mut editing = ctx.editing.lock().await;
        if editing.running_action.is_some() {
            return Err(HubError::precondition("Action is running."));
        }
        let action = editing.project()?.action(&args.action_id)?.clone();
        let (object_id, action_name) = action.parse_type()?;
        let mut values = Vec::with_capacity(action.parameters.len());
        for param in &action.parameters {
            values.push(decode_parameter(&editing, param)?);
        }
        if call.dry_run {
            return Ok(Out::empty());
        }
        editing.running_action = Some(args.action_id.clone());
        (object_id, action_name, values)
    };

    let instance = ctx.runtime.instance(&object_id)?;
    let action_id = args.action_id.clone();
    let task_ctx = ctx.clone();
    let handle = tokio::spawn(async move {
        let outcome = instance.execute(&action_name, params).await;
        let mut editing = task_ctx.editing.lock().await;
        editing.running_action = None;
        let event = match outcome {
            Ok(result) => {
                editing
                    .prev_results
                    .insert(action_id.clone(), vec![result.clone()]);
                Event::new(EventData::ActionResult(ActionResultData {
                    action_id,
                    results: Some(vec![result.to_string()]),
                    error: None,
                }))
            }
            Err(e) => Event::new(EventData::ActionResult(ActionResultData {
                action_id,
                results: None,
                error: Some(e.to_string()),
            })),
        };
        drop(editing);
        task_ctx.broadcast(event);
    });
    *ctx.running_action_task.lock().expect("action task mutex") = Some(handle);

    Ok(Out::broadcast(Event::new(EventData::ActionExecution(
        ActionExecutionData {
            action_id: args.action_id,
        },
    ))))
}

fn decode_parameter(
    editing: &arhub::state::Editing,
    param: &ActionParameter,
) -> Result<serde_json::Value> {
    match param.kind {
        ActionParameterKind::Value => serde_json::from_str(&param.value)
            .map_err(|_| HubError::validation(format!("Parameter {} is not valid JSON.", param.name))),
        ActionParameterKind::Constant => {
            let constant = editing.project()?.constant(&param.value)?;
            serde_json::from_str(&constant.value)
                .map_err(|_| HubError::validation("Constant value is not valid JSON."))
        }
        ActionParameterKind::Link => {
            let link = param.parse_link()?;
            editing
                .prev_results
                .get(&link.action_id)
                .and_then(|results| results.get(link.output_index).cloned())
                .ok_or_else(|| {
                    HubError::precondition("Linked action has no result yet.")
                })
        }
    }
}

pub async fn cancel_action(call: &Call<'_>) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    {
        let mut editing = ctx.editing.lock().await;
        if editing.running_action.is_none() {
            return Err(HubError::precondition("No action is running."));
        }
        if call.dry_run {
            return Ok(Out::empty());
        }
        editing.running_action = None;
    }
    if let Some(handle) = ctx
        .running_action_task
        .lock()
        .expect("action task mutex")
        .take()
    {
        handle.abort();
    }
    Ok(Out::broadcast(Event::new(EventData::ActionCancelled)))
}
