//! Hub context: the explicit object passed to every handler in place of
//! global state. Owns the client registry, users, locks, object types, the
//! editing state, the scene runtime and the execution bridge, plus the
//! scene/project lifecycle orchestration that drives them together.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use arhub_data::common::{Parameter, Scene, SceneObject};
use arhub_data::events::{
    Event, EventData, LockData, MainScreen, OpenProjectData, OpenSceneData, SceneStateKind,
    ShowMainScreenData,
};
use arhub_data::math::Position;
use arhub_data::rpc::robot::RobotEventKind;
use env_config::Settings;

use crate::error::{HubError, Result};
use crate::exec::ExecutionBridge;
use crate::lock::{LockManager, LockNotification, PROJECT_LOCK_ID, SCENE_LOCK_ID, SERVER_OWNER};
use crate::notifications::ClientRegistry;
use crate::objtypes::{ObjectTypeData, ObjectTypeRegistry};
use crate::runtime::{InstanceFactory, SceneRuntime};
use crate::services::{
    BuildService, CalibrationService, ProjectStorage, SceneService, TypeIntrospector,
};
use crate::state::{parent_frame_origin, CachedProject, CachedScene, Editing};
use crate::users::Users;

/// One in-progress object-aiming session (per hub; the original allows one).
pub struct AimingSession {
    pub object_id: String,
    pub robot_id: String,
    pub end_effector: String,
    pub owner: String,
    pub poses: HashMap<usize, arhub_data::math::Pose>,
    pub point_count: usize,
}

/// External collaborators injected at startup.
pub struct Collaborators {
    pub storage: Arc<dyn ProjectStorage>,
    pub scene_service: Arc<dyn SceneService>,
    pub build_service: Arc<dyn BuildService>,
    pub calibration: Option<Arc<dyn CalibrationService>>,
    pub introspector: Arc<dyn TypeIntrospector>,
    pub factory: Arc<dyn InstanceFactory>,
}

pub struct Ctx {
    pub settings: Settings,
    pub clients: ClientRegistry,
    pub users: Users,
    pub lock: LockManager,
    pub object_types: ObjectTypeRegistry,
    pub editing: Mutex<Editing>,
    pub runtime: SceneRuntime,
    pub exec: ExecutionBridge,

    pub storage: Arc<dyn ProjectStorage>,
    pub scene_service: Arc<dyn SceneService>,
    pub build_service: Arc<dyn BuildService>,
    pub calibration: Option<Arc<dyn CalibrationService>>,
    pub introspector: Arc<dyn TypeIntrospector>,
    pub factory: Arc<dyn InstanceFactory>,

    /// What a freshly connected client should see when nothing is open.
    pub main_screen: std::sync::Mutex<ShowMainScreenData>,
    /// Robot-event stream registrations: robot id → subscribed clients.
    pub robot_streams: std::sync::Mutex<HashMap<(String, RobotEventKind), HashSet<Uuid>>>,
    pub aiming: Mutex<Option<AimingSession>>,
    /// Handle of the action currently executed from the editor.
    pub running_action_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub shutdown: tokio::sync::watch::Sender<bool>,
}

/// Channel ends consumed by the background tasks in [`spawn_background`].
pub struct Background {
    pub lock_notifications: mpsc::UnboundedReceiver<LockNotification>,
    pub exec_outbox: mpsc::UnboundedReceiver<String>,
}

impl Ctx {
    pub fn new(settings: Settings, collaborators: Collaborators) -> (Arc<Self>, Background) {
        let (lock, lock_notifications) = LockManager::new();
        let (exec, exec_outbox) = ExecutionBridge::new();
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let ctx = Arc::new(Self {
            settings,
            clients: ClientRegistry::new(),
            users: Users::new(),
            lock,
            object_types: ObjectTypeRegistry::new(),
            editing: Mutex::new(Editing::default()),
            runtime: SceneRuntime::new(),
            exec,
            storage: collaborators.storage,
            scene_service: collaborators.scene_service,
            build_service: collaborators.build_service,
            calibration: collaborators.calibration,
            introspector: collaborators.introspector,
            factory: collaborators.factory,
            main_screen: std::sync::Mutex::new(ShowMainScreenData {
                what: MainScreen::ScenesList,
                highlight: None,
            }),
            robot_streams: std::sync::Mutex::new(HashMap::new()),
            aiming: Mutex::new(None),
            running_action_task: std::sync::Mutex::new(None),
            shutdown,
        });
        (
            ctx,
            Background {
                lock_notifications,
                exec_outbox,
            },
        )
    }

    pub fn broadcast(&self, event: Event) {
        self.clients.broadcast_event(&event, None);
    }

    pub fn broadcast_except(&self, event: Event, exclude: Uuid) {
        self.clients.broadcast_event(&event, Some(exclude));
    }

    pub fn set_main_screen(&self, what: MainScreen, highlight: Option<String>) {
        *self.main_screen.lock().expect("main screen mutex") =
            ShowMainScreenData { what, highlight };
    }

    pub fn main_screen(&self) -> ShowMainScreenData {
        self.main_screen.lock().expect("main screen mutex").clone()
    }

    /// Name of the user behind a channel; required by every lock-taking RPC.
    pub fn user_name(&self, client: Uuid) -> Result<String> {
        self.users.user_name(client)
    }

    /// Advisory-lock assertion done by every mutating RPC.
    pub async fn ensure_locked(&self, object_id: &str, client: Uuid) -> Result<()> {
        let owner = self.user_name(client)?;
        if !self.lock.is_write_locked(object_id, &owner).await {
            return Err(HubError::locking(format!(
                "Object is not write locked <{object_id}>"
            )));
        }
        Ok(())
    }

    /// Snapshot of the type catalogue for validation passes.
    pub async fn type_catalog(&self) -> HashMap<String, Arc<ObjectTypeData>> {
        let mut map = HashMap::new();
        for meta in self.object_types.metas().await {
            if let Ok(data) = self.object_types.get(&meta.object_type).await {
                map.insert(meta.object_type, data);
            }
        }
        map
    }

    // ------------------------------------------------------------------
    // scene lifecycle

    /// Checks one object against its type: known, enabled, not abstract,
    /// pose presence, parameters complete and well-typed, snake_case name.
    pub async fn check_object(
        &self,
        scene: &CachedScene,
        obj: &SceneObject,
        new_one: bool,
    ) -> Result<()> {
        let data = self.object_types.get(&obj.object_type).await?;
        if data.meta.disabled {
            return Err(HubError::precondition("Object type disabled."));
        }
        if data.meta.is_abstract {
            return Err(HubError::precondition("Cannot instantiate abstract type."));
        }
        if data.meta.has_pose && obj.pose.is_none() {
            return Err(HubError::validation("Object requires pose."));
        }
        if !data.meta.has_pose && obj.pose.is_some() {
            return Err(HubError::validation("Object do not have pose."));
        }
        check_settings(&data, &obj.parameters)?;
        arhub_data::helpers::check_snake_case(&obj.name)?;
        if new_one {
            if scene.contains(&obj.id) {
                return Err(HubError::validation("Object with that id already exists."));
            }
            arhub_data::helpers::check_unique_name(&obj.name, scene.object_names())?;
        }
        Ok(())
    }

    /// Loads a scene from the store into the editing state.
    pub async fn open_scene(&self, scene_id: &str) -> Result<Scene> {
        let stored = self.storage.get_scene(scene_id).await?;
        let cached = CachedScene::new(stored)?;
        for obj in cached.objects() {
            self.check_object(&cached, obj, false)
                .await
                .map_err(|e| HubError::precondition(format!("Failed to open scene. {e}")))?;
        }
        let scene = cached.scene();
        let mut editing = self.editing.lock().await;
        editing.scene = Some(cached);
        editing.objects_with_updated_pose.clear();
        Ok(scene)
    }

    /// Persists the open scene and invalidates dependent joints snapshots.
    pub async fn save_scene(&self) -> Result<()> {
        let mut editing = self.editing.lock().await;
        let scene = editing.scene()?.scene();
        let stamp = self.storage.put_scene(&scene).await?;
        let updated: Vec<String> = editing.objects_with_updated_pose.drain().collect();
        if !updated.is_empty() {
            if let Some(project) = editing.project.as_mut() {
                let ap_ids: Vec<String> = project
                    .action_points()
                    .filter(|ap| {
                        updated
                            .iter()
                            .any(|obj| project.ap_ancestry_contains(&ap.id, obj))
                    })
                    .map(|ap| ap.id.clone())
                    .collect();
                for ap_id in ap_ids {
                    project.invalidate_joints(&ap_id);
                }
            }
        }
        editing.scene_mut()?.mark_saved(stamp);
        Ok(())
    }

    pub async fn close_scene(&self, force: bool) -> Result<String> {
        let mut editing = self.editing.lock().await;
        let scene = editing.scene()?;
        if !force && scene.has_changes() {
            return Err(HubError::precondition("Scene has unsaved changes."));
        }
        let scene_id = scene.id.clone();
        editing.scene = None;
        editing.objects_with_updated_pose.clear();
        drop(editing);
        self.set_main_screen(MainScreen::ScenesList, Some(scene_id.clone()));
        Ok(scene_id)
    }

    // ------------------------------------------------------------------
    // project lifecycle

    /// Loads a project (and its scene); AP positions are rewritten from
    /// parent-relative (stored form) to absolute (open form).
    pub async fn open_project(&self, project_id: &str) -> Result<(Scene, arhub_data::common::Project)> {
        let stored = self.storage.get_project(project_id).await?;
        let scene = self.open_scene(&stored.scene_id).await.map_err(|e| {
            HubError::precondition(format!("Failed to open project. {e}"))
        })?;
        let cached = CachedProject::new(stored)?;

        let mut editing = self.editing.lock().await;
        let converted = {
            let scene_ref = editing.scene()?;
            convert_ap_positions(scene_ref, cached, true)?
        };
        let project = converted.project();
        editing.project = Some(converted);
        Ok((scene, project))
    }

    /// Persists the open project; positions go back to parent-relative form.
    pub async fn save_project(&self) -> Result<()> {
        let mut editing = self.editing.lock().await;
        let relative = {
            let scene = editing.scene()?;
            let project = editing.project()?;
            let catalog = self.type_catalog().await;
            let problems = crate::state::project_problems(scene, project, &catalog);
            if !problems.is_empty() {
                tracing::debug!("saving project with problems: {problems:?}");
            }
            convert_positions_copy(scene, project, false)?
        };
        let stamp = self.storage.put_project(&relative).await?;
        editing.project_mut()?.mark_saved(stamp);
        Ok(())
    }

    pub async fn close_project(&self, force: bool) -> Result<String> {
        let mut editing = self.editing.lock().await;
        let project = editing.project()?;
        if !force && project.has_changes() {
            return Err(HubError::precondition("Project has unsaved changes."));
        }
        let project_id = project.id.clone();
        editing.project = None;
        editing.scene = None;
        editing.objects_with_updated_pose.clear();
        drop(editing);
        self.set_main_screen(MainScreen::ProjectsList, Some(project_id.clone()));
        Ok(project_id)
    }

    // ------------------------------------------------------------------
    // scene runtime transitions

    fn publish_scene_state(&self, state: SceneStateKind, message: Option<String>) {
        let data = self.runtime.set_state(state, message);
        self.broadcast(Event::new(EventData::SceneState(data)));
    }

    /// `StartScene` body, run as a background task after the handler's
    /// preconditions passed. Any failure folds back to stopped-with-message.
    pub async fn start_scene_task(self: Arc<Self>) {
        let to_lock = {
            let editing = self.editing.lock().await;
            let mut ids = vec![SCENE_LOCK_ID.to_string()];
            if editing.project.is_some() {
                ids.push(PROJECT_LOCK_ID.to_string());
            }
            ids
        };
        if let Err(e) = self.lock.write_lock(&to_lock, SERVER_OWNER, false).await {
            tracing::error!("Failed to start the scene. {e}");
            return;
        }
        // a concurrent transition may have won the lock first
        if !self.runtime.stopped() {
            let _ = self.lock.write_unlock(&to_lock, SERVER_OWNER).await;
            return;
        }

        let ok = self.run_scene_start().await;
        let _ = self.lock.write_unlock(&to_lock, SERVER_OWNER).await;
        if ok {
            tracing::info!("Scene started.");
        }
    }

    async fn run_scene_start(&self) -> bool {
        self.publish_scene_state(SceneStateKind::Starting, None);

        // clean slate: stop deletes all configurations and clears collisions
        if let Err(e) = self.scene_service.stop().await {
            tracing::error!("Failed to prepare for start: {e}");
            self.publish_scene_state(
                SceneStateKind::Stopped,
                Some("Failed to prepare for start.".to_string()),
            );
            return false;
        }

        let (objects, overrides) = {
            let editing = self.editing.lock().await;
            let scene = match editing.scene() {
                Ok(s) => s,
                Err(e) => {
                    self.publish_scene_state(SceneStateKind::Stopped, Some(e.to_string()));
                    return false;
                }
            };
            let overrides = editing
                .project
                .as_ref()
                .map(|p| p.overrides().clone())
                .unwrap_or_default();
            (scene.objects().cloned().collect::<Vec<_>>(), overrides)
        };

        // object initialization could take a while, run it in parallel
        let mut join_set = tokio::task::JoinSet::new();
        for obj in objects {
            let object_types = &self.object_types;
            let factory = self.factory.clone();
            let object_overrides = overrides.get(&obj.id).cloned();
            let family = match object_types.base_family(&obj.object_type).await {
                Ok(f) => f,
                Err(e) => {
                    self.fail_scene_start(e.to_string()).await;
                    return false;
                }
            };
            let data = match object_types.get(&obj.object_type).await {
                Ok(d) => d,
                Err(e) => {
                    self.fail_scene_start(e.to_string()).await;
                    return false;
                }
            };
            join_set.spawn(async move {
                let settings = merge_settings(&data.meta.settings, &obj.parameters, object_overrides);
                factory
                    .create(family, &obj, &data, settings)
                    .await
                    .map_err(|e| format!("Failed to initialize {}. {e}", obj.name))
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(instance)) => self.runtime.insert_instance(instance),
                Ok(Err(message)) => {
                    join_set.abort_all();
                    self.fail_scene_start(message).await;
                    return false;
                }
                Err(e) => {
                    join_set.abort_all();
                    self.fail_scene_start(format!("Instantiation task failed: {e}")).await;
                    return false;
                }
            }
        }

        // register collision models before going online
        for instance in self.runtime.instances() {
            let data = match self.object_types.get(instance.object_type()).await {
                Ok(d) => d,
                Err(_) => continue,
            };
            if let (Some(model), Some(pose)) = (&data.meta.object_model, instance.pose().await) {
                if let Err(e) = self
                    .scene_service
                    .upsert_collision(model, instance.id(), &pose)
                    .await
                {
                    self.fail_scene_start(e.to_string()).await;
                    return false;
                }
            }
        }

        if let Err(e) = self.scene_service.start().await {
            self.fail_scene_start(e.to_string()).await;
            return false;
        }

        self.publish_scene_state(SceneStateKind::Started, None);
        true
    }

    /// Best-effort cleanup of already-built instances, then stopped(message).
    async fn fail_scene_start(&self, message: String) {
        tracing::error!("Failed to create instances: {message}");
        for instance in self.runtime.instances() {
            if let Err(e) = instance.cleanup().await {
                tracing::warn!("Failed to cleanup {}. {e}", instance.name());
            }
        }
        self.runtime.clear_instances();
        let _ = self.scene_service.stop().await;
        self.publish_scene_state(SceneStateKind::Stopped, Some(message));
    }

    /// `StopScene` body, run as a background task.
    pub async fn stop_scene_task(self: Arc<Self>) {
        let to_lock = {
            let editing = self.editing.lock().await;
            let mut ids = vec![SCENE_LOCK_ID.to_string()];
            if editing.project.is_some() {
                ids.push(PROJECT_LOCK_ID.to_string());
            }
            ids
        };
        if let Err(e) = self.lock.write_lock(&to_lock, SERVER_OWNER, false).await {
            tracing::error!("Failed to stop the scene. {e}");
            return;
        }
        // a concurrent transition may have won the lock first
        if !self.runtime.started() {
            let _ = self.lock.write_unlock(&to_lock, SERVER_OWNER).await;
            return;
        }

        self.publish_scene_state(SceneStateKind::Stopping, None);

        let mut message = None;
        if let Err(e) = self.scene_service.stop().await {
            tracing::error!("Failed to go offline: {e}");
            message = Some(e.to_string());
        }

        let instances = self.runtime.instances();
        let mut cleanups = tokio::task::JoinSet::new();
        for instance in instances {
            cleanups.spawn(async move {
                let name = instance.name().to_string();
                (name, instance.cleanup().await)
            });
        }
        while let Some(joined) = cleanups.join_next().await {
            if let Ok((name, Err(e))) = joined {
                // cleanup failure is logged but does not block the transition
                tracing::error!("Failed to cleanup {name}. {e}");
                message.get_or_insert_with(|| e.to_string());
            }
        }
        self.runtime.clear_instances();
        *self.aiming.lock().await = None;

        self.publish_scene_state(SceneStateKind::Stopped, message);
        let _ = self.lock.write_unlock(&to_lock, SERVER_OWNER).await;
        tracing::info!("Scene stopped.");
    }

    // ------------------------------------------------------------------
    // connection lifecycle

    /// Welcome burst for a newly registered client (§ client registry):
    /// open project > open scene > running package snapshots > main screen.
    pub async fn welcome(&self, client: Uuid) {
        let editing = self.editing.lock().await;
        if let (Some(scene), Some(project)) = (&editing.scene, &editing.project) {
            self.clients.event(
                client,
                &Event::new(EventData::OpenProject(OpenProjectData {
                    scene: scene.scene(),
                    project: project.project(),
                })),
            );
            self.send_scene_state(client);
            return;
        }
        if let Some(scene) = &editing.scene {
            self.clients.event(
                client,
                &Event::new(EventData::OpenScene(OpenSceneData {
                    scene: scene.scene(),
                })),
            );
            self.send_scene_state(client);
            return;
        }
        drop(editing);

        if let Some(snapshots) = self.exec.replay_snapshots() {
            // ui expects this order of events
            for event in snapshots {
                self.clients.event(client, &event);
            }
            return;
        }

        self.clients.event(
            client,
            &Event::new(EventData::ShowMainScreen(self.main_screen())),
        );
    }

    fn send_scene_state(&self, client: Uuid) {
        self.clients.event(
            client,
            &Event::new(EventData::SceneState(self.runtime.state())),
        );
    }

    /// Disconnect: forget the user, release its locks, drop registrations.
    pub async fn disconnect(&self, client: Uuid) {
        self.clients.remove(client);
        {
            let mut streams = self.robot_streams.lock().expect("streams mutex");
            for subscribers in streams.values_mut() {
                subscribers.remove(&client);
            }
            streams.retain(|_, subscribers| !subscribers.is_empty());
        }
        if let Some(user_name) = self.users.logout(client) {
            let released = self.lock.release_all(&user_name).await;
            if !released.is_empty() {
                tracing::debug!(user = %user_name, "released {} locks on disconnect", released.len());
            }
            let mut aiming = self.aiming.lock().await;
            if aiming.as_ref().map(|a| a.owner == user_name).unwrap_or(false) {
                *aiming = None;
            }
        }
    }
}

/// Required settings must be covered and types must match the declaration.
fn check_settings(data: &ObjectTypeData, parameters: &[Parameter]) -> Result<()> {
    for setting in &data.meta.settings {
        if setting.default_value.is_none()
            && !parameters.iter().any(|p| p.name == setting.name)
        {
            return Err(HubError::validation(format!(
                "Required parameter {} is missing.",
                setting.name
            )));
        }
    }
    for param in parameters {
        match data.meta.setting(&param.name) {
            Some(setting) if setting.param_type == param.param_type => {
                serde_json::from_str::<serde_json::Value>(&param.value).map_err(|_| {
                    HubError::validation(format!("Parameter {} is not valid JSON.", param.name))
                })?;
            }
            Some(_) => {
                return Err(HubError::validation(format!(
                    "Type mismatch for parameter {}.",
                    param.name
                )))
            }
            None => {
                return Err(HubError::validation(format!(
                    "Unknown parameter {}.",
                    param.name
                )))
            }
        }
    }
    Ok(())
}

/// Settings for instantiation: type defaults, overridden by scene parameters,
/// overridden by project overrides.
fn merge_settings(
    declared: &[arhub_data::object_type::ParameterMeta],
    scene_parameters: &[Parameter],
    overrides: Option<Vec<Parameter>>,
) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = Vec::new();
    for setting in declared {
        let from_override = overrides
            .as_ref()
            .and_then(|o| o.iter().find(|p| p.name == setting.name));
        let from_scene = scene_parameters.iter().find(|p| p.name == setting.name);
        let value = from_override
            .or(from_scene)
            .map(|p| p.value.clone())
            .or_else(|| setting.default_value.clone());
        if let Some(value) = value {
            merged.push(Parameter {
                name: setting.name.clone(),
                param_type: setting.param_type.clone(),
                value,
            });
        }
    }
    merged
}

/// Rewrites AP positions between stored (parent-relative) and open
/// (absolute) form. `to_absolute == true` on open, `false` on save. All
/// target positions are computed against the frozen input state before any
/// are applied; representation changes do not count as edits.
fn convert_ap_positions(
    scene: &CachedScene,
    mut project: CachedProject,
    to_absolute: bool,
) -> Result<CachedProject> {
    let mut targets: Vec<(String, Position)> = Vec::new();
    for ap in project.action_points() {
        let Some(parent) = &ap.parent else { continue };
        let target = if to_absolute {
            // stored form: the parent chain accumulates to the absolute origin
            ap.position + parent_frame_origin(scene, &project, parent)?
        } else {
            // open form: parents hold absolute positions, one hop suffices
            ap.position - open_parent_origin(scene, &project, parent)?
        };
        targets.push((ap.id.clone(), target));
    }
    for (ap_id, position) in targets {
        project.set_ap_position_raw(&ap_id, position)?;
    }
    Ok(project)
}

/// Same conversion, returning a plain `Project` for persistence.
fn convert_positions_copy(
    scene: &CachedScene,
    project: &CachedProject,
    to_absolute: bool,
) -> Result<arhub_data::common::Project> {
    let cached = CachedProject::new(project.project())?;
    let converted = convert_ap_positions(scene, cached, to_absolute)?;
    Ok(converted.project())
}

/// Absolute origin of `parent` while the project is open (positions already
/// absolute): an AP parent contributes its own position, an object its pose.
fn open_parent_origin(
    scene: &CachedScene,
    project: &CachedProject,
    parent: &str,
) -> Result<Position> {
    if let Ok(ap) = project.bare_action_point(parent) {
        return Ok(ap.position);
    }
    let obj = scene.object(parent)?;
    obj.pose
        .as_ref()
        .map(|p| p.position)
        .ok_or_else(|| HubError::validation("Parent object has no pose."))
}

/// Background tasks: lock notification worker plus the execution bridge
/// client. Spawned once by the server binary.
pub fn spawn_background(ctx: Arc<Ctx>, background: Background) {
    let lock_ctx = ctx.clone();
    let mut lock_rx = background.lock_notifications;
    tokio::spawn(async move {
        while let Some(notification) = lock_rx.recv().await {
            let data = LockData {
                object_ids: notification.object_ids,
                owner: notification.owner,
            };
            let event = if notification.locked {
                Event::new(EventData::ObjectsLocked(data))
            } else {
                Event::new(EventData::ObjectsUnlocked(data))
            };
            lock_ctx.broadcast(event);
        }
    });

    let exec_ctx = ctx.clone();
    tokio::spawn(async move {
        crate::exec::run_bridge(exec_ctx, background.exec_outbox).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use arhub_data::object_type::ParameterMeta;

    fn meta(name: &str, param_type: &str, default: Option<&str>) -> ParameterMeta {
        ParameterMeta {
            name: name.into(),
            param_type: param_type.into(),
            default_value: default.map(Into::into),
            description: None,
        }
    }

    #[test]
    fn merge_settings_prefers_overrides() {
        let declared = vec![meta("speed", "double", Some("0.1")), meta("port", "integer", None)];
        let scene_params = vec![Parameter {
            name: "port".into(),
            param_type: "integer".into(),
            value: "5000".into(),
        }];
        let overrides = Some(vec![Parameter {
            name: "speed".into(),
            param_type: "double".into(),
            value: "0.9".into(),
        }]);
        let merged = merge_settings(&declared, &scene_params, overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, "0.9");
        assert_eq!(merged[1].value, "5000");
    }

    #[test]
    fn merge_settings_falls_back_to_default() {
        let declared = vec![meta("speed", "double", Some("0.1"))];
        let merged = merge_settings(&declared, &[], None);
        assert_eq!(merged[0].value, "0.1");
    }
}
