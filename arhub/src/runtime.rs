//! Scene-runtime engine: the stopped → starting → started → stopping state
//! machine and the map of live object instances.
//!
//! Instantiation is polymorphic over the base family (Generic /
//! GenericWithPose / CollisionObject / Robot) through [`InstanceFactory`];
//! instances are held behind the [`LiveObject`] capability object and looked
//! up typed (`robot`, `camera`). The orchestration that drives the state
//! machine lives on the hub context; this module owns the mechanics.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use arhub_data::common::{Joint, Parameter, SceneObject};
use arhub_data::events::{SceneStateData, SceneStateKind};
use arhub_data::math::Pose;
use arhub_data::object_type::RobotFeatures;
use arhub_data::rpc::camera::CameraParameters;

use crate::error::{HubError, Result};
use crate::objtypes::{BaseFamily, ObjectTypeData};

/// Runtime capabilities common to every live instance.
#[async_trait]
pub trait LiveObject: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn object_type(&self) -> &str;
    async fn pose(&self) -> Option<Pose>;
    async fn set_pose(&self, pose: Pose) -> Result<()>;
    async fn cleanup(&self) -> Result<()>;
    /// Invokes one of the type's actions with decoded parameter values.
    async fn execute(
        &self,
        action_name: &str,
        parameters: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let _ = (action_name, parameters);
        Err(HubError::precondition("Object does not support actions."))
    }
    fn as_robot(&self) -> Option<&dyn RobotInstance> {
        None
    }
    fn as_camera(&self) -> Option<&dyn CameraInstance> {
        None
    }
}

/// Robot capability object; absence of a feature is checked against the
/// type's [`RobotFeatures`] before any of these is called.
#[async_trait]
pub trait RobotInstance: Send + Sync {
    fn features(&self) -> RobotFeatures;
    async fn end_effectors(&self) -> Result<Vec<String>>;
    async fn end_effector_pose(&self, end_effector: &str) -> Result<Pose>;
    async fn grippers(&self) -> Result<Vec<String>>;
    async fn suctions(&self) -> Result<Vec<String>>;
    async fn robot_joints(&self) -> Result<Vec<Joint>>;
    fn move_in_progress(&self) -> bool;
    async fn move_to_pose(&self, end_effector: &str, pose: &Pose, speed: f64, safe: bool)
        -> Result<()>;
    async fn move_to_joints(&self, joints: &[Joint], speed: f64, safe: bool) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn inverse_kinematics(
        &self,
        end_effector: &str,
        pose: &Pose,
        start_joints: Option<&[Joint]>,
        avoid_collisions: bool,
    ) -> Result<Vec<Joint>>;
    async fn forward_kinematics(&self, end_effector: &str, joints: &[Joint]) -> Result<Pose>;
    async fn set_hand_teaching_mode(&self, enabled: bool) -> Result<()>;
}

#[async_trait]
pub trait CameraInstance: Send + Sync {
    async fn color_image(&self) -> Result<String>;
    async fn color_parameters(&self) -> Result<CameraParameters>;
}

/// Builds a live instance for one scene object; keyed by base family.
#[async_trait]
pub trait InstanceFactory: Send + Sync {
    async fn create(
        &self,
        family: BaseFamily,
        object: &SceneObject,
        object_type: &ObjectTypeData,
        settings: Vec<Parameter>,
    ) -> Result<Arc<dyn LiveObject>>;
}

pub struct SceneRuntime {
    state: std::sync::Mutex<SceneStateData>,
    instances: DashMap<String, Arc<dyn LiveObject>>,
}

impl Default for SceneRuntime {
    fn default() -> Self {
        Self {
            state: std::sync::Mutex::new(SceneStateData {
                state: SceneStateKind::Stopped,
                message: None,
            }),
            instances: DashMap::new(),
        }
    }
}

impl SceneRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SceneStateData {
        self.state.lock().expect("runtime state mutex").clone()
    }

    /// Sets the new state and returns it for broadcasting.
    pub fn set_state(&self, state: SceneStateKind, message: Option<String>) -> SceneStateData {
        let data = SceneStateData { state, message };
        *self.state.lock().expect("runtime state mutex") = data.clone();
        data
    }

    pub fn started(&self) -> bool {
        self.state().state == SceneStateKind::Started
    }

    pub fn stopped(&self) -> bool {
        self.state().state == SceneStateKind::Stopped
    }

    /// Editing is allowed only while the runtime is fully stopped.
    pub fn can_modify(&self) -> Result<()> {
        if self.stopped() {
            Ok(())
        } else {
            Err(HubError::precondition(
                "Modifications can be only done offline.",
            ))
        }
    }

    pub fn ensure_started(&self) -> Result<()> {
        if self.started() {
            Ok(())
        } else {
            Err(HubError::precondition("Scene offline."))
        }
    }

    pub fn insert_instance(&self, instance: Arc<dyn LiveObject>) {
        self.instances.insert(instance.id().to_string(), instance);
    }

    pub fn remove_instance(&self, id: &str) -> Option<Arc<dyn LiveObject>> {
        self.instances.remove(id).map(|(_, v)| v)
    }

    pub fn instances(&self) -> Vec<Arc<dyn LiveObject>> {
        self.instances.iter().map(|e| e.value().clone()).collect()
    }

    pub fn clear_instances(&self) {
        self.instances.clear();
    }

    pub fn instance(&self, id: &str) -> Result<Arc<dyn LiveObject>> {
        self.instances
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| HubError::precondition("Unknown object ID."))
    }

    /// Typed lookup; fails when the object exists but is not a robot.
    pub fn robot(&self, id: &str) -> Result<Arc<dyn LiveObject>> {
        let instance = self.instance(id)?;
        if instance.as_robot().is_none() {
            return Err(HubError::precondition(format!(
                "{} is not a robot.",
                instance.name()
            )));
        }
        Ok(instance)
    }
}

// ----------------------------------------------------------------------
// virtual instances: kinematic stubs backing the default runtime and tests

pub struct VirtualObject {
    id: String,
    name: String,
    object_type: String,
    pose: Mutex<Option<Pose>>,
}

#[async_trait]
impl LiveObject for VirtualObject {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn object_type(&self) -> &str {
        &self.object_type
    }

    async fn pose(&self) -> Option<Pose> {
        *self.pose.lock().await
    }

    async fn set_pose(&self, pose: Pose) -> Result<()> {
        let mut guard = self.pose.lock().await;
        if guard.is_none() {
            return Err(HubError::precondition("Object does not have pose."));
        }
        *guard = Some(pose);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _action_name: &str,
        _parameters: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

pub struct VirtualRobot {
    id: String,
    name: String,
    object_type: String,
    pose: Mutex<Pose>,
    joints: Mutex<Vec<Joint>>,
    moving: std::sync::atomic::AtomicBool,
    hand_teaching: std::sync::atomic::AtomicBool,
    /// Simulated per-move travel time at full speed.
    pub move_duration: std::time::Duration,
}

impl VirtualRobot {
    pub fn new(id: impl Into<String>, name: impl Into<String>, object_type: impl Into<String>, pose: Pose) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            object_type: object_type.into(),
            pose: Mutex::new(pose),
            joints: Mutex::new(
                (1..=6).map(|i| Joint::new(format!("joint_{i}"), 0.0)).collect(),
            ),
            moving: std::sync::atomic::AtomicBool::new(false),
            hand_teaching: std::sync::atomic::AtomicBool::new(false),
            move_duration: std::time::Duration::from_millis(20),
        }
    }

    pub const EEF: &'static str = "default";
}

#[async_trait]
impl LiveObject for VirtualRobot {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn object_type(&self) -> &str {
        &self.object_type
    }

    async fn pose(&self) -> Option<Pose> {
        Some(*self.pose.lock().await)
    }

    async fn set_pose(&self, pose: Pose) -> Result<()> {
        *self.pose.lock().await = pose;
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _action_name: &str,
        _parameters: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn as_robot(&self) -> Option<&dyn RobotInstance> {
        Some(self)
    }
}

#[async_trait]
impl RobotInstance for VirtualRobot {
    fn features(&self) -> RobotFeatures {
        RobotFeatures {
            move_to_pose: true,
            move_to_joints: true,
            stop: true,
            inverse_kinematics: false,
            forward_kinematics: false,
            hand_teaching: true,
        }
    }

    async fn end_effectors(&self) -> Result<Vec<String>> {
        Ok(vec![Self::EEF.to_string()])
    }

    async fn end_effector_pose(&self, end_effector: &str) -> Result<Pose> {
        if end_effector != Self::EEF {
            return Err(HubError::precondition("Unknown end effector."));
        }
        Ok(*self.pose.lock().await)
    }

    async fn grippers(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn suctions(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn robot_joints(&self) -> Result<Vec<Joint>> {
        Ok(self.joints.lock().await.clone())
    }

    fn move_in_progress(&self) -> bool {
        self.moving.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn move_to_pose(
        &self,
        end_effector: &str,
        pose: &Pose,
        speed: f64,
        _safe: bool,
    ) -> Result<()> {
        if end_effector != Self::EEF {
            return Err(HubError::precondition("Unknown end effector."));
        }
        if !(0.0..=1.0).contains(&speed) || speed == 0.0 {
            return Err(HubError::validation("Invalid speed."));
        }
        self.moving
            .store(true, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(self.move_duration.mul_f64(1.0 / speed)).await;
        *self.pose.lock().await = *pose;
        self.moving
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn move_to_joints(&self, joints: &[Joint], speed: f64, _safe: bool) -> Result<()> {
        if !(0.0..=1.0).contains(&speed) || speed == 0.0 {
            return Err(HubError::validation("Invalid speed."));
        }
        self.moving
            .store(true, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(self.move_duration.mul_f64(1.0 / speed)).await;
        *self.joints.lock().await = joints.to_vec();
        self.moving
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.move_in_progress() {
            return Err(HubError::precondition("Robot is not moving."));
        }
        self.moving
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn inverse_kinematics(
        &self,
        _end_effector: &str,
        _pose: &Pose,
        _start_joints: Option<&[Joint]>,
        _avoid_collisions: bool,
    ) -> Result<Vec<Joint>> {
        Err(HubError::precondition("Robot does not support IK."))
    }

    async fn forward_kinematics(&self, _end_effector: &str, _joints: &[Joint]) -> Result<Pose> {
        Err(HubError::precondition("Robot does not support FK."))
    }

    async fn set_hand_teaching_mode(&self, enabled: bool) -> Result<()> {
        self.hand_teaching
            .store(enabled, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Default factory: virtual instances for every family.
pub struct VirtualFactory;

#[async_trait]
impl InstanceFactory for VirtualFactory {
    async fn create(
        &self,
        family: BaseFamily,
        object: &SceneObject,
        _object_type: &ObjectTypeData,
        _settings: Vec<Parameter>,
    ) -> Result<Arc<dyn LiveObject>> {
        match family {
            BaseFamily::Robot => {
                let pose = object.pose.ok_or_else(|| {
                    HubError::precondition("Object requires pose.")
                })?;
                Ok(Arc::new(VirtualRobot::new(
                    object.id.clone(),
                    object.name.clone(),
                    object.object_type.clone(),
                    pose,
                )))
            }
            BaseFamily::GenericWithPose | BaseFamily::CollisionObject => {
                let pose = object.pose.ok_or_else(|| {
                    HubError::precondition("Object requires pose.")
                })?;
                Ok(Arc::new(VirtualObject {
                    id: object.id.clone(),
                    name: object.name.clone(),
                    object_type: object.object_type.clone(),
                    pose: Mutex::new(Some(pose)),
                }))
            }
            BaseFamily::Generic => Ok(Arc::new(VirtualObject {
                id: object.id.clone(),
                name: object.name.clone(),
                object_type: object.object_type.clone(),
                pose: Mutex::new(None),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arhub_data::math::Position;

    #[tokio::test]
    async fn state_machine_starts_stopped() {
        let rt = SceneRuntime::new();
        assert!(rt.stopped());
        assert!(rt.can_modify().is_ok());
        assert!(rt.ensure_started().is_err());
    }

    #[tokio::test]
    async fn started_blocks_modification() {
        let rt = SceneRuntime::new();
        rt.set_state(SceneStateKind::Started, None);
        let err = rt.can_modify().unwrap_err();
        assert_eq!(err.to_string(), "Modifications can be only done offline.");
        assert!(rt.ensure_started().is_ok());
    }

    #[tokio::test]
    async fn typed_lookup_rejects_non_robot() {
        let rt = SceneRuntime::new();
        rt.insert_instance(Arc::new(VirtualObject {
            id: "o1".into(),
            name: "box".into(),
            object_type: "Box".into(),
            pose: Mutex::new(None),
        }));
        assert!(rt.instance("o1").is_ok());
        assert!(rt.robot("o1").is_err());
        assert!(rt.instance("missing").is_err());
    }

    #[tokio::test]
    async fn virtual_robot_moves_and_stops() {
        let robot = VirtualRobot::new("r1", "bot", "VBot", Pose::default());
        let target = Pose::new(Position::new(0.1, 0.2, 0.3), Default::default());
        robot
            .move_to_pose(VirtualRobot::EEF, &target, 1.0, true)
            .await
            .unwrap();
        let pose = robot.end_effector_pose(VirtualRobot::EEF).await.unwrap();
        assert!(pose.position.approx_eq(&target.position));
        assert!(robot.stop().await.is_err());
    }

    #[tokio::test]
    async fn invalid_speed_is_rejected() {
        let robot = VirtualRobot::new("r1", "bot", "VBot", Pose::default());
        let r = robot
            .move_to_pose(VirtualRobot::EEF, &Pose::default(), 0.0, true)
            .await;
        assert!(r.is_err());
        let r = robot.move_to_joints(&[], 1.5, true).await;
        assert!(r.is_err());
    }
}
