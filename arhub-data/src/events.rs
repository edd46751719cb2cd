//! Event catalogue: every unsolicited server → client notification.
//!
//! An event frame is `{"event": "<Name>", "data": ..., "changeType"?,
//! "parentId"?}`. The name is the variant name verbatim (PascalCase);
//! payloads live under `data`.

use serde::{Deserialize, Serialize};

use crate::common::{
    Action, BareActionPoint, Joint, LogicItem, NamedOrientation, Project, ProjectConstant,
    ProjectRobotJoints, Scene, SceneObject,
};
use crate::math::Pose;
use crate::object_type::ObjectTypeMeta;
use crate::package::{
    ActionStateAfterData, ActionStateBeforeData, PackageInfoData, PackageStateData, PackageSummary,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Update,
    Remove,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneStateKind {
    Stopped,
    Starting,
    Started,
    Stopping,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneStateData {
    pub state: SceneStateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainScreen {
    ScenesList,
    ProjectsList,
    PackagesList,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowMainScreenData {
    pub what: MainScreen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockData {
    pub object_ids: Vec<String>,
    pub owner: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSceneData {
    pub scene: Scene,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenProjectData {
    pub scene: Scene,
    pub project: Project,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveEventType {
    Start,
    End,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMoveToPoseData {
    pub move_event_type: MoveEventType,
    pub robot_id: String,
    pub end_effector_id: String,
    pub target_pose: Pose,
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMoveToJointsData {
    pub move_event_type: MoveEventType,
    pub robot_id: String,
    pub target_joints: Vec<Joint>,
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMoveToApOrientationData {
    pub move_event_type: MoveEventType,
    pub robot_id: String,
    pub end_effector_id: String,
    pub orientation_id: String,
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMoveToApJointsData {
    pub move_event_type: MoveEventType,
    pub robot_id: String,
    pub joints_id: String,
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EefPose {
    pub end_effector_id: String,
    pub pose: Pose,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotEefData {
    pub robot_id: String,
    pub end_effectors: Vec<EefPose>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotJointsData {
    pub robot_id: String,
    pub joints: Vec<Joint>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandTeachingModeData {
    pub robot_id: String,
    pub enabled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStateKind {
    Started,
    Finished,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStateData {
    pub id: String,
    pub state: ProcessStateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExecutionData {
    pub action_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResultData {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExceptionData {
    pub message: String,
    #[serde(rename = "type")]
    pub exception_type: String,
    #[serde(default)]
    pub handled: bool,
}

/// Typed event payloads; the variant name is the wire event name.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum EventData {
    // scene
    OpenScene(OpenSceneData),
    SceneChanged(Scene),
    SceneSaved,
    SceneClosed,
    SceneObjectChanged(SceneObject),
    SceneState(SceneStateData),
    // project
    OpenProject(OpenProjectData),
    ProjectChanged(Project),
    ProjectSaved,
    ProjectClosed,
    ActionPointChanged(BareActionPoint),
    ActionChanged(Action),
    LogicItemChanged(LogicItem),
    OrientationChanged(NamedOrientation),
    JointsChanged(ProjectRobotJoints),
    ProjectConstantChanged(ProjectConstant),
    // locks
    ObjectsLocked(LockData),
    ObjectsUnlocked(LockData),
    // session / registry
    ShowMainScreen(ShowMainScreenData),
    ChangedObjectTypes(Vec<ObjectTypeMeta>),
    ProcessState(ProcessStateData),
    // robot
    RobotMoveToPose(RobotMoveToPoseData),
    RobotMoveToJoints(RobotMoveToJointsData),
    RobotMoveToActionPointOrientation(RobotMoveToApOrientationData),
    RobotMoveToActionPointJoints(RobotMoveToApJointsData),
    RobotEef(RobotEefData),
    RobotJoints(RobotJointsData),
    HandTeachingMode(HandTeachingModeData),
    // editor-run actions
    ActionExecution(ActionExecutionData),
    ActionResult(ActionResultData),
    ActionCancelled,
    // execution runtime
    PackageState(PackageStateData),
    PackageInfo(PackageInfoData),
    PackageChanged(PackageSummary),
    ActionStateBefore(ActionStateBeforeData),
    ActionStateAfter(ActionStateAfterData),
    ProjectException(ProjectExceptionData),
}

/// Every event name the hub can emit, in catalogue order.
pub const EVENT_NAMES: [&str; 37] = [
    "OpenScene",
    "SceneChanged",
    "SceneSaved",
    "SceneClosed",
    "SceneObjectChanged",
    "SceneState",
    "OpenProject",
    "ProjectChanged",
    "ProjectSaved",
    "ProjectClosed",
    "ActionPointChanged",
    "ActionChanged",
    "LogicItemChanged",
    "OrientationChanged",
    "JointsChanged",
    "ProjectConstantChanged",
    "ObjectsLocked",
    "ObjectsUnlocked",
    "ShowMainScreen",
    "ChangedObjectTypes",
    "ProcessState",
    "RobotMoveToPose",
    "RobotMoveToJoints",
    "RobotMoveToActionPointOrientation",
    "RobotMoveToActionPointJoints",
    "RobotEef",
    "RobotJoints",
    "HandTeachingMode",
    "ActionExecution",
    "ActionResult",
    "ActionCancelled",
    "PackageState",
    "PackageInfo",
    "PackageChanged",
    "ActionStateBefore",
    "ActionStateAfter",
    "ProjectException",
];

/// A complete event frame: payload plus the optional `changeType` /
/// `parentId` decorations used by the `*Changed` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub data: EventData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Event {
    pub fn new(data: EventData) -> Self {
        Self {
            data,
            change_type: None,
            parent_id: None,
        }
    }

    pub fn with_change(data: EventData, change_type: ChangeType) -> Self {
        Self {
            data,
            change_type: Some(change_type),
            parent_id: None,
        }
    }

    pub fn with_parent(
        data: EventData,
        change_type: ChangeType,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            data,
            change_type: Some(change_type),
            parent_id: Some(parent_id.into()),
        }
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match &self.data {
            EventData::OpenScene(_) => "OpenScene",
            EventData::SceneChanged(_) => "SceneChanged",
            EventData::SceneSaved => "SceneSaved",
            EventData::SceneClosed => "SceneClosed",
            EventData::SceneObjectChanged(_) => "SceneObjectChanged",
            EventData::SceneState(_) => "SceneState",
            EventData::OpenProject(_) => "OpenProject",
            EventData::ProjectChanged(_) => "ProjectChanged",
            EventData::ProjectSaved => "ProjectSaved",
            EventData::ProjectClosed => "ProjectClosed",
            EventData::ActionPointChanged(_) => "ActionPointChanged",
            EventData::ActionChanged(_) => "ActionChanged",
            EventData::LogicItemChanged(_) => "LogicItemChanged",
            EventData::OrientationChanged(_) => "OrientationChanged",
            EventData::JointsChanged(_) => "JointsChanged",
            EventData::ProjectConstantChanged(_) => "ProjectConstantChanged",
            EventData::ObjectsLocked(_) => "ObjectsLocked",
            EventData::ObjectsUnlocked(_) => "ObjectsUnlocked",
            EventData::ShowMainScreen(_) => "ShowMainScreen",
            EventData::ChangedObjectTypes(_) => "ChangedObjectTypes",
            EventData::ProcessState(_) => "ProcessState",
            EventData::RobotMoveToPose(_) => "RobotMoveToPose",
            EventData::RobotMoveToJoints(_) => "RobotMoveToJoints",
            EventData::RobotMoveToActionPointOrientation(_) => {
                "RobotMoveToActionPointOrientation"
            }
            EventData::RobotMoveToActionPointJoints(_) => "RobotMoveToActionPointJoints",
            EventData::RobotEef(_) => "RobotEef",
            EventData::RobotJoints(_) => "RobotJoints",
            EventData::HandTeachingMode(_) => "HandTeachingMode",
            EventData::ActionExecution(_) => "ActionExecution",
            EventData::ActionResult(_) => "ActionResult",
            EventData::ActionCancelled => "ActionCancelled",
            EventData::PackageState(_) => "PackageState",
            EventData::PackageInfo(_) => "PackageInfo",
            EventData::PackageChanged(_) => "PackageChanged",
            EventData::ActionStateBefore(_) => "ActionStateBefore",
            EventData::ActionStateAfter(_) => "ActionStateAfter",
            EventData::ProjectException(_) => "ProjectException",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_event_has_no_data_key() {
        let evt = Event::new(EventData::SceneSaved);
        assert_eq!(
            serde_json::to_string(&evt).unwrap(),
            r#"{"event":"SceneSaved"}"#
        );
    }

    #[test]
    fn change_type_travels_lowercase() {
        let obj = SceneObject {
            id: "o1".into(),
            name: "box".into(),
            object_type: "Box".into(),
            pose: None,
            parameters: vec![],
        };
        let evt = Event::with_change(EventData::SceneObjectChanged(obj), ChangeType::Update);
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"event\":\"SceneObjectChanged\""));
        assert!(json.contains("\"changeType\":\"update\""));
    }

    #[test]
    fn parent_id_travels_camel() {
        let ori = NamedOrientation {
            id: "ori1".into(),
            name: "grip".into(),
            orientation: Default::default(),
        };
        let evt = Event::with_parent(
            EventData::OrientationChanged(ori),
            ChangeType::Add,
            "ap1",
        );
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"parentId\":\"ap1\""));
    }

    #[test]
    fn state_events_round_trip() {
        let evt = Event::new(EventData::SceneState(SceneStateData {
            state: SceneStateKind::Starting,
            message: None,
        }));
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"state\":\"Starting\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.data, EventData::SceneState(_)));
    }

    #[test]
    fn incoming_runtime_event_parses() {
        let json = r#"{"event":"PackageState","data":{"state":"running","packageId":"pkg_9"}}"#;
        let evt: Event = serde_json::from_str(json).unwrap();
        match &evt.data {
            EventData::PackageState(d) => {
                assert_eq!(d.package_id.as_deref(), Some("pkg_9"));
            }
            _ => panic!("expected PackageState"),
        }
        assert_eq!(evt.name(), "PackageState");
    }
}
