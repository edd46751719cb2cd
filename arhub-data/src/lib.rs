//! Hub wire protocol and data model.
//!
//! This crate defines the wire shape of the three frame kinds (request,
//! response, event), the event catalogue, the typed RPC argument/payload
//! structs, and the scene/project data model they carry. It does not depend
//! on the hub runtime; the `arhub` crate builds its cached state and the
//! `serve` crate its dispatcher on top of these types.
//!
//! Wire fields are lowerCamelCase, internal fields snake_case; the serde
//! attributes on each struct do the conversion symmetrically. Enums travel
//! as their string value, timestamps as ISO-8601 UTC.

pub mod common;
pub mod events;
pub mod frame;
pub mod helpers;
pub mod math;
pub mod object_type;
pub mod package;
pub mod rpc;

pub use common::{
    uid, Action, ActionParameter, ActionParameterKind, ActionPoint, BareActionPoint, Flow,
    IdDesc, Joint, LinkToOutput, LogicCondition, LogicItem, NamedOrientation, Parameter, Project,
    ProjectConstant, ProjectFunction, ProjectOverride, ProjectRobotJoints, Scene, SceneObject,
    DEFAULT_FLOW, LOGIC_END, LOGIC_START,
};
pub use events::{ChangeType, Event, EventData};
pub use frame::{RequestFrame, ResponseFrame};
pub use math::{Orientation, Pose, Position};
pub use object_type::{
    CollisionModel, MeshFocusPoint, ObjectAction, ObjectActionParameter, ObjectTypeMeta,
    ParameterMeta, Pivot, RobotFeatures, RobotMeta,
};
pub use package::{
    ActionStateAfterData, ActionStateBeforeData, PackageInfoData, PackageState, PackageStateData,
    PackageSummary,
};
