//! Scene and project data model.
//!
//! Entities reference each other by id (no pointer cycles); the `arhub`
//! crate keeps indexed "cached" copies of the open scene/project built from
//! these types. Wire casing is lowerCamelCase via serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::math::{Orientation, Pose, Position};

/// Synthetic logic-graph source node.
pub const LOGIC_START: &str = "START";
/// Synthetic logic-graph sink node.
pub const LOGIC_END: &str = "END";
/// Name of the default action flow.
pub const DEFAULT_FLOW: &str = "default";

/// Generates an id: `<prefix>_<uuid4-hex>`.
pub fn uid(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid link value.")]
    InvalidLink,
    #[error("Action: {0} has invalid type: {1}.")]
    InvalidActionType(String, String),
    #[error("Outputs have to be unique.")]
    DuplicateOutputs,
}

/// Name/type/value triple used for scene-object parameters and overrides.
/// `value` is the JSON-encoded value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Pose>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<SceneObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_modified: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedOrientation {
    pub id: String,
    pub name: String,
    pub orientation: Orientation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Joint {
    pub name: String,
    pub value: f64,
}

impl Joint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Robot joints captured at an action point; invalidated when the AP (or an
/// ancestor) moves.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRobotJoints {
    pub id: String,
    pub name: String,
    pub robot_id: String,
    pub joints: Vec<Joint>,
    #[serde(default)]
    pub is_valid: bool,
}

/// Parsed `<action-id>/<flow-type>/<output-index>` link target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkToOutput {
    pub action_id: String,
    pub flow_type: String,
    pub output_index: usize,
}

/// Parses a link value; see [`LinkToOutput`].
pub fn parse_link(value: &str) -> Result<LinkToOutput, ModelError> {
    let mut parts = value.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(action_id), Some(flow), Some(idx), None) if !action_id.is_empty() => Ok(
            LinkToOutput {
                action_id: action_id.to_string(),
                flow_type: flow.to_string(),
                output_index: idx.parse().map_err(|_| ModelError::InvalidLink)?,
            },
        ),
        _ => Err(ModelError::InvalidLink),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionParameterKind {
    /// JSON-encoded literal value.
    Value,
    /// Reference to a project constant (value holds the constant id).
    Constant,
    /// Link to another action's flow output (value holds `id/flow/index`).
    Link,
}

impl Default for ActionParameterKind {
    fn default() -> Self {
        Self::Value
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "is_value_kind")]
    pub kind: ActionParameterKind,
}

fn is_value_kind(kind: &ActionParameterKind) -> bool {
    *kind == ActionParameterKind::Value
}

impl ActionParameter {
    pub fn parse_link(&self) -> Result<LinkToOutput, ModelError> {
        debug_assert_eq!(self.kind, ActionParameterKind::Link);
        parse_link(&self.value)
    }
}

/// A named flow carrying an action's typed outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(rename = "type", default = "default_flow")]
    pub flow_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

fn default_flow() -> String {
    DEFAULT_FLOW.to_string()
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            flow_type: default_flow(),
            outputs: Vec::new(),
        }
    }
}

impl Flow {
    /// Outputs must be unique within one flow.
    pub fn check(&self) -> Result<(), ModelError> {
        let mut seen = std::collections::HashSet::new();
        for out in &self.outputs {
            if !seen.insert(out.as_str()) {
                return Err(ModelError::DuplicateOutputs);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub name: String,
    /// `<scene-object-id>/<type-action-name>`.
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
}

impl Action {
    /// Splits `type` into (scene object id, type action name).
    pub fn parse_type(&self) -> Result<(String, String), ModelError> {
        let mut parts = self.action_type.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(obj), Some(act), None) if !obj.is_empty() && !act.is_empty() => {
                Ok((obj.to_string(), act.to_string()))
            }
            _ => Err(ModelError::InvalidActionType(
                self.id.clone(),
                self.action_type.clone(),
            )),
        }
    }

    pub fn flow(&self, flow_type: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.flow_type == flow_type)
    }

    pub fn parameter(&self, name: &str) -> Option<&ActionParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BareActionPoint {
    pub id: String,
    pub name: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPoint {
    pub id: String,
    pub name: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orientations: Vec<NamedOrientation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub robot_joints: Vec<ProjectRobotJoints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl ActionPoint {
    pub fn from_bare(bare: BareActionPoint) -> Self {
        Self {
            id: bare.id,
            name: bare.name,
            position: bare.position,
            parent: bare.parent,
            orientations: Vec::new(),
            robot_joints: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn bare(&self) -> BareActionPoint {
        BareActionPoint {
            id: self.id.clone(),
            name: self.name.clone(),
            position: self.position,
            parent: self.parent.clone(),
        }
    }
}

/// Equality guard on a linked value: `what` is a link, `value` a JSON literal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicCondition {
    pub what: String,
    pub value: String,
}

impl LogicCondition {
    pub fn parse_what(&self) -> Result<LinkToOutput, ModelError> {
        parse_link(&self.what)
    }
}

/// Directed edge of the action execution graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicItem {
    pub id: String,
    /// `START` or `<action-id>/<flow-type>` (bare action id implies the default flow).
    pub start: String,
    /// `END` or an action id.
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<LogicCondition>,
}

impl LogicItem {
    /// Splits `start` into (action id or `START`, flow type).
    pub fn parse_start(&self) -> (String, String) {
        match self.start.split_once('/') {
            Some((action_id, flow)) => (action_id.to_string(), flow.to_string()),
            None => (self.start.clone(), DEFAULT_FLOW.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConstant {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub const_type: String,
    pub value: String,
}

/// Read-only in the editor; carried for persistence round-trips.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFunction {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logic: Vec<LogicItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
}

/// Per-project replacement of one scene object's settings parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverride {
    pub id: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub scene_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub has_logic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_points: Vec<ActionPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<ProjectConstant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<ProjectFunction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logic: Vec<LogicItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_overrides: Vec<ProjectOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_modified: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Listing record for scenes/projects; projects carry validation flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdDesc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_carries_prefix() {
        let id = uid("pkg");
        assert!(id.starts_with("pkg_"));
        assert!(id.len() > 4 + 30);
    }

    #[test]
    fn link_parses_and_rejects() {
        let l = parse_link("act_1/default/0").unwrap();
        assert_eq!(l.action_id, "act_1");
        assert_eq!(l.flow_type, "default");
        assert_eq!(l.output_index, 0);
        assert!(parse_link("act_1/default").is_err());
        assert!(parse_link("act_1/default/x").is_err());
        assert!(parse_link("/default/0").is_err());
    }

    #[test]
    fn action_type_splits() {
        let act = Action {
            id: "a1".into(),
            name: "pick".into(),
            action_type: "obj_1/Pick".into(),
            parameters: vec![],
            flows: vec![],
        };
        assert_eq!(
            act.parse_type().unwrap(),
            ("obj_1".to_string(), "Pick".to_string())
        );
    }

    #[test]
    fn logic_start_defaults_flow() {
        let li = LogicItem {
            id: "l1".into(),
            start: "a1".into(),
            end: LOGIC_END.into(),
            condition: None,
        };
        assert_eq!(li.parse_start(), ("a1".to_string(), DEFAULT_FLOW.to_string()));

        let li2 = LogicItem {
            id: "l2".into(),
            start: "a1/other".into(),
            end: "a2".into(),
            condition: None,
        };
        assert_eq!(li2.parse_start(), ("a1".to_string(), "other".to_string()));
    }

    #[test]
    fn duplicate_flow_outputs_rejected() {
        let f = Flow {
            flow_type: DEFAULT_FLOW.into(),
            outputs: vec!["x".into(), "x".into()],
        };
        assert_eq!(f.check(), Err(ModelError::DuplicateOutputs));
    }

    #[test]
    fn scene_wire_casing_is_camel() {
        let scene = Scene {
            id: "s1".into(),
            name: "demo".into(),
            int_modified: Some(chrono::Utc::now()),
            ..Scene::default()
        };
        let json = serde_json::to_string(&scene).unwrap();
        assert!(json.contains("\"intModified\""));
        assert!(!json.contains("int_modified"));
    }

    #[test]
    fn action_parameter_kind_on_wire() {
        let p = ActionParameter {
            name: "x".into(),
            param_type: "integer".into(),
            value: "a1/default/0".into(),
            kind: ActionParameterKind::Link,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"kind\":\"link\""));
        // the default kind is omitted on the wire
        let p2 = ActionParameter {
            kind: ActionParameterKind::Value,
            value: "1".into(),
            ..p
        };
        assert!(!serde_json::to_string(&p2).unwrap().contains("kind"));
    }
}
