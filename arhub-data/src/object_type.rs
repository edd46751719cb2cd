//! Object-type metadata: the capability descriptor the hub keeps instead of
//! introspecting live classes. Produced by the (external) type introspector,
//! cached by the registry, delivered to clients as-is.

use serde::{Deserialize, Serialize};

use crate::math::Position;

/// Base families the inheritance chain of every type terminates at.
pub const BUILT_IN_TYPES: [&str; 4] = ["Generic", "GenericWithPose", "CollisionObject", "Robot"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollisionModel {
    #[serde(rename_all = "camelCase")]
    Box {
        size_x: f64,
        size_y: f64,
        size_z: f64,
    },
    #[serde(rename_all = "camelCase")]
    Cylinder { radius: f64, height: f64 },
    #[serde(rename_all = "camelCase")]
    Sphere { radius: f64 },
    #[serde(rename_all = "camelCase")]
    Mesh {
        asset_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        focus_points: Vec<MeshFocusPoint>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshFocusPoint {
    pub id: String,
    pub position: Position,
}

/// Pivot used when updating an object pose from a robot end effector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pivot {
    Top,
    Middle,
    Bottom,
}

/// One settings field of an object type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectActionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Constraint such as an allowed-values list, JSON-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub composite: bool,
    #[serde(default)]
    pub blackbox: bool,
    #[serde(default)]
    pub cancellable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ObjectActionParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<String>,
    /// Type the action was first defined on (filled by ancestor propagation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origins: Option<String>,
    #[serde(default)]
    pub meta: ActionMetadata,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeMeta {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub has_pose: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub built_in: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<ParameterMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_model: Option<CollisionModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_parent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl ObjectTypeMeta {
    pub fn setting(&self, name: &str) -> Option<&ParameterMeta> {
        self.settings.iter().find(|s| s.name == name)
    }
}

/// Which optional robot capabilities a concrete robot type actually overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotFeatures {
    #[serde(default)]
    pub move_to_pose: bool,
    #[serde(default)]
    pub move_to_joints: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub inverse_kinematics: bool,
    #[serde(default)]
    pub forward_kinematics: bool,
    #[serde(default)]
    pub hand_teaching: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMeta {
    #[serde(rename = "type")]
    pub robot_type: String,
    #[serde(default)]
    pub features: RobotFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urdf_package_filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_model_wire_shape() {
        let m = CollisionModel::Box {
            size_x: 0.1,
            size_y: 0.2,
            size_z: 0.3,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"type\":\"box\""));
        assert!(json.contains("\"sizeZ\":0.3"));
        let back: CollisionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn meta_abstract_rename() {
        let meta = ObjectTypeMeta {
            object_type: "Robot".into(),
            is_abstract: true,
            built_in: true,
            ..ObjectTypeMeta::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"abstract\":true"));
        assert!(json.contains("\"type\":\"Robot\""));
    }

    #[test]
    fn pivot_is_uppercase_on_wire() {
        assert_eq!(serde_json::to_string(&Pivot::Top).unwrap(), "\"TOP\"");
    }
}
