//! Object-type RPCs: `GetObjectTypes`, `GetActions`, `NewObjectType`,
//! `UpdateObjectModel`, `DeleteObjectTypes`, `ObjectTypeUsage`, `GetRobotMeta`.

use serde::{Deserialize, Serialize};

use crate::object_type::CollisionModel;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetActionsArgs {
    #[serde(rename = "type")]
    pub object_type: String,
}

/// `NewObjectType` takes the full meta of the new type; the hub validates
/// the name, the base chain and the model, then registers it with the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectModelArgs {
    pub object_type_id: String,
    pub object_model: CollisionModel,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObjectTypesArgs {
    /// When empty, every deletable (unused, not built-in) type is removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

/// Scene ids that contain an object of the given type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub scenes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
}
