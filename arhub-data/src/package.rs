//! Execution-runtime data: package state and action-state snapshots the hub
//! caches and replays to newly connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    Running,
    Stopping,
    Stopped,
    Pausing,
    Paused,
    Resuming,
    Undefined,
}

impl Default for PackageState {
    fn default() -> Self {
        Self::Undefined
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStateData {
    #[serde(default)]
    pub state: PackageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfoData {
    pub package_id: String,
    pub package_name: String,
    pub scene: serde_json::Value,
    pub project: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Emitted by the runtime before an action executes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStateBeforeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

/// Emitted by the runtime after an action executed, with JSON-encoded results.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStateAfterData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_state_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&PackageState::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn package_state_data_round_trip() {
        let d = PackageStateData {
            state: PackageState::Stopped,
            package_id: Some("pkg_1".into()),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"packageId\":\"pkg_1\""));
        let back: PackageStateData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state, PackageState::Stopped);
    }
}
