//! Execution RPCs: `BuildProject`, `TemporaryPackage`, and the pass-through
//! set forwarded verbatim to the execution runtime (`UploadPackage`,
//! `ListPackages`, `DeletePackage`, `RenamePackage`, `RunPackage`,
//! `StopPackage`, `PausePackage`, `ResumePackage`, `StepAction`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Requests forwarded to the execution runtime without hub-side handling.
pub const PASS_THROUGH_RPCS: [&str; 9] = [
    "UploadPackage",
    "ListPackages",
    "DeletePackage",
    "RenamePackage",
    "RunPackage",
    "StopPackage",
    "PausePackage",
    "ResumePackage",
    "StepAction",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProjectArgs {
    pub project_id: String,
    pub package_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProjectData {
    pub package_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryPackageArgs {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub start_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<BTreeSet<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPackageArgs {
    /// Id of the execution package.
    pub id: String,
    /// Base64 encoded content of the zip file.
    pub data: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePackageArgs {
    pub package_id: String,
    pub new_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPackageArgs {
    pub id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub start_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<BTreeSet<String>>,
    #[serde(default = "default_true")]
    pub cleanup_after_run: bool,
}

fn default_true() -> bool {
    true
}
