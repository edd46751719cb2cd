//! Lock RPCs: `ReadLock`, `WriteLock`, `ReadUnlock`, `WriteUnlock`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockArgs {
    pub object_id: String,
    /// Expand the lock to the whole subtree rooted at `object_id`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub lock_tree: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockArgs {
    pub object_id: String,
}
