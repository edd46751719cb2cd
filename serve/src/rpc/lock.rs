//! Lock RPCs: `ReadLock`, `WriteLock`, `ReadUnlock`, `WriteUnlock`.
//!
//! The lock manager emits `ObjectsLocked` / `ObjectsUnlocked` itself (via
//! the notification worker), so these handlers return no events.

use arhub::error::{HubError, Result};
use arhub::lock::{PROJECT_LOCK_ID, SCENE_LOCK_ID};
use arhub::state::lock_tree_closure;
use arhub_data::rpc::lock::{LockArgs, UnlockArgs};

use crate::dispatch::{Call, Out};

/// The id must name something lockable: the open scene's objects, the open
/// project's entities, an object type, or the scene/project pseudo-ids.
async fn check_lockable(call: &Call<'_>, object_id: &str) -> Result<()> {
    if object_id == SCENE_LOCK_ID || object_id == PROJECT_LOCK_ID {
        return Ok(());
    }
    if call.ctx.object_types.contains(object_id).await {
        return Ok(());
    }
    let editing = call.ctx.editing.lock().await;
    if let Some(scene) = &editing.scene {
        if scene.contains(object_id) {
            return Ok(());
        }
    }
    if let Some(project) = &editing.project {
        if project.bare_action_point(object_id).is_ok()
            || project.action(object_id).is_ok()
            || project.orientation(object_id).is_ok()
            || project.joints(object_id).is_ok()
            || project.constant(object_id).is_ok()
            || project.logic_item(object_id).is_ok()
        {
            return Ok(());
        }
    }
    Err(HubError::precondition(format!(
        "Unknown object id {object_id}."
    )))
}

/// Ids covered by a lock request, honoring the subtree flag.
async fn expand(call: &Call<'_>, object_id: &str, lock_tree: bool) -> Result<Vec<String>> {
    if !lock_tree {
        return Ok(vec![object_id.to_string()]);
    }
    let editing = call.ctx.editing.lock().await;
    Ok(lock_tree_closure(
        editing.project.as_ref(),
        &[object_id.to_string()],
    ))
}

pub async fn read_lock(call: &Call<'_>, args: LockArgs) -> Result<Out> {
    let owner = call.user_name()?;
    check_lockable(call, &args.object_id).await?;
    let ids = expand(call, &args.object_id, args.lock_tree).await?;
    call.ctx.lock.read_lock(&ids, &owner).await?;
    Ok(Out::empty())
}

pub async fn write_lock(call: &Call<'_>, args: LockArgs) -> Result<Out> {
    let owner = call.user_name()?;
    check_lockable(call, &args.object_id).await?;
    let ids = expand(call, &args.object_id, args.lock_tree).await?;
    call.ctx
        .lock
        .write_lock(&ids, &owner, args.lock_tree)
        .await?;
    Ok(Out::empty())
}

pub async fn read_unlock(call: &Call<'_>, args: UnlockArgs) -> Result<Out> {
    let owner = call.user_name()?;
    call.ctx
        .lock
        .read_unlock(&[args.object_id], &owner)
        .await?;
    Ok(Out::empty())
}

pub async fn write_unlock(call: &Call<'_>, args: UnlockArgs) -> Result<Out> {
    let owner = call.user_name()?;
    let ids = {
        // a tree lock is released with the same closure it was taken with
        let editing = call.ctx.editing.lock().await;
        lock_tree_closure(editing.project.as_ref(), &[args.object_id.clone()])
    };
    let held: Vec<String> = {
        let mut held = Vec::new();
        for id in ids {
            if call.ctx.lock.is_write_locked(&id, &owner).await {
                held.push(id);
            }
        }
        held
    };
    if held.is_empty() {
        return Err(HubError::cannot_unlock());
    }
    call.ctx.lock.write_unlock(&held, &owner).await?;
    Ok(Out::empty())
}
