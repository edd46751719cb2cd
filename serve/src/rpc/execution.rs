//! Execution RPCs: build workflows and the pass-through set forwarded to the
//! execution runtime.

use serde_json::Value;

use arhub::error::{HubError, Result};
use arhub::exec;
use arhub_data::rpc::execution::{BuildProjectArgs, BuildProjectData, TemporaryPackageArgs};

use crate::dispatch::{project_needed, Call, Out};

pub async fn build_project(call: &Call<'_>, args: BuildProjectArgs) -> Result<Out> {
    let ctx = call.ctx;
    // the build service works on the stored project; unsaved changes would
    // silently not make it into the package
    {
        let editing = ctx.editing.lock().await;
        if let Some(project) = &editing.project {
            if project.id == args.project_id && project.has_changes() {
                return Err(HubError::precondition("Project has unsaved changes."));
            }
        }
    }
    if call.dry_run {
        return Ok(Out::empty());
    }
    let package_id =
        exec::build_and_upload_package(ctx, &args.project_id, &args.package_name).await?;
    Ok(Out::data(serde_json::to_value(BuildProjectData {
        package_id,
    })?))
}

pub async fn temporary_package(call: &Call<'_>, args: TemporaryPackageArgs) -> Result<Out> {
    let ctx = call.ctx;
    project_needed(ctx).await?;
    crate::dispatch::scene_stopped(ctx)?;
    if ctx.exec.package_running() {
        return Err(HubError::precondition("Package already running."));
    }

    let (project_id, project_name) = {
        let editing = ctx.editing.lock().await;
        let project = editing.project()?;
        if project.has_changes() {
            return Err(HubError::precondition("Project has unsaved changes."));
        }
        (project.id.clone(), project.name.clone())
    };
    if call.dry_run {
        return Ok(Out::empty());
    }

    let package_id = exec::build_and_upload_package(
        ctx,
        &project_id,
        &format!("temporary package for {project_name}"),
    )
    .await?;

    tokio::spawn(exec::run_temporary_package(
        ctx.clone(),
        package_id,
        args.start_paused,
        args.breakpoints,
    ));
    Ok(Out::empty())
}

/// Forwards a client frame to the execution runtime verbatim; the bridge
/// re-keys the id, the dispatcher re-attaches the client's one.
pub async fn pass_through(call: &Call<'_>, request: &str, args: Value) -> Result<Out> {
    let resp = call.ctx.exec.request(request, args).await?;
    if !resp.result {
        let messages = if resp.messages.is_empty() {
            vec![format!("{request} failed.")]
        } else {
            resp.messages
        };
        return Err(HubError::external("Execution unit", messages.join("\n")));
    }
    Ok(Out::data(resp.data))
}
