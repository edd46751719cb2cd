//! Camera RPCs: color image/parameters from a live camera instance and the
//! calibration pass-throughs.

use arhub::error::{HubError, Result};
use arhub_data::rpc::camera::{GetCameraPoseArgs, MarkersCornersArgs};
use arhub_data::rpc::IdArgs;

use crate::dispatch::{scene_started, Call, Out};

fn not_a_camera() -> HubError {
    HubError::precondition("Not a camera.")
}

pub async fn camera_color_image(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    scene_started(call.ctx)?;
    let instance = call.ctx.runtime.instance(&args.id)?;
    let camera = instance.as_camera().ok_or_else(not_a_camera)?;
    let image = camera.color_image().await?;
    Ok(Out::data(serde_json::Value::String(image)))
}

pub async fn camera_color_parameters(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    scene_started(call.ctx)?;
    let instance = call.ctx.runtime.instance(&args.id)?;
    let camera = instance.as_camera().ok_or_else(not_a_camera)?;
    let parameters = camera.color_parameters().await?;
    Ok(Out::data(serde_json::to_value(parameters)?))
}

pub async fn calibrate_camera(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    let ctx = call.ctx;
    scene_started(ctx)?;
    let calibration = ctx
        .calibration
        .as_ref()
        .ok_or_else(|| HubError::external("Calibration service", "Not configured."))?;
    let instance = ctx.runtime.instance(&args.id)?;
    let camera = instance.as_camera().ok_or_else(not_a_camera)?;
    if call.dry_run {
        return Ok(Out::empty());
    }
    let image = camera.color_image().await?;
    let parameters = camera.color_parameters().await?;
    let pose = calibration.estimate_camera_pose(&parameters, &image).await?;
    Ok(Out::data(serde_json::to_value(pose)?))
}

pub async fn get_camera_pose(call: &Call<'_>, args: GetCameraPoseArgs) -> Result<Out> {
    let calibration = call
        .ctx
        .calibration
        .as_ref()
        .ok_or_else(|| HubError::external("Calibration service", "Not configured."))?;
    let pose = calibration
        .estimate_camera_pose(&args.camera_parameters, &args.image)
        .await?;
    Ok(Out::data(serde_json::to_value(pose)?))
}

pub async fn markers_corners(call: &Call<'_>, args: MarkersCornersArgs) -> Result<Out> {
    let calibration = call
        .ctx
        .calibration
        .as_ref()
        .ok_or_else(|| HubError::external("Calibration service", "Not configured."))?;
    let corners = calibration
        .markers_corners(&args.camera_parameters, &args.image)
        .await?;
    Ok(Out::data(serde_json::to_value(corners)?))
}
