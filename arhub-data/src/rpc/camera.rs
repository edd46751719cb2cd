//! Camera RPCs: `CameraColorImage`, `CameraColorParameters`,
//! `CalibrateCamera`, `GetCameraPose`, `MarkersCorners`.

use serde::{Deserialize, Serialize};

use crate::math::Position;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraParameters {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dist_coefs: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCameraPoseArgs {
    pub camera_parameters: CameraParameters,
    /// Base64 encoded image.
    pub image: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkersCornersArgs {
    pub camera_parameters: CameraParameters,
    /// Base64 encoded image.
    pub image: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerCorners {
    pub marker_id: i32,
    pub corners: Vec<Position>,
}
