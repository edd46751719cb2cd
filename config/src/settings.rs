//! Typed hub settings read from `ARCOR2_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::LoadError;

/// All settings the hub consumes, with their documented defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Port the WebSocket server listens on (`ARCOR2_ARSERVER_PORT`).
    pub port: u16,
    /// Execution runtime WebSocket URL (`ARCOR2_EXECUTION_URL`).
    pub execution_url: String,
    /// Project (persistent store) service base URL (`ARCOR2_PROJECT_SERVICE_URL`).
    pub project_service_url: String,
    /// Scene (simulation) service base URL (`ARCOR2_SCENE_SERVICE_URL`).
    pub scene_service_url: String,
    /// Build service base URL (`ARCOR2_BUILD_URL`).
    pub build_url: String,
    /// Data directory for URDF packages (`ARCOR2_DATA_PATH`).
    pub data_path: PathBuf,
    /// Period of the robot joints/eef event streams (`ARCOR2_STREAMING_PERIOD`, seconds).
    pub streaming_period: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 6789,
            execution_url: "ws://0.0.0.0:6790".to_string(),
            project_service_url: "http://0.0.0.0:10000".to_string(),
            scene_service_url: "http://0.0.0.0:5013".to_string(),
            build_url: "http://0.0.0.0:5008".to_string(),
            data_path: PathBuf::from("/tmp/arserver"),
            streaming_period: Duration::from_millis(100),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, value: String) -> Result<T, LoadError> {
    value.parse().map_err(|_| LoadError::BadValue {
        key: key.to_string(),
        value,
    })
}

impl Settings {
    /// Reads settings from the process environment; unset keys fall back to defaults.
    pub fn from_env() -> Result<Self, LoadError> {
        let mut settings = Self::default();

        if let Ok(v) = std::env::var("ARCOR2_ARSERVER_PORT") {
            settings.port = parsed("ARCOR2_ARSERVER_PORT", v)?;
        }
        if let Ok(v) = std::env::var("ARCOR2_EXECUTION_URL") {
            settings.execution_url = v;
        }
        if let Ok(v) = std::env::var("ARCOR2_PROJECT_SERVICE_URL") {
            settings.project_service_url = v;
        }
        if let Ok(v) = std::env::var("ARCOR2_SCENE_SERVICE_URL") {
            settings.scene_service_url = v;
        }
        if let Ok(v) = std::env::var("ARCOR2_BUILD_URL") {
            settings.build_url = v;
        }
        if let Ok(v) = std::env::var("ARCOR2_DATA_PATH") {
            settings.data_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ARCOR2_STREAMING_PERIOD") {
            let secs: f64 = parsed("ARCOR2_STREAMING_PERIOD", v)?;
            settings.streaming_period = Duration::from_secs_f64(secs);
        }

        Ok(settings)
    }
}
