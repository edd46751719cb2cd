//! Adapters to the external collaborators: persistent project store, scene
//! simulation service, build service, camera calibration service, and the
//! object-type introspector. Each is a narrow async trait with a
//! reqwest-backed implementation; tests plug in mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arhub_data::common::{IdDesc, Project, Scene};
use arhub_data::math::Pose;
use arhub_data::object_type::{CollisionModel, ObjectAction, ObjectTypeMeta};
use arhub_data::rpc::camera::{CameraParameters, MarkerCorners};

use crate::error::{HubError, Result};

/// Stored object-type record as the project store keeps it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeRecord {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<CollisionModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Introspection result for one object type.
#[derive(Clone, Debug)]
pub struct IntrospectedType {
    pub meta: ObjectTypeMeta,
    pub actions: Vec<ObjectAction>,
    pub robot_features: Option<arhub_data::object_type::RobotFeatures>,
}

/// Adapter over the out-of-scope object-type-source parser.
#[async_trait]
pub trait TypeIntrospector: Send + Sync {
    async fn introspect(&self, record: &ObjectTypeRecord) -> Result<IntrospectedType>;
}

/// CRUD over scenes, projects and object-type sources.
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    async fn list_scenes(&self) -> Result<Vec<IdDesc>>;
    async fn get_scene(&self, id: &str) -> Result<Scene>;
    /// Returns the store's `modified` stamp of the saved copy.
    async fn put_scene(&self, scene: &Scene) -> Result<Option<chrono::DateTime<chrono::Utc>>>;
    async fn delete_scene(&self, id: &str) -> Result<()>;

    async fn list_projects(&self) -> Result<Vec<IdDesc>>;
    async fn get_project(&self, id: &str) -> Result<Project>;
    async fn put_project(&self, project: &Project)
        -> Result<Option<chrono::DateTime<chrono::Utc>>>;
    async fn delete_project(&self, id: &str) -> Result<()>;

    async fn list_object_types(&self) -> Result<Vec<ObjectTypeRecord>>;
    async fn put_object_type(&self, record: &ObjectTypeRecord) -> Result<()>;
    async fn delete_object_type(&self, id: &str) -> Result<()>;
}

/// Collision/visualisation service for the started scene.
#[async_trait]
pub trait SceneService: Send + Sync {
    async fn start(&self) -> Result<()>;
    /// Deletes all registered collisions as a side effect.
    async fn stop(&self) -> Result<()>;
    async fn started(&self) -> Result<bool>;
    async fn upsert_collision(&self, model: &CollisionModel, id: &str, pose: &Pose)
        -> Result<()>;
    async fn delete_collision(&self, id: &str) -> Result<()>;
    /// Updates an object's pose after aiming finished.
    async fn focus(&self, id: &str, pose: &Pose) -> Result<Pose>;
}

/// Project → runnable package archive.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Returns the zip bytes of the published package.
    async fn publish(&self, project_id: &str, package_name: &str) -> Result<Vec<u8>>;
}

/// Camera calibration collaborator.
#[async_trait]
pub trait CalibrationService: Send + Sync {
    async fn estimate_camera_pose(
        &self,
        parameters: &CameraParameters,
        image_b64: &str,
    ) -> Result<Pose>;
    async fn markers_corners(
        &self,
        parameters: &CameraParameters,
        image_b64: &str,
    ) -> Result<Vec<MarkerCorners>>;
}

/// Shape of a pre-parsed descriptor document stored as a type's source.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorDoc {
    meta: ObjectTypeMeta,
    #[serde(default)]
    actions: Vec<ObjectAction>,
    #[serde(default)]
    robot_features: Option<arhub_data::object_type::RobotFeatures>,
}

/// Production introspector: the actual source parser is a separate
/// collaborator, so the store ships pre-parsed descriptor documents and
/// this adapter only decodes them.
pub struct DescriptorIntrospector;

#[async_trait]
impl TypeIntrospector for DescriptorIntrospector {
    async fn introspect(&self, record: &ObjectTypeRecord) -> Result<IntrospectedType> {
        if record.source.is_empty() {
            return Err(HubError::validation("Type has no source."));
        }
        let doc: DescriptorDoc = serde_json::from_str(&record.source)
            .map_err(|e| HubError::validation(format!("Source does not parse: {e}.")))?;
        if doc.meta.object_type != record.id {
            return Err(HubError::validation("Descriptor name mismatch."));
        }
        Ok(IntrospectedType {
            meta: doc.meta,
            actions: doc.actions,
            robot_features: doc.robot_features,
        })
    }
}

// ----------------------------------------------------------------------
// reqwest-backed implementations

fn external(collaborator: &'static str, e: reqwest::Error) -> HubError {
    HubError::external(collaborator, e.to_string())
}

async fn check(collaborator: &'static str, resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(HubError::external(
        collaborator,
        format!("{status}: {body}"),
    ))
}

pub struct RestProjectStorage {
    base: String,
    client: reqwest::Client,
}

impl RestProjectStorage {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }
}

const STORE: &str = "Project service";

#[async_trait]
impl ProjectStorage for RestProjectStorage {
    async fn list_scenes(&self) -> Result<Vec<IdDesc>> {
        let resp = self
            .client
            .get(self.url("/scenes"))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn get_scene(&self, id: &str) -> Result<Scene> {
        let resp = self
            .client
            .get(self.url(&format!("/scene/{id}")))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn put_scene(&self, scene: &Scene) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let resp = self
            .client
            .put(self.url("/scene"))
            .json(scene)
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn delete_scene(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/scene/{id}")))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp).await.map(|_| ())
    }

    async fn list_projects(&self) -> Result<Vec<IdDesc>> {
        let resp = self
            .client
            .get(self.url("/projects"))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        let resp = self
            .client
            .get(self.url(&format!("/project/{id}")))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn put_project(
        &self,
        project: &Project,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let resp = self
            .client
            .put(self.url("/project"))
            .json(project)
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/project/{id}")))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp).await.map(|_| ())
    }

    async fn list_object_types(&self) -> Result<Vec<ObjectTypeRecord>> {
        let resp = self
            .client
            .get(self.url("/object_types"))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(STORE, e))
    }

    async fn put_object_type(&self, record: &ObjectTypeRecord) -> Result<()> {
        let resp = self
            .client
            .put(self.url("/object_type"))
            .json(record)
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp).await.map(|_| ())
    }

    async fn delete_object_type(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/object_type/{id}")))
            .send()
            .await
            .map_err(|e| external(STORE, e))?;
        check(STORE, resp).await.map(|_| ())
    }
}

pub struct RestSceneService {
    base: String,
    client: reqwest::Client,
}

impl RestSceneService {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }
}

const SCENE_SRV: &str = "Scene service";

#[async_trait]
impl SceneService for RestSceneService {
    async fn start(&self) -> Result<()> {
        let resp = self
            .client
            .put(self.url("/system/start"))
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        let resp = self
            .client
            .put(self.url("/system/stop"))
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp).await.map(|_| ())
    }

    async fn started(&self) -> Result<bool> {
        let resp = self
            .client
            .get(self.url("/system/running"))
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(SCENE_SRV, e))
    }

    async fn upsert_collision(
        &self,
        model: &CollisionModel,
        id: &str,
        pose: &Pose,
    ) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            id: &'a str,
            model: &'a CollisionModel,
            pose: &'a Pose,
        }
        let resp = self
            .client
            .put(self.url("/collisions"))
            .json(&Body { id, model, pose })
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp).await.map(|_| ())
    }

    async fn delete_collision(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/collisions/{id}")))
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp).await.map(|_| ())
    }

    async fn focus(&self, id: &str, pose: &Pose) -> Result<Pose> {
        let resp = self
            .client
            .put(self.url(&format!("/utils/focus/{id}")))
            .json(pose)
            .send()
            .await
            .map_err(|e| external(SCENE_SRV, e))?;
        check(SCENE_SRV, resp)
            .await?
            .json()
            .await
            .map_err(|e| external(SCENE_SRV, e))
    }
}

pub struct RestBuildService {
    base: String,
    client: reqwest::Client,
}

impl RestBuildService {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }
}

const BUILD: &str = "Build service";

#[async_trait]
impl BuildService for RestBuildService {
    async fn publish(&self, project_id: &str, package_name: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/project/{}/publish",
            self.base.trim_end_matches('/'),
            project_id
        );
        let resp = self
            .client
            .get(url)
            .query(&[("packageName", package_name)])
            .send()
            .await
            .map_err(|e| external(BUILD, e))?;
        let resp = check(BUILD, resp).await?;
        let bytes = resp.bytes().await.map_err(|e| external(BUILD, e))?;
        Ok(bytes.to_vec())
    }
}
