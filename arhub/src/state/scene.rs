//! Indexed copy of the open scene.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use arhub_data::common::{Scene, SceneObject};

use crate::error::{HubError, Result};

pub struct CachedScene {
    pub id: String,
    pub name: String,
    pub description: String,
    pub modified: Option<DateTime<Utc>>,
    pub int_modified: Option<DateTime<Utc>>,
    objects: HashMap<String, SceneObject>,
    order: Vec<String>,
}

impl CachedScene {
    pub fn new(scene: Scene) -> Result<Self> {
        let mut objects = HashMap::new();
        let mut order = Vec::new();
        for obj in scene.objects {
            if objects.contains_key(&obj.id) {
                return Err(HubError::validation(format!(
                    "Duplicate object id: {}.",
                    obj.id
                )));
            }
            order.push(obj.id.clone());
            objects.insert(obj.id.clone(), obj);
        }
        Ok(Self {
            id: scene.id,
            name: scene.name,
            description: scene.description,
            modified: scene.modified,
            int_modified: scene.int_modified,
            objects,
            order,
        })
    }

    pub fn object(&self, object_id: &str) -> Result<&SceneObject> {
        self.objects
            .get(object_id)
            .ok_or_else(|| HubError::precondition(format!("Object ID {object_id} not found.")))
    }

    pub fn object_mut(&mut self, object_id: &str) -> Result<&mut SceneObject> {
        self.objects
            .get_mut(object_id)
            .ok_or_else(|| HubError::precondition(format!("Object ID {object_id} not found.")))
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn object_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects().map(|o| o.name.as_str())
    }

    pub fn objects_of_type<'a>(
        &'a self,
        object_type: &'a str,
    ) -> impl Iterator<Item = &'a SceneObject> {
        self.objects()
            .filter(move |o| o.object_type == object_type)
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.objects.contains_key(object_id)
    }

    pub fn update_modified(&mut self) {
        self.int_modified = Some(Utc::now());
    }

    pub fn has_changes(&self) -> bool {
        match (self.int_modified, self.modified) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(int), Some(ext)) => int > ext,
        }
    }

    /// Marks the in-memory copy as persisted at `stamp`.
    pub fn mark_saved(&mut self, stamp: Option<DateTime<Utc>>) {
        self.modified = stamp.or_else(|| Some(Utc::now()));
        self.int_modified = self.modified;
    }

    pub fn upsert_object(&mut self, obj: SceneObject) {
        if !self.objects.contains_key(&obj.id) {
            self.order.push(obj.id.clone());
        }
        self.objects.insert(obj.id.clone(), obj);
        self.update_modified();
    }

    pub fn delete_object(&mut self, object_id: &str) -> Result<SceneObject> {
        let obj = self
            .objects
            .remove(object_id)
            .ok_or_else(|| HubError::precondition("Object id not found."))?;
        self.order.retain(|id| id != object_id);
        self.update_modified();
        Ok(obj)
    }

    /// Full `Scene` for persistence and for the `OpenScene` payload.
    pub fn scene(&self) -> Scene {
        Scene {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            objects: self.objects().cloned().collect(),
            modified: self.modified,
            int_modified: self.int_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: &str, name: &str) -> SceneObject {
        SceneObject {
            id: id.into(),
            name: name.into(),
            object_type: "Box".into(),
            pose: None,
            parameters: vec![],
        }
    }

    fn empty() -> CachedScene {
        CachedScene::new(Scene {
            id: "scn_1".into(),
            name: "s".into(),
            ..Scene::default()
        })
        .unwrap()
    }

    #[test]
    fn duplicate_object_id_rejected() {
        let scene = Scene {
            id: "scn_1".into(),
            name: "s".into(),
            objects: vec![obj("o1", "a"), obj("o1", "b")],
            ..Scene::default()
        };
        assert!(CachedScene::new(scene).is_err());
    }

    #[test]
    fn upsert_bumps_int_modified_and_has_changes() {
        let mut scene = empty();
        assert!(!scene.has_changes());
        scene.upsert_object(obj("o1", "a"));
        assert!(scene.has_changes());
        scene.mark_saved(None);
        assert!(!scene.has_changes());
    }

    #[test]
    fn delete_unknown_object_is_error() {
        let mut scene = empty();
        assert!(scene.delete_object("nope").is_err());
    }

    #[test]
    fn round_trip_preserves_insertion_order() {
        let mut scene = empty();
        scene.upsert_object(obj("o2", "b"));
        scene.upsert_object(obj("o1", "a"));
        let out = scene.scene();
        let ids: Vec<_> = out.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o2", "o1"]);
    }
}
