//! In-memory indexed ("cached") copies of the open scene and project.
//!
//! Mutations go through the high-level ops here; each one bumps
//! `int_modified` so `has_changes` can compare against the last persisted
//! `modified` stamp. Entities are indexed by id; parent/child relations are
//! kept as id maps rather than pointer cycles.

mod project;
mod scene;
mod validate;

pub use project::CachedProject;
pub use scene::CachedScene;
pub use validate::{executable_problems, link_output_type, project_problems};

use std::collections::HashSet;

use arhub_data::math::Position;

use crate::error::{HubError, Result};

/// Editing-session state guarded by the hub mutex: the optionally open scene
/// and project plus bookkeeping that belongs to them.
#[derive(Default)]
pub struct Editing {
    pub scene: Option<CachedScene>,
    pub project: Option<CachedProject>,
    /// Scene objects whose pose changed since the last save; flushed on save
    /// and used to invalidate dependent robot-joint snapshots.
    pub objects_with_updated_pose: HashSet<String>,
    /// Action currently being executed from the editor, if any.
    pub running_action: Option<String>,
    /// Results of actions executed from the editor, consumable through
    /// parameter links until the scene stops.
    pub prev_results: std::collections::HashMap<String, Vec<serde_json::Value>>,
}

impl Editing {
    pub fn scene(&self) -> Result<&CachedScene> {
        self.scene
            .as_ref()
            .ok_or_else(|| HubError::precondition("Scene not opened."))
    }

    pub fn scene_mut(&mut self) -> Result<&mut CachedScene> {
        self.scene
            .as_mut()
            .ok_or_else(|| HubError::precondition("Scene not opened."))
    }

    pub fn project(&self) -> Result<&CachedProject> {
        self.project
            .as_ref()
            .ok_or_else(|| HubError::precondition("Project not opened."))
    }

    pub fn project_mut(&mut self) -> Result<&mut CachedProject> {
        self.project
            .as_mut()
            .ok_or_else(|| HubError::precondition("Project not opened."))
    }
}

/// Accumulates the parent chain of stored (parent-relative) positions into
/// the absolute origin of `parent`'s frame. APs carry no orientation of
/// their own, so a chain of APs is a pure translation; the terminating
/// scene-object parent contributes its pose position. Only meaningful on
/// the stored representation (used when opening a project).
pub fn parent_frame_origin(
    scene: &CachedScene,
    project: &CachedProject,
    parent: &str,
) -> Result<Position> {
    let mut origin = Position::default();
    let mut current = Some(parent.to_string());
    let mut hops = 0usize;
    while let Some(id) = current {
        hops += 1;
        if hops > project.action_point_count() + 1 {
            return Err(HubError::validation("Parent chain contains a cycle."));
        }
        if let Ok(ap) = project.bare_action_point(&id) {
            origin = origin + ap.position;
            current = ap.parent.clone();
        } else {
            let obj = scene.object(&id)?;
            let pose = obj
                .pose
                .as_ref()
                .ok_or_else(|| HubError::validation("Parent object has no pose."))?;
            origin = origin + pose.position;
            current = None;
        }
    }
    Ok(origin)
}

/// Computes the subtree lock closure per the cooperative-locking contract:
/// the roots, every AP whose parent chain visits a root, and every
/// action/orientation/joints owned by any AP in the set.
pub fn lock_tree_closure(project: Option<&CachedProject>, roots: &[String]) -> Vec<String> {
    let mut closure: HashSet<String> = roots.iter().cloned().collect();

    if let Some(project) = project {
        // APs reachable from the current set; parent chains are shallow, so
        // iterate until the set stops growing.
        loop {
            let mut grew = false;
            for ap in project.action_points() {
                if closure.contains(&ap.id) {
                    continue;
                }
                if let Some(parent) = &ap.parent {
                    if closure.contains(parent) {
                        closure.insert(ap.id.clone());
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
        }
        for ap in project.action_points() {
            if !closure.contains(&ap.id) {
                continue;
            }
            for action in project.ap_actions(&ap.id) {
                closure.insert(action.id.clone());
            }
            for ori in project.ap_orientations(&ap.id) {
                closure.insert(ori.id.clone());
            }
            for joints in project.ap_joints(&ap.id) {
                closure.insert(joints.id.clone());
            }
        }
    }

    let mut out: Vec<String> = closure.into_iter().collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use arhub_data::common::*;
    use arhub_data::math::{Orientation, Pose};

    fn scene_with_object(id: &str) -> CachedScene {
        CachedScene::new(Scene {
            id: "scn_1".into(),
            name: "s".into(),
            objects: vec![SceneObject {
                id: id.into(),
                name: "obj".into(),
                object_type: "Box".into(),
                pose: Some(Pose::new(Position::new(1.0, 0.0, 0.0), Orientation::default())),
                parameters: vec![],
            }],
            ..Scene::default()
        })
        .unwrap()
    }

    fn project_with_chain(obj_id: &str) -> CachedProject {
        // ap1 under the object, ap2 under ap1, act1 on ap1
        CachedProject::new(Project {
            id: "prj_1".into(),
            name: "p".into(),
            scene_id: "scn_1".into(),
            action_points: vec![
                ActionPoint {
                    actions: vec![Action {
                        id: "act1".into(),
                        name: "a".into(),
                        action_type: format!("{obj_id}/Pick"),
                        parameters: vec![],
                        flows: vec![Flow::default()],
                    }],
                    ..ActionPoint::from_bare(BareActionPoint {
                        id: "ap1".into(),
                        name: "ap_one".into(),
                        position: Position::new(0.5, 0.0, 0.0),
                        parent: Some(obj_id.into()),
                    })
                },
                ActionPoint::from_bare(BareActionPoint {
                    id: "ap2".into(),
                    name: "ap_two".into(),
                    position: Position::new(0.0, 0.5, 0.0),
                    parent: Some("ap1".into()),
                }),
            ],
            ..Project::default()
        })
        .unwrap()
    }

    #[test]
    fn closure_covers_descendants_of_scene_object() {
        let project = project_with_chain("o1");
        let closure = lock_tree_closure(Some(&project), &["o1".to_string()]);
        assert_eq!(closure, vec!["act1", "ap1", "ap2", "o1"]);
    }

    #[test]
    fn closure_of_leaf_is_just_the_leaf() {
        let project = project_with_chain("o1");
        let closure = lock_tree_closure(Some(&project), &["ap2".to_string()]);
        assert_eq!(closure, vec!["ap2"]);
    }

    #[test]
    fn parent_origin_walks_chain() {
        let scene = scene_with_object("o1");
        let project = project_with_chain("o1");
        let origin = parent_frame_origin(&scene, &project, "ap1").unwrap();
        assert!(origin.approx_eq(&Position::new(1.5, 0.0, 0.0)));
    }
}
