//! Indexed copy of the open project.
//!
//! Action points are stored bare; their actions, orientations and joints
//! live in flat id maps carrying the owning AP id. Removing an AP cascades
//! to everything it owns. AP positions are absolute while the project is
//! open; the open/save conversions live in the project-lifecycle handlers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use arhub_data::common::{
    Action, ActionPoint, BareActionPoint, LogicItem, NamedOrientation, Parameter, Project,
    ProjectConstant, ProjectFunction, ProjectRobotJoints, LOGIC_START,
};
use arhub_data::math::Position;

use crate::error::{HubError, Result};

pub struct CachedProject {
    pub id: String,
    pub name: String,
    pub scene_id: String,
    pub description: String,
    pub has_logic: bool,
    pub modified: Option<DateTime<Utc>>,
    pub int_modified: Option<DateTime<Utc>>,
    action_points: HashMap<String, BareActionPoint>,
    ap_order: Vec<String>,
    actions: HashMap<String, (Action, String)>,
    orientations: HashMap<String, (NamedOrientation, String)>,
    joints: HashMap<String, (ProjectRobotJoints, String)>,
    constants: HashMap<String, ProjectConstant>,
    logic_items: HashMap<String, LogicItem>,
    functions: HashMap<String, ProjectFunction>,
    overrides: HashMap<String, Vec<Parameter>>,
}

impl CachedProject {
    pub fn new(project: Project) -> Result<Self> {
        let mut cached = Self {
            id: project.id,
            name: project.name,
            scene_id: project.scene_id,
            description: project.description,
            has_logic: project.has_logic,
            modified: project.modified,
            int_modified: project.int_modified,
            action_points: HashMap::new(),
            ap_order: Vec::new(),
            actions: HashMap::new(),
            orientations: HashMap::new(),
            joints: HashMap::new(),
            constants: HashMap::new(),
            logic_items: HashMap::new(),
            functions: HashMap::new(),
            overrides: HashMap::new(),
        };

        for ap in project.action_points {
            if cached.action_points.contains_key(&ap.id) {
                return Err(HubError::validation(format!("Duplicate AP id: {}.", ap.id)));
            }
            let bare = ap.bare();
            cached.ap_order.push(bare.id.clone());
            cached.action_points.insert(bare.id.clone(), bare);

            for action in ap.actions {
                if cached.actions.contains_key(&action.id) {
                    return Err(HubError::validation(format!(
                        "Duplicate action id: {}.",
                        action.id
                    )));
                }
                cached
                    .actions
                    .insert(action.id.clone(), (action, ap.id.clone()));
            }
            for ori in ap.orientations {
                if cached.orientations.contains_key(&ori.id) {
                    return Err(HubError::validation(format!(
                        "Duplicate orientation id: {}.",
                        ori.id
                    )));
                }
                cached
                    .orientations
                    .insert(ori.id.clone(), (ori, ap.id.clone()));
            }
            for joints in ap.robot_joints {
                if cached.joints.contains_key(&joints.id) {
                    return Err(HubError::validation(format!(
                        "Duplicate joints id: {}.",
                        joints.id
                    )));
                }
                cached
                    .joints
                    .insert(joints.id.clone(), (joints, ap.id.clone()));
            }
        }

        for constant in project.constants {
            cached.constants.insert(constant.id.clone(), constant);
        }
        for item in project.logic {
            cached.logic_items.insert(item.id.clone(), item);
        }
        for function in project.functions {
            cached.functions.insert(function.id.clone(), function);
        }
        for over in project.object_overrides {
            cached.overrides.insert(over.id, over.parameters);
        }

        Ok(cached)
    }

    // ------------------------------------------------------------------
    // lookups

    pub fn action_point_count(&self) -> usize {
        self.action_points.len()
    }

    pub fn action_points(&self) -> impl Iterator<Item = &BareActionPoint> {
        self.ap_order
            .iter()
            .filter_map(|id| self.action_points.get(id))
    }

    pub fn bare_action_point(&self, ap_id: &str) -> Result<&BareActionPoint> {
        self.action_points
            .get(ap_id)
            .ok_or_else(|| HubError::precondition("Action point not found."))
    }

    pub fn action_point_names(&self) -> impl Iterator<Item = &str> {
        self.action_points().map(|ap| ap.name.as_str())
    }

    pub fn action(&self, action_id: &str) -> Result<&Action> {
        self.actions
            .get(action_id)
            .map(|(a, _)| a)
            .ok_or_else(|| HubError::precondition("Action not found."))
    }

    /// Owning AP of an action.
    pub fn action_parent(&self, action_id: &str) -> Result<&BareActionPoint> {
        let (_, ap_id) = self
            .actions
            .get(action_id)
            .ok_or_else(|| HubError::precondition("Action not found."))?;
        self.bare_action_point(ap_id)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values().map(|(a, _)| a)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions().map(|a| a.name.as_str())
    }

    pub fn orientation(&self, orientation_id: &str) -> Result<&NamedOrientation> {
        self.orientations
            .get(orientation_id)
            .map(|(o, _)| o)
            .ok_or_else(|| HubError::precondition("Unknown orientation."))
    }

    pub fn orientation_parent(&self, orientation_id: &str) -> Result<&BareActionPoint> {
        let (_, ap_id) = self
            .orientations
            .get(orientation_id)
            .ok_or_else(|| HubError::precondition("Unknown orientation."))?;
        self.bare_action_point(ap_id)
    }

    pub fn joints(&self, joints_id: &str) -> Result<&ProjectRobotJoints> {
        self.joints
            .get(joints_id)
            .map(|(j, _)| j)
            .ok_or_else(|| HubError::precondition("Unknown joints."))
    }

    pub fn joints_parent(&self, joints_id: &str) -> Result<&BareActionPoint> {
        let (_, ap_id) = self
            .joints
            .get(joints_id)
            .ok_or_else(|| HubError::precondition("Unknown joints."))?;
        self.bare_action_point(ap_id)
    }

    pub fn ap_actions(&self, ap_id: &str) -> Vec<&Action> {
        self.actions
            .values()
            .filter(|(_, parent)| parent == ap_id)
            .map(|(a, _)| a)
            .collect()
    }

    pub fn ap_orientations(&self, ap_id: &str) -> Vec<&NamedOrientation> {
        self.orientations
            .values()
            .filter(|(_, parent)| parent == ap_id)
            .map(|(o, _)| o)
            .collect()
    }

    pub fn ap_joints(&self, ap_id: &str) -> Vec<&ProjectRobotJoints> {
        self.joints
            .values()
            .filter(|(_, parent)| parent == ap_id)
            .map(|(j, _)| j)
            .collect()
    }

    pub fn logic_items(&self) -> impl Iterator<Item = &LogicItem> {
        self.logic_items.values()
    }

    pub fn logic_item(&self, id: &str) -> Result<&LogicItem> {
        self.logic_items
            .get(id)
            .ok_or_else(|| HubError::precondition("Logic item not found."))
    }

    pub fn constants(&self) -> impl Iterator<Item = &ProjectConstant> {
        self.constants.values()
    }

    pub fn constant(&self, id: &str) -> Result<&ProjectConstant> {
        self.constants
            .get(id)
            .ok_or_else(|| HubError::precondition("Constant not found."))
    }

    pub fn overrides(&self) -> &HashMap<String, Vec<Parameter>> {
        &self.overrides
    }

    /// Ids a logic item may reference as endpoints.
    pub fn valid_logic_endpoints(&self) -> HashSet<String> {
        let mut endpoints: HashSet<String> =
            self.actions.keys().cloned().collect();
        endpoints.insert(arhub_data::common::LOGIC_START.to_string());
        endpoints.insert(arhub_data::common::LOGIC_END.to_string());
        endpoints
    }

    /// The action the unique `START` edge points at.
    pub fn first_action_id(&self) -> Result<String> {
        let mut first = None;
        for item in self.logic_items.values() {
            if item.start == LOGIC_START {
                if first.is_some() {
                    return Err(HubError::validation("Duplicate start."));
                }
                first = Some(item.end.clone());
            }
        }
        first.ok_or_else(|| HubError::validation("Start action not found."))
    }

    // ------------------------------------------------------------------
    // mutations

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

    pub fn mark_saved(&mut self, stamp: Option<DateTime<Utc>>) {
        self.modified = stamp.or_else(|| Some(Utc::now()));
        self.int_modified = self.modified;
    }

    pub fn upsert_action_point(
        &mut self,
        ap_id: &str,
        name: String,
        position: Position,
        parent: Option<String>,
    ) -> BareActionPoint {
        if self.action_points.contains_key(ap_id) {
            let moved = !self.action_points[ap_id].position.approx_eq(&position);
            if moved {
                self.invalidate_joints(ap_id);
            }
            let ap = self.action_points.get_mut(ap_id).expect("present");
            ap.name = name;
            ap.position = position;
            ap.parent = parent;
        } else {
            let ap = BareActionPoint {
                id: ap_id.to_string(),
                name,
                position,
                parent,
            };
            self.ap_order.push(ap.id.clone());
            self.action_points.insert(ap.id.clone(), ap);
        }
        self.update_modified();
        self.action_points[ap_id].clone()
    }

    /// Rewrites an AP position without touching joints validity or the
    /// modification stamp. Only for the relative/absolute representation
    /// conversion on open/save; real moves go through
    /// [`Self::update_ap_position`].
    pub fn set_ap_position_raw(&mut self, ap_id: &str, position: Position) -> Result<()> {
        let ap = self
            .action_points
            .get_mut(ap_id)
            .ok_or_else(|| HubError::precondition("Action point not found."))?;
        ap.position = position;
        Ok(())
    }

    /// Walks the parent chain of `ap_id`; `true` when it visits `object_id`.
    pub fn ap_ancestry_contains(&self, ap_id: &str, object_id: &str) -> bool {
        let mut current = self
            .action_points
            .get(ap_id)
            .and_then(|ap| ap.parent.clone());
        let mut hops = 0;
        while let Some(id) = current {
            if id == object_id {
                return true;
            }
            hops += 1;
            if hops > self.action_points.len() {
                return false;
            }
            current = self
                .action_points
                .get(&id)
                .and_then(|ap| ap.parent.clone());
        }
        false
    }

    /// Moves an AP and invalidates its joints snapshots.
    pub fn update_ap_position(&mut self, ap_id: &str, position: Position) -> Result<()> {
        if !self.action_points.contains_key(ap_id) {
            return Err(HubError::precondition("Action point not found."));
        }
        self.invalidate_joints(ap_id);
        let ap = self.action_points.get_mut(ap_id).expect("present");
        ap.position = position;
        self.update_modified();
        Ok(())
    }

    pub fn invalidate_joints(&mut self, ap_id: &str) {
        for (joints, parent) in self.joints.values_mut() {
            if parent == ap_id {
                joints.is_valid = false;
            }
        }
    }

    pub fn remove_action_point(&mut self, ap_id: &str) -> Result<BareActionPoint> {
        let ap = self
            .action_points
            .remove(ap_id)
            .ok_or_else(|| HubError::precondition("Action point not found."))?;
        self.ap_order.retain(|id| id != ap_id);
        self.actions.retain(|_, (_, parent)| parent != ap_id);
        self.orientations.retain(|_, (_, parent)| parent != ap_id);
        self.joints.retain(|_, (_, parent)| parent != ap_id);
        self.update_modified();
        Ok(ap)
    }

    pub fn upsert_action(&mut self, ap_id: &str, action: Action) -> Result<()> {
        self.bare_action_point(ap_id)?;
        self.actions
            .insert(action.id.clone(), (action, ap_id.to_string()));
        self.update_modified();
        Ok(())
    }

    pub fn remove_action(&mut self, action_id: &str) -> Result<Action> {
        let (action, _) = self
            .actions
            .remove(action_id)
            .ok_or_else(|| HubError::precondition("Action not found."))?;
        self.update_modified();
        Ok(action)
    }

    pub fn action_mut(&mut self, action_id: &str) -> Result<&mut Action> {
        self.int_modified = Some(Utc::now());
        self.actions
            .get_mut(action_id)
            .map(|(a, _)| a)
            .ok_or_else(|| HubError::precondition("Action not found."))
    }

    pub fn upsert_orientation(&mut self, ap_id: &str, ori: NamedOrientation) -> Result<()> {
        self.bare_action_point(ap_id)?;
        self.orientations
            .insert(ori.id.clone(), (ori, ap_id.to_string()));
        self.update_modified();
        Ok(())
    }

    pub fn update_orientation(&mut self, ori: NamedOrientation) -> Result<()> {
        match self.orientations.get_mut(&ori.id) {
            Some((existing, _)) => {
                *existing = ori;
                self.update_modified();
                Ok(())
            }
            None => Err(HubError::precondition("Unknown orientation.")),
        }
    }

    pub fn remove_orientation(&mut self, orientation_id: &str) -> Result<NamedOrientation> {
        let (ori, _) = self
            .orientations
            .remove(orientation_id)
            .ok_or_else(|| HubError::precondition("Unknown orientation."))?;
        self.update_modified();
        Ok(ori)
    }

    pub fn upsert_joints(&mut self, ap_id: &str, joints: ProjectRobotJoints) -> Result<()> {
        self.bare_action_point(ap_id)?;
        self.joints
            .insert(joints.id.clone(), (joints, ap_id.to_string()));
        self.update_modified();
        Ok(())
    }

    pub fn update_joints(&mut self, joints: ProjectRobotJoints) -> Result<()> {
        match self.joints.get_mut(&joints.id) {
            Some((existing, _)) => {
                *existing = joints;
                self.update_modified();
                Ok(())
            }
            None => Err(HubError::precondition("Unknown joints.")),
        }
    }

    pub fn remove_joints(&mut self, joints_id: &str) -> Result<ProjectRobotJoints> {
        let (joints, _) = self
            .joints
            .remove(joints_id)
            .ok_or_else(|| HubError::precondition("Unknown joints."))?;
        self.update_modified();
        Ok(joints)
    }

    pub fn upsert_logic_item(&mut self, item: LogicItem) {
        self.logic_items.insert(item.id.clone(), item);
        self.update_modified();
    }

    pub fn remove_logic_item(&mut self, id: &str) -> Result<LogicItem> {
        let item = self
            .logic_items
            .remove(id)
            .ok_or_else(|| HubError::precondition("Logic item not found."))?;
        self.update_modified();
        Ok(item)
    }

    pub fn upsert_constant(&mut self, constant: ProjectConstant) {
        self.constants.insert(constant.id.clone(), constant);
        self.update_modified();
    }

    pub fn remove_constant(&mut self, id: &str) -> Result<ProjectConstant> {
        let constant = self
            .constants
            .remove(id)
            .ok_or_else(|| HubError::precondition("Constant not found."))?;
        self.update_modified();
        Ok(constant)
    }

    pub fn set_override(&mut self, object_id: &str, parameters: Vec<Parameter>) {
        if parameters.is_empty() {
            self.overrides.remove(object_id);
        } else {
            self.overrides.insert(object_id.to_string(), parameters);
        }
        self.update_modified();
    }

    /// Full `Project` for persistence and for the `OpenProject` payload.
    pub fn project(&self) -> Project {
        let mut action_points = Vec::with_capacity(self.action_points.len());
        for id in &self.ap_order {
            let bare = match self.action_points.get(id) {
                Some(b) => b,
                None => continue,
            };
            let mut ap = ActionPoint::from_bare(bare.clone());
            ap.actions = self.ap_actions(id).into_iter().cloned().collect();
            ap.orientations = self.ap_orientations(id).into_iter().cloned().collect();
            ap.robot_joints = self.ap_joints(id).into_iter().cloned().collect();
            action_points.push(ap);
        }
        Project {
            id: self.id.clone(),
            name: self.name.clone(),
            scene_id: self.scene_id.clone(),
            description: self.description.clone(),
            has_logic: self.has_logic,
            action_points,
            constants: self.constants.values().cloned().collect(),
            functions: self.functions.values().cloned().collect(),
            logic: self.logic_items.values().cloned().collect(),
            object_overrides: self
                .overrides
                .iter()
                .map(|(id, parameters)| arhub_data::common::ProjectOverride {
                    id: id.clone(),
                    parameters: parameters.clone(),
                })
                .collect(),
            modified: self.modified,
            int_modified: self.int_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arhub_data::common::{Flow, LOGIC_END};

    fn ap(id: &str, name: &str, parent: Option<&str>) -> ActionPoint {
        ActionPoint::from_bare(BareActionPoint {
            id: id.into(),
            name: name.into(),
            position: Position::default(),
            parent: parent.map(Into::into),
        })
    }

    fn project() -> CachedProject {
        let mut p1 = ap("ap1", "one", None);
        p1.actions.push(Action {
            id: "act1".into(),
            name: "pick".into(),
            action_type: "o1/Pick".into(),
            parameters: vec![],
            flows: vec![Flow::default()],
        });
        p1.robot_joints.push(ProjectRobotJoints {
            id: "j1".into(),
            name: "default".into(),
            robot_id: "r1".into(),
            joints: vec![],
            is_valid: true,
        });
        CachedProject::new(Project {
            id: "prj_1".into(),
            name: "p".into(),
            scene_id: "scn_1".into(),
            action_points: vec![p1, ap("ap2", "two", Some("ap1"))],
            ..Project::default()
        })
        .unwrap()
    }

    #[test]
    fn removing_ap_cascades() {
        let mut project = project();
        project.remove_action_point("ap1").unwrap();
        assert!(project.action("act1").is_err());
        assert!(project.joints("j1").is_err());
        assert!(project.bare_action_point("ap2").is_ok());
    }

    #[test]
    fn moving_ap_invalidates_joints() {
        let mut project = project();
        assert!(project.joints("j1").unwrap().is_valid);
        project
            .update_ap_position("ap1", Position::new(1.0, 0.0, 0.0))
            .unwrap();
        assert!(!project.joints("j1").unwrap().is_valid);
    }

    #[test]
    fn mutations_set_has_changes() {
        let mut project = project();
        // the constructor itself does not count as a change
        assert!(!project.has_changes());
        project.upsert_constant(ProjectConstant {
            id: "c1".into(),
            name: "speed".into(),
            const_type: "double".into(),
            value: "0.5".into(),
        });
        assert!(project.has_changes());
        project.mark_saved(None);
        assert!(!project.has_changes());
    }

    #[test]
    fn first_action_requires_unique_start() {
        let mut project = project();
        assert!(project.first_action_id().is_err());
        project.upsert_logic_item(LogicItem {
            id: "l1".into(),
            start: LOGIC_START.into(),
            end: "act1".into(),
            condition: None,
        });
        assert_eq!(project.first_action_id().unwrap(), "act1");
        project.upsert_logic_item(LogicItem {
            id: "l2".into(),
            start: LOGIC_START.into(),
            end: LOGIC_END.into(),
            condition: None,
        });
        assert!(project.first_action_id().is_err());
    }

    #[test]
    fn project_round_trip_keeps_children() {
        let project = project();
        let out = project.project();
        let ap1 = out
            .action_points
            .iter()
            .find(|a| a.id == "ap1")
            .expect("ap1");
        assert_eq!(ap1.actions.len(), 1);
        assert_eq!(ap1.robot_joints.len(), 1);
    }
}
