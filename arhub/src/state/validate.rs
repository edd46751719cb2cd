//! Project validation: the `valid` / `executable` tags on project listings
//! and the per-mutation parameter checks share the logic here.

use std::collections::{HashMap, HashSet};

use arhub_data::common::{
    parse_link, Action, ActionParameterKind, DEFAULT_FLOW, LOGIC_END, LOGIC_START,
};
use arhub_data::object_type::ObjectAction;

use super::{CachedProject, CachedScene};
use crate::objtypes::ObjectTypeData;

/// Looks up `action_type` (`<object-id>/<action-name>`) against the scene
/// and the type catalogue; returns the action signature.
fn resolve_action<'a>(
    scene: &CachedScene,
    types: &'a HashMap<String, std::sync::Arc<ObjectTypeData>>,
    action: &Action,
) -> Result<&'a ObjectAction, String> {
    let (obj_id, action_name) = action
        .parse_type()
        .map_err(|e| e.to_string())?;
    let obj = scene
        .object(&obj_id)
        .map_err(|_| format!("Action {} references unknown object {obj_id}.", action.name))?;
    let data = types
        .get(&obj.object_type)
        .ok_or_else(|| format!("Unknown object type {}.", obj.object_type))?;
    if data.meta.disabled {
        return Err(format!("Object type {} is disabled.", obj.object_type));
    }
    data.actions
        .iter()
        .find(|a| a.name == action_name)
        .ok_or_else(|| {
            format!(
                "Action {} references unknown type action {action_name}.",
                action.name
            )
        })
}

/// Everything that makes the project not `valid`. Empty means valid.
pub fn project_problems(
    scene: &CachedScene,
    project: &CachedProject,
    types: &HashMap<String, std::sync::Arc<ObjectTypeData>>,
) -> Vec<String> {
    let mut problems = Vec::new();

    // flow outputs must be globally unique, valid identifiers
    let mut outputs: HashSet<&str> = HashSet::new();
    for action in project.actions() {
        for flow in &action.flows {
            for output in &flow.outputs {
                if arhub_data::helpers::check_snake_case(output).is_err() {
                    problems.push(format!("Output {output} is not a valid identifier."));
                }
                if !outputs.insert(output.as_str()) {
                    problems.push(format!("Output {output} is not unique."));
                }
            }
        }
    }

    for action in project.actions() {
        let signature = match resolve_action(scene, types, action) {
            Ok(s) => s,
            Err(problem) => {
                problems.push(problem);
                continue;
            }
        };

        for param in &action.parameters {
            match param.kind {
                ActionParameterKind::Value => {
                    if let Some(meta) = signature
                        .parameters
                        .iter()
                        .find(|p| p.name == param.name)
                    {
                        if meta.param_type != param.param_type {
                            problems.push(format!(
                                "Parameter {} of action {} has type {} (expected {}).",
                                param.name, action.name, param.param_type, meta.param_type
                            ));
                        }
                    } else {
                        problems.push(format!(
                            "Action {} has unknown parameter {}.",
                            action.name, param.name
                        ));
                    }
                }
                ActionParameterKind::Constant => {
                    match project.constant(&param.value) {
                        Ok(constant) if constant.const_type == param.param_type => {}
                        Ok(_) => problems.push(format!(
                            "Param {} of action {} does not match constant type.",
                            param.name, action.name
                        )),
                        Err(_) => problems.push(format!(
                            "Param {} of action {} references unknown constant.",
                            param.name, action.name
                        )),
                    }
                }
                ActionParameterKind::Link => match link_output_type(scene, project, types, &param.value) {
                    Ok(output_type) => {
                        if output_type != param.param_type {
                            problems.push(
                                "Param type does not match action output type.".to_string(),
                            );
                        }
                    }
                    Err(problem) => problems.push(problem),
                },
            }
        }
    }

    // logic endpoints must exist and conditions must resolve
    for item in project.logic_items() {
        let (start_id, flow) = item.parse_start();
        if start_id != LOGIC_START {
            match project.action(&start_id) {
                Ok(action) => {
                    if action.flow(&flow).is_none() {
                        problems.push(format!("Logic item {} uses unknown flow {flow}.", item.id));
                    }
                }
                Err(_) => problems.push(format!(
                    "Logic item {} starts at unknown action {start_id}.",
                    item.id
                )),
            }
        }
        if item.end != LOGIC_END && project.action(&item.end).is_err() {
            problems.push(format!(
                "Logic item {} ends at unknown action {}.",
                item.id, item.end
            ));
        }
        if let Some(condition) = &item.condition {
            if let Err(problem) = link_output_type(scene, project, types, &condition.what) {
                problems.push(problem);
            }
        }
    }

    // overrides must name existing settings with matching types
    for (object_id, parameters) in project.overrides() {
        let obj = match scene.object(object_id) {
            Ok(o) => o,
            Err(_) => {
                problems.push(format!("Override for unknown object {object_id}."));
                continue;
            }
        };
        if let Some(data) = types.get(&obj.object_type) {
            for param in parameters {
                match data.meta.setting(&param.name) {
                    Some(setting) if setting.param_type == param.param_type => {}
                    Some(_) => problems.push(format!(
                        "Override {} of {} has mismatched type.",
                        param.name, obj.name
                    )),
                    None => problems.push(format!(
                        "Override {} does not exist on type {}.",
                        param.name, obj.object_type
                    )),
                }
            }
        }
    }

    problems
}

/// Type of the output a link (`action/flow/index`) points at.
pub fn link_output_type(
    scene: &CachedScene,
    project: &CachedProject,
    types: &HashMap<String, std::sync::Arc<ObjectTypeData>>,
    link: &str,
) -> Result<String, String> {
    let parsed = parse_link(link).map_err(|e| e.to_string())?;
    let action = project
        .action(&parsed.action_id)
        .map_err(|_| format!("Link {link} references unknown action."))?;
    let flow = action
        .flow(&parsed.flow_type)
        .ok_or_else(|| format!("Link {link} references unknown flow."))?;
    if parsed.output_index >= flow.outputs.len() {
        return Err(format!("Link {link} output index out of range."));
    }
    let signature = resolve_action(scene, types, action)?;
    signature
        .returns
        .get(parsed.output_index)
        .cloned()
        .ok_or_else(|| format!("Link {link} output index out of range."))
}

/// Problems that keep a `valid` project from being `executable`: a unique
/// START edge, END reachable from START, and exhaustive condition coverage
/// at every branching output (conservatively: boolean branches need both
/// values present, anything else must be unconditional).
pub fn executable_problems(project: &CachedProject) -> Vec<String> {
    let mut problems = Vec::new();

    if !project.has_logic {
        return problems;
    }

    let start_targets: Vec<&str> = project
        .logic_items()
        .filter(|i| i.start == LOGIC_START)
        .map(|i| i.end.as_str())
        .collect();
    match start_targets.len() {
        0 => {
            problems.push("Logic has no START edge.".to_string());
            return problems;
        }
        1 => {}
        _ => {
            problems.push("Logic has more than one START edge.".to_string());
            return problems;
        }
    }

    // group outgoing edges by their source output
    let mut edges: HashMap<String, Vec<&arhub_data::common::LogicItem>> = HashMap::new();
    for item in project.logic_items() {
        if item.start == LOGIC_START {
            continue;
        }
        let (start_id, flow) = item.parse_start();
        edges
            .entry(format!("{start_id}/{flow}"))
            .or_default()
            .push(item);
    }

    // condition coverage per source output
    for (source, items) in &edges {
        if items.len() == 1 && items[0].condition.is_none() {
            continue;
        }
        if items.iter().any(|i| i.condition.is_none()) {
            problems.push(format!(
                "Branching from {source} mixes conditional and unconditional edges."
            ));
            continue;
        }
        let values: HashSet<&str> = items
            .iter()
            .filter_map(|i| i.condition.as_ref())
            .map(|c| c.value.as_str())
            .collect();
        if values != HashSet::from(["true", "false"]) {
            problems.push(format!(
                "Branching from {source} does not cover both boolean values."
            ));
        }
    }

    // END must be reachable
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = vec![start_targets[0].to_string()];
    let mut reached_end = start_targets[0] == LOGIC_END;
    while let Some(current) = queue.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        for item in project.logic_items() {
            let (start_id, _) = item.parse_start();
            if start_id == current {
                if item.end == LOGIC_END {
                    reached_end = true;
                } else {
                    queue.push(item.end.clone());
                }
            }
        }
    }
    if !reached_end {
        problems.push("END is not reachable from START.".to_string());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objtypes::ObjectTypeData;
    use arhub_data::common::*;
    use arhub_data::object_type::{ObjectActionParameter, ObjectTypeMeta};
    use std::sync::Arc;

    fn types_with_action() -> HashMap<String, Arc<ObjectTypeData>> {
        let mut types = HashMap::new();
        types.insert(
            "Box".to_string(),
            Arc::new(ObjectTypeData {
                meta: ObjectTypeMeta {
                    object_type: "Box".into(),
                    has_pose: true,
                    ..ObjectTypeMeta::default()
                },
                actions: vec![ObjectAction {
                    name: "pick".into(),
                    description: None,
                    parameters: vec![ObjectActionParameter {
                        name: "x".into(),
                        param_type: "integer".into(),
                        default_value: None,
                        description: None,
                        extra: None,
                    }],
                    returns: vec!["string".into()],
                    origins: None,
                    meta: Default::default(),
                    disabled: false,
                    problem: None,
                }],
                robot_meta: None,
            }),
        );
        types
    }

    fn scene() -> CachedScene {
        CachedScene::new(Scene {
            id: "scn_1".into(),
            name: "s".into(),
            objects: vec![SceneObject {
                id: "o1".into(),
                name: "box".into(),
                object_type: "Box".into(),
                pose: Some(Default::default()),
                parameters: vec![],
            }],
            ..Scene::default()
        })
        .unwrap()
    }

    fn project_with_actions(params: Vec<ActionParameter>) -> CachedProject {
        let mut producer = Action {
            id: "a1".into(),
            name: "producer".into(),
            action_type: "o1/pick".into(),
            parameters: vec![],
            flows: vec![Flow {
                flow_type: DEFAULT_FLOW.into(),
                outputs: vec!["out_value".into()],
            }],
        };
        producer.parameters = vec![];
        let consumer = Action {
            id: "a2".into(),
            name: "consumer".into(),
            action_type: "o1/pick".into(),
            parameters: params,
            flows: vec![Flow::default()],
        };
        let mut ap = ActionPoint::from_bare(BareActionPoint {
            id: "ap1".into(),
            name: "ap_one".into(),
            position: Default::default(),
            parent: None,
        });
        ap.actions = vec![producer, consumer];
        CachedProject::new(Project {
            id: "prj_1".into(),
            name: "p".into(),
            scene_id: "scn_1".into(),
            action_points: vec![ap],
            ..Project::default()
        })
        .unwrap()
    }

    #[test]
    fn link_type_mismatch_is_reported() {
        // producer's output type is "string", consumer wants "integer"
        let project = project_with_actions(vec![ActionParameter {
            name: "x".into(),
            param_type: "integer".into(),
            value: "a1/default/0".into(),
            kind: ActionParameterKind::Link,
        }]);
        let problems = project_problems(&scene(), &project, &types_with_action());
        assert!(problems
            .iter()
            .any(|p| p == "Param type does not match action output type."));
    }

    #[test]
    fn valid_project_has_no_problems() {
        let project = project_with_actions(vec![ActionParameter {
            name: "x".into(),
            param_type: "integer".into(),
            value: "1".into(),
            kind: ActionParameterKind::Value,
        }]);
        let problems = project_problems(&scene(), &project, &types_with_action());
        assert!(problems.is_empty(), "{problems:?}");
    }

    #[test]
    fn executable_needs_unique_start_and_reachable_end() {
        let mut project = project_with_actions(vec![]);
        assert!(!executable_problems(&project).is_empty());
        project.upsert_logic_item(LogicItem {
            id: "l1".into(),
            start: LOGIC_START.into(),
            end: "a1".into(),
            condition: None,
        });
        // END not reachable yet
        assert!(!executable_problems(&project).is_empty());
        project.upsert_logic_item(LogicItem {
            id: "l2".into(),
            start: "a1".into(),
            end: LOGIC_END.into(),
            condition: None,
        });
        assert!(executable_problems(&project).is_empty());
    }

    #[test]
    fn partial_boolean_branch_is_not_executable() {
        let mut project = project_with_actions(vec![]);
        project.upsert_logic_item(LogicItem {
            id: "l1".into(),
            start: LOGIC_START.into(),
            end: "a1".into(),
            condition: None,
        });
        project.upsert_logic_item(LogicItem {
            id: "l2".into(),
            start: "a1".into(),
            end: LOGIC_END.into(),
            condition: Some(LogicCondition {
                what: "a1/default/0".into(),
                value: "true".into(),
            }),
        });
        let problems = executable_problems(&project);
        assert!(problems.iter().any(|p| p.contains("boolean")));
    }
}
