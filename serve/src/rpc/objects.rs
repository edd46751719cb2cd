//! Object-type RPCs: catalogue queries and type management.

use arhub::error::{HubError, Result};
use arhub::services::ObjectTypeRecord;
use arhub_data::events::{ChangeType, Event, EventData};
use arhub_data::object_type::ObjectTypeMeta;
use arhub_data::rpc::objects::*;
use arhub_data::rpc::IdArgs;

use crate::dispatch::{Call, Out};

pub async fn get_object_types(call: &Call<'_>) -> Result<Out> {
    let metas = call.ctx.object_types.metas().await;
    Ok(Out::data(serde_json::to_value(metas)?))
}

pub async fn get_actions(call: &Call<'_>, args: GetActionsArgs) -> Result<Out> {
    let actions = call.ctx.object_types.actions(&args.object_type).await?;
    Ok(Out::data(serde_json::to_value(actions)?))
}

pub async fn get_robot_meta(call: &Call<'_>) -> Result<Out> {
    let metas = call.ctx.object_types.robot_metas().await;
    Ok(Out::data(serde_json::to_value(metas)?))
}

pub async fn new_object_type(call: &Call<'_>, meta: ObjectTypeMeta) -> Result<Out> {
    let ctx = call.ctx;
    arhub_data::helpers::check_pascal_case(&meta.object_type)?;
    if ctx.object_types.contains(&meta.object_type).await {
        return Err(HubError::validation("Object type already exists."));
    }
    let base = meta
        .base
        .clone()
        .ok_or_else(|| HubError::validation("Base type has to be set."))?;
    let base_data = ctx.object_types.get(&base).await?;
    if base_data.meta.disabled {
        return Err(HubError::precondition("Base type is disabled."));
    }
    if meta.has_pose != base_data.meta.has_pose && !base_data.meta.built_in {
        return Err(HubError::validation("Pose flag has to match the base."));
    }
    if call.dry_run {
        return Ok(Out::empty());
    }

    let record = ObjectTypeRecord {
        id: meta.object_type.clone(),
        source: String::new(),
        model: meta.object_model.clone(),
        modified: None,
    };
    ctx.storage.put_object_type(&record).await?;
    ctx.object_types.insert_meta(meta.clone()).await;
    Ok(Out::broadcast(Event::with_change(
        EventData::ChangedObjectTypes(vec![meta]),
        ChangeType::Add,
    )))
}

pub async fn update_object_model(call: &Call<'_>, args: UpdateObjectModelArgs) -> Result<Out> {
    let ctx = call.ctx;
    ctx.ensure_locked(&args.object_type_id, call.client).await?;
    let data = ctx.object_types.get(&args.object_type_id).await?;
    if data.meta.built_in {
        return Err(HubError::validation("Cannot modify built-in type."));
    }
    if call.dry_run {
        return Ok(Out::empty());
    }

    let record = ObjectTypeRecord {
        id: args.object_type_id.clone(),
        source: String::new(),
        model: Some(args.object_model.clone()),
        modified: None,
    };
    ctx.storage.put_object_type(&record).await?;
    let meta = ctx
        .object_types
        .update_model(&args.object_type_id, args.object_model)
        .await?;
    Ok(Out::broadcast(Event::with_change(
        EventData::ChangedObjectTypes(vec![meta]),
        ChangeType::Update,
    )))
}

async fn scenes_using_type(call: &Call<'_>, object_type: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for desc in call.ctx.storage.list_scenes().await? {
        if let Ok(scene) = call.ctx.storage.get_scene(&desc.id).await {
            if scene.objects.iter().any(|o| o.object_type == object_type) {
                out.push(scene.id);
            }
        }
    }
    Ok(out)
}

pub async fn delete_object_types(call: &Call<'_>, args: DeleteObjectTypesArgs) -> Result<Out> {
    let ctx = call.ctx;
    let targets: Vec<String> = if args.ids.is_empty() {
        ctx.object_types
            .metas()
            .await
            .into_iter()
            .filter(|m| !m.built_in)
            .map(|m| m.object_type)
            .collect()
    } else {
        args.ids
    };

    let mut removed = Vec::new();
    let mut problems = Vec::new();
    for object_type in targets {
        let data = match ctx.object_types.get(&object_type).await {
            Ok(d) => d,
            Err(e) => {
                problems.push(format!("{object_type}: {e}"));
                continue;
            }
        };
        if data.meta.built_in {
            problems.push(format!("{object_type}: cannot delete built-in type."));
            continue;
        }
        let used_by = scenes_using_type(call, &object_type).await?;
        if !used_by.is_empty() {
            problems.push(format!(
                "{object_type}: used by scenes {}.",
                used_by.join(", ")
            ));
            continue;
        }
        if call.dry_run {
            continue;
        }
        ctx.storage.delete_object_type(&object_type).await?;
        ctx.object_types.remove(&object_type).await?;
        removed.push(data.meta.clone());
    }

    if !problems.is_empty() {
        return Err(HubError::precondition(problems.join("\n")));
    }
    if call.dry_run || removed.is_empty() {
        return Ok(Out::empty());
    }
    Ok(Out::broadcast(Event::with_change(
        EventData::ChangedObjectTypes(removed),
        ChangeType::Remove,
    )))
}

pub async fn object_type_usage(call: &Call<'_>, args: IdArgs) -> Result<Out> {
    call.ctx.object_types.get(&args.id).await?;
    let scenes = scenes_using_type(call, &args.id).await?;
    Ok(Out::data(serde_json::to_value(UsageData {
        scenes,
        projects: Vec::new(),
    })?))
}
