//! Robot helpers: feature checks, move orchestration with start/end/failed
//! events, and the periodic joints/eef event streamers.

use std::sync::Arc;

use arhub_data::common::Joint;
use arhub_data::events::{
    EefPose, Event, EventData, MoveEventType, RobotEefData, RobotJointsData,
    RobotMoveToApJointsData, RobotMoveToApOrientationData, RobotMoveToJointsData,
    RobotMoveToPoseData,
};
use arhub_data::math::Pose;
use arhub_data::rpc::robot::RobotEventKind;

use crate::context::Ctx;
use crate::error::{HubError, Result};
use crate::runtime::RobotInstance;

/// Fails unless the robot's type actually overrides the capability.
pub fn ensure_feature(robot: &dyn RobotInstance, feature: &str) -> Result<()> {
    let features = robot.features();
    let supported = match feature {
        "move_to_pose" => features.move_to_pose,
        "move_to_joints" => features.move_to_joints,
        "stop" => features.stop,
        "inverse_kinematics" => features.inverse_kinematics,
        "forward_kinematics" => features.forward_kinematics,
        "hand_teaching" => features.hand_teaching,
        _ => false,
    };
    if supported {
        Ok(())
    } else {
        Err(HubError::precondition(format!(
            "Robot does not support {feature}."
        )))
    }
}

/// A robot that is moving or executing an editor-run action must not accept
/// another movement.
pub async fn check_robot_before_move(ctx: &Ctx, robot_id: &str) -> Result<()> {
    let instance = ctx.runtime.robot(robot_id)?;
    let robot = instance.as_robot().expect("checked robot");
    if robot.move_in_progress() {
        return Err(HubError::precondition("Robot is moving."));
    }
    let editing = ctx.editing.lock().await;
    if let Some(action_id) = &editing.running_action {
        if let Ok(project) = editing.project() {
            if let Ok(action) = project.action(action_id) {
                if let Ok((obj_id, _)) = action.parse_type() {
                    if obj_id == robot_id {
                        return Err(HubError::precondition("Robot is executing action."));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Runs the movement in the background: a `start` event, the blocking move,
/// then `end` or `failed` with the message.
pub fn move_to_pose_task(
    ctx: Arc<Ctx>,
    robot_id: String,
    end_effector_id: String,
    pose: Pose,
    speed: f64,
    safe: bool,
) {
    tokio::spawn(async move {
        let event = |move_event_type, message: Option<String>| {
            Event::new(EventData::RobotMoveToPose(RobotMoveToPoseData {
                move_event_type,
                robot_id: robot_id.clone(),
                end_effector_id: end_effector_id.clone(),
                target_pose: pose,
                safe,
                message,
            }))
        };
        ctx.broadcast(event(MoveEventType::Start, None));
        let outcome = async {
            let instance = ctx.runtime.robot(&robot_id)?;
            let robot = instance.as_robot().expect("checked robot");
            robot.move_to_pose(&end_effector_id, &pose, speed, safe).await
        }
        .await;
        match outcome {
            Ok(()) => ctx.broadcast(event(MoveEventType::End, None)),
            Err(e) => {
                tracing::error!("robot movement failed: {e}");
                ctx.broadcast(event(MoveEventType::Failed, Some(e.to_string())));
            }
        }
    });
}

pub fn move_to_joints_task(
    ctx: Arc<Ctx>,
    robot_id: String,
    joints: Vec<Joint>,
    speed: f64,
    safe: bool,
) {
    tokio::spawn(async move {
        let event = |move_event_type, message: Option<String>| {
            Event::new(EventData::RobotMoveToJoints(RobotMoveToJointsData {
                move_event_type,
                robot_id: robot_id.clone(),
                target_joints: joints.clone(),
                safe,
                message,
            }))
        };
        ctx.broadcast(event(MoveEventType::Start, None));
        let outcome = async {
            let instance = ctx.runtime.robot(&robot_id)?;
            let robot = instance.as_robot().expect("checked robot");
            robot.move_to_joints(&joints, speed, safe).await
        }
        .await;
        match outcome {
            Ok(()) => ctx.broadcast(event(MoveEventType::End, None)),
            Err(e) => {
                tracing::error!("robot movement failed: {e}");
                ctx.broadcast(event(MoveEventType::Failed, Some(e.to_string())));
            }
        }
    });
}

/// Move to an AP orientation: the target pose is the AP position plus the
/// named orientation.
pub fn move_to_ap_orientation_task(
    ctx: Arc<Ctx>,
    robot_id: String,
    end_effector_id: String,
    orientation_id: String,
    pose: Pose,
    speed: f64,
    safe: bool,
) {
    tokio::spawn(async move {
        let event = |move_event_type, message: Option<String>| {
            Event::new(EventData::RobotMoveToActionPointOrientation(
                RobotMoveToApOrientationData {
                    move_event_type,
                    robot_id: robot_id.clone(),
                    end_effector_id: end_effector_id.clone(),
                    orientation_id: orientation_id.clone(),
                    safe,
                    message,
                },
            ))
        };
        ctx.broadcast(event(MoveEventType::Start, None));
        let outcome = async {
            let instance = ctx.runtime.robot(&robot_id)?;
            let robot = instance.as_robot().expect("checked robot");
            robot.move_to_pose(&end_effector_id, &pose, speed, safe).await
        }
        .await;
        match outcome {
            Ok(()) => ctx.broadcast(event(MoveEventType::End, None)),
            Err(e) => ctx.broadcast(event(MoveEventType::Failed, Some(e.to_string()))),
        }
    });
}

pub fn move_to_ap_joints_task(
    ctx: Arc<Ctx>,
    robot_id: String,
    joints_id: String,
    joints: Vec<Joint>,
    speed: f64,
    safe: bool,
) {
    tokio::spawn(async move {
        let event = |move_event_type, message: Option<String>| {
            Event::new(EventData::RobotMoveToActionPointJoints(
                RobotMoveToApJointsData {
                    move_event_type,
                    robot_id: robot_id.clone(),
                    joints_id: joints_id.clone(),
                    safe,
                    message,
                },
            ))
        };
        ctx.broadcast(event(MoveEventType::Start, None));
        let outcome = async {
            let instance = ctx.runtime.robot(&robot_id)?;
            let robot = instance.as_robot().expect("checked robot");
            robot.move_to_joints(&joints, speed, safe).await
        }
        .await;
        match outcome {
            Ok(()) => ctx.broadcast(event(MoveEventType::End, None)),
            Err(e) => ctx.broadcast(event(MoveEventType::Failed, Some(e.to_string()))),
        }
    });
}

/// Registers/unregisters a client for a robot's periodic events; the first
/// registration spawns the streamer task.
pub fn register_for_robot_event(
    ctx: &Arc<Ctx>,
    client: uuid::Uuid,
    robot_id: String,
    what: RobotEventKind,
    send: bool,
) {
    let spawn_streamer = {
        let mut streams = ctx.robot_streams.lock().expect("streams mutex");
        let was_empty = streams.is_empty();
        let key = (robot_id, what);
        if send {
            streams.entry(key).or_default().insert(client);
        } else if let Some(subscribers) = streams.get_mut(&key) {
            subscribers.remove(&client);
            if subscribers.is_empty() {
                streams.remove(&key);
            }
        }
        was_empty && !streams.is_empty()
    };
    if spawn_streamer {
        tokio::spawn(streamer_task(ctx.clone()));
    }
}

/// Emits `RobotJoints` / `RobotEef` to the registered clients at the
/// configured period. Exits when nobody is registered, the scene stops, or
/// the hub shuts down.
async fn streamer_task(ctx: Arc<Ctx>) {
    let period = ctx.settings.streaming_period;
    let mut shutdown = ctx.shutdown.subscribe();
    loop {
        if *shutdown.borrow() {
            return;
        }
        if !ctx.runtime.started() {
            ctx.robot_streams.lock().expect("streams mutex").clear();
            return;
        }
        let registrations: Vec<((String, RobotEventKind), Vec<uuid::Uuid>)> = {
            let streams = ctx.robot_streams.lock().expect("streams mutex");
            if streams.is_empty() {
                return;
            }
            streams
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
                .collect()
        };

        for ((robot_id, what), subscribers) in registrations {
            let instance = match ctx.runtime.robot(&robot_id) {
                Ok(i) => i,
                Err(_) => continue,
            };
            let robot = instance.as_robot().expect("checked robot");
            let event = match what {
                RobotEventKind::Joints => match robot.robot_joints().await {
                    Ok(joints) => Event::new(EventData::RobotJoints(RobotJointsData {
                        robot_id: robot_id.clone(),
                        joints,
                    })),
                    Err(_) => continue,
                },
                RobotEventKind::EefPose => {
                    let mut end_effectors = Vec::new();
                    if let Ok(ids) = robot.end_effectors().await {
                        for id in ids {
                            if let Ok(pose) = robot.end_effector_pose(&id).await {
                                end_effectors.push(EefPose {
                                    end_effector_id: id,
                                    pose,
                                });
                            }
                        }
                    }
                    if end_effectors.is_empty() {
                        continue;
                    }
                    Event::new(EventData::RobotEef(RobotEefData {
                        robot_id: robot_id.clone(),
                        end_effectors,
                    }))
                }
            };
            for client in subscribers {
                ctx.clients.event(client, &event);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shutdown.changed() => {}
        }
    }
}
