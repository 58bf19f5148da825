// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Method handlers: map client requests onto state transitions.
//!
//! Replies that depend on durable state (create, complete, cancel, stop) are
//! deferred through persist-command completions; everything else replies
//! synchronously. Errors never escape as anything but an envelope.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use am_core::{ActivityCommand, ActivityId, ActivitySpec, AmError, BusType};
use am_wire::{
    ActivityRef, CompleteUpdates, ListFlags, Reply, ReplyBody, Request, PROTOCOL_VERSION,
};

use crate::engine::effect::Fx;
use crate::engine::ConnCtx;
use crate::model::activity::Activity;
use crate::model::details;
use crate::model::persist::{Completion, PersistCmdKind};
use crate::model::schedule::Schedule;
use crate::model::subscription::Subscription;
use crate::model::trigger::Trigger;
use crate::model::{EngineState, ENABLE_EXTERNAL};

type ReplyTx = oneshot::Sender<Reply>;

fn send(reply: ReplyTx, value: Reply) {
    let _ = reply.send(value);
}

fn send_result(reply: ReplyTx, result: Result<Reply, AmError>) {
    send(reply, result.into());
}

/// Top-level dispatch for one request.
pub fn handle_request(
    state: &mut EngineState,
    ctx: ConnCtx,
    request: Request,
    reply: ReplyTx,
    now: DateTime<Utc>,
    fx: &mut Fx,
) {
    if request.is_private_only() && ctx.bus == BusType::Public {
        send(
            reply,
            Reply::error(&AmError::access_denied("method restricted to the private bus")),
        );
        return;
    }
    match request {
        Request::Ping => send(reply, Reply::ok()),
        Request::Hello { version, .. } => {
            tracing::debug!(conn = ctx.conn_id, client_version = version, "hello");
            send(
                reply,
                Reply::with_body(ReplyBody::Hello { version: PROTOCOL_VERSION.to_string() }),
            );
        }

        Request::Create { spec, subscribe, detailed_events, start, replace } => {
            create(state, ctx, spec, subscribe, detailed_events, start, replace, reply, now, fx);
        }

        Request::Monitor { target, subscribe, detailed_events } => {
            let result = monitor(state, &ctx, &target, subscribe, detailed_events, fx);
            send_result(reply, result);
        }

        Request::Join { target, subscribe, detailed_events } => {
            let result = join(state, &ctx, &target, subscribe, detailed_events, fx);
            send_result(reply, result);
        }

        Request::Adopt { target, wait, subscribe, detailed_events } => {
            let result = adopt(state, &ctx, &target, wait, subscribe, detailed_events, now, fx);
            send_result(reply, result);
        }

        Request::Release { target } => {
            let result = resolve(state, &ctx, &target)
                .and_then(|id| state.release(id, &ctx.caller))
                .map(|()| Reply::ok());
            send_result(reply, result);
        }

        Request::Complete { target, restart, force, updates } => {
            complete(state, ctx, &target, restart, force, updates, reply, now, fx);
        }

        Request::Cancel { target } => {
            end_request(state, &ctx, &target, ActivityCommand::Cancel, reply, now, fx);
        }
        Request::Stop { target } => {
            end_request(state, &ctx, &target, ActivityCommand::Stop, reply, now, fx);
        }

        Request::Pause { target } => {
            let result = resolve(state, &ctx, &target)
                .and_then(|id| state.send_command(id, ActivityCommand::Pause, false, now, fx))
                .map(|()| Reply::ok());
            send_result(reply, result);
        }

        Request::Start { target } => {
            let result = resolve(state, &ctx, &target)
                .and_then(|id| state.send_command(id, ActivityCommand::Start, false, now, fx))
                .map(|()| Reply::ok());
            send_result(reply, result);
        }

        Request::Schedule { target } => {
            let result = resolve(state, &ctx, &target).map(|id| {
                let uninitialized = state
                    .registry
                    .get(id)
                    .map(|a| !a.initialized && !a.ending)
                    .unwrap_or(false);
                if uninitialized {
                    state.request_schedule(id, now, fx);
                }
                Reply::ok()
            });
            send_result(reply, result);
        }

        Request::Focus { target } => {
            let result = resolve(state, &ctx, &target)
                .and_then(|id| state.focus_activity(id, fx))
                .map(|()| Reply::ok());
            send_result(reply, result);
        }
        Request::Unfocus { target } => {
            let result = resolve(state, &ctx, &target)
                .and_then(|id| state.unfocus_activity(id, fx))
                .map(|()| Reply::ok());
            send_result(reply, result);
        }
        Request::AddFocus { source_id, target_id } => {
            let result = state.add_focus(source_id, target_id, fx).map(|()| Reply::ok());
            send_result(reply, result);
        }

        Request::List { flags } => {
            let mut activities: Vec<_> =
                state.registry.iter().map(|act| details::build(act, flags)).collect();
            activities.sort_by_key(|d| d.activity_id);
            send(reply, Reply::with_body(ReplyBody::List { activities }));
        }

        Request::GetDetails { target, current } => {
            let result = resolve(state, &ctx, &target).map(|id| {
                let flags =
                    ListFlags { details: true, subscribers: true, current, internal: false };
                match state.registry.get(id) {
                    Some(act) => Reply::with_body(ReplyBody::Details {
                        activity: Box::new(details::build(act, flags)),
                    }),
                    None => Reply::error(&AmError::not_found("activity vanished")),
                }
            });
            send_result(reply, result);
        }

        Request::Info => {
            send(reply, Reply::with_body(ReplyBody::Info { info: Box::new(state.info()) }));
        }

        Request::MapProcess { pid, container_name, ids } => {
            let ids: Vec<am_core::BusId> =
                ids.iter().map(|s| am_core::BusId::parse(s)).collect();
            state.resources.map_process(&container_name, &ids, pid, fx);
            send(reply, Reply::ok());
        }

        Request::Enable => {
            state.enable(ENABLE_EXTERNAL, now, fx);
            send(reply, Reply::ok());
        }
        Request::Disable => {
            state.disable(ENABLE_EXTERNAL);
            send(reply, Reply::ok());
        }
    }
}

/// Resolve a target reference against the registry.
fn resolve(
    state: &EngineState,
    ctx: &ConnCtx,
    target: &ActivityRef,
) -> Result<ActivityId, AmError> {
    if let Some(id) = target.id {
        state.registry.require(id)?;
        return Ok(id);
    }
    if let Some(name) = &target.name {
        return state
            .registry
            .find_by_name(name, &ctx.caller)
            .ok_or_else(|| AmError::not_found(format!("no activity named {name:?} for caller")));
    }
    Err(AmError::invalid_argument("activityId or activityName required"))
}

/// Create a subscription bound to this connection and track it for cleanup.
fn subscribe_conn(
    state: &mut EngineState,
    ctx: &ConnCtx,
    id: ActivityId,
    detailed: bool,
    fx: &mut Fx,
) -> Result<am_core::SubscriptionId, AmError> {
    let sub = Subscription::new(ctx.caller.clone(), detailed, ctx.outlet.clone());
    let sub_id = state.add_subscription(id, sub, fx)?;
    state.track_conn_subscription(ctx.conn_id, id, sub_id);
    Ok(sub_id)
}

#[allow(clippy::too_many_arguments)]
fn create(
    state: &mut EngineState,
    ctx: ConnCtx,
    spec: ActivitySpec,
    subscribe: bool,
    detailed: bool,
    start: bool,
    replace: bool,
    reply: ReplyTx,
    now: DateTime<Utc>,
    fx: &mut Fx,
) {
    tracing::info!(name = %spec.name, caller = %ctx.caller, replace, "create");
    if let Err(err) = spec.validate() {
        send(reply, Reply::error(&err));
        return;
    }
    if !subscribe && !(start && spec.callback.is_some()) {
        send(
            reply,
            Reply::error(&AmError::invalid_argument(
                "created activity must specify start and a callback if not subscribed",
            )),
        );
        return;
    }

    let id = state.registry.allocate_id();
    let mut act = Activity::new(id, spec, ctx.caller.clone());
    if let Err(err) = state.instantiate_gating(&mut act) {
        send(reply, Reply::error(&err));
        return;
    }

    let old = state.registry.find_by_name(act.name(), &act.creator);
    if let Some(old_id) = old {
        if !replace {
            tracing::warn!(name = act.name(), existing = %old_id, "create collision without replace");
            send(reply, Reply::error(&AmError::exists("activity with that name already exists")));
            return;
        }
    }

    state.registry.insert(act);
    state.registry.register_name(id);

    let completion = Completion::FinishCreate {
        reply,
        outlet: ctx.outlet.clone(),
        conn_id: ctx.conn_id,
        caller: ctx.caller.clone(),
        subscribe,
        detailed,
        start,
    };

    match old {
        Some(old_id) => {
            // Past the point of no return: cancel and replace the old one.
            if let Some(old_act) = state.registry.get_mut(old_id) {
                old_act.terminate = true;
                old_act.plug_all_subscriptions();
            }
            state.registry.unregister_name(old_id);
            // Chain first so the old Activity's teardown blocks on it.
            state.ensure_replace_completion(old_id, id, completion, now, fx);
            if let Err(err) = state.send_command(old_id, ActivityCommand::Cancel, true, now, fx) {
                tracing::warn!(activity = %old_id, error = %err, "cancel of replaced activity failed");
            }
            if let Some(old_act) = state.registry.get_mut(old_id) {
                old_act.unplug_all_subscriptions();
            }
        }
        None => {
            state.ensure_completion(id, PersistCmdKind::Store, completion, now, fx);
        }
    }
}

fn monitor(
    state: &mut EngineState,
    ctx: &ConnCtx,
    target: &ActivityRef,
    subscribe: bool,
    detailed: bool,
    fx: &mut Fx,
) -> Result<Reply, AmError> {
    let id = resolve(state, ctx, target)?;
    if subscribe {
        subscribe_conn(state, ctx, id, detailed, fx)?;
    }
    let activity_state = state.registry.require(id)?.state();
    Ok(Reply::with_body(ReplyBody::State { activity_id: id, state: activity_state }))
}

fn join(
    state: &mut EngineState,
    ctx: &ConnCtx,
    target: &ActivityRef,
    subscribe: bool,
    detailed: bool,
    fx: &mut Fx,
) -> Result<Reply, AmError> {
    if !subscribe {
        return Err(AmError::invalid_argument("join method calls must subscribe"));
    }
    let id = resolve(state, ctx, target)?;
    subscribe_conn(state, ctx, id, detailed, fx)?;
    Ok(Reply::ok())
}

#[allow(clippy::too_many_arguments)]
fn adopt(
    state: &mut EngineState,
    ctx: &ConnCtx,
    target: &ActivityRef,
    wait: bool,
    subscribe: bool,
    detailed: bool,
    now: DateTime<Utc>,
    fx: &mut Fx,
) -> Result<Reply, AmError> {
    if !subscribe {
        return Err(AmError::invalid_argument("adopt method calls must subscribe"));
    }
    let id = resolve(state, ctx, target)?;
    let sub_id = subscribe_conn(state, ctx, id, detailed, fx)?;
    match state.adopt(id, sub_id, wait) {
        Ok(adopted) => Ok(Reply::adopted(id, adopted)),
        Err(err) => {
            // The failed call takes its subscription with it.
            state.remove_subscription(id, sub_id, now, fx);
            state.untrack_conn_subscription(ctx.conn_id, sub_id);
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn complete(
    state: &mut EngineState,
    ctx: ConnCtx,
    target: &ActivityRef,
    restart: bool,
    force: bool,
    updates: CompleteUpdates,
    reply: ReplyTx,
    now: DateTime<Utc>,
    fx: &mut Fx,
) {
    let prepared = resolve(state, &ctx, target).and_then(|id| {
        state.check_complete_caller(id, &ctx.caller, force)?;
        Ok(id)
    });
    let id = match prepared {
        Ok(id) => id,
        Err(err) => {
            send(reply, Reply::error(&err));
            return;
        }
    };
    tracing::info!(activity = %id, caller = %ctx.caller, restart, "complete");

    if restart {
        if let Err(err) = apply_updates(state, id, &updates) {
            send(reply, Reply::error(&err));
            return;
        }
        if let Some(act) = state.registry.get_mut(id) {
            act.restart = true;
        }
    } else if let Some(act) = state.registry.get_mut(id) {
        act.terminate = true;
    }

    if let Some(act) = state.registry.get_mut(id) {
        act.plug_all_subscriptions();
    }
    if let Err(err) = state.send_command(id, ActivityCommand::Complete, false, now, fx) {
        if let Some(act) = state.registry.get_mut(id) {
            act.terminate = false;
            act.restart = false;
            act.unplug_all_subscriptions();
        }
        send(reply, Reply::error(&err));
        return;
    }

    let kind = if restart { PersistCmdKind::Store } else { PersistCmdKind::Delete };
    state.ensure_completion(
        id,
        kind,
        Completion::FinishEnd { reply: Some(reply), restart },
        now,
        fx,
    );
    if let Some(act) = state.registry.get_mut(id) {
        act.unplug_all_subscriptions();
    }
}

/// Shared cancel/stop path. Repeating the command an Activity is already
/// ending with is a no-op.
fn end_request(
    state: &mut EngineState,
    ctx: &ConnCtx,
    target: &ActivityRef,
    command: ActivityCommand,
    reply: ReplyTx,
    now: DateTime<Utc>,
    fx: &mut Fx,
) {
    let id = match resolve(state, ctx, target) {
        Ok(id) => id,
        Err(err) => {
            send(reply, Reply::error(&err));
            return;
        }
    };
    let repeat = state.registry.get(id).map(|a| a.ext_command == command).unwrap_or(false);
    if repeat {
        send(reply, Reply::ok());
        return;
    }
    tracing::info!(activity = %id, command = %command, caller = %ctx.caller, "end request");

    if let Some(act) = state.registry.get_mut(id) {
        act.plug_all_subscriptions();
        act.terminate = true;
    }
    if let Err(err) = state.send_command(id, command, false, now, fx) {
        if let Some(act) = state.registry.get_mut(id) {
            act.terminate = false;
            act.unplug_all_subscriptions();
        }
        send(reply, Reply::error(&err));
        return;
    }
    state.ensure_completion(
        id,
        PersistCmdKind::Delete,
        Completion::FinishEnd { reply: Some(reply), restart: false },
        now,
        fx,
    );
    if let Some(act) = state.registry.get_mut(id) {
        act.unplug_all_subscriptions();
    }
}

/// Apply `complete(restart)` spec updates, re-instantiating the affected
/// gating children. Requirement updates are validated before anything is
/// replaced.
fn apply_updates(
    state: &mut EngineState,
    id: ActivityId,
    updates: &CompleteUpdates,
) -> Result<(), AmError> {
    if updates.is_empty() {
        return Ok(());
    }
    // Validate first: unknown requirements must not leave a half-updated spec.
    let new_requirements = match &updates.requirements {
        Some(reqs) => {
            let mut out = indexmap::IndexMap::new();
            for (name, desired) in reqs {
                let req = state.requirements.instantiate(name, desired)?;
                out.insert(name.clone(), req);
            }
            Some(out)
        }
        None => None,
    };
    if let Some(schedule) = &updates.schedule {
        schedule.validate().map_err(AmError::invalid_argument)?;
    }

    let act = state.registry.require_mut(id)?;
    if let Some(cb) = &updates.callback {
        act.spec.callback = Some(cb.clone());
    }
    if let Some(schedule) = &updates.schedule {
        act.spec.schedule = Some(schedule.clone());
        act.schedule = Some(Schedule::new(schedule.clone()));
    }
    if let Some(trigger) = &updates.trigger {
        act.spec.trigger = Some(trigger.clone());
        act.trigger = Some(Trigger::exclusive(id, trigger));
    }
    if let Some(reqs) = new_requirements {
        act.spec.requirements = updates.requirements.clone().unwrap_or_default();
        act.requirements = reqs;
    }
    if let Some(metadata) = &updates.metadata {
        if !metadata.is_object() {
            return Err(AmError::invalid_argument("metadata must be an object"));
        }
        act.spec.metadata = Some(metadata.clone());
    }
    Ok(())
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
