// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence command pipeline.
//!
//! Commands form per-Activity FIFOs joined into cross-Activity chains on
//! replace. Externally visible state never leads durable state: replies and
//! event delivery gate on the owning command completing, and command _k+1_
//! begins only after command _k_ completes. Chains execute iteratively, never
//! recursively.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use am_core::{ActivityId, BusId, CmdId};
use am_wire::Reply;

use crate::model::subscription::EventSender;

/// `(document id, revision)` handle into the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PersistToken {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl PersistToken {
    pub fn is_valid(&self) -> bool {
        self.doc_id.is_some()
    }
}

/// What a command does against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistCmdKind {
    /// Serialize and put the current Activity document.
    Store,
    /// Delete the Activity's document.
    Delete,
    /// Ordering placeholder: completes immediately, used to wait on another
    /// Activity's chain.
    Noop,
}

am_core::simple_display! {
    PersistCmdKind {
        Store => "store",
        Delete => "delete",
        Noop => "noop",
    }
}

/// Channel half for the deferred method reply.
pub type ReplyTx = oneshot::Sender<Reply>;

/// Continuation run when a command completes.
///
/// Mirrors the method-completion pattern: the client reply (and any follow-on
/// method work) happens only after the durable state caught up.
#[derive(Debug)]
pub enum Completion {
    None,
    /// Finish `create`: subscribe/parent the caller, reply, maybe start.
    FinishCreate {
        reply: ReplyTx,
        outlet: EventSender,
        conn_id: u64,
        caller: BusId,
        subscribe: bool,
        detailed: bool,
        start: bool,
    },
    /// Finish the replaced Activity's side: drop its claim on the token.
    FinishReplace,
    /// Finish `complete`/`cancel`/`stop`: release the name unless
    /// restarting, then reply.
    FinishEnd { reply: Option<ReplyTx>, restart: bool },
}

/// One queued persistence command.
#[derive(Debug)]
pub struct PersistCommand {
    pub id: CmdId,
    pub activity_id: ActivityId,
    pub kind: PersistCmdKind,
    /// Chain continuation, possibly crossing to another Activity.
    pub next: Option<CmdId>,
    pub completion: Completion,
    /// Replace stores adopt the replaced Activity's token at dispatch time,
    /// so a document id landing mid-chain still reaches the overwrite.
    pub token_from: Option<ActivityId>,
}

/// Slab of live commands plus chain plumbing.
#[derive(Debug, Default)]
pub struct PersistPipeline {
    commands: HashMap<CmdId, PersistCommand>,
}

impl PersistPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        activity_id: ActivityId,
        kind: PersistCmdKind,
        completion: Completion,
    ) -> CmdId {
        let id = CmdId::new();
        self.commands.insert(
            id,
            PersistCommand { id, activity_id, kind, next: None, completion, token_from: None },
        );
        id
    }

    pub fn get(&self, id: CmdId) -> Option<&PersistCommand> {
        self.commands.get(&id)
    }

    pub fn get_mut(&mut self, id: CmdId) -> Option<&mut PersistCommand> {
        self.commands.get_mut(&id)
    }

    pub fn remove(&mut self, id: CmdId) -> Option<PersistCommand> {
        self.commands.remove(&id)
    }

    /// Append `new` at the end of the chain starting at `head`.
    ///
    /// Walks the `next` links with a loop guard; appending a command to its
    /// own chain is refused.
    pub fn append(&mut self, head: CmdId, new: CmdId) {
        if head == new {
            tracing::warn!(cmd = %new, "refusing to append persist command to itself");
            return;
        }
        let mut cursor = head;
        loop {
            let Some(cmd) = self.commands.get(&cursor) else {
                tracing::warn!(cmd = %cursor, "broken persist chain during append");
                return;
            };
            match cmd.next {
                Some(next) if next == new => {
                    tracing::warn!(cmd = %new, "append would create a persist chain loop");
                    return;
                }
                Some(next) => cursor = next,
                None => break,
            }
        }
        if let Some(tail) = self.commands.get_mut(&cursor) {
            tail.next = Some(new);
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

use chrono::{DateTime, Utc};

use crate::engine::effect::{Effect, Fx, StoreOp};
use crate::model::subscription::Subscription;
use crate::model::EngineState;
use am_core::ActivityCommand;

impl EngineState {
    /// Gate a method completion behind the Activity's durable state.
    ///
    /// Persistent Activities hook a real store/delete command; a
    /// non-persistent Activity with commands already in flight hooks a no-op
    /// to preserve ordering; otherwise the completion runs synchronously.
    pub fn ensure_completion(
        &mut self,
        id: ActivityId,
        kind: PersistCmdKind,
        completion: Completion,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        let (persistent, head) = match self.registry.get_mut(id) {
            Some(act) => {
                if act.is_persistent() && act.persist_token.is_none() {
                    act.persist_token = Some(PersistToken::default());
                }
                (act.is_persistent(), act.hooked_persist_command())
            }
            None => {
                self.run_completion_for(id, completion, false, now, fx);
                return;
            }
        };

        if persistent {
            let cmd = self.persist.create(id, kind, completion);
            if let Some(act) = self.registry.get_mut(id) {
                act.hook_persist_command(cmd);
            }
            match head {
                Some(head) => self.persist.append(head, cmd),
                None => self.run_persist(cmd, now, fx),
            }
        } else if let Some(head) = head {
            let cmd = self.persist.create(id, PersistCmdKind::Noop, completion);
            if let Some(act) = self.registry.get_mut(id) {
                act.hook_persist_command(cmd);
            }
            self.persist.append(head, cmd);
        } else {
            self.run_completion_for(id, completion, true, now, fx);
        }
    }

    /// Chain a replace so the store never observes the new Activity existing
    /// while the old one also exists.
    ///
    /// The blocking command goes first: the new store (overwriting the shared
    /// document) when the new Activity persists, otherwise the old delete.
    pub fn ensure_replace_completion(
        &mut self,
        old_id: ActivityId,
        new_id: ActivityId,
        completion: Completion,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        let new_persistent =
            self.registry.get(new_id).map(|a| a.is_persistent()).unwrap_or(false);
        let old_persistent =
            self.registry.get(old_id).map(|a| a.is_persistent()).unwrap_or(false);
        let old_head = self.registry.get(old_id).and_then(|a| a.hooked_persist_command());

        if new_persistent {
            // The new Activity inherits the old token so its store overwrites
            // the same document.
            let inherited =
                self.registry.get(old_id).and_then(|a| a.persist_token.clone());
            if let Some(act) = self.registry.get_mut(new_id) {
                act.persist_token = Some(inherited.unwrap_or_default());
            }
            let new_cmd = self.persist.create(new_id, PersistCmdKind::Store, completion);
            if let Some(cmd) = self.persist.get_mut(new_cmd) {
                cmd.token_from = Some(old_id);
            }
            let old_cmd = self.persist.create(old_id, PersistCmdKind::Noop, Completion::FinishReplace);
            if let Some(act) = self.registry.get_mut(new_id) {
                act.hook_persist_command(new_cmd);
            }
            self.persist.append(new_cmd, old_cmd);
            if let Some(act) = self.registry.get_mut(old_id) {
                act.hook_persist_command(old_cmd);
            }
            match old_head {
                Some(head) => self.persist.append(head, new_cmd),
                None => self.run_persist(new_cmd, now, fx),
            }
        } else if old_persistent {
            let old_cmd =
                self.persist.create(old_id, PersistCmdKind::Delete, Completion::FinishReplace);
            let new_cmd = self.persist.create(new_id, PersistCmdKind::Noop, completion);
            if let Some(act) = self.registry.get_mut(new_id) {
                act.hook_persist_command(new_cmd);
            }
            self.persist.append(old_cmd, new_cmd);
            if let Some(act) = self.registry.get_mut(old_id) {
                act.hook_persist_command(old_cmd);
            }
            match old_head {
                Some(head) => self.persist.append(head, old_cmd),
                None => self.run_persist(old_cmd, now, fx),
            }
        } else if let Some(head) = old_head {
            // Neither persists, but the old is still waiting on someone
            // else's chain; the new must wait on the same thing.
            let new_cmd = self.persist.create(new_id, PersistCmdKind::Noop, completion);
            let old_cmd =
                self.persist.create(old_id, PersistCmdKind::Noop, Completion::FinishReplace);
            if let Some(act) = self.registry.get_mut(new_id) {
                act.hook_persist_command(new_cmd);
            }
            self.persist.append(new_cmd, old_cmd);
            if let Some(act) = self.registry.get_mut(old_id) {
                act.hook_persist_command(old_cmd);
            }
            self.persist.append(head, new_cmd);
        } else {
            self.run_completion_for(new_id, completion, true, now, fx);
            self.run_completion_for(old_id, Completion::FinishReplace, true, now, fx);
        }
    }

    /// Execute a command chain head. Store and delete dispatch to the store
    /// adapter and wait; no-ops complete inline, iteratively, so long chains
    /// cannot exhaust the stack.
    pub fn run_persist(&mut self, first: CmdId, now: DateTime<Utc>, fx: &mut Fx) {
        let mut cursor = Some(first);
        while let Some(cmd_id) = cursor {
            let Some(cmd) = self.persist.get(cmd_id) else {
                return;
            };
            let kind = cmd.kind;
            let activity_id = cmd.activity_id;
            let token_from = self.persist.get(cmd_id).and_then(|c| c.token_from);
            match kind {
                PersistCmdKind::Store => {
                    // Adopt the replaced Activity's token if ours never got a
                    // document id; the store then overwrites in place.
                    let stale = self
                        .registry
                        .get(activity_id)
                        .and_then(|a| a.persist_token.as_ref())
                        .map(|t| !t.is_valid())
                        .unwrap_or(true);
                    if stale {
                        if let Some(src) = token_from {
                            let inherited = self
                                .registry
                                .get(src)
                                .and_then(|a| a.persist_token.clone())
                                .filter(PersistToken::is_valid);
                            if let Some(token) = inherited {
                                if let Some(act) = self.registry.get_mut(activity_id) {
                                    act.persist_token = Some(token);
                                }
                            }
                        }
                    }
                    let (doc, token) = match self.registry.get(activity_id) {
                        Some(act) => (act.to_document(), act.persist_token.clone()),
                        None => (serde_json::Value::Null, None),
                    };
                    let token = token.unwrap_or_default();
                    tracing::debug!(cmd = %cmd_id, activity = %activity_id, "dispatching store");
                    fx.push(Effect::PersistDispatch {
                        cmd_id,
                        op: StoreOp::Put { doc_id: token.doc_id, rev: token.rev, doc },
                    });
                    return;
                }
                PersistCmdKind::Delete => {
                    let doc_id = self
                        .registry
                        .get(activity_id)
                        .and_then(|a| a.persist_token.clone())
                        .and_then(|t| t.doc_id);
                    match doc_id {
                        Some(doc_id) => {
                            let rev = self
                                .registry
                                .get(activity_id)
                                .and_then(|a| a.persist_token.clone())
                                .and_then(|t| t.rev);
                            tracing::debug!(cmd = %cmd_id, activity = %activity_id, "dispatching delete");
                            fx.push(Effect::PersistDispatch {
                                cmd_id,
                                op: StoreOp::Del { doc_id, rev },
                            });
                            return;
                        }
                        None => {
                            // Never stored; nothing durable to remove.
                            cursor = self.finish_command(cmd_id, true, None, now, fx);
                        }
                    }
                }
                PersistCmdKind::Noop => {
                    cursor = self.finish_command(cmd_id, true, None, now, fx);
                }
            }
        }
    }

    /// A dispatched command came back from the store.
    pub fn persist_complete(
        &mut self,
        cmd_id: CmdId,
        ok: bool,
        token: Option<PersistToken>,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        if let Some(next) = self.finish_command(cmd_id, ok, token, now, fx) {
            self.run_persist(next, now, fx);
        }
    }

    /// Run the completion, unhook, and hand back the chain continuation.
    ///
    /// The completion runs while the command is still hooked, so anything it
    /// hooks itself chains behind this command; `next` is re-read afterwards
    /// to pick that up.
    fn finish_command(
        &mut self,
        cmd_id: CmdId,
        ok: bool,
        token: Option<PersistToken>,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) -> Option<CmdId> {
        let (activity_id, completion) = {
            let cmd = self.persist.get_mut(cmd_id)?;
            (cmd.activity_id, std::mem::replace(&mut cmd.completion, Completion::None))
        };
        if ok {
            if let Some(token) = token {
                if let Some(act) = self.registry.get_mut(activity_id) {
                    act.persist_token = Some(token);
                }
            }
        } else {
            tracing::warn!(cmd = %cmd_id, activity = %activity_id, "persist command failed");
        }

        self.run_completion_for(activity_id, completion, ok, now, fx);

        let next = self.persist.get(cmd_id).and_then(|c| c.next);
        self.persist.remove(cmd_id);

        let ending_and_clear = {
            match self.registry.get_mut(activity_id) {
                Some(act) => {
                    act.unhook_persist_command(cmd_id);
                    act.ending && !act.is_persist_command_hooked()
                }
                None => false,
            }
        };
        if ending_and_clear {
            self.end_activity(activity_id, now, fx);
        }
        next
    }

    /// Dispatch one completion continuation.
    fn run_completion_for(
        &mut self,
        id: ActivityId,
        completion: Completion,
        ok: bool,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        match completion {
            Completion::None => {}
            Completion::FinishReplace => {
                // The replacement owns the token now.
                if let Some(act) = self.registry.get_mut(id) {
                    act.persist_token = None;
                }
            }
            Completion::FinishEnd { reply, restart } => {
                if !restart {
                    let registered =
                        self.registry.get(id).map(|a| a.name_registered).unwrap_or(false);
                    if registered {
                        self.registry.unregister_name(id);
                    }
                }
                if let Some(reply) = reply {
                    let _ = reply.send(Reply::ok());
                }
            }
            Completion::FinishCreate {
                reply,
                outlet,
                conn_id,
                caller,
                subscribe,
                detailed,
                start,
            } => {
                if !ok {
                    tracing::warn!(activity = %id, "create persisted with failure; continuing in-memory");
                }
                if self.registry.get(id).is_none() {
                    let _ = reply.send(Reply::error(&am_core::AmError::internal(
                        "activity disappeared during creation",
                    )));
                    return;
                }
                if subscribe {
                    let sub = Subscription::new(caller, detailed, outlet);
                    let sub_id = sub.id;
                    if let Ok(sub_id) = self.add_subscription(id, sub, fx) {
                        let parent_open =
                            self.registry.get(id).map(|a| a.parent.is_none()).unwrap_or(false);
                        if parent_open {
                            if let Some(act) = self.registry.get_mut(id) {
                                act.parent = Some(sub_id);
                                act.released = false;
                            }
                        }
                    }
                    self.track_conn_subscription(conn_id, id, sub_id);
                }
                let _ = reply.send(Reply::created(id));
                if start {
                    if let Err(err) =
                        self.send_command(id, ActivityCommand::Start, false, now, fx)
                    {
                        tracing::warn!(activity = %id, error = %err, "start after create failed");
                    }
                    let not_running =
                        self.registry.get(id).map(|a| !a.is_running()).unwrap_or(false);
                    if not_running {
                        // Tell subscribers what the holdup is.
                        if let Some(act) = self.registry.get_mut(id) {
                            act.broadcast_event(am_core::ActivityEvent::Update);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
