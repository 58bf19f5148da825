// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine: one dispatch loop owning all core state.
//!
//! Requests arrive from the listener, signals arrive from the adapters; both
//! are serialized through this loop, mutate [`EngineState`], and leave as
//! effects for the executor. There is no other path into the state.

pub mod effect;
pub mod executor;
pub mod methods;
pub mod signal;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use am_core::{BusId, BusType, Clock};
use am_wire::{Reply, Request};

use crate::model::{EngineConfig, EngineState};
use self::effect::Fx;
use self::executor::{EngineDeps, Executor};
use self::signal::Signal;

/// Identity and plumbing of one client connection.
#[derive(Debug, Clone)]
pub struct ConnCtx {
    pub conn_id: u64,
    pub caller: BusId,
    pub bus: BusType,
    pub outlet: crate::model::subscription::EventSender,
}

/// Inputs to the engine loop.
#[derive(Debug)]
pub enum Msg {
    Rpc { ctx: ConnCtx, request: Request, reply: oneshot::Sender<Reply> },
    Signal(Signal),
}

/// The engine: state, executor, and the two inbound channels.
pub struct Engine<C: Clock> {
    state: EngineState,
    executor: Executor,
    clock: C,
    msg_rx: mpsc::Receiver<Msg>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
}

/// Handle for feeding the engine.
#[derive(Clone)]
pub struct EngineHandle {
    pub msg_tx: mpsc::Sender<Msg>,
    pub signal_tx: mpsc::UnboundedSender<Signal>,
}

impl<C: Clock> Engine<C> {
    pub fn new(deps: EngineDeps, config: EngineConfig, clock: C) -> (Self, EngineHandle) {
        let (msg_tx, msg_rx) = mpsc::channel(256);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let executor = Executor::new(deps, signal_tx.clone());
        let engine = Self { state: EngineState::new(config), executor, clock, msg_rx, signal_rx };
        (engine, EngineHandle { msg_tx, signal_tx })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    /// Execute effects produced before the loop started (reload, gates).
    pub async fn flush_startup_effects(&self, effects: Vec<effect::Effect>) {
        self.executor.execute_all(effects).await;
    }

    /// Run until shutdown is requested or both channels close.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("engine loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
                sig = self.signal_rx.recv() => match sig {
                    Some(sig) => self.dispatch(Msg::Signal(sig)).await,
                    None => break,
                },
            }
        }
        tracing::info!("engine loop stopped");
    }

    /// Handle one message and execute whatever effects fell out.
    pub async fn dispatch(&mut self, msg: Msg) {
        let mut fx = Fx::new();
        match msg {
            Msg::Rpc { ctx, request, reply } => {
                let now = self.clock.utc_now();
                methods::handle_request(&mut self.state, ctx, request, reply, now, &mut fx);
            }
            Msg::Signal(signal) => {
                let now = self.clock.utc_now();
                self.handle_signal(signal, now, &mut fx);
            }
        }
        let effects = fx.drain();
        if !effects.is_empty() {
            self.executor.execute_all(effects).await;
        }
    }

    fn handle_signal(&mut self, signal: Signal, now: chrono::DateTime<chrono::Utc>, fx: &mut Fx) {
        match signal {
            Signal::TriggerResponse { activity_id, response } => {
                self.state.trigger_response(activity_id, &response, fx);
            }
            Signal::CallbackResult { activity_id, outcome } => {
                self.state.callback_result(activity_id, outcome, now, fx);
            }
            Signal::PowerLocked { activity_id } => self.state.power_locked(activity_id, fx),
            Signal::PowerUnlocked { activity_id } => {
                self.state.power_unlocked(activity_id, now, fx);
            }
            Signal::PersistComplete { cmd_id, ok, token } => {
                self.state.persist_complete(cmd_id, ok, token, now, fx);
            }
            Signal::TimerFired { id } => match id {
                effect::TimerId::ScheduleWake => self.state.schedule_wake(now, fx),
                effect::TimerId::InteractiveYield => {
                    self.state.interactive_yield_timeout(now, fx);
                }
            },
            Signal::RequirementChanged { name, value } => {
                self.state.requirement_changed(&name, value, fx);
            }
            Signal::TimezoneChanged { offset_secs } => {
                self.state.timezone_changed(offset_secs, now, fx);
            }
            Signal::ConnectionClosed { conn_id } => {
                let subscriptions = self.state.conn_subs.remove(&conn_id).unwrap_or_default();
                for (activity_id, sub_id) in subscriptions {
                    self.state.remove_subscription(activity_id, sub_id, now, fx);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
