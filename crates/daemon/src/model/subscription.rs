// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription records.
//!
//! A subscription binds one client connection to one Activity. Events queue
//! on the record while it is plugged — explicitly, or implicitly because the
//! Activity has a hooked persistence command — and drain strictly in order
//! once the gate opens.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use am_core::{ActivityEvent, BusId, SubscriptionId};
use am_wire::EventRecord;

/// Where delivered events go: the owning connection's write queue.
pub type EventSender = mpsc::UnboundedSender<EventRecord>;

/// Create a detached outlet pair for tests.
pub fn outlet() -> (EventSender, mpsc::UnboundedReceiver<EventRecord>) {
    mpsc::unbounded_channel()
}

/// One client's attachment to an Activity.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber: BusId,
    /// Client asked for `update` events.
    pub detailed: bool,
    plugged: bool,
    queue: VecDeque<EventRecord>,
    /// Last event queued or sent, for consecutive-duplicate suppression.
    last_event: Option<ActivityEvent>,
    outlet: EventSender,
}

impl Subscription {
    pub fn new(subscriber: BusId, detailed: bool, outlet: EventSender) -> Self {
        Self {
            id: SubscriptionId::new(),
            subscriber,
            detailed,
            plugged: false,
            queue: VecDeque::new(),
            last_event: None,
            outlet,
        }
    }

    pub fn plug(&mut self) {
        self.plugged = true;
    }

    /// Clear the explicit plug. The caller flushes once the Activity-level
    /// gate (hooked persist commands) is also clear.
    pub fn unplug(&mut self) {
        self.plugged = false;
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    /// Queue an event for this subscription.
    ///
    /// Update events are dropped for non-detailed subscriptions, and a
    /// consecutive duplicate `update` is suppressed entirely.
    pub fn queue_event(&mut self, record: EventRecord) {
        if record.event.is_detail_only() && !self.detailed {
            return;
        }
        if record.event == ActivityEvent::Update && self.last_event == Some(ActivityEvent::Update)
        {
            return;
        }
        self.last_event = Some(record.event);
        self.queue.push_back(record);
    }

    /// Drain queued events to the connection if the gate is open.
    ///
    /// `gated` is the Activity-level condition (a hooked persist command).
    pub fn flush(&mut self, gated: bool) {
        if self.plugged || gated {
            return;
        }
        while let Some(record) = self.queue.pop_front() {
            // A closed outlet means the connection is going away; the
            // listener will remove the subscription shortly.
            if self.outlet.send(record).is_err() {
                self.queue.clear();
                break;
            }
        }
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
