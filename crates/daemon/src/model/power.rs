// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-Activity wake-lock state.
//!
//! Lock and unlock are asynchronous: the FSM requests a transition and waits
//! for the power daemon's confirmation signal before proceeding. `start` is
//! not broadcast until the lock is held; terminal cleanup waits for release.

/// Wake-lock state of one Activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Unlocked,
    /// Begin requested, waiting for the locked confirmation.
    Locking,
    Locked,
    /// End requested, waiting for the unlocked confirmation.
    Unlocking,
}

impl PowerState {
    pub fn is_locked(&self) -> bool {
        matches!(self, PowerState::Locked)
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, PowerState::Unlocked)
    }
}

am_core::simple_display! {
    PowerState {
        Unlocked => "unlocked",
        Locking => "locking",
        Locked => "locked",
        Unlocking => "unlocking",
    }
}
