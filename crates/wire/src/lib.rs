// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! am-wire: client ↔ `activityd` protocol types.
//!
//! Transport is newline-delimited JSON. Every request is answered by exactly
//! one [`Reply`]; subscription methods additionally stream [`EventRecord`]s
//! until the subscription drops.

mod event;
mod request;
mod response;
mod types;

pub use event::EventRecord;
pub use request::{ActivityRef, CompleteUpdates, ListFlags, Request};
pub use response::{Reply, ReplyBody};
pub use types::{ActivityDetails, InternalDetails, ManagerInfo, QueueInfo};

/// Protocol version, checked in the Hello handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");
