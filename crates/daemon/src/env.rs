// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;

/// Resolve the state directory:
/// `ACTIVITYD_STATE_DIR` > `XDG_STATE_HOME/activityd` > `~/.local/state/activityd`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ACTIVITYD_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("activityd"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/activityd"))
}

/// Log filter override, e.g. `activityd=debug`.
pub fn log_filter() -> Option<String> {
    std::env::var("ACTIVITYD_LOG").ok().filter(|s| !s.is_empty())
}

/// Force monotonic id allocation (debugging aid).
pub fn monotonic_ids() -> bool {
    std::env::var("ACTIVITYD_MONOTONIC_IDS").map(|v| v == "1" || v == "true").unwrap_or(false)
}
