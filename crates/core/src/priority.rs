// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity priorities.

use serde::{Deserialize, Serialize};

/// Priority of an Activity, contributing to resource-container priority.
///
/// `foreground` is shorthand for `{immediate, normal}` and `background` for
/// `{not-immediate, low}`; the aliases are resolved during spec parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

crate::simple_display! {
    ActivityPriority {
        Lowest => "lowest",
        Low => "low",
        Normal => "normal",
        High => "high",
        Highest => "highest",
    }
}

impl ActivityPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lowest" => Some(Self::Lowest),
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "highest" => Some(Self::Highest),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
