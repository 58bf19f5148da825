// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus identities.
//!
//! Every client on the message bus is an application, a service, or an
//! anonymous connection. `(name, creator)` pairs key the Activity name table,
//! so `BusId` ordering and equality matter for registry lookups.

use serde::{Deserialize, Serialize};

/// Which bus a connection arrived on. Private-bus methods are rejected with
/// `AccessDenied` when called from the public bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    #[default]
    Private,
    Public,
}

crate::simple_display! {
    BusType {
        Private => "private",
        Public => "public",
    }
}

/// Identity of a bus client.
///
/// Application ids may arrive with a trailing version (`"com.example.mail 1.2"`);
/// the version is stripped at construction so equality matches across upgrades.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BusId {
    App(String),
    Service(String),
    Anonymous(String),
}

impl BusId {
    pub fn app(id: impl AsRef<str>) -> Self {
        let id = id.as_ref();
        let bare = id.split_whitespace().next().unwrap_or(id);
        BusId::App(bare.to_string())
    }

    pub fn service(id: impl Into<String>) -> Self {
        BusId::Service(id.into())
    }

    pub fn anonymous(token: impl Into<String>) -> Self {
        BusId::Anonymous(token.into())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, BusId::Anonymous(_))
    }

    /// The bare identity string, without the type tag.
    pub fn name(&self) -> &str {
        match self {
            BusId::App(s) | BusId::Service(s) | BusId::Anonymous(s) => s,
        }
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusId::App(s) => write!(f, "app:{s}"),
            BusId::Service(s) => write!(f, "svc:{s}"),
            BusId::Anonymous(s) => write!(f, "anon:{s}"),
        }
    }
}

impl Serialize for BusId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BusId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(BusId::parse(&s))
    }
}

impl BusId {
    /// Parse the `Display` form back into a typed id.
    ///
    /// Untagged strings are treated as service names, which is what the bus
    /// transport reports for trusted daemons.
    pub fn parse(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix("app:") {
            BusId::app(rest)
        } else if let Some(rest) = s.strip_prefix("svc:") {
            BusId::Service(rest.to_string())
        } else if let Some(rest) = s.strip_prefix("anon:") {
            BusId::Anonymous(rest.to_string())
        } else {
            BusId::Service(s.to_string())
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
