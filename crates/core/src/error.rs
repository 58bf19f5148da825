// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error codes crossing the method boundary.
//!
//! Every RPC reply carries `{returnValue, errorCode, errorText}`. Internal
//! transition errors never surface raw; the worst observable outcome is a
//! bare `internal` envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-visible error discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// Activity lookup by id or `(name, creator)` missed.
    NotFound,
    /// `create` without `replace` collided on `(name, creator)`.
    Exists,
    /// Malformed spec, missing required flags, out-of-range values.
    InvalidArgument,
    /// `release`/`complete` from a non-parent non-creator.
    WrongCaller,
    /// Trigger arm/disarm from a non-owner.
    WrongOwner,
    /// `adopt(wait=false)` while the Activity has a parent.
    WouldBlock,
    /// Private-bus-only method invoked from the public bus.
    AccessDenied,
    /// Spec names a requirement no provider registered.
    UnknownRequirement,
    /// Out-call failed recoverably.
    TransientTransport,
    /// Out-call failed unrecoverably.
    PermanentTransport,
    /// Invariant violation caught at the method boundary.
    Internal,
}

crate::simple_display! {
    ErrorCode {
        NotFound => "notFound",
        Exists => "exists",
        InvalidArgument => "invalidArgument",
        WrongCaller => "wrongCaller",
        WrongOwner => "wrongOwner",
        WouldBlock => "wouldBlock",
        AccessDenied => "accessDenied",
        UnknownRequirement => "unknownRequirement",
        TransientTransport => "transientTransport",
        PermanentTransport => "permanentTransport",
        Internal => "internal",
    }
}

/// A method-boundary error: code plus human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {text}")]
pub struct AmError {
    pub code: ErrorCode,
    pub text: String,
}

impl AmError {
    pub fn new(code: ErrorCode, text: impl Into<String>) -> Self {
        Self { code, text: text.into() }
    }

    pub fn not_found(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, text)
    }

    pub fn exists(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Exists, text)
    }

    pub fn invalid_argument(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, text)
    }

    pub fn wrong_caller(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::WrongCaller, text)
    }

    pub fn wrong_owner(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::WrongOwner, text)
    }

    pub fn would_block(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::WouldBlock, text)
    }

    pub fn access_denied(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, text)
    }

    pub fn unknown_requirement(name: &str) -> Self {
        Self::new(ErrorCode::UnknownRequirement, format!("no provider registered for '{name}'"))
    }

    pub fn internal(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, text)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
