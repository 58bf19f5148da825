// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reply envelope.
//!
//! Every method replies `{returnValue, errorCode?, errorText?}` plus
//! method-specific fields flattened alongside.

use serde::{Deserialize, Serialize};

use am_core::{ActivityId, ActivityState, AmError, ErrorCode};

use crate::types::{ActivityDetails, ManagerInfo};

/// Method-specific reply fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyBody {
    /// `adopt`: id plus adoption outcome.
    ///
    /// Variant order matters: untagged deserialization tries top-down, so the
    /// wider payloads must precede the bare `Created` shape.
    Adopted {
        #[serde(rename = "activityId")]
        activity_id: ActivityId,
        adopted: bool,
    },
    /// `monitor`: current computed state.
    State {
        #[serde(rename = "activityId")]
        activity_id: ActivityId,
        state: ActivityState,
    },
    /// `create` and other id-bearing replies.
    Created {
        #[serde(rename = "activityId")]
        activity_id: ActivityId,
    },
    /// `getDetails`: one Activity.
    Details {
        #[serde(rename = "$activity")]
        activity: Box<ActivityDetails>,
    },
    /// `list`: all registered Activities.
    List { activities: Vec<ActivityDetails> },
    /// `info`: manager state dump.
    Info {
        #[serde(flatten)]
        info: Box<ManagerInfo>,
    },
    /// `hello`
    Hello { version: String },
}

/// Reply from the daemon to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "returnValue")]
    pub return_value: bool,
    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(rename = "errorText", default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ReplyBody>,
}

impl Reply {
    /// Bare success.
    pub fn ok() -> Self {
        Self { return_value: true, error_code: None, error_text: None, body: None }
    }

    /// Success with method-specific fields.
    pub fn with_body(body: ReplyBody) -> Self {
        Self { return_value: true, error_code: None, error_text: None, body: Some(body) }
    }

    pub fn created(activity_id: ActivityId) -> Self {
        Self::with_body(ReplyBody::Created { activity_id })
    }

    pub fn adopted(activity_id: ActivityId, adopted: bool) -> Self {
        Self::with_body(ReplyBody::Adopted { activity_id, adopted })
    }

    /// Error envelope. Never carries method fields.
    pub fn error(err: &AmError) -> Self {
        Self {
            return_value: false,
            error_code: Some(err.code),
            error_text: Some(err.text.clone()),
            body: None,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.return_value
    }
}

impl From<Result<Reply, AmError>> for Reply {
    fn from(res: Result<Reply, AmError>) -> Self {
        match res {
            Ok(reply) => reply,
            Err(err) => Reply::error(&err),
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
