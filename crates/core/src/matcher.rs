// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger matchers.
//!
//! A matcher decides whether a trigger-subscription response fires the
//! trigger. Matchers are pure and deterministic over the response document;
//! no matcher may observe anything but the response passed in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property path into the response: a single key or a chain of keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropPath {
    Key(String),
    Path(Vec<String>),
}

/// Comparison operators recognized in `where` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
}

/// One node of a `where` tree: a comparison, or an and/or combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereClause {
    And {
        and: Vec<WhereClause>,
    },
    Or {
        or: Vec<WhereClause>,
    },
    Compare {
        prop: PropPath,
        op: CompareOp,
        val: Value,
    },
}

/// How results aggregate at the current nesting level. The mode also drives
/// the descent into array-valued response properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    And,
    Or,
}

/// Three-valued clause outcome: a missing property is distinct from a failed
/// comparison, and neither counts as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchResult {
    NoProperty,
    Matched,
    NotMatched,
}

impl WhereClause {
    fn check(&self, response: &Value, mode: MatchMode) -> MatchResult {
        match self {
            WhereClause::And { and } => check_clauses(and, response, MatchMode::And),
            WhereClause::Or { or } => check_clauses(or, response, MatchMode::Or),
            WhereClause::Compare { prop, op, val } => {
                check_property(prop, response, *op, val, mode)
            }
        }
    }
}

fn check_clauses(clauses: &[WhereClause], response: &Value, mode: MatchMode) -> MatchResult {
    for clause in clauses {
        let result = clause.check(response, mode);
        match mode {
            MatchMode::And => {
                if result != MatchResult::Matched {
                    return MatchResult::NotMatched;
                }
            }
            MatchMode::Or => {
                if result == MatchResult::Matched {
                    return MatchResult::Matched;
                }
            }
        }
    }
    if mode == MatchMode::And {
        MatchResult::Matched
    } else {
        MatchResult::NotMatched
    }
}

fn check_property(
    prop: &PropPath,
    response: &Value,
    op: CompareOp,
    val: &Value,
    mode: MatchMode,
) -> MatchResult {
    match prop {
        PropPath::Key(key) => match response.get(key) {
            Some(found) => check_match(found, op, val),
            None => MatchResult::NoProperty,
        },
        PropPath::Path(keys) => check_path(keys, response, op, val, mode),
    }
}

/// Walk a multi-segment key path. An array-valued intermediate property
/// starts a DFS over its elements with the remaining key segments, each
/// element's result aggregated under the current mode; this descends into
/// arrays of arrays as well.
fn check_path(
    keys: &[String],
    response: &Value,
    op: CompareOp,
    val: &Value,
    mode: MatchMode,
) -> MatchResult {
    let mut onion = response;
    let mut idx = 0;
    while idx < keys.len() {
        match onion {
            Value::Array(elements) => {
                for element in elements {
                    let result = check_path(&keys[idx..], element, op, val, mode);
                    match mode {
                        MatchMode::And => {
                            if result != MatchResult::Matched {
                                return MatchResult::NotMatched;
                            }
                        }
                        MatchMode::Or => {
                            if result == MatchResult::Matched {
                                return MatchResult::Matched;
                            }
                        }
                    }
                }
                return if mode == MatchMode::And {
                    MatchResult::Matched
                } else {
                    MatchResult::NotMatched
                };
            }
            Value::Object(map) => match map.get(&keys[idx]) {
                Some(next) => {
                    onion = next;
                    idx += 1;
                }
                None => return MatchResult::NoProperty,
            },
            _ => return MatchResult::NoProperty,
        }
    }
    check_match(onion, op, val)
}

/// Compare a resolved response value against the clause value.
///
/// Equality is literal (with numeric coercion so 1 == 1.0); ordering
/// operators require both sides to be numbers or both strings.
fn check_match(found: &Value, op: CompareOp, val: &Value) -> MatchResult {
    let matched = match op {
        CompareOp::Eq => values_equal(found, val),
        CompareOp::Ne => !values_equal(found, val),
        CompareOp::Lt | CompareOp::Le | CompareOp::Ge | CompareOp::Gt => {
            match values_ordering(found, val) {
                Some(ord) => match op {
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Le => ord.is_le(),
                    CompareOp::Ge => ord.is_ge(),
                    CompareOp::Gt => ord.is_gt(),
                    _ => unreachable!("equality ops handled above"),
                },
                None => false,
            }
        }
    };
    if matched {
        MatchResult::Matched
    } else {
        MatchResult::NotMatched
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        // Numeric compare so 1 == 1.0
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn values_ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// What it takes for a trigger-subscription response to fire the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerMatcher {
    /// Any response at all fires.
    Any,
    /// The response contains the given key.
    Key(String),
    /// The response's value at `key` equals `value`.
    Compare { key: String, value: Value },
    /// Recursive where tree, clauses combined with AND at the root.
    Where(Vec<WhereClause>),
}

impl TriggerMatcher {
    pub fn matches(&self, response: &Value) -> bool {
        match self {
            TriggerMatcher::Any => true,
            TriggerMatcher::Key(key) => response.get(key).is_some(),
            TriggerMatcher::Compare { key, value } => {
                response.get(key).map(|found| values_equal(found, value)).unwrap_or(false)
            }
            TriggerMatcher::Where(clauses) => {
                check_clauses(clauses, response, MatchMode::And) == MatchResult::Matched
            }
        }
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
