// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_codes_serialize_camel_case() {
    assert_eq!(serde_json::to_string(&ErrorCode::NotFound).unwrap(), "\"notFound\"");
    assert_eq!(serde_json::to_string(&ErrorCode::WouldBlock).unwrap(), "\"wouldBlock\"");
    assert_eq!(
        serde_json::to_string(&ErrorCode::UnknownRequirement).unwrap(),
        "\"unknownRequirement\""
    );
}

#[test]
fn display_matches_serde_name() {
    let json = serde_json::to_string(&ErrorCode::TransientTransport).unwrap();
    assert_eq!(json.trim_matches('"'), ErrorCode::TransientTransport.to_string());
}

#[test]
fn am_error_formats_code_and_text() {
    let err = AmError::not_found("activity 7 not found");
    assert_eq!(err.to_string(), "notFound: activity 7 not found");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn unknown_requirement_names_the_requirement() {
    let err = AmError::unknown_requirement("internet");
    assert!(err.text.contains("internet"));
    assert_eq!(err.code, ErrorCode::UnknownRequirement);
}
