// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn priority_order() {
    use ActivityPriority::*;
    assert!(Lowest < Low);
    assert!(Low < Normal);
    assert!(Normal < High);
    assert!(High < Highest);
}

#[test]
fn default_is_normal() {
    assert_eq!(ActivityPriority::default(), ActivityPriority::Normal);
}

#[test]
fn parse_round_trips_display() {
    for p in [
        ActivityPriority::Lowest,
        ActivityPriority::Low,
        ActivityPriority::Normal,
        ActivityPriority::High,
        ActivityPriority::Highest,
    ] {
        assert_eq!(ActivityPriority::parse(&p.to_string()), Some(p));
    }
    assert_eq!(ActivityPriority::parse("urgent"), None);
}
