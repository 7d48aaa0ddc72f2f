// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for reply validation and fixed-offset decoding.

use obs_bridge::error::GENERIC_FAILURE;
use obs_bridge::{is_valid, validate, CallResponse, Error, TypedValue};

fn reply(values: Vec<TypedValue>) -> CallResponse {
    CallResponse::new(values)
}

// ===========================================================================
// validate
// ===========================================================================

#[test]
fn empty_reply_is_transport_failure() {
    assert!(matches!(validate(&CallResponse::empty()), Err(Error::Transport)));
    assert!(!is_valid(&CallResponse::empty()));
}

#[test]
fn nonzero_status_surfaces_message() {
    let r = reply(vec![1u64.into(), "scene not found".into()]);
    match validate(&r) {
        Err(Error::Remote { status, message }) => {
            assert_eq!(status, 1);
            assert_eq!(message, "scene not found");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn nonzero_status_without_message_is_generic() {
    for r in [
        reply(vec![2u64.into()]),
        reply(vec![2u64.into(), TypedValue::Int32(5)]),
        reply(vec![2u64.into(), "".into()]),
    ] {
        match validate(&r) {
            Err(Error::Remote { status, message }) => {
                assert_eq!(status, 2);
                assert_eq!(message, GENERIC_FAILURE);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[test]
fn zero_status_succeeds_regardless_of_trailing() {
    assert!(validate(&reply(vec![0u64.into()])).is_ok());
    assert!(validate(&reply(vec![0u64.into(), "ignored".into(), 3.5f64.into()])).is_ok());
    assert!(validate(&reply(vec![TypedValue::Int32(0)])).is_ok());
    assert!(is_valid(&reply(vec![TypedValue::UInt32(0)])));
}

#[test]
fn non_integer_status_is_decode_error() {
    let r = reply(vec!["0".into()]);
    assert!(matches!(validate(&r), Err(Error::Decode { index: 0, .. })));
}

#[test]
fn remote_error_displays_message() {
    let err = validate(&reply(vec![1u64.into(), "busy".into()])).unwrap_err();
    assert_eq!(err.to_string(), "busy");
}

// ===========================================================================
// Offsets
// ===========================================================================

#[test]
fn require_len_reports_truncation() {
    let r = reply(vec![0u64.into(), 1.0f64.into()]);
    assert!(r.require_len("M", 2).is_ok());
    match r.require_len("M", 3) {
        Err(Error::Truncated {
            method,
            expected,
            actual,
        }) => {
            assert_eq!(method, "M");
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn decode_past_end_is_truncated_not_panic() {
    let r = reply(vec![0u64.into()]);
    assert!(matches!(r.decode::<f64>("M", 4), Err(Error::Truncated { .. })));
}

#[test]
fn decode_wrong_kind_names_index() {
    let r = reply(vec![0u64.into(), "x".into()]);
    match r.decode::<f64>("M", 1) {
        Err(Error::Decode { index, .. }) => assert_eq!(index, 1),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn string_or_falls_back() {
    let r = reply(vec![0u64.into(), "".into(), TypedValue::Int32(1), "12 GB".into()]);
    assert_eq!(r.string_or(1, "dflt"), "dflt");
    assert_eq!(r.string_or(2, "dflt"), "dflt");
    assert_eq!(r.string_or(3, "dflt"), "12 GB");
    assert_eq!(r.string_or(9, "dflt"), "dflt");
}
