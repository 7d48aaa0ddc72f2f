// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for TypedValue: tag-checked access and native conversions.

use obs_bridge::{DecodeError, FromValue, Kind, TypedValue};

// ===========================================================================
// Accessors
// ===========================================================================

#[test]
fn accessor_matching_kind() {
    assert_eq!(TypedValue::Int32(-7).as_i32(), Ok(-7));
    assert_eq!(TypedValue::UInt32(7).as_u32(), Ok(7));
    assert_eq!(TypedValue::Int64(-1 << 40).as_i64(), Ok(-1 << 40));
    assert_eq!(TypedValue::UInt64(u64::MAX).as_u64(), Ok(u64::MAX));
    assert_eq!(TypedValue::Float64(0.25).as_f64(), Ok(0.25));
    assert_eq!(TypedValue::String("abc".into()).as_str(), Ok("abc"));
    assert_eq!(TypedValue::Binary(vec![1, 2]).as_bytes(), Ok(&[1u8, 2][..]));
}

#[test]
fn accessor_wrong_kind_is_error() {
    let v = TypedValue::Int32(5);
    assert_eq!(
        v.as_str(),
        Err(DecodeError {
            expected: Kind::String,
            found: Kind::Int32,
        })
    );
    assert!(v.as_u32().is_err());
    assert!(v.as_f64().is_err());
    assert!(TypedValue::UInt64(1).as_u32().is_err());
}

#[test]
fn decode_error_message_names_both_kinds() {
    let err = TypedValue::Float64(1.0).as_i32().unwrap_err();
    assert_eq!(err.to_string(), "expected int32 value, found float64");
}

#[test]
fn empty_string_reads_as_empty() {
    assert_eq!(TypedValue::String(String::new()).as_str(), Ok(""));
}

// ===========================================================================
// Booleans and status codes
// ===========================================================================

#[test]
fn bool_travels_as_uint32() {
    assert_eq!(TypedValue::from(true), TypedValue::UInt32(1));
    assert_eq!(TypedValue::from(false), TypedValue::UInt32(0));
    assert_eq!(TypedValue::UInt32(9).as_bool(), Ok(true));
    assert_eq!(TypedValue::UInt32(0).as_bool(), Ok(false));
    assert!(TypedValue::Int32(1).as_bool().is_err());
}

#[test]
fn status_accepts_any_integer_kind() {
    assert_eq!(TypedValue::UInt64(0).as_status(), Ok(0));
    assert_eq!(TypedValue::UInt32(3).as_status(), Ok(3));
    assert_eq!(TypedValue::Int64(2).as_status(), Ok(2));
    assert_ne!(TypedValue::Int32(-1).as_status(), Ok(0));
    assert!(TypedValue::String("0".into()).as_status().is_err());
    assert!(TypedValue::Float64(0.0).as_status().is_err());
}

// ===========================================================================
// FromValue
// ===========================================================================

#[test]
fn generic_decode_uses_declared_kind() {
    assert_eq!(<u64 as FromValue>::KIND, Kind::UInt64);
    assert_eq!(<bool as FromValue>::KIND, Kind::UInt32);
    assert_eq!(TypedValue::UInt64(42).decode::<u64>(), Ok(42));
    assert_eq!(
        TypedValue::String("x".into()).decode::<String>(),
        Ok("x".to_owned())
    );
    assert_eq!(TypedValue::from(&b"ab"[..]).decode::<Vec<u8>>(), Ok(b"ab".to_vec()));
    assert!(TypedValue::UInt32(42).decode::<u64>().is_err());
}

#[test]
fn kind_tags_are_stable() {
    for (tag, kind) in [
        (1, Kind::Int32),
        (2, Kind::UInt32),
        (3, Kind::Int64),
        (4, Kind::UInt64),
        (5, Kind::Float64),
        (6, Kind::String),
        (7, Kind::Binary),
    ] {
        assert_eq!(kind.tag(), tag);
        assert_eq!(Kind::from_tag(tag), Some(kind));
    }
    assert_eq!(Kind::from_tag(0), None);
    assert_eq!(Kind::from_tag(8), None);
}
