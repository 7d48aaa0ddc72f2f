// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Typed values exchanged with the server process.
// Every call argument and every element of a reply is one of these.

use std::fmt;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Discriminant of a [`TypedValue`].
///
/// The numeric tag is the one written to the wire (see `wire.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Int32 = 1,
    UInt32 = 2,
    Int64 = 3,
    UInt64 = 4,
    Float64 = 5,
    String = 6,
    Binary = 7,
}

impl Kind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int32),
            2 => Some(Self::UInt32),
            3 => Some(Self::Int64),
            4 => Some(Self::UInt64),
            5 => Some(Self::Float64),
            6 => Some(Self::String),
            7 => Some(Self::Binary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// A value was read as a kind it does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} value, found {found}")]
pub struct DecodeError {
    pub expected: Kind,
    pub found: Kind,
}

// ---------------------------------------------------------------------------
// TypedValue
// ---------------------------------------------------------------------------

/// A single typed argument or reply element.
///
/// Accessors check the tag: asking an `Int32` for its string is a
/// [`DecodeError`], never a reinterpretation of the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    String(String),
    Binary(Vec<u8>),
}

impl TypedValue {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Int32(_) => Kind::Int32,
            Self::UInt32(_) => Kind::UInt32,
            Self::Int64(_) => Kind::Int64,
            Self::UInt64(_) => Kind::UInt64,
            Self::Float64(_) => Kind::Float64,
            Self::String(_) => Kind::String,
            Self::Binary(_) => Kind::Binary,
        }
    }

    fn mismatch(&self, expected: Kind) -> DecodeError {
        DecodeError {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_i32(&self) -> Result<i32, DecodeError> {
        match self {
            Self::Int32(v) => Ok(*v),
            other => Err(other.mismatch(Kind::Int32)),
        }
    }

    pub fn as_u32(&self) -> Result<u32, DecodeError> {
        match self {
            Self::UInt32(v) => Ok(*v),
            other => Err(other.mismatch(Kind::UInt32)),
        }
    }

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        match self {
            Self::Int64(v) => Ok(*v),
            other => Err(other.mismatch(Kind::Int64)),
        }
    }

    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        match self {
            Self::UInt64(v) => Ok(*v),
            other => Err(other.mismatch(Kind::UInt64)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        match self {
            Self::Float64(v) => Ok(*v),
            other => Err(other.mismatch(Kind::Float64)),
        }
    }

    /// The string payload. An empty backing string is returned as `""`.
    pub fn as_str(&self) -> Result<&str, DecodeError> {
        match self {
            Self::String(s) => Ok(s.as_str()),
            other => Err(other.mismatch(Kind::String)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], DecodeError> {
        match self {
            Self::Binary(b) => Ok(b.as_slice()),
            other => Err(other.mismatch(Kind::Binary)),
        }
    }

    /// Booleans travel as `UInt32` 0/1.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        self.as_u32().map(|v| v != 0)
    }

    /// Interpret the value as a reply status code.
    ///
    /// Any integer kind is accepted; negative codes map to a nonzero status.
    pub fn as_status(&self) -> Result<u64, DecodeError> {
        match self {
            Self::Int32(v) => Ok(*v as i64 as u64),
            Self::UInt32(v) => Ok(u64::from(*v)),
            Self::Int64(v) => Ok(*v as u64),
            Self::UInt64(v) => Ok(*v),
            other => Err(other.mismatch(Kind::UInt64)),
        }
    }

    /// Decode into a native type with the kind `T` is documented to travel as.
    pub fn decode<T: FromValue>(&self) -> Result<T, DecodeError> {
        T::from_value(self)
    }
}

// ---------------------------------------------------------------------------
// FromValue
// ---------------------------------------------------------------------------

/// Native types that can be read back out of a [`TypedValue`].
pub trait FromValue: Sized {
    const KIND: Kind;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError>;
}

impl FromValue for i32 {
    const KIND: Kind = Kind::Int32;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_i32()
    }
}

impl FromValue for u32 {
    const KIND: Kind = Kind::UInt32;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_u32()
    }
}

impl FromValue for i64 {
    const KIND: Kind = Kind::Int64;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_i64()
    }
}

impl FromValue for u64 {
    const KIND: Kind = Kind::UInt64;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_u64()
    }
}

impl FromValue for f64 {
    const KIND: Kind = Kind::Float64;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_f64()
    }
}

impl FromValue for bool {
    const KIND: Kind = Kind::UInt32;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_bool()
    }
}

impl FromValue for String {
    const KIND: Kind = Kind::String;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_str().map(str::to_owned)
    }
}

impl FromValue for Vec<u8> {
    const KIND: Kind = Kind::Binary;
    fn from_value(v: &TypedValue) -> Result<Self, DecodeError> {
        v.as_bytes().map(<[u8]>::to_vec)
    }
}

// ---------------------------------------------------------------------------
// Encoding from native values
// ---------------------------------------------------------------------------

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for TypedValue {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::UInt32(u32::from(v))
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(v: &[u8]) -> Self {
        Self::Binary(v.to_vec())
    }
}
