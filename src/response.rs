// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Call replies and their validation.
//
// A reply is a sequence of typed values. Element 0 is the status code
// (0 = success); a failed reply may carry a message at element 1. An empty
// reply means the channel failed before an answer arrived.

use crate::error::{Error, Result, GENERIC_FAILURE};
use crate::value::{FromValue, TypedValue};

/// Status code of a successful reply.
pub const STATUS_OK: u64 = 0;

/// The values returned by a synchronous call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallResponse {
    values: Vec<TypedValue>,
}

impl CallResponse {
    pub fn new(values: Vec<TypedValue>) -> Self {
        Self { values }
    }

    /// The reply produced when the channel failed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&TypedValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<TypedValue> {
        self.values
    }

    /// Fail with [`Error::Truncated`] unless the reply has at least `min`
    /// values.
    pub fn require_len(&self, method: &str, min: usize) -> Result<()> {
        if self.values.len() < min {
            return Err(Error::Truncated {
                method: method.to_owned(),
                expected: min,
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    /// Decode the element at `index` as `T`.
    pub fn decode<T: FromValue>(&self, method: &str, index: usize) -> Result<T> {
        self.require_len(method, index + 1)?;
        self.values[index]
            .decode::<T>()
            .map_err(|source| Error::Decode { index, source })
    }

    /// The string at `index`, or `default` when the element is missing, not
    /// a string, or empty.
    pub fn string_or(&self, index: usize, default: &str) -> String {
        match self.values.get(index).map(TypedValue::as_str) {
            Some(Ok(s)) if !s.is_empty() => s.to_owned(),
            _ => default.to_owned(),
        }
    }
}

impl From<Vec<TypedValue>> for CallResponse {
    fn from(values: Vec<TypedValue>) -> Self {
        Self::new(values)
    }
}

/// Check a reply's status.
///
/// - no values at all: [`Error::Transport`]
/// - nonzero status: [`Error::Remote`] carrying element 1's text when it is a
///   string, otherwise a generic message
/// - status 0: success, whatever follows
pub fn validate(response: &CallResponse) -> Result<()> {
    let head = match response.get(0) {
        Some(v) => v,
        None => return Err(Error::Transport),
    };
    let status = head
        .as_status()
        .map_err(|source| Error::Decode { index: 0, source })?;
    if status == STATUS_OK {
        return Ok(());
    }

    let message = match response.get(1).map(TypedValue::as_str) {
        Some(Ok(msg)) if !msg.is_empty() => msg.to_owned(),
        _ => GENERIC_FAILURE.to_owned(),
    };
    Err(Error::Remote { status, message })
}

/// [`validate`] reduced to a flag; the failure is logged.
pub fn is_valid(response: &CallResponse) -> bool {
    match validate(response) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "call failed");
            false
        }
    }
}
