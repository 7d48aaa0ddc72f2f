// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Crate-wide error type for the API surface.

use std::io;

use crate::value::DecodeError;
use crate::wire::WireError;

/// Message used when a failed reply carries no text of its own.
pub const GENERIC_FAILURE: &str = "Failed to make IPC call, verify IPC status.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reply was empty: the channel to the server failed or was lost.
    #[error("lost connection to the server process")]
    Transport,

    /// The server answered with a nonzero status.
    #[error("{message}")]
    Remote { status: u64, message: String },

    /// The reply is shorter than the method's documented layout.
    #[error("{method}: reply has {actual} values, expected at least {expected}")]
    Truncated {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// A reply element had the wrong kind.
    #[error("reply element {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: DecodeError,
    },

    /// A host argument was missing or had the wrong type.
    #[error("argument {index}: expected {expected}")]
    InvalidArgument { index: usize, expected: &'static str },

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
