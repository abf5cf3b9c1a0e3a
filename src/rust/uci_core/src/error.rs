// Copyright 2022, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This module defines the error type and the result type for this library.

use uci_packets::DecodeError;

/// The error type for the uci_core library.
#[non_exhaustive] // Adding new enum fields doesn't break the downstream build.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The provided parameters are invalid, or the method is not allowed to be called in the
    /// current state.
    #[error("Bad parameters")]
    BadParameters,
    /// The allocator could not provide a buffer block.
    #[error("No buffer available")]
    NoBuffer,
    /// A transport is already attached.
    #[error("A transport is already attached")]
    Busy,
    /// No transport is attached.
    #[error("No transport is attached")]
    NotAttached,
    /// A handler group for this group id is already registered.
    #[error("Group id {0:#x} is already registered")]
    DuplicatedGroupId(u8),
    /// The message does not hold enough bytes for the requested read.
    #[error("Message truncated: wanted {wanted} bytes, {remaining} remaining")]
    Truncated { wanted: usize, remaining: usize },
    /// Nested sub-messages exceed the maximum depth.
    #[error("Nested message depth exceeded")]
    NestTooDeep,
    /// The transport failed to send a packet.
    #[error("The packet send failed with an error")]
    PacketTxError,
    /// The packet header could not be decoded.
    #[error("Could not parse packet: {0}")]
    Parse(#[from] DecodeError),
}

/// The result type for the uci_core library.
///
/// This type is broadly used by the methods in this library which may produce an error.
pub type Result<T> = std::result::Result<T, Error>;
